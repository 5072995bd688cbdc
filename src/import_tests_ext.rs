use super::{import_backup, read_backup, Backup, ImportError};
use crate::db::SqliteStore;
use crate::domain::note::NoteEntry;
use crate::domain::session::Role;
use crate::clock::FixedClock;
use crate::domain::stage::Stage;
use crate::lifecycle::StageStateMachine;
use crate::repository::{ClientRepository, UserDirectory};
use crate::store::ClientStore;
use crate::timeline::build_timeline;
use time::macros::datetime;
use uuid::Uuid;

const BACKUP: &str = r#"{
  "users": [
    {"_id": "65f0", "id": "U-1", "name": "Priya", "email": "Priya@Example.com", "role": "super_admin", "status": "active"},
    {"id": "U-2", "name": "Omar", "email": "omar@example.com", "role": "user"}
  ],
  "clients": [
    {
      "_id": "65f1",
      "id": "C-1",
      "company_name": "Acme Corp",
      "contact_person": "Road Runner",
      "budget": 50000,
      "budget_currency": "usd",
      "stage": 3,
      "assigned_bde": "U-2",
      "created_at": "2025-03-01T09:00:00.123456",
      "last_interaction": "2025-03-05 10:00:00",
      "notes": [
        "met at expo",
        {"id": "N-1", "text": "sent pricing", "author": "U-2", "timestamp": "2025-03-04T08:00:00Z",
         "attachments": [{"id": "A-1", "filename": "x.pdf", "original_filename": "pricing.pdf", "file_type": "application/pdf", "file_size": 1200, "uploaded_by": "U-2", "uploaded_at": "2025-03-04T08:00:00Z"}]}
      ],
      "attachments": [
        {"id": "A-2", "original_filename": "logo.png", "file_size": 10, "uploaded_by": "U-2", "uploaded_at": "2025-03-02T08:00:00"}
      ]
    },
    {
      "id": "C-2",
      "company_name": "Globex",
      "contact_person": "Hank",
      "stage": 4,
      "is_dropped": true,
      "created_at": "2025-04-01T00:00:00Z"
    }
  ],
  "tasks": []
}"#;

fn temp_store() -> (SqliteStore, String) {
    let path = std::env::temp_dir()
        .join(format!("leadtrack-import-{}.sqlite", Uuid::now_v7()))
        .display()
        .to_string();
    (SqliteStore::open(&path).expect("store should open"), path)
}

fn cleanup(path: &str) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path}{suffix}"));
    }
}

fn parse(raw: &str) -> Backup {
    serde_json::from_str(raw).expect("backup should decode")
}

#[test]
fn imports_both_note_shapes_and_naive_timestamps() {
    let (store, path) = temp_store();
    let summary = import_backup(&store, parse(BACKUP), datetime!(2026-01-01 00:00 UTC))
        .expect("import should succeed");
    assert_eq!(summary.users_imported, 2);
    assert_eq!(summary.clients_imported, 2);

    let acme = store.get("C-1").expect("client should exist");
    assert_eq!(acme.stage, Stage::PricingProposal);
    assert_eq!(acme.created_at, datetime!(2025-03-01 09:00:00.123456 UTC));
    assert_eq!(acme.last_interaction, datetime!(2025-03-05 10:00 UTC));
    assert_eq!(acme.budget.as_ref().unwrap().currency, "USD");
    assert!(matches!(acme.notes[0], NoteEntry::Legacy { .. }));
    let note = acme.notes[1].as_structured().expect("object note is structured");
    assert_eq!(note.attachments[0].media_type, "application/pdf");
    assert_eq!(acme.attachments[0].media_type, "image/png");

    let ids: Vec<String> = build_timeline(&acme).into_iter().map(|e| e.id).collect();
    assert!(ids.contains(&"note-N-1".to_string()));
    assert_eq!(ids.len(), 5);

    let globex = store.get("C-2").expect("client should exist");
    assert_eq!(globex.drop_reason.as_deref(), Some("unspecified"));
    assert_eq!(globex.last_interaction, globex.created_at);

    let omar = store.get_user("U-2").unwrap().expect("user should exist");
    assert_eq!(omar.role, Role::Bde);

    cleanup(&path);
}

#[test]
fn reimport_skips_existing_ids() {
    let (store, path) = temp_store();
    import_backup(&store, parse(BACKUP), datetime!(2026-01-01 00:00 UTC))
        .expect("first import should succeed");
    let again = import_backup(&store, parse(BACKUP), datetime!(2026-01-02 00:00 UTC))
        .expect("second import should succeed");
    assert_eq!(again.clients_imported, 0);
    assert_eq!(again.clients_skipped, 2);
    assert_eq!(again.users_skipped, 2);
    assert_eq!(store.list().unwrap().len(), 2);

    cleanup(&path);
}

#[test]
fn malformed_record_aborts_before_writing() {
    let (store, path) = temp_store();
    let backup = parse(
        r#"{"clients": [
            {"id": "C-ok", "company_name": "Fine", "stage": 1},
            {"id": "C-bad", "company_name": "Broken", "stage": 9}
        ]}"#,
    );
    let err = import_backup(&store, backup, datetime!(2026-01-01 00:00 UTC))
        .expect_err("stage 9 should be rejected");
    assert!(matches!(err, ImportError::Invalid(ref message) if message.contains("C-bad")));
    assert!(store.list().unwrap().is_empty());

    let bad_time = parse(
        r#"{"clients": [{"id": "C-t", "company_name": "T", "created_at": "last tuesday"}]}"#,
    );
    assert!(import_backup(&store, bad_time, datetime!(2026-01-01 00:00 UTC)).is_err());

    cleanup(&path);
}

#[test]
fn failing_insert_rolls_back_the_whole_import() {
    let (store, path) = temp_store();
    let backup = parse(
        r#"{
          "users": [{"id": "U-1", "name": "Priya", "email": "priya@example.com"}],
          "clients": [
            {"id": "C-1", "company_name": "Acme", "contact_person": "Road Runner",
             "attachments": [{"id": "A-1", "original_filename": "deck.pdf"}]},
            {"id": "C-2", "company_name": "Globex", "contact_person": "Hank",
             "attachments": [{"id": "A-1", "original_filename": "deck.pdf"}]}
          ]
        }"#,
    );
    let err = import_backup(&store, backup, datetime!(2026-01-01 00:00 UTC))
        .expect_err("shared attachment id should fail the import");
    assert!(matches!(err, ImportError::Repository(_)));
    assert!(store.list().unwrap().is_empty());
    assert_eq!(store.user_count().unwrap(), 0);

    cleanup(&path);
}

#[test]
fn imported_client_without_contact_still_moves_and_drops() {
    let (store, path) = temp_store();
    let backup = parse(r#"{"clients": [{"id": "C-1", "company_name": "Acme", "stage": 2}]}"#);
    import_backup(&store, backup, datetime!(2026-01-01 00:00 UTC))
        .expect("import should succeed");

    let clock = FixedClock::at(datetime!(2026-02-01 10:00 UTC));
    let machine = StageStateMachine::new(&store, &clock);
    let mut cache = ClientStore::from_clients(store.list().unwrap());

    let moved = machine
        .move_stage(&mut cache, "C-1", 3)
        .expect("stage move should persist");
    assert_eq!(moved.stage, Stage::PricingProposal);
    assert_eq!(moved.contact_person, "");

    let dropped = machine
        .drop(&mut cache, "C-1", "lost budget")
        .expect("drop should persist");
    assert_eq!(dropped.drop_reason.as_deref(), Some("lost budget"));
    assert_eq!(store.get("C-1").unwrap().stage, Stage::PricingProposal);

    cleanup(&path);
}

#[test]
fn read_backup_reports_missing_file_and_bad_json() {
    let missing = std::env::temp_dir().join(format!("leadtrack-missing-{}.json", Uuid::now_v7()));
    assert!(matches!(read_backup(&missing), Err(ImportError::Io(_))));

    let garbage = std::env::temp_dir().join(format!("leadtrack-bad-{}.json", Uuid::now_v7()));
    std::fs::write(&garbage, "{ not json").expect("temp file should write");
    assert!(matches!(read_backup(&garbage), Err(ImportError::Json(_))));
    let _ = std::fs::remove_file(garbage);
}
