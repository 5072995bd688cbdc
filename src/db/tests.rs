use super::{get_meta, open_connection, SqliteStore, CURRENT_SCHEMA_VERSION};
use crate::domain::client::{Budget, ClientPatch, NewClient};
use crate::domain::note::{Attachment, AttachmentOwner, Note, NoteEntry};
use crate::domain::session::{NewUser, Role, User, UserStatus};
use crate::domain::stage::Stage;
use crate::repository::{
    AttachmentService, ClientRepository, NoteService, RepositoryError, UserDirectory,
    UNASSIGNED, UNKNOWN_USER,
};
use rusqlite::params;
use time::macros::datetime;
use uuid::Uuid;

fn unique_db_path() -> String {
    std::env::temp_dir()
        .join(format!("leadtrack-db-{}.sqlite", Uuid::now_v7()))
        .display()
        .to_string()
}

fn cleanup_db_files(path: &str) {
    for suffix in ["", "-wal", "-shm"] {
        let candidate = format!("{path}{suffix}");
        let _ = std::fs::remove_file(candidate);
    }
}

fn table_exists(conn: &rusqlite::Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            params![table_name],
            |row| row.get(0),
        )
        .expect("table existence query should be readable");
    exists == 1
}

fn acme() -> NewClient {
    NewClient {
        company_name: "Acme Corp".to_string(),
        contact_person: "Road Runner".to_string(),
        email: Some("rr@acme.test".to_string()),
        budget: Some(Budget::new(50_000.0, Some("usd"))),
        ..NewClient::default()
    }
}

#[test]
fn configures_connection_pragmas() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal_mode pragma should be readable");
    assert_eq!(journal_mode.to_uppercase(), "WAL");

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("foreign_keys pragma should be readable");
    assert_eq!(foreign_keys, 1);

    let busy_timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .expect("busy_timeout pragma should be readable");
    assert_eq!(busy_timeout, 5000);

    cleanup_db_files(&path);
}

#[test]
fn initializes_tables_and_reapplies_migrations_idempotently() {
    let path = unique_db_path();
    let first = open_connection(&path).expect("first open should initialize schema");
    for table in ["schema_migrations", "meta", "users", "clients", "notes", "attachments"] {
        assert!(table_exists(&first, table), "expected table '{}' to exist", table);
    }
    drop(first);

    let second = open_connection(&path).expect("second open should be idempotent");
    let applied_count: i64 = second
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
        .expect("schema_migrations count should be queryable");
    assert_eq!(applied_count, CURRENT_SCHEMA_VERSION);
    assert_eq!(
        get_meta(&second, "schema_version").expect("meta should be readable"),
        Some(CURRENT_SCHEMA_VERSION.to_string())
    );

    cleanup_db_files(&path);
}

#[test]
fn creates_updates_and_lists_clients() {
    let path = unique_db_path();
    let store = SqliteStore::open(&path).expect("store should open");

    let created = store
        .create(acme(), datetime!(2026-02-01 09:00 UTC))
        .expect("create should succeed");
    assert!(created.id.starts_with("C-"));
    assert_eq!(created.stage, Stage::FirstContact);

    let updated = store
        .update(
            &created.id,
            &ClientPatch::stage(Stage::Negotiation, datetime!(2026-02-03 12:00 UTC)),
        )
        .expect("update should succeed");
    assert_eq!(updated.stage, Stage::Negotiation);

    let listed = store.list().expect("list should succeed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], updated);
    assert_eq!(listed[0].budget.as_ref().unwrap().currency, "USD");
    assert_eq!(listed[0].last_interaction, datetime!(2026-02-03 12:00 UTC));

    let dropped = store
        .update(&created.id, &ClientPatch::drop_reason(Some("no budget".to_string())))
        .expect("drop should persist");
    assert!(store.get(&created.id).unwrap().is_dropped());
    assert_eq!(dropped.stage, Stage::Negotiation);

    cleanup_db_files(&path);
}

#[test]
fn update_rejects_missing_client_and_blank_company() {
    let path = unique_db_path();
    let store = SqliteStore::open(&path).expect("store should open");
    let created = store
        .create(acme(), datetime!(2026-02-01 09:00 UTC))
        .expect("create should succeed");

    let missing = store.update("C-404", &ClientPatch::drop_reason(None));
    assert_eq!(missing, Err(RepositoryError::NotFound("C-404".to_string())));

    let blank = ClientPatch {
        company_name: Some("   ".to_string()),
        ..ClientPatch::default()
    };
    assert!(matches!(
        store.update(&created.id, &blank),
        Err(RepositoryError::Validation(_))
    ));
    assert_eq!(store.get(&created.id).unwrap().company_name, "Acme Corp");

    cleanup_db_files(&path);
}

#[test]
fn notes_keep_order_and_legacy_rows_migrate_in_place() {
    let path = unique_db_path();
    let store = SqliteStore::open(&path).expect("store should open");
    let mut client = acme().into_client("C-legacy".to_string(), datetime!(2025-06-01 09:00 UTC));
    client.notes = vec![
        NoteEntry::Legacy {
            text: "met at expo".to_string(),
        },
        NoteEntry::Legacy {
            text: "asked for deck".to_string(),
        },
    ];
    assert!(store.insert_client(&client).expect("insert should succeed"));
    assert!(!store.insert_client(&client).expect("repeat insert should skip"));

    let note = Note {
        id: "N-1".to_string(),
        text: "sent pricing".to_string(),
        author: "U-1".to_string(),
        created_at: datetime!(2026-02-01 10:00 UTC),
        attachments: Vec::new(),
    };
    store
        .add_note("C-legacy", note)
        .expect("add note should succeed");

    let notes = store.notes_for("C-legacy").expect("notes should load");
    assert_eq!(notes.len(), 3);
    assert!(notes[0].is_legacy() && notes[1].is_legacy());
    assert_eq!(notes[2].text(), "sent pricing");

    let migrated = store
        .migrate_legacy_notes("C-legacy", "U-9", datetime!(2026-03-01 00:00 UTC))
        .expect("migration should succeed");
    assert_eq!(migrated, 2);
    let notes = store.notes_for("C-legacy").expect("notes should load");
    assert!(notes.iter().all(|entry| !entry.is_legacy()));
    assert_eq!(notes[0].text(), "met at expo");
    assert_eq!(notes[0].as_structured().unwrap().author, "U-9");
    assert_eq!(
        store
            .migrate_legacy_notes("C-legacy", "U-9", datetime!(2026-03-02 00:00 UTC))
            .expect("second migration should succeed"),
        0
    );

    cleanup_db_files(&path);
}

#[test]
fn attachments_are_scoped_to_their_owner() {
    let path = unique_db_path();
    let store = SqliteStore::open(&path).expect("store should open");
    let client = store
        .create(acme(), datetime!(2026-02-01 09:00 UTC))
        .expect("create should succeed");
    let note = Note {
        id: "N-with-file".to_string(),
        text: "see contract".to_string(),
        author: "U-1".to_string(),
        created_at: datetime!(2026-02-02 09:00 UTC),
        attachments: Vec::new(),
    };
    store.add_note(&client.id, note).expect("note should save");

    let file = |id: &str| Attachment {
        id: id.to_string(),
        filename: format!("{id}.pdf"),
        original_filename: "contract.pdf".to_string(),
        media_type: "application/pdf".to_string(),
        size_bytes: 2048,
        uploaded_by: "U-1".to_string(),
        uploaded_at: datetime!(2026-02-02 09:30 UTC),
    };
    store
        .add_attachment(AttachmentOwner::Client(&client.id), file("A-client"))
        .expect("client attachment should save");
    store
        .add_attachment(AttachmentOwner::Note("N-with-file"), file("A-note"))
        .expect("note attachment should save");

    let on_client = store
        .attachments_for(AttachmentOwner::Client(&client.id))
        .expect("client attachments should load");
    assert_eq!(on_client.len(), 1);
    assert_eq!(on_client[0].id, "A-client");

    let loaded = store.get(&client.id).expect("client should load");
    let note = loaded.notes[0].as_structured().expect("note is structured");
    assert_eq!(note.attachments[0].id, "A-note");

    assert_eq!(
        store.add_attachment(AttachmentOwner::Note("N-missing"), file("A-x")),
        Err(RepositoryError::NotFound("N-missing".to_string()))
    );

    cleanup_db_files(&path);
}

#[test]
fn users_resolve_with_sentinels_and_reject_duplicate_email() {
    let path = unique_db_path();
    let store = SqliteStore::open(&path).expect("store should open");
    assert_eq!(store.user_count().unwrap(), 0);

    let admin = store
        .create_user(NewUser {
            name: "Priya".to_string(),
            email: "Priya@Example.com".to_string(),
            role: Role::SuperAdmin,
            status: UserStatus::Active,
        })
        .expect("user should be created");
    assert!(admin.id.starts_with("U-"));
    assert_eq!(admin.email, "priya@example.com");

    let duplicate = store.create_user(NewUser {
        name: "Other".to_string(),
        email: "priya@example.com".to_string(),
        role: Role::Bde,
        status: UserStatus::Active,
    });
    assert!(matches!(duplicate, Err(RepositoryError::Validation(_))));

    let inactive = User {
        id: "U-old".to_string(),
        name: "Omar".to_string(),
        email: "omar@example.com".to_string(),
        role: Role::Bde,
        status: UserStatus::Inactive,
    };
    assert!(store.insert_user(&inactive).unwrap());

    assert_eq!(store.resolve_name(&admin.id), "Priya");
    assert_eq!(store.resolve_name("U-ghost"), UNKNOWN_USER);
    assert_eq!(store.resolve_assignee(None), UNASSIGNED);
    let assignable = store.list_assignable().expect("users should list");
    assert_eq!(assignable, vec![admin]);

    cleanup_db_files(&path);
}
