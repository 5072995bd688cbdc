use super::{App, AppError, BoardMoveStatus};
use crate::board::BoardError;
use crate::clock::FixedClock;
use crate::config::Config;
use crate::domain::client::{ClientPatch, NewClient};
use crate::domain::stage::Stage;
use crate::lifecycle::LifecycleError;
use crate::query::{ClientListFilter, SortField, SortOrder};
use std::path::PathBuf;
use time::macros::datetime;
use uuid::Uuid;

fn unique_workspace() -> PathBuf {
    let root = std::env::temp_dir().join(format!("leadtrack-app-test-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&root).expect("temp workspace should be creatable");
    root
}

fn open_app(root: &std::path::Path) -> App {
    let db_path = root.join(".leadtrack/state.sqlite");
    App::open_with_clock(
        db_path.to_str().expect("utf8 path"),
        Config::default(),
        Box::new(FixedClock::at(datetime!(2026-04-01 12:00 UTC))),
    )
    .expect("app should open")
}

/// Opens an app with a super admin `U-…` and a bde, signed in as the admin.
fn staffed_app(root: &std::path::Path) -> (App, String, String) {
    let mut app = open_app(root);
    let admin = app
        .add_user("Priya", "priya@example.com", "super_admin", None)
        .expect("bootstrap admin should be created");
    app.sign_in(&admin.id).expect("admin should sign in");
    let bde = app
        .add_user("Omar", "omar@example.com", "bde", None)
        .expect("admin should create bde");
    (app, admin.id, bde.id)
}

fn acme(assigned_bde: Option<&str>) -> NewClient {
    NewClient {
        company_name: "Acme Corp".to_string(),
        contact_person: "Road Runner".to_string(),
        email: Some("rr@acme.test".to_string()),
        assigned_bde: assigned_bde.map(str::to_string),
        ..NewClient::default()
    }
}

#[test]
fn first_user_bootstraps_as_super_admin_then_requires_permission() {
    let root = unique_workspace();
    let mut app = open_app(&root);

    let denied = app.add_user("Eve", "eve@example.com", "bde", None);
    assert!(matches!(denied, Err(AppError::PermissionDenied(_))));

    let admin = app
        .add_user("Priya", "priya@example.com", "super-admin", None)
        .expect("bootstrap should succeed");
    let no_session = app.add_user("Omar", "omar@example.com", "bde", None);
    assert!(matches!(no_session, Err(AppError::PermissionDenied(_))));

    app.sign_in(&admin.id).expect("admin should sign in");
    let bde = app
        .add_user("Omar", "omar@example.com", "user", None)
        .expect("super admin can add users");

    app.sign_in(&bde.id).expect("bde should sign in");
    let as_bde = app.add_user("Zed", "zed@example.com", "bde", None);
    assert!(matches!(as_bde, Err(AppError::PermissionDenied(_))));

    assert_eq!(app.list_users().unwrap().len(), 2);
    assert_eq!(app.list_bdes().unwrap().len(), 2);
    assert!(matches!(
        app.sign_in("U-missing"),
        Err(AppError::NotFound(_))
    ));

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn lifecycle_operations_persist_across_reopen() {
    let root = unique_workspace();
    let (mut app, _admin, bde) = staffed_app(&root);

    let unassignable = app.create_client(acme(Some("U-ghost")));
    assert!(matches!(unassignable, Err(AppError::InvalidArgument(_))));

    let created = app
        .create_client(acme(Some(&bde)))
        .expect("create should succeed");
    assert_eq!(created.stage, Stage::FirstContact);
    assert_eq!(created.assigned_bde_name, "Omar");

    let moved = app.move_stage(&created.id, "3").expect("move should succeed");
    assert_eq!(moved.stage, Stage::PricingProposal);
    assert!(matches!(
        app.move_stage(&created.id, "9"),
        Err(AppError::Lifecycle(LifecycleError::InvalidStage(9)))
    ));
    assert!(matches!(
        app.move_stage(&created.id, "closed-won"),
        Err(AppError::InvalidArgument(_))
    ));

    assert!(matches!(
        app.drop_client(&created.id, "  "),
        Err(AppError::Lifecycle(LifecycleError::Validation(_)))
    ));
    let dropped = app
        .drop_client(&created.id, "lost budget")
        .expect("drop should succeed");
    assert_eq!(dropped.status, "Dropped (Pricing Proposal)");
    assert!(dropped.is_dropped);

    drop(app);
    let mut reopened = open_app(&root);
    assert!(reopened.show(&created.id).unwrap().is_dropped);
    let reactivated = reopened
        .reactivate(&created.id)
        .expect("reactivate should succeed");
    assert_eq!(reactivated.stage, Stage::FirstContact);
    assert_eq!(reactivated.drop_reason, None);
    assert!(matches!(
        reopened.reactivate(&created.id),
        Err(AppError::Lifecycle(LifecycleError::InvalidState(_)))
    ));
    assert!(matches!(
        reopened.move_stage("C-404", "2"),
        Err(AppError::NotFound(_))
    ));

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn board_moves_confirm_cancel_and_skip_dropped_cards() {
    let root = unique_workspace();
    let (mut app, _admin, _bde) = staffed_app(&root);
    let active = app.create_client(acme(None)).expect("create should succeed");
    let lost = app
        .create_client(NewClient {
            company_name: "Globex".to_string(),
            contact_person: "Hank".to_string(),
            ..NewClient::default()
        })
        .expect("create should succeed");
    app.drop_client(&lost.id, "went silent")
        .expect("drop should succeed");

    let report = app
        .board_move(&active.id, Some("converted"))
        .expect("board move should run");
    assert_eq!(report.status, BoardMoveStatus::Confirmed);
    assert_eq!(report.client.stage, Stage::ConvertedClient);
    assert_eq!(report.error, None);

    let cancelled = app
        .board_move(&active.id, None)
        .expect("cancel should run");
    assert_eq!(cancelled.status, BoardMoveStatus::Cancelled);
    let unchanged = app
        .board_move(&active.id, Some("5"))
        .expect("same column should run");
    assert_eq!(unchanged.status, BoardMoveStatus::Unchanged);

    assert!(matches!(
        app.board_move(&lost.id, Some("2")),
        Err(AppError::Board(BoardError::Dropped(_)))
    ));

    let columns = app.board();
    assert_eq!(columns[4].clients.len(), 1);
    assert_eq!(columns.iter().map(|c| c.clients.len()).sum::<usize>(), 1);

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn notes_and_attachments_require_session_and_feed_timeline() {
    let root = unique_workspace();
    let mut app = open_app(&root);
    let admin = app
        .add_user("Priya", "priya@example.com", "super_admin", None)
        .expect("bootstrap should succeed");
    let client = app.create_client(acme(None)).expect("create should succeed");

    assert!(matches!(
        app.add_note(&client.id, "hello"),
        Err(AppError::PermissionDenied(_))
    ));
    app.sign_in(&admin.id).expect("admin should sign in");
    assert!(matches!(
        app.add_note(&client.id, "   "),
        Err(AppError::InvalidArgument(_))
    ));
    let note = app
        .add_note(&client.id, "Discussed rollout plan")
        .expect("note should save");
    let note_id = note.id.clone().expect("structured note has id");

    let file = root.join("proposal.txt");
    std::fs::write(&file, "scope and pricing").expect("file should write");
    let on_client = app
        .attach(&client.id, &file, None)
        .expect("client attachment should save");
    assert_eq!(on_client.media_type, "text/plain");
    assert_eq!(on_client.size_bytes, 17);
    app.attach(&client.id, &file, Some(&note_id))
        .expect("note attachment should save");
    assert!(matches!(
        app.attach(&client.id, &file, Some("N-other")),
        Err(AppError::NotFound(_))
    ));

    let shown = app.show(&client.id).expect("client should load");
    assert_eq!(shown.notes[0].attachments.len(), 1);
    assert_eq!(shown.attachments.len(), 1);
    assert_eq!(app.notes(&client.id).unwrap(), shown.notes);
    assert_eq!(
        app.attachments(&client.id, Some(&note_id)).unwrap(),
        shown.notes[0].attachments
    );
    assert_eq!(app.attachments(&client.id, None).unwrap(), shown.attachments);
    assert!(matches!(app.notes("C-404"), Err(AppError::NotFound(_))));

    let timeline = app.timeline(&client.id).expect("timeline should build");
    let ids: Vec<&str> = timeline.iter().map(|entry| entry.event.id.as_str()).collect();
    assert!(ids.contains(&format!("note-{}", note_id).as_str()));
    assert!(ids.contains(&"created"));
    let note_entry = timeline
        .iter()
        .find(|entry| entry.event.title == "Note Added")
        .expect("note event present");
    assert_eq!(note_entry.actor_name, "Priya");

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn update_client_edits_fields_only() {
    let root = unique_workspace();
    let (mut app, _admin, _bde) = staffed_app(&root);
    let client = app.create_client(acme(None)).expect("create should succeed");

    assert!(matches!(
        app.update_client(&client.id, ClientPatch::default()),
        Err(AppError::InvalidArgument(_))
    ));
    assert!(matches!(
        app.update_client(
            &client.id,
            ClientPatch {
                stage: Some(Stage::Negotiation),
                ..ClientPatch::default()
            }
        ),
        Err(AppError::InvalidArgument(_))
    ));

    let budget = app.budget(75_000.0, None);
    let updated = app
        .update_client(
            &client.id,
            ClientPatch {
                industry: Some("Logistics".to_string()),
                budget: Some(Some(budget)),
                ..ClientPatch::default()
            },
        )
        .expect("update should succeed");
    assert_eq!(updated.industry.as_deref(), Some("Logistics"));
    assert_eq!(updated.budget, Some(75_000.0));
    assert_eq!(updated.budget_currency.as_deref(), Some("USD"));
    assert_eq!(updated.stage, Stage::FirstContact);

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn query_uses_config_defaults_and_stats_count_pipeline() {
    let root = unique_workspace();
    let db_path = root.join(".leadtrack/state.sqlite");
    let config = Config {
        sort_by: SortField::CompanyName,
        sort_order: SortOrder::Asc,
        ..Config::default()
    };
    let mut app = App::open_with_clock(
        db_path.to_str().expect("utf8 path"),
        config,
        Box::new(FixedClock::at(datetime!(2026-04-01 12:00 UTC))),
    )
    .expect("app should open");

    for company in ["Umbrella", "Acme", "Initech"] {
        app.create_client(NewClient {
            company_name: company.to_string(),
            contact_person: "Contact".to_string(),
            ..NewClient::default()
        })
        .expect("create should succeed");
    }
    let listed = app
        .query(None, ClientListFilter::default(), None, None)
        .expect("query should run");
    let names: Vec<&str> = listed.iter().map(|c| c.company_name.as_str()).collect();
    assert_eq!(names, vec!["Acme", "Initech", "Umbrella"]);

    let bad_sort = app.query(None, ClientListFilter::default(), Some("mood"), None);
    assert!(matches!(bad_sort, Err(AppError::Query(_))));

    let umbrella = listed[2].id.clone();
    app.move_stage(&umbrella, "5").expect("move should succeed");
    app.drop_client(&listed[0].id, "no fit")
        .expect("drop should succeed");
    let stats = app.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.converted, 1);

    let _ = std::fs::remove_dir_all(root);
}
