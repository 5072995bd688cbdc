use super::{board_columns, BoardError, BoardReconciler, DragOutcome, PendingMove, Settlement};
use crate::clock::FixedClock;
use crate::domain::client::{Budget, Client, NewClient};
use crate::domain::stage::Stage;
use crate::lifecycle::StageStateMachine;
use crate::repository::memory::MemoryRepository;
use crate::repository::RepositoryError;
use crate::store::ClientStore;
use time::macros::datetime;

fn client_at(id: &str, stage: Stage) -> Client {
    let mut client = NewClient {
        company_name: format!("Company {id}"),
        contact_person: "Dana".to_string(),
        budget: Some(Budget::new(50_000.0, Some("USD"))),
        ..NewClient::default()
    }
    .into_client(id.to_string(), datetime!(2026-03-01 09:00 UTC));
    client.stage = stage;
    client
}

fn fixture(clients: Vec<Client>) -> (MemoryRepository, ClientStore) {
    let repo = MemoryRepository::with_clients(clients.clone());
    (repo, ClientStore::from_clients(clients))
}

fn drag(
    board: &mut BoardReconciler,
    store: &mut ClientStore,
    id: &str,
    target: Stage,
) -> PendingMove {
    let session = board.begin_drag(store, id).expect("drag should start");
    match board.end_drag(store, session, Some(target)) {
        DragOutcome::Pending(pending) => pending,
        other => panic!("expected a pending move, got {other:?}"),
    }
}

#[test]
fn failed_drop_on_board_rolls_back_and_later_move_succeeds() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::PricingProposal)]);
    let clock = FixedClock::at(datetime!(2026-03-10 14:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);
    let mut board = BoardReconciler::new();

    let pending = drag(&mut board, &mut store, "C-1", Stage::ConvertedClient);
    assert_eq!(store.get("C-1").unwrap().stage, Stage::ConvertedClient);
    assert!(board.is_pending("C-1"));

    repo.fail_next_updates(1);
    let settlement = board.commit(&mut store, &machine, pending);
    match settlement {
        Settlement::RolledBack {
            restored_stage,
            error,
        } => {
            assert_eq!(restored_stage, Stage::PricingProposal);
            assert!(error.is_recoverable());
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert_eq!(store.get("C-1").unwrap().stage, Stage::PricingProposal);
    assert_eq!(repo.stored("C-1").unwrap().stage, Stage::PricingProposal);
    assert!(!board.is_pending("C-1"));

    let moved = machine
        .move_stage(&mut store, "C-1", 5)
        .expect("retry should succeed");
    assert_eq!(moved.stage, Stage::ConvertedClient);
    assert_eq!(store.get("C-1").unwrap().stage, Stage::ConvertedClient);
}

#[test]
fn cancelled_and_unchanged_drags_issue_no_call() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::TechnicalDiscussion)]);
    let mut board = BoardReconciler::new();

    let session = board.begin_drag(&store, "C-1").expect("drag should start");
    assert_eq!(board.end_drag(&mut store, session, None), DragOutcome::Cancelled);

    let session = board.begin_drag(&store, "C-1").expect("drag should start");
    assert_eq!(
        board.end_drag(&mut store, session, Some(Stage::TechnicalDiscussion)),
        DragOutcome::Unchanged
    );

    assert_eq!(store.get("C-1").unwrap().stage, Stage::TechnicalDiscussion);
    assert!(!board.is_pending("C-1"));
    assert_eq!(repo.update_calls(), 0);
}

#[test]
fn confirmed_move_replaces_cached_record() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::FirstContact)]);
    let clock = FixedClock::at(datetime!(2026-03-10 14:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);
    let mut board = BoardReconciler::new();

    let pending = drag(&mut board, &mut store, "C-1", Stage::Negotiation);
    let settlement = board.commit(&mut store, &machine, pending);
    assert!(matches!(settlement, Settlement::Confirmed(ref c) if c.stage == Stage::Negotiation));

    let cached = store.get("C-1").unwrap();
    assert_eq!(cached.stage, Stage::Negotiation);
    assert_eq!(cached.last_interaction, datetime!(2026-03-10 14:00 UTC));
    assert_eq!(repo.update_calls(), 1);
}

#[test]
fn newer_move_supersedes_older_result() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::FirstContact)]);
    let clock = FixedClock::at(datetime!(2026-03-10 14:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);
    let mut board = BoardReconciler::new();

    let first = drag(&mut board, &mut store, "C-1", Stage::PricingProposal);
    let second = drag(&mut board, &mut store, "C-1", Stage::ConvertedClient);
    assert!(second.ticket > first.ticket);
    assert_eq!(second.origin_stage, Stage::PricingProposal);

    let first_result = machine.persist_stage("C-1", first.target_stage);
    let settled = board.commit(&mut store, &machine, second);
    assert!(matches!(settled, Settlement::Confirmed(_)));

    // The older result arrives late and must not move the card back.
    assert_eq!(
        board.settle(&mut store, first, first_result),
        Settlement::Superseded
    );
    assert_eq!(store.get("C-1").unwrap().stage, Stage::ConvertedClient);
}

#[test]
fn rollback_after_supersession_restores_last_persisted_stage() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::FirstContact)]);
    let clock = FixedClock::at(datetime!(2026-03-10 14:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);
    let mut board = BoardReconciler::new();

    let first = drag(&mut board, &mut store, "C-1", Stage::PricingProposal);
    let second = drag(&mut board, &mut store, "C-1", Stage::ConvertedClient);

    repo.fail_next_updates(2);
    let first_result = machine.persist_stage("C-1", first.target_stage);
    assert_eq!(
        board.settle(&mut store, first, first_result),
        Settlement::Superseded
    );
    assert_eq!(store.get("C-1").unwrap().stage, Stage::ConvertedClient);

    match board.commit(&mut store, &machine, second) {
        Settlement::RolledBack { restored_stage, .. } => {
            assert_eq!(restored_stage, Stage::FirstContact);
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert_eq!(store.get("C-1").unwrap().stage, Stage::FirstContact);
}

#[test]
fn superseded_success_advances_rollback_baseline() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::FirstContact)]);
    let clock = FixedClock::at(datetime!(2026-03-10 14:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);
    let mut board = BoardReconciler::new();

    let first = drag(&mut board, &mut store, "C-1", Stage::TechnicalDiscussion);
    let second = drag(&mut board, &mut store, "C-1", Stage::Negotiation);

    let first_result = machine.persist_stage("C-1", first.target_stage);
    assert_eq!(
        board.settle(&mut store, first, first_result),
        Settlement::Superseded
    );
    assert_eq!(store.get("C-1").unwrap().stage, Stage::Negotiation);

    let failure = Err(RepositoryError::Unavailable("timeout".to_string()));
    match board.settle(&mut store, second, failure) {
        Settlement::RolledBack { restored_stage, .. } => {
            assert_eq!(restored_stage, Stage::TechnicalDiscussion);
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert_eq!(store.get("C-1").unwrap().stage, Stage::TechnicalDiscussion);
}

#[test]
fn newest_failure_settled_first_then_older_success_keeps_board_in_sync() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::FirstContact)]);
    let clock = FixedClock::at(datetime!(2026-03-10 14:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);
    let mut board = BoardReconciler::new();

    let first = drag(&mut board, &mut store, "C-1", Stage::TechnicalDiscussion);
    let second = drag(&mut board, &mut store, "C-1", Stage::PricingProposal);
    let first_result = machine.persist_stage("C-1", first.target_stage);
    assert_eq!(repo.stored("C-1").unwrap().stage, Stage::TechnicalDiscussion);

    let failure = Err(RepositoryError::Unavailable("timeout".to_string()));
    match board.settle(&mut store, second, failure) {
        Settlement::RolledBack { restored_stage, .. } => {
            assert_eq!(restored_stage, Stage::TechnicalDiscussion);
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert!(board.is_pending("C-1"));

    assert_eq!(
        board.settle(&mut store, first, first_result),
        Settlement::Superseded
    );
    assert!(!board.is_pending("C-1"));
    assert_eq!(store.get("C-1").unwrap().stage, Stage::TechnicalDiscussion);
    assert_eq!(repo.stored("C-1").unwrap().stage, Stage::TechnicalDiscussion);
}

#[test]
fn older_failure_after_newest_failure_restores_persisted_stage() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::FirstContact)]);
    let mut board = BoardReconciler::new();

    let first = drag(&mut board, &mut store, "C-1", Stage::TechnicalDiscussion);
    let second = drag(&mut board, &mut store, "C-1", Stage::PricingProposal);

    let timeout = || Err(RepositoryError::Unavailable("timeout".to_string()));
    assert!(matches!(
        board.settle(&mut store, second, timeout()),
        Settlement::RolledBack { restored_stage: Stage::TechnicalDiscussion, .. }
    ));
    assert_eq!(
        board.settle(&mut store, first, timeout()),
        Settlement::Superseded
    );
    assert_eq!(store.get("C-1").unwrap().stage, Stage::FirstContact);
    assert_eq!(repo.stored("C-1").unwrap().stage, Stage::FirstContact);
    assert_eq!(repo.update_calls(), 0);
}

#[test]
fn begin_drag_rejects_unknown_and_dropped_clients() {
    let mut dropped = client_at("C-2", Stage::Negotiation);
    dropped.drop_reason = Some("budget cut".to_string());
    let (_repo, store) = fixture(vec![client_at("C-1", Stage::FirstContact), dropped]);
    let board = BoardReconciler::new();

    assert_eq!(
        board.begin_drag(&store, "C-404"),
        Err(BoardError::NotFound("C-404".to_string()))
    );
    assert_eq!(
        board.begin_drag(&store, "C-2"),
        Err(BoardError::Dropped("C-2".to_string()))
    );
}

#[test]
fn columns_group_active_clients_in_store_order() {
    let mut lost = client_at("C-3", Stage::PricingProposal);
    lost.drop_reason = Some("went silent".to_string());
    let store = ClientStore::from_clients(vec![
        client_at("C-1", Stage::PricingProposal),
        client_at("C-2", Stage::FirstContact),
        lost,
        client_at("C-4", Stage::PricingProposal),
    ]);

    let columns = board_columns(&store);
    assert_eq!(columns.len(), 5);
    let ids = |index: usize| -> Vec<&str> {
        columns[index]
            .clients
            .iter()
            .map(|client| client.id.as_str())
            .collect()
    };
    assert_eq!(columns[2].stage, Stage::PricingProposal);
    assert_eq!(ids(2), vec!["C-1", "C-4"]);
    assert_eq!(ids(0), vec!["C-2"]);
    assert!(ids(4).is_empty());
}
