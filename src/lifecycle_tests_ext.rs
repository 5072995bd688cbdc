use super::{LifecycleError, StageStateMachine};
use crate::clock::FixedClock;
use crate::domain::client::{Budget, Client, NewClient};
use crate::domain::stage::Stage;
use crate::repository::memory::MemoryRepository;
use crate::store::ClientStore;
use time::macros::datetime;
use time::Duration;

fn client_at(id: &str, stage: Stage) -> Client {
    let mut client = NewClient {
        company_name: "Acme Corp".to_string(),
        contact_person: "Road Runner".to_string(),
        budget: Some(Budget::new(50_000.0, Some("usd"))),
        ..NewClient::default()
    }
    .into_client(id.to_string(), datetime!(2026-01-05 09:00 UTC));
    client.stage = stage;
    client
}

fn fixture(clients: Vec<Client>) -> (MemoryRepository, ClientStore) {
    let repo = MemoryRepository::with_clients(clients.clone());
    (repo, ClientStore::from_clients(clients))
}

#[test]
fn move_stage_persists_once_and_repeat_is_a_no_op() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::FirstContact)]);
    let clock = FixedClock::at(datetime!(2026-02-01 10:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);

    let moved = machine
        .move_stage(&mut store, "C-1", 3)
        .expect("move should succeed");
    assert_eq!(moved.stage, Stage::PricingProposal);
    assert_eq!(moved.last_interaction, datetime!(2026-02-01 10:00 UTC));

    clock.advance(Duration::hours(2));
    let again = machine
        .move_stage(&mut store, "C-1", 3)
        .expect("repeat move should succeed");
    assert_eq!(again.last_interaction, datetime!(2026-02-01 10:00 UTC));
    assert_eq!(repo.update_calls(), 1);
    assert_eq!(store.get("C-1").unwrap().stage, Stage::PricingProposal);
}

#[test]
fn move_stage_allows_backward_and_skipping_moves() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::Negotiation)]);
    let clock = FixedClock::at(datetime!(2026-02-01 10:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);

    let back = machine
        .move_to(&mut store, "C-1", Stage::FirstContact)
        .expect("backward move should succeed");
    assert_eq!(back.stage, Stage::FirstContact);
    let jump = machine
        .move_to(&mut store, "C-1", Stage::ConvertedClient)
        .expect("skip move should succeed");
    assert_eq!(jump.stage, Stage::ConvertedClient);
}

#[test]
fn move_stage_rejects_out_of_range_before_any_call() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::FirstContact)]);
    let clock = FixedClock::at(datetime!(2026-02-01 10:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);

    for invalid in [0, 6, -3] {
        let err = machine
            .move_stage(&mut store, "C-1", invalid)
            .expect_err("out of range stage should fail");
        assert_eq!(err, LifecycleError::InvalidStage(invalid));
    }
    assert_eq!(repo.update_calls(), 0);
}

#[test]
fn move_stage_keeps_last_interaction_after_created_under_clock_skew() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::FirstContact)]);
    let clock = FixedClock::at(datetime!(2025-12-01 00:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);

    let moved = machine
        .move_to(&mut store, "C-1", Stage::TechnicalDiscussion)
        .expect("move should succeed");
    assert_eq!(moved.last_interaction, moved.created_at);
}

#[test]
fn move_stage_on_unknown_client_is_not_found() {
    let (repo, mut store) = fixture(Vec::new());
    let clock = FixedClock::at(datetime!(2026-02-01 10:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);

    let err = machine
        .move_stage(&mut store, "C-404", 2)
        .expect_err("unknown client should fail");
    assert_eq!(err, LifecycleError::NotFound("C-404".to_string()));
}

#[test]
fn move_stage_surfaces_network_failure_without_touching_cache() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::PricingProposal)]);
    let clock = FixedClock::at(datetime!(2026-02-01 10:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);
    repo.fail_next_updates(1);

    let err = machine
        .move_stage(&mut store, "C-1", 5)
        .expect_err("persistence failure should surface");
    assert!(matches!(err, LifecycleError::Repository(_)));
    assert_eq!(store.get("C-1").unwrap().stage, Stage::PricingProposal);
}

#[test]
fn drop_requires_non_blank_reason() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::PricingProposal)]);
    let clock = FixedClock::at(datetime!(2026-02-01 10:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);

    for blank in ["", "   "] {
        let err = machine
            .drop(&mut store, "C-1", blank)
            .expect_err("blank reason should fail");
        assert!(matches!(err, LifecycleError::Validation(_)));
    }
    assert_eq!(repo.update_calls(), 0);

    let dropped = machine
        .drop(&mut store, "C-1", "lost budget")
        .expect("drop should succeed");
    assert!(dropped.is_dropped());
    assert_eq!(dropped.drop_reason.as_deref(), Some("lost budget"));
    assert_eq!(dropped.stage, Stage::PricingProposal);
}

#[test]
fn drop_is_idempotent_for_identical_reason() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::Negotiation)]);
    let clock = FixedClock::at(datetime!(2026-02-01 10:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);

    let first = machine
        .drop(&mut store, "C-1", "  went silent ")
        .expect("drop should succeed");
    let second = machine
        .drop(&mut store, "C-1", "went silent")
        .expect("repeat drop should succeed");
    assert_eq!(first, second);
    assert_eq!(repo.update_calls(), 1);

    let replaced = machine
        .drop(&mut store, "C-1", "chose competitor")
        .expect("new reason should replace old one");
    assert_eq!(replaced.drop_reason.as_deref(), Some("chose competitor"));
}

#[test]
fn reactivate_forces_first_contact_and_clears_reason() {
    for stage in Stage::ALL {
        let (repo, mut store) = fixture(vec![client_at("C-1", stage)]);
        let clock = FixedClock::at(datetime!(2026-02-01 10:00 UTC));
        let machine = StageStateMachine::new(&repo, &clock);

        machine
            .drop(&mut store, "C-1", "paused")
            .expect("drop should succeed");
        let reactivated = machine
            .reactivate(&mut store, "C-1")
            .expect("reactivate should succeed");
        assert_eq!(reactivated.stage, Stage::FirstContact);
        assert_eq!(reactivated.drop_reason, None);
        assert!(!reactivated.is_dropped());
        assert_eq!(repo.stored("C-1").unwrap().stage, Stage::FirstContact);
    }
}

#[test]
fn reactivate_requires_dropped_client() {
    let (repo, mut store) = fixture(vec![client_at("C-1", Stage::Negotiation)]);
    let clock = FixedClock::at(datetime!(2026-02-01 10:00 UTC));
    let machine = StageStateMachine::new(&repo, &clock);

    let err = machine
        .reactivate(&mut store, "C-1")
        .expect_err("active client cannot be reactivated");
    assert!(matches!(err, LifecycleError::InvalidState(_)));
    assert_eq!(repo.update_calls(), 0);
}
