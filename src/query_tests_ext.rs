use super::{
    run_query, BudgetRange, ClientListFilter, ClientQuery, DateRange, QueryError, SortField,
    SortOrder,
};
use crate::domain::client::{Budget, Client, NewClient};
use crate::domain::stage::Stage;
use std::str::FromStr;
use time::macros::datetime;
use time::OffsetDateTime;

const NOW: OffsetDateTime = datetime!(2026-05-14 15:30 UTC);

fn client(id: &str, company: &str, contact: &str, created: OffsetDateTime) -> Client {
    NewClient {
        company_name: company.to_string(),
        contact_person: contact.to_string(),
        ..NewClient::default()
    }
    .into_client(id.to_string(), created)
}

fn roster() -> Vec<Client> {
    let mut acme = client("C-1", "ACME Widgets", "Wile E.", datetime!(2026-05-14 08:00 UTC));
    acme.industry = Some("Manufacturing".to_string());
    acme.budget = Some(Budget::new(50_000.0, None));
    acme.stage = Stage::PricingProposal;
    acme.assigned_bde = Some("U-1".to_string());

    let mut globex = client("C-2", "Globex", "Hank", datetime!(2026-05-11 12:00 UTC));
    globex.email = Some("hank@acme-partners.io".to_string());
    globex.industry = Some("Energy".to_string());
    globex.budget = Some(Budget::new(9_999.0, None));
    globex.stage = Stage::ConvertedClient;
    globex.drop_reason = Some("merged".to_string());

    let mut initech = client("C-3", "Initech", "Bill", datetime!(2026-04-01 12:00 UTC));
    initech.phone = Some("+1 555 0100".to_string());
    initech.industry = Some("manufacturing".to_string());
    initech.stage = Stage::ConvertedClient;
    initech.company_size = Some("51-200".to_string());

    let mut umbrella = client("C-4", "Umbrella", "Alice", datetime!(2025-11-20 12:00 UTC));
    umbrella.budget = Some(Budget::new(750_000.0, Some("eur")));
    umbrella.assigned_bde = Some("U-2".to_string());

    vec![acme, globex, initech, umbrella]
}

fn ids(clients: &[Client]) -> Vec<&str> {
    clients.iter().map(|client| client.id.as_str()).collect()
}

fn query(search: &str, filter: ClientListFilter, sort_by: &str, order: &str) -> ClientQuery {
    ClientQuery {
        search: Some(search.to_string()),
        filter,
        sort_by: SortField::from_str(sort_by).unwrap(),
        sort_order: SortOrder::from_str(order).unwrap(),
    }
}

#[test]
fn search_matches_any_contact_field_case_insensitively() {
    let result = run_query(
        &roster(),
        &query("acme", ClientListFilter::default(), "created_at", "desc"),
        NOW,
    )
    .expect("query should run");
    assert_eq!(ids(&result), vec!["C-1", "C-2"]);

    let by_phone = run_query(
        &roster(),
        &query("555", ClientListFilter::default(), "created_at", "desc"),
        NOW,
    )
    .expect("query should run");
    assert_eq!(ids(&by_phone), vec!["C-3"]);
}

#[test]
fn search_keeps_surrounding_spaces_in_the_needle() {
    let trailing = run_query(
        &roster(),
        &query("acme ", ClientListFilter::default(), "created_at", "desc"),
        NOW,
    )
    .expect("query should run");
    assert_eq!(ids(&trailing), vec!["C-1"]);

    let leading = run_query(
        &roster(),
        &query(" acme", ClientListFilter::default(), "created_at", "desc"),
        NOW,
    )
    .expect("query should run");
    assert!(leading.is_empty());
}

#[test]
fn blank_search_and_filters_impose_no_constraint() {
    let filter = ClientListFilter {
        industry: Some("  ".to_string()),
        stage: Some(String::new()),
        ..ClientListFilter::default()
    };
    let result = run_query(&roster(), &query("   ", filter, "created_at", "asc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&result), vec!["C-4", "C-3", "C-2", "C-1"]);
}

#[test]
fn stage_filter_includes_dropped_clients() {
    let filter = ClientListFilter {
        stage: Some("5".to_string()),
        ..ClientListFilter::default()
    };
    let result = run_query(&roster(), &query("", filter, "created_at", "desc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&result), vec!["C-2", "C-3"]);

    let active_only = ClientListFilter {
        stage: Some("converted".to_string()),
        dropped: Some("false".to_string()),
        ..ClientListFilter::default()
    };
    let result = run_query(&roster(), &query("", active_only, "created_at", "desc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&result), vec!["C-3"]);
}

#[test]
fn structured_filters_combine_conjunctively() {
    let filter = ClientListFilter {
        industry: Some("MANUFACTURING".to_string()),
        assigned_bde: Some("U-1".to_string()),
        ..ClientListFilter::default()
    };
    let result = run_query(&roster(), &query("", filter, "created_at", "desc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&result), vec!["C-1"]);

    let size = ClientListFilter {
        company_size: Some("51-200".to_string()),
        ..ClientListFilter::default()
    };
    let result = run_query(&roster(), &query("", size, "created_at", "desc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&result), vec!["C-3"]);
}

#[test]
fn budget_buckets_are_half_open_and_skip_missing_budgets() {
    let range = |bucket: &str| ClientListFilter {
        budget_range: Some(bucket.to_string()),
        ..ClientListFilter::default()
    };
    let low = run_query(&roster(), &query("", range("0-10000"), "budget", "asc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&low), vec!["C-2"]);

    let mid = run_query(&roster(), &query("", range("50000-100000"), "budget", "asc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&mid), vec!["C-1"]);

    let top = run_query(&roster(), &query("", range("500000+"), "budget", "asc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&top), vec!["C-4"]);

    let everything = run_query(&roster(), &query("", range("0-1000000000"), "budget", "asc"), NOW)
        .expect("query should run");
    assert!(!ids(&everything).contains(&"C-3"));
}

#[test]
fn date_buckets_resolve_relative_to_now() {
    let range = |bucket: &str| ClientListFilter {
        date_range: Some(bucket.to_string()),
        ..ClientListFilter::default()
    };
    let today = run_query(&roster(), &query("", range("today"), "created_at", "asc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&today), vec!["C-1"]);

    // 2026-05-14 is a Thursday; the week starts Monday 2026-05-11.
    let week = run_query(&roster(), &query("", range("this_week"), "created_at", "asc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&week), vec!["C-2", "C-1"]);

    let quarter = run_query(&roster(), &query("", range("this_quarter"), "created_at", "asc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&quarter), vec!["C-3", "C-2", "C-1"]);

    let year = run_query(&roster(), &query("", range("this_year"), "created_at", "asc"), NOW)
        .expect("query should run");
    assert_eq!(year.len(), 3);
}

#[test]
fn date_range_bounds_start_at_period_boundaries() {
    assert_eq!(
        DateRange::ThisMonth.bounds(NOW),
        (datetime!(2026-05-01 00:00 UTC), NOW)
    );
    assert_eq!(
        DateRange::ThisQuarter.bounds(NOW).0,
        datetime!(2026-04-01 00:00 UTC)
    );
    assert_eq!(
        DateRange::ThisWeek.bounds(NOW).0,
        datetime!(2026-05-11 00:00 UTC)
    );
}

#[test]
fn sorting_is_stable_in_both_directions() {
    let mut clients = roster();
    for client in &mut clients {
        client.stage = Stage::Negotiation;
    }
    clients[2].stage = Stage::ConvertedClient;

    let asc = run_query(&clients, &query("", ClientListFilter::default(), "stage", "asc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&asc), vec!["C-1", "C-2", "C-4", "C-3"]);

    let desc = run_query(&clients, &query("", ClientListFilter::default(), "stage", "desc"), NOW)
        .expect("query should run");
    assert_eq!(ids(&desc), vec!["C-3", "C-1", "C-2", "C-4"]);
}

#[test]
fn text_sort_is_case_sensitive_and_budget_sorts_missing_first() {
    let mut clients = roster();
    clients[1].company_name = "globex".to_string();
    let by_name = run_query(
        &clients,
        &query("", ClientListFilter::default(), "company_name", "asc"),
        NOW,
    )
    .expect("query should run");
    assert_eq!(ids(&by_name), vec!["C-1", "C-3", "C-4", "C-2"]);

    let by_budget = run_query(
        &roster(),
        &query("", ClientListFilter::default(), "budget", "asc"),
        NOW,
    )
    .expect("query should run");
    assert_eq!(ids(&by_budget), vec!["C-3", "C-2", "C-1", "C-4"]);
}

#[test]
fn rejects_unknown_sort_keys_and_malformed_buckets() {
    assert!(matches!(
        SortField::from_str("favourite"),
        Err(QueryError::Sort(_))
    ));
    assert!(SortOrder::from_str("sideways").is_err());
    assert!(BudgetRange::from_str("lots").is_err());
    assert!(BudgetRange::from_str("100-10").is_err());
    assert_eq!(
        BudgetRange::from_str("10,000-50,000").unwrap(),
        BudgetRange::Between {
            min: 10_000.0,
            max: 50_000.0
        }
    );

    let filter = ClientListFilter {
        date_range: Some("fortnight".to_string()),
        ..ClientListFilter::default()
    };
    let err = run_query(&roster(), &query("", filter, "created_at", "desc"), NOW)
        .expect_err("bad bucket should fail");
    assert!(matches!(err, QueryError::Filter(_)));
}
