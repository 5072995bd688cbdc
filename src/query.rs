use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

use time::{Date, Duration, Month, OffsetDateTime, UtcOffset};
use tracing::debug;

use crate::domain::client::Client;
use crate::domain::stage::Stage;

/// Filter values as callers supply them; blank strings mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientListFilter {
    pub stage: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub assigned_bde: Option<String>,
    pub budget_range: Option<String>,
    pub date_range: Option<String>,
    pub dropped: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientQuery {
    pub search: Option<String>,
    pub filter: ClientListFilter,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

/// Evaluates `query` over `clients`: free-text search, then conjunctive
/// filters, then a stable sort. Buckets resolve against `now`.
pub fn run_query(
    clients: &[Client],
    query: &ClientQuery,
    now: OffsetDateTime,
) -> Result<Vec<Client>, QueryError> {
    let normalized = NormalizedFilter::resolve(&query.filter, now)?;
    let search = normalize_search(query.search.as_deref());

    let mut matched: Vec<Client> = clients
        .iter()
        .filter(|client| match search.as_deref() {
            Some(needle) => matches_search(client, needle),
            None => true,
        })
        .filter(|client| normalized.matches(client))
        .cloned()
        .collect();

    sort_clients(&mut matched, query.sort_by, query.sort_order);
    debug!(
        total = clients.len(),
        matched = matched.len(),
        sort_by = query.sort_by.as_str(),
        sort_order = query.sort_order.as_str(),
        "client query evaluated"
    );
    Ok(matched)
}

pub fn sort_clients(clients: &mut [Client], field: SortField, order: SortOrder) {
    // slice::sort_by is stable, and reversing the comparator (not the
    // output) keeps ties in their pre-sort order for both directions.
    match order {
        SortOrder::Asc => clients.sort_by(|a, b| compare_by(a, b, field)),
        SortOrder::Desc => clients.sort_by(|a, b| compare_by(b, a, field)),
    }
}

fn compare_by(a: &Client, b: &Client, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::LastInteraction => a.last_interaction.cmp(&b.last_interaction),
        SortField::CompanyName => a.company_name.cmp(&b.company_name),
        SortField::ContactPerson => a.contact_person.cmp(&b.contact_person),
        SortField::Email => text(&a.email).cmp(text(&b.email)),
        SortField::Industry => text(&a.industry).cmp(text(&b.industry)),
        SortField::Stage => a.stage.number().cmp(&b.stage.number()),
        SortField::Budget => {
            match (
                a.budget.as_ref().map(|budget| budget.amount),
                b.budget.as_ref().map(|budget| budget.amount),
            ) {
                (Some(left), Some(right)) => left.total_cmp(&right),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }
    }
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn matches_search(client: &Client, needle: &str) -> bool {
    [
        Some(client.company_name.as_str()),
        Some(client.contact_person.as_str()),
        client.email.as_deref(),
        client.phone.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Blank input imposes no constraint; anything else matches verbatim,
/// surrounding spaces included.
fn normalize_search(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_lowercase())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct NormalizedFilter {
    stage: Option<Stage>,
    industry: Option<String>,
    company_size: Option<String>,
    assigned_bde: Option<String>,
    budget: Option<BudgetRange>,
    created_window: Option<(OffsetDateTime, OffsetDateTime)>,
    dropped: Option<bool>,
}

impl NormalizedFilter {
    fn resolve(raw: &ClientListFilter, now: OffsetDateTime) -> Result<Self, QueryError> {
        let stage = match normalize_scalar(raw.stage.as_deref()) {
            Some(value) => Some(
                Stage::from_str(&value).map_err(|err| QueryError::Filter(err.to_string()))?,
            ),
            None => None,
        };
        let budget = match normalize_scalar(raw.budget_range.as_deref()) {
            Some(value) => Some(BudgetRange::from_str(&value)?),
            None => None,
        };
        let created_window = match normalize_scalar(raw.date_range.as_deref()) {
            Some(value) => Some(DateRange::from_str(&value)?.bounds(now)),
            None => None,
        };
        let dropped = match normalize_scalar(raw.dropped.as_deref()) {
            Some(value) => Some(parse_flag(&value)?),
            None => None,
        };

        Ok(Self {
            stage,
            industry: normalize_scalar(raw.industry.as_deref()).map(|v| v.to_lowercase()),
            company_size: normalize_scalar(raw.company_size.as_deref()).map(|v| v.to_lowercase()),
            assigned_bde: normalize_scalar(raw.assigned_bde.as_deref()),
            budget,
            created_window,
            dropped,
        })
    }

    fn matches(&self, client: &Client) -> bool {
        if let Some(stage) = self.stage {
            if client.stage != stage {
                return false;
            }
        }

        if !equals_ignoring_case(client.industry.as_deref(), self.industry.as_deref()) {
            return false;
        }

        if !equals_ignoring_case(client.company_size.as_deref(), self.company_size.as_deref()) {
            return false;
        }

        if let Some(expected) = self.assigned_bde.as_deref() {
            if client.assigned_bde.as_deref() != Some(expected) {
                return false;
            }
        }

        if let Some(range) = self.budget {
            match client.budget.as_ref() {
                Some(budget) if range.contains(budget.amount) => {}
                _ => return false,
            }
        }

        if let Some((start, end)) = self.created_window {
            if client.created_at < start || client.created_at > end {
                return false;
            }
        }

        if let Some(dropped) = self.dropped {
            if client.is_dropped() != dropped {
                return false;
            }
        }

        true
    }
}

fn equals_ignoring_case(actual: Option<&str>, expected: Option<&str>) -> bool {
    match expected {
        Some(expected) => actual
            .map(|value| value.trim().to_lowercase() == expected)
            .unwrap_or(false),
        None => true,
    }
}

fn normalize_scalar(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_flag(raw: &str) -> Result<bool, QueryError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(QueryError::Filter(format!(
            "invalid dropped filter '{}': expected true or false",
            raw
        ))),
    }
}

/// Half-open budget bucket: `min <= amount < max`, or `amount >= min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetRange {
    Between { min: f64, max: f64 },
    AtLeast { min: f64 },
}

impl BudgetRange {
    pub const PRESETS: [&'static str; 5] = [
        "0-10000",
        "10000-50000",
        "50000-100000",
        "100000-500000",
        "500000+",
    ];

    pub fn contains(self, amount: f64) -> bool {
        match self {
            BudgetRange::Between { min, max } => amount >= min && amount < max,
            BudgetRange::AtLeast { min } => amount >= min,
        }
    }
}

impl FromStr for BudgetRange {
    type Err = QueryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let raw = value.trim().replace(['_', ','], "");
        let invalid = || {
            QueryError::Filter(format!(
                "invalid budget range '{}': expected one of {}",
                value,
                BudgetRange::PRESETS.join(", ")
            ))
        };

        if let Some(min) = raw.strip_suffix('+') {
            let min = min.trim().parse::<f64>().map_err(|_| invalid())?;
            return Ok(BudgetRange::AtLeast { min });
        }

        let (min, max) = raw.split_once('-').ok_or_else(invalid)?;
        let min = min.trim().parse::<f64>().map_err(|_| invalid())?;
        let max = max.trim().parse::<f64>().map_err(|_| invalid())?;
        if max <= min {
            return Err(invalid());
        }
        Ok(BudgetRange::Between { min, max })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Today,
    ThisWeek,
    ThisMonth,
    ThisQuarter,
    ThisYear,
}

impl DateRange {
    /// Inclusive UTC window from the start of the period up to `now`.
    pub fn bounds(self, now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
        let now = now.to_offset(UtcOffset::UTC);
        let today = now.date();
        let start = match self {
            DateRange::Today => today,
            DateRange::ThisWeek => {
                today - Duration::days(i64::from(today.weekday().number_days_from_monday()))
            }
            DateRange::ThisMonth => first_of(today.year(), today.month()),
            DateRange::ThisQuarter => {
                let quarter_start = (u8::from(today.month()) - 1) / 3 * 3 + 1;
                let month = Month::try_from(quarter_start).unwrap_or(Month::January);
                first_of(today.year(), month)
            }
            DateRange::ThisYear => first_of(today.year(), Month::January),
        };
        (start.midnight().assume_utc(), now)
    }
}

fn first_of(year: i32, month: Month) -> Date {
    Date::from_calendar_date(year, month, 1).unwrap_or(Date::MIN)
}

impl FromStr for DateRange {
    type Err = QueryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "today" => Ok(DateRange::Today),
            "this_week" | "week" => Ok(DateRange::ThisWeek),
            "this_month" | "month" => Ok(DateRange::ThisMonth),
            "this_quarter" | "quarter" => Ok(DateRange::ThisQuarter),
            "this_year" | "year" => Ok(DateRange::ThisYear),
            _ => Err(QueryError::Filter(format!(
                "invalid date range '{}': expected today, this_week, this_month, this_quarter or this_year",
                value
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    LastInteraction,
    CompanyName,
    ContactPerson,
    Email,
    Industry,
    Stage,
    Budget,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::LastInteraction => "last_interaction",
            SortField::CompanyName => "company_name",
            SortField::ContactPerson => "contact_person",
            SortField::Email => "email",
            SortField::Industry => "industry",
            SortField::Stage => "stage",
            SortField::Budget => "budget",
        }
    }
}

impl FromStr for SortField {
    type Err = QueryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "created_at" | "created" => Ok(SortField::CreatedAt),
            "last_interaction" => Ok(SortField::LastInteraction),
            "company_name" | "company" => Ok(SortField::CompanyName),
            "contact_person" | "contact" => Ok(SortField::ContactPerson),
            "email" => Ok(SortField::Email),
            "industry" => Ok(SortField::Industry),
            "stage" => Ok(SortField::Stage),
            "budget" => Ok(SortField::Budget),
            _ => Err(QueryError::Sort(format!("unsupported sort key '{}'", value))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            _ => Err(QueryError::Sort(format!(
                "unsupported sort order '{}'; use asc|desc",
                value
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    Filter(String),
    Sort(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Filter(message) | QueryError::Sort(message) => f.write_str(message),
        }
    }
}

impl Error for QueryError {}

#[cfg(test)]
#[path = "query_tests_ext.rs"]
mod tests_ext;
