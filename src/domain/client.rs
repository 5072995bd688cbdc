use time::OffsetDateTime;

use crate::domain::note::{Attachment, NoteEntry};
use crate::domain::stage::Stage;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    pub amount: f64,
    pub currency: String,
}

impl Budget {
    pub fn new(amount: f64, currency: Option<&str>) -> Self {
        Self {
            amount,
            currency: normalize_currency(currency),
        }
    }
}

pub fn normalize_currency(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_ascii_uppercase(),
        _ => DEFAULT_CURRENCY.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    pub id: String,
    pub company_name: String,
    pub contact_person: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub budget: Option<Budget>,
    pub requirements: Option<String>,
    pub source: Option<String>,
    pub referrer_name: Option<String>,
    pub assigned_bde: Option<String>,
    pub stage: Stage,
    /// Present exactly when the client is dropped.
    pub drop_reason: Option<String>,
    pub created_at: OffsetDateTime,
    pub last_interaction: OffsetDateTime,
    pub notes: Vec<NoteEntry>,
    pub attachments: Vec<Attachment>,
}

impl Client {
    pub fn is_dropped(&self) -> bool {
        self.drop_reason.is_some()
    }

    pub fn status_label(&self) -> String {
        if self.is_dropped() {
            format!("Dropped ({})", self.stage.label())
        } else {
            self.stage.label().to_string()
        }
    }

    /// Interaction timestamps never precede creation, even under clock skew.
    pub fn interaction_time(&self, now: OffsetDateTime) -> OffsetDateTime {
        now.max(self.created_at)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewClient {
    pub company_name: String,
    pub contact_person: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub budget: Option<Budget>,
    pub requirements: Option<String>,
    pub source: Option<String>,
    pub referrer_name: Option<String>,
    pub assigned_bde: Option<String>,
}

impl NewClient {
    pub fn into_client(self, id: String, now: OffsetDateTime) -> Client {
        Client {
            id,
            company_name: self.company_name.trim().to_string(),
            contact_person: self.contact_person.trim().to_string(),
            email: non_empty(self.email.as_deref()),
            phone: non_empty(self.phone.as_deref()),
            industry: non_empty(self.industry.as_deref()),
            company_size: non_empty(self.company_size.as_deref()),
            budget: self.budget,
            requirements: non_empty(self.requirements.as_deref()),
            source: non_empty(self.source.as_deref()),
            referrer_name: non_empty(self.referrer_name.as_deref()),
            assigned_bde: non_empty(self.assigned_bde.as_deref()),
            stage: Stage::FirstContact,
            drop_reason: None,
            created_at: now,
            last_interaction: now,
            notes: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

/// Partial update sent to the repository. Text fields set to an empty
/// string clear the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientPatch {
    pub company_name: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub budget: Option<Option<Budget>>,
    pub requirements: Option<String>,
    pub source: Option<String>,
    pub referrer_name: Option<String>,
    pub assigned_bde: Option<String>,
    pub stage: Option<Stage>,
    pub drop_reason: Option<Option<String>>,
    pub last_interaction: Option<OffsetDateTime>,
}

impl ClientPatch {
    pub fn stage(stage: Stage, at: OffsetDateTime) -> Self {
        Self {
            stage: Some(stage),
            last_interaction: Some(at),
            ..Self::default()
        }
    }

    pub fn drop_reason(reason: Option<String>) -> Self {
        Self {
            drop_reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn has_changes(&self) -> bool {
        self.has_field_edits()
            || self.stage.is_some()
            || self.drop_reason.is_some()
            || self.last_interaction.is_some()
    }

    pub fn has_field_edits(&self) -> bool {
        self.company_name.is_some()
            || self.contact_person.is_some()
            || self.email.is_some()
            || self.phone.is_some()
            || self.industry.is_some()
            || self.company_size.is_some()
            || self.budget.is_some()
            || self.requirements.is_some()
            || self.source.is_some()
            || self.referrer_name.is_some()
            || self.assigned_bde.is_some()
    }

    pub fn apply_to(&self, client: &mut Client) {
        if let Some(value) = self.company_name.as_deref() {
            client.company_name = value.trim().to_string();
        }
        if let Some(value) = self.contact_person.as_deref() {
            client.contact_person = value.trim().to_string();
        }
        apply_text(&mut client.email, self.email.as_deref());
        apply_text(&mut client.phone, self.phone.as_deref());
        apply_text(&mut client.industry, self.industry.as_deref());
        apply_text(&mut client.company_size, self.company_size.as_deref());
        if let Some(budget) = &self.budget {
            client.budget = budget.clone();
        }
        apply_text(&mut client.requirements, self.requirements.as_deref());
        apply_text(&mut client.source, self.source.as_deref());
        apply_text(&mut client.referrer_name, self.referrer_name.as_deref());
        apply_text(&mut client.assigned_bde, self.assigned_bde.as_deref());
        if let Some(stage) = self.stage {
            client.stage = stage;
        }
        if let Some(reason) = &self.drop_reason {
            client.drop_reason = reason.clone();
        }
        if let Some(at) = self.last_interaction {
            client.last_interaction = client.interaction_time(at);
        }
    }
}

fn apply_text(slot: &mut Option<String>, value: Option<&str>) {
    if let Some(raw) = value {
        *slot = non_empty(Some(raw));
    }
}

pub fn non_empty(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{Budget, ClientPatch, NewClient};
    use crate::domain::stage::Stage;
    use time::macros::datetime;

    fn sample() -> super::Client {
        NewClient {
            company_name: "  Acme Corp ".to_string(),
            contact_person: "Road Runner".to_string(),
            email: Some("   ".to_string()),
            budget: Some(Budget::new(50_000.0, None)),
            ..NewClient::default()
        }
        .into_client("C-1".to_string(), datetime!(2026-01-10 09:00 UTC))
    }

    #[test]
    fn new_clients_start_at_first_contact_and_active() {
        let client = sample();
        assert_eq!(client.company_name, "Acme Corp");
        assert_eq!(client.stage, Stage::FirstContact);
        assert!(!client.is_dropped());
        assert_eq!(client.email, None);
        assert_eq!(client.created_at, client.last_interaction);
        assert_eq!(client.budget.as_ref().unwrap().currency, "USD");
    }

    #[test]
    fn status_label_reflects_drop_state() {
        let mut client = sample();
        assert_eq!(client.status_label(), "First Contact");
        client.drop_reason = Some("lost budget".to_string());
        assert_eq!(client.status_label(), "Dropped (First Contact)");
    }

    #[test]
    fn patch_clears_text_with_empty_string_and_clamps_interaction() {
        let mut client = sample();
        client.requirements = Some("CRM rollout".to_string());
        let patch = ClientPatch {
            requirements: Some(String::new()),
            industry: Some(" Retail ".to_string()),
            last_interaction: Some(datetime!(2025-12-31 00:00 UTC)),
            ..ClientPatch::default()
        };
        assert!(patch.has_changes());
        patch.apply_to(&mut client);
        assert_eq!(client.requirements, None);
        assert_eq!(client.industry.as_deref(), Some("Retail"));
        assert_eq!(client.last_interaction, client.created_at);
    }

    #[test]
    fn empty_patch_has_no_changes() {
        assert!(!ClientPatch::default().has_changes());
        assert!(ClientPatch::drop_reason(None).has_changes());
    }
}
