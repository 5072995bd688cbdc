//! Restores a JSON backup of `{ users, clients }` as the hosted app exported
//! it. Notes arrive either as bare strings or as objects; timestamps may be
//! RFC 3339 or naive ISO values, read as UTC.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::clock::parse_timestamp;
use crate::db::{self, SqliteStore};
use crate::domain::client::{non_empty, Budget, Client};
use crate::domain::note::{guess_media_type, new_note_id, Attachment, Note, NoteEntry};
use crate::domain::session::{Role, User, UserStatus};
use crate::domain::stage::Stage;
use crate::repository::{RepositoryError, UNKNOWN_USER};

const UNSPECIFIED_DROP_REASON: &str = "unspecified";

#[derive(Debug, Default, Deserialize)]
pub struct Backup {
    #[serde(default)]
    pub users: Vec<BackupUser>,
    #[serde(default)]
    pub clients: Vec<BackupClient>,
}

#[derive(Debug, Deserialize)]
pub struct BackupUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BackupClient {
    pub id: String,
    pub company_name: String,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub company_size: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub budget_currency: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default, alias = "lead_source")]
    pub source: Option<String>,
    #[serde(default)]
    pub referrer_name: Option<String>,
    #[serde(default)]
    pub assigned_bde: Option<String>,
    #[serde(default = "first_stage")]
    pub stage: i64,
    #[serde(default)]
    pub is_dropped: Option<bool>,
    #[serde(default)]
    pub drop_reason: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_interaction: Option<String>,
    #[serde(default)]
    pub notes: Vec<BackupNote>,
    #[serde(default)]
    pub attachments: Vec<BackupAttachment>,
}

fn first_stage() -> i64 {
    Stage::FirstContact.number()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BackupNote {
    Text(String),
    Object {
        #[serde(default)]
        id: Option<String>,
        text: String,
        #[serde(default)]
        author: Option<String>,
        #[serde(default, alias = "created_at")]
        timestamp: Option<String>,
        #[serde(default)]
        attachments: Vec<BackupAttachment>,
    },
}

#[derive(Debug, Deserialize)]
pub struct BackupAttachment {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    pub original_filename: String,
    #[serde(default, alias = "file_type")]
    pub media_type: Option<String>,
    #[serde(default, alias = "file_size")]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub users_imported: usize,
    pub users_skipped: usize,
    pub clients_imported: usize,
    pub clients_skipped: usize,
}

pub fn read_backup(path: &Path) -> Result<Backup, ImportError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Converts every record first so a malformed backup writes nothing, then
/// inserts users and clients whose ids are not present yet. The inserts
/// share one transaction, so a failing row leaves the store untouched.
pub fn import_backup(
    store: &SqliteStore,
    backup: Backup,
    imported_at: OffsetDateTime,
) -> Result<ImportSummary, ImportError> {
    let users = backup
        .users
        .into_iter()
        .map(BackupUser::into_user)
        .collect::<Result<Vec<_>, _>>()?;
    let clients = backup
        .clients
        .into_iter()
        .map(|client| client.into_client(imported_at))
        .collect::<Result<Vec<_>, _>>()?;

    let summary = store.with_transaction(|conn| -> Result<ImportSummary, ImportError> {
        let mut summary = ImportSummary::default();
        for user in &users {
            if db::insert_user(conn, user).map_err(RepositoryError::from)? {
                summary.users_imported += 1;
            } else {
                summary.users_skipped += 1;
            }
        }
        for client in &clients {
            if db::insert_client(conn, client)? {
                summary.clients_imported += 1;
            } else {
                warn!(client = %client.id, "client already present; skipped");
                summary.clients_skipped += 1;
            }
        }
        Ok(summary)
    })?;
    info!(
        users = summary.users_imported,
        clients = summary.clients_imported,
        skipped = summary.users_skipped + summary.clients_skipped,
        "backup imported"
    );
    Ok(summary)
}

impl BackupUser {
    fn into_user(self) -> Result<User, ImportError> {
        let role = match self.role.as_deref() {
            Some(raw) => Role::from_str(raw)
                .map_err(|err| ImportError::Invalid(format!("user '{}': {}", self.id, err)))?,
            None => Role::Bde,
        };
        let status = match self.status.as_deref() {
            Some(raw) => UserStatus::parse(raw).ok_or_else(|| {
                ImportError::Invalid(format!("user '{}': unknown status '{}'", self.id, raw))
            })?,
            None => UserStatus::Active,
        };
        Ok(User {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_ascii_lowercase(),
            id: self.id,
            role,
            status,
        })
    }
}

impl BackupClient {
    fn into_client(self, imported_at: OffsetDateTime) -> Result<Client, ImportError> {
        let id = self.id;
        let invalid = |message: String| ImportError::Invalid(format!("client '{}': {}", id, message));

        let stage = Stage::from_number(self.stage).map_err(|err| invalid(err.to_string()))?;
        let created_at = optional_timestamp(self.created_at.as_deref())
            .map_err(&invalid)?
            .unwrap_or(imported_at);
        let last_interaction = optional_timestamp(self.last_interaction.as_deref())
            .map_err(&invalid)?
            .unwrap_or(created_at)
            .max(created_at);

        let reason = non_empty(self.drop_reason.as_deref());
        let drop_reason = match self.is_dropped {
            Some(true) => Some(reason.unwrap_or_else(|| UNSPECIFIED_DROP_REASON.to_string())),
            Some(false) => None,
            None => reason,
        };

        let mut notes = Vec::with_capacity(self.notes.len());
        for note in self.notes {
            notes.push(note.into_entry().map_err(&invalid)?);
        }
        let mut attachments = Vec::with_capacity(self.attachments.len());
        for attachment in self.attachments {
            attachments.push(attachment.into_attachment(imported_at).map_err(&invalid)?);
        }

        let company_name = self.company_name.trim().to_string();
        if company_name.is_empty() {
            return Err(invalid("company name is required".to_string()));
        }

        Ok(Client {
            company_name,
            contact_person: self.contact_person.unwrap_or_default().trim().to_string(),
            email: non_empty(self.email.as_deref()),
            phone: non_empty(self.phone.as_deref()),
            industry: non_empty(self.industry.as_deref()),
            company_size: non_empty(self.company_size.as_deref()),
            budget: self
                .budget
                .map(|amount| Budget::new(amount, self.budget_currency.as_deref())),
            requirements: non_empty(self.requirements.as_deref()),
            source: non_empty(self.source.as_deref()),
            referrer_name: non_empty(self.referrer_name.as_deref()),
            assigned_bde: non_empty(self.assigned_bde.as_deref()),
            stage,
            drop_reason,
            created_at,
            last_interaction,
            notes,
            attachments,
            id,
        })
    }
}

impl BackupNote {
    /// Object notes without a timestamp cannot be placed in time and are
    /// kept as legacy text.
    fn into_entry(self) -> Result<NoteEntry, String> {
        match self {
            BackupNote::Text(text) => Ok(NoteEntry::Legacy { text }),
            BackupNote::Object {
                id,
                text,
                author,
                timestamp,
                attachments,
            } => {
                let Some(created_at) = optional_timestamp(timestamp.as_deref())? else {
                    return Ok(NoteEntry::Legacy { text });
                };
                let mut converted = Vec::with_capacity(attachments.len());
                for attachment in attachments {
                    converted.push(attachment.into_attachment(created_at)?);
                }
                Ok(NoteEntry::Structured(Note {
                    id: non_empty(id.as_deref()).unwrap_or_else(new_note_id),
                    text,
                    author: non_empty(author.as_deref())
                        .unwrap_or_else(|| UNKNOWN_USER.to_string()),
                    created_at,
                    attachments: converted,
                }))
            }
        }
    }
}

impl BackupAttachment {
    fn into_attachment(self, fallback: OffsetDateTime) -> Result<Attachment, String> {
        let uploaded_at = optional_timestamp(self.uploaded_at.as_deref())?.unwrap_or(fallback);
        let media_type = non_empty(self.media_type.as_deref())
            .unwrap_or_else(|| guess_media_type(&self.original_filename));
        Ok(Attachment {
            filename: non_empty(self.filename.as_deref())
                .unwrap_or_else(|| self.original_filename.clone()),
            media_type,
            size_bytes: self.size_bytes.unwrap_or_default(),
            uploaded_by: non_empty(self.uploaded_by.as_deref())
                .unwrap_or_else(|| UNKNOWN_USER.to_string()),
            uploaded_at,
            original_filename: self.original_filename,
            id: self.id,
        })
    }
}

fn optional_timestamp(raw: Option<&str>) -> Result<Option<OffsetDateTime>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value)
            .map(Some)
            .ok_or_else(|| format!("unreadable timestamp '{}'", value)),
    }
}

#[derive(Debug)]
pub enum ImportError {
    Io(io::Error),
    Json(serde_json::Error),
    Invalid(String),
    Repository(RepositoryError),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "cannot read backup: {}", err),
            ImportError::Json(err) => write!(f, "invalid backup JSON: {}", err),
            ImportError::Invalid(message) => write!(f, "invalid backup record: {}", message),
            ImportError::Repository(err) => write!(f, "{}", err),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Json(err) => Some(err),
            ImportError::Invalid(_) => None,
            ImportError::Repository(err) => Some(err),
        }
    }
}

impl From<io::Error> for ImportError {
    fn from(value: io::Error) -> Self {
        ImportError::Io(value)
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(value: serde_json::Error) -> Self {
        ImportError::Json(value)
    }
}

impl From<RepositoryError> for ImportError {
    fn from(value: RepositoryError) -> Self {
        ImportError::Repository(value)
    }
}

#[cfg(test)]
#[path = "import_tests_ext.rs"]
mod tests_ext;
