//! Collaborator seams the engine persists through. The SQLite cache in
//! `db` implements all of them; tests use [`memory::MemoryRepository`].

use std::error::Error;
use std::fmt;

use time::OffsetDateTime;

use crate::domain::client::{Client, ClientPatch, NewClient};
use crate::domain::note::{Attachment, AttachmentOwner, Note, NoteEntry};
use crate::domain::session::{NewUser, User};

pub const UNKNOWN_USER: &str = "Unknown";
pub const UNASSIGNED: &str = "Unassigned";

pub trait ClientRepository {
    fn list(&self) -> Result<Vec<Client>, RepositoryError>;
    fn get(&self, id: &str) -> Result<Client, RepositoryError>;
    fn update(&self, id: &str, patch: &ClientPatch) -> Result<Client, RepositoryError>;
    fn create(&self, fields: NewClient, at: OffsetDateTime) -> Result<Client, RepositoryError>;
}

pub trait UserDirectory {
    fn get_user(&self, id: &str) -> Result<Option<User>, RepositoryError>;
    fn list_users(&self) -> Result<Vec<User>, RepositoryError>;
    fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Never fails: unresolved ids render as [`UNKNOWN_USER`].
    fn resolve_name(&self, user_id: &str) -> String {
        match self.get_user(user_id) {
            Ok(Some(user)) => user.name,
            _ => UNKNOWN_USER.to_string(),
        }
    }

    fn resolve_assignee(&self, user_id: Option<&str>) -> String {
        match self.get_user(user_id.unwrap_or_default()) {
            Ok(Some(user)) => user.name,
            _ => UNASSIGNED.to_string(),
        }
    }

    fn list_assignable(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self
            .list_users()?
            .into_iter()
            .filter(User::is_assignable)
            .collect())
    }
}

pub trait NoteService {
    fn add_note(&self, client_id: &str, note: Note) -> Result<Note, RepositoryError>;
    fn notes_for(&self, client_id: &str) -> Result<Vec<NoteEntry>, RepositoryError>;
    /// Attributes every legacy note of a client; returns how many changed.
    fn migrate_legacy_notes(
        &self,
        client_id: &str,
        author: &str,
        at: OffsetDateTime,
    ) -> Result<usize, RepositoryError>;
}

pub trait AttachmentService {
    fn add_attachment(
        &self,
        owner: AttachmentOwner<'_>,
        attachment: Attachment,
    ) -> Result<Attachment, RepositoryError>;
    fn attachments_for(
        &self,
        owner: AttachmentOwner<'_>,
    ) -> Result<Vec<Attachment>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    NotFound(String),
    Validation(String),
    Unauthorized(String),
    /// The persistence call could not complete.
    Unavailable(String),
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryError::NotFound(id) => write!(f, "record '{}' not found", id),
            RepositoryError::Validation(message) => write!(f, "rejected: {}", message),
            RepositoryError::Unauthorized(message) => write!(f, "unauthorized: {}", message),
            RepositoryError::Unavailable(message) => {
                write!(f, "persistence unavailable: {}", message)
            }
        }
    }
}

impl RepositoryError {
    /// True when retrying the same call may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_))
    }
}

impl Error for RepositoryError {}

impl From<rusqlite::Error> for RepositoryError {
    fn from(value: rusqlite::Error) -> Self {
        RepositoryError::Unavailable(value.to_string())
    }
}

#[cfg(test)]
pub mod memory {
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;

    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::{ClientRepository, RepositoryError};
    use crate::domain::client::{Client, ClientPatch, NewClient};

    /// In-memory repository with call counters and scripted update failures.
    #[derive(Debug, Default)]
    pub struct MemoryRepository {
        clients: RefCell<BTreeMap<String, Client>>,
        updates: Cell<usize>,
        failing_updates: Cell<usize>,
    }

    impl MemoryRepository {
        pub fn with_clients(clients: Vec<Client>) -> Self {
            let repo = Self::default();
            for client in clients {
                repo.clients.borrow_mut().insert(client.id.clone(), client);
            }
            repo
        }

        pub fn update_calls(&self) -> usize {
            self.updates.get()
        }

        /// The next `count` updates fail with `Unavailable`.
        pub fn fail_next_updates(&self, count: usize) {
            self.failing_updates.set(count);
        }

        pub fn stored(&self, id: &str) -> Option<Client> {
            self.clients.borrow().get(id).cloned()
        }
    }

    impl ClientRepository for MemoryRepository {
        fn list(&self) -> Result<Vec<Client>, RepositoryError> {
            Ok(self.clients.borrow().values().cloned().collect())
        }

        fn get(&self, id: &str) -> Result<Client, RepositoryError> {
            self.stored(id)
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
        }

        fn update(&self, id: &str, patch: &ClientPatch) -> Result<Client, RepositoryError> {
            self.updates.set(self.updates.get() + 1);
            let remaining = self.failing_updates.get();
            if remaining > 0 {
                self.failing_updates.set(remaining - 1);
                return Err(RepositoryError::Unavailable(
                    "simulated network failure".to_string(),
                ));
            }
            let mut clients = self.clients.borrow_mut();
            let client = clients
                .get_mut(id)
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
            patch.apply_to(client);
            Ok(client.clone())
        }

        fn create(&self, fields: NewClient, at: OffsetDateTime) -> Result<Client, RepositoryError> {
            let client = fields.into_client(format!("C-{}", Uuid::now_v7()), at);
            self.clients
                .borrow_mut()
                .insert(client.id.clone(), client.clone());
            Ok(client)
        }
    }
}
