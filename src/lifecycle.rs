use std::error::Error;
use std::fmt;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::domain::client::{Client, ClientPatch};
use crate::domain::stage::{InvalidStage, Stage};
use crate::repository::{ClientRepository, RepositoryError};
use crate::store::ClientStore;

/// Applies stage moves and the drop/reactivate lifecycle to clients held in
/// a [`ClientStore`], persisting each change through the repository.
///
/// Any stage is reachable from any other in one move; progression is not
/// required to be sequential.
pub struct StageStateMachine<'a> {
    repo: &'a dyn ClientRepository,
    clock: &'a dyn Clock,
}

impl<'a> StageStateMachine<'a> {
    pub fn new(repo: &'a dyn ClientRepository, clock: &'a dyn Clock) -> Self {
        Self { repo, clock }
    }

    pub fn move_stage(
        &self,
        store: &mut ClientStore,
        id: &str,
        new_stage: i64,
    ) -> Result<Client, LifecycleError> {
        let target = Stage::from_number(new_stage)?;
        self.move_to(store, id, target)
    }

    pub fn move_to(
        &self,
        store: &mut ClientStore,
        id: &str,
        target: Stage,
    ) -> Result<Client, LifecycleError> {
        let current = lookup(store, id)?;
        if current.stage == target {
            debug!(client = id, stage = target.number(), "stage unchanged; skipping persist");
            return Ok(current.clone());
        }

        let from = current.stage;
        let updated = self.persist_stage(id, target)?;
        store.upsert(updated.clone());
        info!(
            client = id,
            from = from.number(),
            to = target.number(),
            "client stage moved"
        );
        Ok(updated)
    }

    pub fn drop(
        &self,
        store: &mut ClientStore,
        id: &str,
        reason: &str,
    ) -> Result<Client, LifecycleError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LifecycleError::Validation(
                "drop reason cannot be empty".to_string(),
            ));
        }

        let current = lookup(store, id)?;
        if current.drop_reason.as_deref() == Some(reason) {
            return Ok(current.clone());
        }

        let updated = self
            .repo
            .update(id, &ClientPatch::drop_reason(Some(reason.to_string())))?;
        store.upsert(updated.clone());
        info!(client = id, reason, "client dropped");
        Ok(updated)
    }

    /// Clears the drop and restarts the client at `FirstContact`, whatever
    /// stage it held before.
    pub fn reactivate(&self, store: &mut ClientStore, id: &str) -> Result<Client, LifecycleError> {
        let current = lookup(store, id)?;
        if !current.is_dropped() {
            return Err(LifecycleError::InvalidState(format!(
                "client '{}' is not dropped",
                id
            )));
        }

        let patch = ClientPatch {
            stage: Some(Stage::FirstContact),
            drop_reason: Some(None),
            ..ClientPatch::default()
        };
        let updated = self.repo.update(id, &patch)?;
        store.upsert(updated.clone());
        info!(client = id, "client reactivated");
        Ok(updated)
    }

    /// Persists a stage without consulting the cache. Shared with the board,
    /// whose cache entry already shows the target stage optimistically.
    pub fn persist_stage(&self, id: &str, target: Stage) -> Result<Client, RepositoryError> {
        self.repo
            .update(id, &ClientPatch::stage(target, self.clock.now()))
    }
}

fn lookup<'s>(store: &'s ClientStore, id: &str) -> Result<&'s Client, LifecycleError> {
    store
        .get(id)
        .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    InvalidStage(i64),
    Validation(String),
    InvalidState(String),
    NotFound(String),
    Repository(RepositoryError),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::InvalidStage(value) => {
                write!(f, "invalid stage {}: expected a value from 1 to 5", value)
            }
            LifecycleError::Validation(message) => write!(f, "{}", message),
            LifecycleError::InvalidState(message) => write!(f, "{}", message),
            LifecycleError::NotFound(id) => write!(f, "client '{}' not found", id),
            LifecycleError::Repository(err) => write!(f, "{}", err),
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LifecycleError::Repository(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvalidStage> for LifecycleError {
    fn from(value: InvalidStage) -> Self {
        LifecycleError::InvalidStage(value.value)
    }
}

impl From<RepositoryError> for LifecycleError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(id) => LifecycleError::NotFound(id),
            RepositoryError::Validation(message) => LifecycleError::Validation(message),
            other => LifecycleError::Repository(other),
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests_ext.rs"]
mod tests_ext;
