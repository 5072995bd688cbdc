use std::collections::HashMap;

use crate::domain::client::Client;
use crate::domain::stage::Stage;
use crate::repository::{ClientRepository, RepositoryError};

/// Session cache of the client collection. Every engine component reads
/// and writes clients through this store; order is the order the
/// repository listed them in, with new clients appended.
#[derive(Debug, Clone, Default)]
pub struct ClientStore {
    clients: Vec<Client>,
    index: HashMap<String, usize>,
}

impl ClientStore {
    pub fn from_clients(clients: Vec<Client>) -> Self {
        let mut store = Self::default();
        for client in clients {
            store.upsert(client);
        }
        store
    }

    pub fn load(repo: &dyn ClientRepository) -> Result<Self, RepositoryError> {
        Ok(Self::from_clients(repo.list()?))
    }

    pub fn all(&self) -> &[Client] {
        &self.clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Client> {
        self.index.get(id).map(|position| &self.clients[*position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Replaces the entry with the same id in place, or appends it.
    pub fn upsert(&mut self, client: Client) {
        match self.index.get(&client.id) {
            Some(position) => self.clients[*position] = client,
            None => {
                self.index.insert(client.id.clone(), self.clients.len());
                self.clients.push(client);
            }
        }
    }

    /// Sets only the stage of a cached entry; returns the previous stage.
    pub fn set_stage(&mut self, id: &str, stage: Stage) -> Option<Stage> {
        let position = *self.index.get(id)?;
        let client = &mut self.clients[position];
        let previous = client.stage;
        client.stage = stage;
        Some(previous)
    }

    pub fn refresh(
        &mut self,
        repo: &dyn ClientRepository,
        id: &str,
    ) -> Result<&Client, RepositoryError> {
        let fresh = repo.get(id)?;
        self.upsert(fresh);
        self.get(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}
