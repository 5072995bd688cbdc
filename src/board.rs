use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use tracing::{info, warn};

use crate::domain::client::Client;
use crate::domain::stage::Stage;
use crate::lifecycle::StageStateMachine;
use crate::repository::RepositoryError;
use crate::store::ClientStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub client_id: String,
    pub origin_stage: Stage,
}

/// A stage move shown optimistically and awaiting its persistence result.
/// Not `Clone`: each pending move settles exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct PendingMove {
    pub client_id: String,
    pub origin_stage: Stage,
    pub target_stage: Stage,
    ticket: u64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DragOutcome {
    Cancelled,
    Unchanged,
    Pending(PendingMove),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Confirmed(Client),
    RolledBack {
        restored_stage: Stage,
        error: RepositoryError,
    },
    /// A newer move for the same client was issued; this result was dropped.
    Superseded,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    latest_ticket: u64,
    /// Moves issued for the client whose results have not arrived yet.
    outstanding: usize,
    /// Last stage known to be persisted, from the newest successful ticket.
    baseline: Stage,
    baseline_ticket: u64,
    latest_failed: bool,
}

/// Drives drag-and-drop stage changes on the pipeline board.
///
/// `end_drag` mutates the cached stage immediately and hands back a
/// [`PendingMove`]; `settle` applies the persistence result when it
/// arrives. Several moves for one client may be outstanding; only the
/// newest one decides what the board shows.
#[derive(Debug, Default)]
pub struct BoardReconciler {
    next_ticket: u64,
    in_flight: HashMap<String, InFlight>,
}

impl BoardReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_drag(&self, store: &ClientStore, client_id: &str) -> Result<DragSession, BoardError> {
        let client = store
            .get(client_id)
            .ok_or_else(|| BoardError::NotFound(client_id.to_string()))?;
        if client.is_dropped() {
            return Err(BoardError::Dropped(client_id.to_string()));
        }
        Ok(DragSession {
            client_id: client.id.clone(),
            origin_stage: client.stage,
        })
    }

    pub fn end_drag(
        &mut self,
        store: &mut ClientStore,
        session: DragSession,
        target: Option<Stage>,
    ) -> DragOutcome {
        let Some(target_stage) = target else {
            return DragOutcome::Cancelled;
        };
        if target_stage == session.origin_stage {
            return DragOutcome::Unchanged;
        }
        if store.set_stage(&session.client_id, target_stage).is_none() {
            return DragOutcome::Cancelled;
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.in_flight
            .entry(session.client_id.clone())
            .and_modify(|entry| {
                entry.latest_ticket = ticket;
                entry.outstanding += 1;
                entry.latest_failed = false;
            })
            .or_insert(InFlight {
                latest_ticket: ticket,
                outstanding: 1,
                baseline: session.origin_stage,
                baseline_ticket: 0,
                latest_failed: false,
            });

        DragOutcome::Pending(PendingMove {
            client_id: session.client_id,
            origin_stage: session.origin_stage,
            target_stage,
            ticket,
        })
    }

    /// Applies a persistence result. A failed newest move reverts the card
    /// to its origin while older moves are still outstanding, and to the
    /// last persisted stage once none are. A stale result that arrives after
    /// the newest move failed re-aligns the card with what was persisted.
    pub fn settle(
        &mut self,
        store: &mut ClientStore,
        pending: PendingMove,
        result: Result<Client, RepositoryError>,
    ) -> Settlement {
        let Some(entry) = self.in_flight.get_mut(&pending.client_id) else {
            warn!(
                client = %pending.client_id,
                ticket = pending.ticket,
                "discarding result for a client with no moves in flight"
            );
            return Settlement::Superseded;
        };

        entry.outstanding = entry.outstanding.saturating_sub(1);
        if let Ok(persisted) = &result {
            if pending.ticket > entry.baseline_ticket {
                entry.baseline = persisted.stage;
                entry.baseline_ticket = pending.ticket;
            }
        }
        let is_latest = entry.latest_ticket == pending.ticket;
        if is_latest {
            entry.latest_failed = result.is_err();
        }
        let InFlight {
            latest_ticket,
            outstanding,
            baseline,
            latest_failed,
            ..
        } = *entry;
        if outstanding == 0 {
            self.in_flight.remove(&pending.client_id);
        }

        if !is_latest {
            if outstanding == 0 && latest_failed {
                store.set_stage(&pending.client_id, baseline);
            }
            warn!(
                client = %pending.client_id,
                ticket = pending.ticket,
                latest = latest_ticket,
                "discarding result of superseded board move"
            );
            return Settlement::Superseded;
        }

        match result {
            Ok(client) => {
                info!(
                    client = %pending.client_id,
                    from = pending.origin_stage.number(),
                    to = pending.target_stage.number(),
                    "board move confirmed"
                );
                store.upsert(client.clone());
                Settlement::Confirmed(client)
            }
            Err(error) => {
                let restored_stage = if outstanding == 0 {
                    baseline
                } else {
                    pending.origin_stage
                };
                store.set_stage(&pending.client_id, restored_stage);
                warn!(
                    client = %pending.client_id,
                    restored = restored_stage.number(),
                    error = %error,
                    "board move failed; stage rolled back"
                );
                Settlement::RolledBack {
                    restored_stage,
                    error,
                }
            }
        }
    }

    /// Issues the persistence call for `pending` and settles it in one step.
    pub fn commit(
        &mut self,
        store: &mut ClientStore,
        machine: &StageStateMachine<'_>,
        pending: PendingMove,
    ) -> Settlement {
        let result = machine.persist_stage(&pending.client_id, pending.target_stage);
        self.settle(store, pending, result)
    }

    #[cfg(test)]
    pub fn is_pending(&self, client_id: &str) -> bool {
        self.in_flight.contains_key(client_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardColumn<'a> {
    pub stage: Stage,
    pub clients: Vec<&'a Client>,
}

/// One column per stage holding the active clients in store order.
pub fn board_columns(store: &ClientStore) -> Vec<BoardColumn<'_>> {
    let mut columns: Vec<BoardColumn<'_>> = Stage::ALL
        .iter()
        .map(|stage| BoardColumn {
            stage: *stage,
            clients: Vec::new(),
        })
        .collect();
    for client in store.all().iter().filter(|client| !client.is_dropped()) {
        let slot = client.stage.number() as usize - 1;
        columns[slot].clients.push(client);
    }
    columns
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    NotFound(String),
    Dropped(String),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::NotFound(id) => write!(f, "client '{}' not found", id),
            BoardError::Dropped(id) => {
                write!(f, "client '{}' is dropped and not on the board", id)
            }
        }
    }
}

impl Error for BoardError {}

#[cfg(test)]
mod tests;
