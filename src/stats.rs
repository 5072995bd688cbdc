use serde::Serialize;

use crate::domain::client::Client;
use crate::domain::stage::Stage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub stage: Stage,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub total: usize,
    pub active: usize,
    pub dropped: usize,
    pub converted: usize,
    /// Active clients only; dropped ones are counted once in `dropped`.
    pub by_stage: Vec<StageCount>,
}

pub fn pipeline_stats(clients: &[Client]) -> PipelineStats {
    let mut by_stage: Vec<StageCount> = Stage::ALL
        .iter()
        .map(|stage| StageCount {
            stage: *stage,
            label: stage.label(),
            count: 0,
        })
        .collect();
    let mut dropped = 0;
    let mut converted = 0;
    for client in clients {
        if client.is_dropped() {
            dropped += 1;
            continue;
        }
        if client.stage.is_converted() {
            converted += 1;
        }
        if let Some(slot) = by_stage.iter_mut().find(|entry| entry.stage == client.stage) {
            slot.count += 1;
        }
    }
    PipelineStats {
        total: clients.len(),
        active: clients.len() - dropped,
        dropped,
        converted,
        by_stage,
    }
}

#[cfg(test)]
mod tests {
    use super::pipeline_stats;
    use crate::domain::client::{Client, NewClient};
    use crate::domain::stage::Stage;
    use time::macros::datetime;

    fn client(id: &str, stage: Stage, dropped: bool) -> Client {
        let mut client = NewClient {
            company_name: id.to_string(),
            contact_person: "x".to_string(),
            ..NewClient::default()
        }
        .into_client(id.to_string(), datetime!(2026-01-01 00:00 UTC));
        client.stage = stage;
        if dropped {
            client.drop_reason = Some("lost".to_string());
        }
        client
    }

    #[test]
    fn counts_active_clients_per_stage() {
        let stats = pipeline_stats(&[
            client("a", Stage::FirstContact, false),
            client("b", Stage::ConvertedClient, false),
            client("c", Stage::ConvertedClient, true),
            client("d", Stage::Negotiation, false),
            client("e", Stage::FirstContact, false),
        ]);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.active, 4);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.converted, 1);
        let counts: Vec<usize> = stats.by_stage.iter().map(|entry| entry.count).collect();
        assert_eq!(counts, vec![2, 0, 0, 1, 1]);
    }

    #[test]
    fn empty_pipeline_has_zeroed_columns() {
        let stats = pipeline_stats(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.by_stage.len(), 5);
        assert!(stats.by_stage.iter().all(|entry| entry.count == 0));
    }
}
