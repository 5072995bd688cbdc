use std::cmp::Ordering;

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::client::Client;
use crate::domain::stage::Stage;

const NOTE_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEventKind {
    Created,
    StageReached { stage: Stage },
    NoteAdded { note_id: String, has_attachments: bool },
    AttachmentAdded { attachment_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    pub id: String,
    #[serde(flatten)]
    pub kind: TimelineEventKind,
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    pub actor: Option<String>,
}

/// Merges a client's history into one feed, newest first.
///
/// Stage events are synthetic: one per stage from 2 up to the current stage,
/// all stamped with `last_interaction` because per-stage times are not
/// recorded. Legacy notes carry no timestamp and are left out. Equal
/// timestamps keep generation order (stages, notes, attachments) with the
/// creation event last.
pub fn build_timeline(client: &Client) -> Vec<TimelineEvent> {
    let mut events = Vec::with_capacity(1 + client.notes.len() + client.attachments.len() + 4);

    for stage in client.stage.reached() {
        events.push(TimelineEvent {
            id: format!("stage-{}", stage.number()),
            kind: TimelineEventKind::StageReached { stage },
            title: format!("Moved to {}", stage.label()),
            description: format!("Client progressed to {} stage", stage.label()),
            occurred_at: client.last_interaction,
            actor: client.assigned_bde.clone(),
        });
    }

    for note in client.notes.iter().filter_map(|entry| entry.as_structured()) {
        events.push(TimelineEvent {
            id: format!("note-{}", note.id),
            kind: TimelineEventKind::NoteAdded {
                note_id: note.id.clone(),
                has_attachments: !note.attachments.is_empty(),
            },
            title: "Note Added".to_string(),
            description: preview(&note.text),
            occurred_at: note.created_at,
            actor: Some(note.author.clone()),
        });
    }

    for attachment in &client.attachments {
        events.push(TimelineEvent {
            id: format!("attachment-{}", attachment.id),
            kind: TimelineEventKind::AttachmentAdded {
                attachment_id: attachment.id.clone(),
            },
            title: "File Attached".to_string(),
            description: format!("{} was uploaded", attachment.original_filename),
            occurred_at: attachment.uploaded_at,
            actor: Some(attachment.uploaded_by.clone()),
        });
    }

    events.push(TimelineEvent {
        id: "created".to_string(),
        kind: TimelineEventKind::Created,
        title: "Client Added".to_string(),
        description: format!("{} was added to the pipeline", client.company_name),
        occurred_at: client.created_at,
        actor: client.assigned_bde.clone(),
    });

    // Stable: equal timestamps keep push order, which already puts Created last.
    events.sort_by(newest_first);
    events
}

fn newest_first(a: &TimelineEvent, b: &TimelineEvent) -> Ordering {
    b.occurred_at.cmp(&a.occurred_at)
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(NOTE_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
