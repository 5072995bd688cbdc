use std::path::Path;

use time::OffsetDateTime;
use uuid::Uuid;

pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: String,
    pub text: String,
    pub author: String,
    pub created_at: OffsetDateTime,
    pub attachments: Vec<Attachment>,
}

/// A stored note. Older records carry only text; they stay out of the
/// timeline until [`NoteEntry::into_structured`] attributes them.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteEntry {
    Legacy { text: String },
    Structured(Note),
}

impl NoteEntry {
    pub fn text(&self) -> &str {
        match self {
            NoteEntry::Legacy { text } => text,
            NoteEntry::Structured(note) => &note.text,
        }
    }

    pub fn as_structured(&self) -> Option<&Note> {
        match self {
            NoteEntry::Legacy { .. } => None,
            NoteEntry::Structured(note) => Some(note),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, NoteEntry::Legacy { .. })
    }

    pub fn into_structured(self, author: &str, at: OffsetDateTime) -> NoteEntry {
        match self {
            NoteEntry::Legacy { text } => NoteEntry::Structured(Note {
                id: new_note_id(),
                text,
                author: author.to_string(),
                created_at: at,
                attachments: Vec::new(),
            }),
            structured => structured,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub text: String,
    pub created_at: Option<OffsetDateTime>,
}

impl NewNote {
    pub fn into_note(self, author: &str, fallback: OffsetDateTime) -> Note {
        Note {
            id: new_note_id(),
            text: self.text.trim().to_string(),
            author: author.to_string(),
            created_at: self.created_at.unwrap_or(fallback),
            attachments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentOwner<'a> {
    Client(&'a str),
    Note(&'a str),
}

impl AttachmentOwner<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            AttachmentOwner::Client(_) => "client",
            AttachmentOwner::Note(_) => "note",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            AttachmentOwner::Client(id) | AttachmentOwner::Note(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub original_filename: String,
    pub media_type: String,
    pub size_bytes: u64,
    pub uploaded_by: String,
    pub uploaded_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct NewAttachment {
    pub original_filename: String,
    pub media_type: Option<String>,
    pub size_bytes: u64,
}

impl NewAttachment {
    pub fn into_attachment(self, uploader: &str, at: OffsetDateTime) -> Attachment {
        let original_filename = self.original_filename.trim().to_string();
        let media_type = match self.media_type.as_deref().map(str::trim) {
            Some(declared) if !declared.is_empty() => declared.to_string(),
            _ => guess_media_type(&original_filename),
        };
        Attachment {
            id: format!("A-{}", Uuid::now_v7()),
            filename: stored_filename(&original_filename),
            original_filename,
            media_type,
            size_bytes: self.size_bytes,
            uploaded_by: uploader.to_string(),
            uploaded_at: at,
        }
    }
}

pub fn guess_media_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or(UNKNOWN_MEDIA_TYPE)
        .to_string()
}

fn stored_filename(original: &str) -> String {
    let stem = Uuid::now_v7().to_string();
    match Path::new(original).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{stem}.{}", ext.to_ascii_lowercase()),
        _ => stem,
    }
}

pub fn new_note_id() -> String {
    format!("N-{}", Uuid::now_v7())
}
