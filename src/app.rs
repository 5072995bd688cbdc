use std::error::Error;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, warn};

use crate::board::{
    board_columns, BoardError, BoardReconciler, DragOutcome, Settlement,
};
use crate::clock::{format_timestamp, parse_timestamp, Clock, SystemClock};
use crate::config::{Config, ConfigError};
use crate::db::SqliteStore;
use crate::domain::client::{non_empty, Budget, Client, ClientPatch, NewClient};
use crate::domain::note::{Attachment, AttachmentOwner, NewAttachment, NewNote, NoteEntry};
use crate::domain::session::{NewUser, Role, SessionContext, User, UserStatus};
use crate::domain::stage::{ParseStageError, Stage};
use crate::import::{import_backup, read_backup, ImportError, ImportSummary};
use crate::lifecycle::{LifecycleError, StageStateMachine};
use crate::query::{run_query, ClientListFilter, ClientQuery, QueryError, SortField, SortOrder};
use crate::repository::{
    AttachmentService, ClientRepository, NoteService, RepositoryError, UserDirectory,
};
use crate::stats::{pipeline_stats, PipelineStats};
use crate::store::ClientStore;
use crate::timeline::{build_timeline, TimelineEvent};

pub struct App {
    store: SqliteStore,
    cache: ClientStore,
    board: BoardReconciler,
    clock: Box<dyn Clock>,
    config: Config,
    session: Option<SessionContext>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClientView {
    pub id: String,
    pub company_name: String,
    pub contact_person: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub budget: Option<f64>,
    pub budget_currency: Option<String>,
    pub requirements: Option<String>,
    pub source: Option<String>,
    pub referrer_name: Option<String>,
    pub assigned_bde: Option<String>,
    pub assigned_bde_name: String,
    pub stage: Stage,
    pub stage_label: &'static str,
    pub is_dropped: bool,
    pub drop_reason: Option<String>,
    pub status: String,
    pub created_at: String,
    pub last_interaction: String,
    pub notes: Vec<NoteView>,
    pub attachments: Vec<AttachmentView>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NoteView {
    pub id: Option<String>,
    pub text: String,
    pub author: Option<String>,
    pub created_at: Option<String>,
    pub legacy: bool,
    pub attachments: Vec<AttachmentView>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AttachmentView {
    pub id: String,
    pub filename: String,
    pub original_filename: String,
    pub media_type: String,
    pub size_bytes: u64,
    pub uploaded_by: String,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimelineEntry {
    #[serde(flatten)]
    pub event: TimelineEvent,
    pub actor_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BoardColumnView {
    pub stage: Stage,
    pub label: &'static str,
    pub clients: Vec<ClientView>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoardMoveStatus {
    Cancelled,
    Unchanged,
    Confirmed,
    RolledBack,
    Superseded,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BoardMoveReport {
    pub status: BoardMoveStatus,
    pub client: ClientView,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
}

impl App {
    pub fn open(db_path: &str, config: Config) -> Result<Self, AppError> {
        Self::open_with_clock(db_path, config, Box::new(SystemClock))
    }

    pub fn open_with_clock(
        db_path: &str,
        config: Config,
        clock: Box<dyn Clock>,
    ) -> Result<Self, AppError> {
        ensure_parent_dir(db_path)?;
        let store = SqliteStore::open(db_path)?;
        let cache = ClientStore::load(&store)?;
        Ok(Self {
            store,
            cache,
            board: BoardReconciler::new(),
            clock,
            config,
            session: None,
        })
    }

    /// Acts as `user_id` for every following call.
    pub fn sign_in(&mut self, user_id: &str) -> Result<&SessionContext, AppError> {
        let user = self
            .store
            .get_user(user_id.trim())?
            .ok_or_else(|| AppError::NotFound(format!("user '{}'", user_id.trim())))?;
        if user.status != UserStatus::Active {
            return Err(AppError::PermissionDenied(format!(
                "user '{}' is inactive",
                user.id
            )));
        }
        info!(user = %user.id, role = user.role.as_str(), "session started");
        Ok(&*self.session.insert(SessionContext::for_user(&user)))
    }

    /// Builds a budget, filling the currency from configuration.
    pub fn budget(&self, amount: f64, currency: Option<&str>) -> Budget {
        let currency = non_empty(currency).unwrap_or_else(|| self.config.default_currency.clone());
        Budget::new(amount, Some(&currency))
    }

    pub fn query(
        &self,
        search: Option<&str>,
        filter: ClientListFilter,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
    ) -> Result<Vec<ClientView>, AppError> {
        let query = ClientQuery {
            search: search.map(str::to_string),
            filter,
            sort_by: match sort_by {
                Some(raw) => SortField::from_str(raw)?,
                None => self.config.sort_by,
            },
            sort_order: match sort_order {
                Some(raw) => SortOrder::from_str(raw)?,
                None => self.config.sort_order,
            },
        };
        let matched = run_query(self.cache.all(), &query, self.clock.now())?;
        Ok(matched.iter().map(|client| self.view(client)).collect())
    }

    pub fn show(&self, id: &str) -> Result<ClientView, AppError> {
        Ok(self.view(self.cached(id)?))
    }

    pub fn timeline(&self, id: &str) -> Result<Vec<TimelineEntry>, AppError> {
        let client = self.cached(id)?;
        Ok(build_timeline(client)
            .into_iter()
            .map(|event| TimelineEntry {
                actor_name: self.store.resolve_name(event.actor.as_deref().unwrap_or_default()),
                event,
            })
            .collect())
    }

    pub fn move_stage(&mut self, id: &str, stage: &str) -> Result<ClientView, AppError> {
        let machine = StageStateMachine::new(&self.store, self.clock.as_ref());
        let updated = match stage.trim().parse::<i64>() {
            Ok(number) => machine.move_stage(&mut self.cache, id, number)?,
            Err(_) => machine.move_to(&mut self.cache, id, Stage::from_str(stage)?)?,
        };
        Ok(self.view(&updated))
    }

    pub fn drop_client(&mut self, id: &str, reason: &str) -> Result<ClientView, AppError> {
        let machine = StageStateMachine::new(&self.store, self.clock.as_ref());
        let updated = machine.drop(&mut self.cache, id, reason)?;
        Ok(self.view(&updated))
    }

    pub fn reactivate(&mut self, id: &str) -> Result<ClientView, AppError> {
        let machine = StageStateMachine::new(&self.store, self.clock.as_ref());
        let updated = machine.reactivate(&mut self.cache, id)?;
        Ok(self.view(&updated))
    }

    pub fn board(&self) -> Vec<BoardColumnView> {
        board_columns(&self.cache)
            .into_iter()
            .map(|column| BoardColumnView {
                stage: column.stage,
                label: column.stage.label(),
                clients: column
                    .clients
                    .into_iter()
                    .map(|client| self.view(client))
                    .collect(),
            })
            .collect()
    }

    /// Drags a card onto `target` (or nowhere) and settles the persistence
    /// result. A rollback is reported, not raised.
    pub fn board_move(
        &mut self,
        id: &str,
        target: Option<&str>,
    ) -> Result<BoardMoveReport, AppError> {
        let target = match target {
            Some(raw) => Some(parse_stage(raw)?),
            None => None,
        };
        let session = self.board.begin_drag(&self.cache, id)?;
        let machine = StageStateMachine::new(&self.store, self.clock.as_ref());
        let (status, error) = match self.board.end_drag(&mut self.cache, session, target) {
            DragOutcome::Cancelled => (BoardMoveStatus::Cancelled, None),
            DragOutcome::Unchanged => (BoardMoveStatus::Unchanged, None),
            DragOutcome::Pending(pending) => {
                match self.board.commit(&mut self.cache, &machine, pending) {
                    Settlement::Confirmed(client) => {
                        info!(client = %client.id, stage = client.stage.number(), "board move confirmed");
                        (BoardMoveStatus::Confirmed, None)
                    }
                    Settlement::RolledBack {
                        restored_stage,
                        error,
                    } => (
                        BoardMoveStatus::RolledBack,
                        Some(format!(
                            "{} (restored to stage {})",
                            error,
                            restored_stage.number()
                        )),
                    ),
                    Settlement::Superseded => (BoardMoveStatus::Superseded, None),
                }
            }
        };
        Ok(BoardMoveReport {
            status,
            client: self.view(self.cached(id)?),
            error,
        })
    }

    pub fn create_client(&mut self, fields: NewClient) -> Result<ClientView, AppError> {
        if fields.company_name.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "company name is required".to_string(),
            ));
        }
        if fields.contact_person.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "contact person is required".to_string(),
            ));
        }
        if let Some(assignee) = non_empty(fields.assigned_bde.as_deref()) {
            self.require_assignable(&assignee)?;
        }
        let created = self.store.create(fields, self.clock.now())?;
        info!(client = %created.id, company = %created.company_name, "client created");
        self.cache.upsert(created.clone());
        Ok(self.view(&created))
    }

    /// Edits descriptive fields. Stage and drop state only change through
    /// the lifecycle operations.
    pub fn update_client(&mut self, id: &str, patch: ClientPatch) -> Result<ClientView, AppError> {
        if patch.stage.is_some() || patch.drop_reason.is_some() {
            return Err(AppError::InvalidArgument(
                "stage and drop state change through move, drop and reactivate".to_string(),
            ));
        }
        if !patch.has_field_edits() {
            return Err(AppError::InvalidArgument(
                "update requires at least one field change".to_string(),
            ));
        }
        self.cached(id)?;
        if let Some(assignee) = non_empty(patch.assigned_bde.as_deref()) {
            self.require_assignable(&assignee)?;
        }
        let patch = ClientPatch {
            last_interaction: Some(self.clock.now()),
            ..patch
        };
        let updated = self.store.update(id, &patch)?;
        self.cache.upsert(updated.clone());
        info!(client = id, "client fields updated");
        Ok(self.view(&updated))
    }

    pub fn stats(&self) -> PipelineStats {
        pipeline_stats(self.cache.all())
    }

    pub fn add_note(&mut self, id: &str, text: &str) -> Result<NoteView, AppError> {
        let author = self.require_session()?.user_id.clone();
        if text.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "note text cannot be empty".to_string(),
            ));
        }
        self.cached(id)?;
        let now = self.clock.now();
        let note = NewNote {
            text: text.to_string(),
            created_at: None,
        }
        .into_note(&author, now);
        let saved = self.store.add_note(id, note)?;
        self.touch(id)?;
        info!(client = id, note = %saved.id, "note added");
        Ok(note_view(&NoteEntry::Structured(saved)))
    }

    pub fn attach(
        &mut self,
        id: &str,
        file: &Path,
        note_id: Option<&str>,
    ) -> Result<AttachmentView, AppError> {
        let uploader = self.require_session()?.user_id.clone();
        if let Some(note_id) = note_id {
            self.require_note(id, note_id)?;
        } else {
            self.cached(id)?;
        }

        let metadata = std::fs::metadata(file)?;
        if !metadata.is_file() {
            return Err(AppError::InvalidArgument(format!(
                "'{}' is not a regular file",
                file.display()
            )));
        }
        let original_filename = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AppError::InvalidArgument(format!("'{}' has no file name", file.display()))
            })?;
        let attachment = NewAttachment {
            original_filename,
            media_type: None,
            size_bytes: metadata.len(),
        }
        .into_attachment(&uploader, self.clock.now());

        let owner = match note_id {
            Some(note_id) => AttachmentOwner::Note(note_id),
            None => AttachmentOwner::Client(id),
        };
        let saved = self.store.add_attachment(owner, attachment)?;
        self.touch(id)?;
        info!(
            client = id,
            attachment = %saved.id,
            owner = owner.kind(),
            "file attached"
        );
        Ok(attachment_view(&saved))
    }

    /// Reads notes back from the store in insertion order.
    pub fn notes(&self, id: &str) -> Result<Vec<NoteView>, AppError> {
        Ok(self.store.notes_for(id)?.iter().map(note_view).collect())
    }

    pub fn attachments(
        &self,
        id: &str,
        note_id: Option<&str>,
    ) -> Result<Vec<AttachmentView>, AppError> {
        let owner = match note_id {
            Some(note_id) => {
                self.require_note(id, note_id)?;
                AttachmentOwner::Note(note_id)
            }
            None => AttachmentOwner::Client(id),
        };
        Ok(self
            .store
            .attachments_for(owner)?
            .iter()
            .map(attachment_view)
            .collect())
    }

    /// Attributes legacy notes to `author` (default: the session user) at
    /// `at` (default: now).
    pub fn migrate_notes(
        &mut self,
        id: &str,
        author: Option<&str>,
        at: Option<&str>,
    ) -> Result<usize, AppError> {
        let author = match non_empty(author) {
            Some(author) => author,
            None => self.require_session()?.user_id.clone(),
        };
        let at = match at {
            Some(raw) => parse_timestamp(raw).ok_or_else(|| {
                AppError::InvalidArgument(format!("unreadable timestamp '{}'", raw))
            })?,
            None => self.clock.now(),
        };
        self.cached(id)?;
        let migrated = self.store.migrate_legacy_notes(id, &author, at)?;
        self.cache.refresh(&self.store, id)?;
        info!(client = id, migrated, "legacy notes migrated");
        Ok(migrated)
    }

    pub fn import(&mut self, path: &Path) -> Result<ImportSummary, AppError> {
        let backup = read_backup(path)?;
        let summary = import_backup(&self.store, backup, self.clock.now())?;
        self.cache = ClientStore::load(&self.store)?;
        Ok(summary)
    }

    /// Only super admins manage users, except that the very first user may
    /// be created without a session provided it is a super admin.
    pub fn add_user(
        &mut self,
        name: &str,
        email: &str,
        role: &str,
        status: Option<&str>,
    ) -> Result<UserView, AppError> {
        let role = Role::from_str(role)
            .map_err(|err| AppError::InvalidArgument(err.to_string()))?;
        let status = match status {
            Some(raw) => UserStatus::parse(raw).ok_or_else(|| {
                AppError::InvalidArgument(format!(
                    "invalid status '{}': expected active or inactive",
                    raw
                ))
            })?,
            None => UserStatus::Active,
        };

        if self.store.user_count()? == 0 {
            if role != Role::SuperAdmin {
                return Err(AppError::PermissionDenied(
                    "the first user must be a super_admin".to_string(),
                ));
            }
        } else {
            let session = self.require_session()?;
            if !session.can_manage_users() {
                warn!(user = %session.user_id, "user creation denied");
                return Err(AppError::PermissionDenied(
                    "only super_admin users can create users".to_string(),
                ));
            }
        }

        let created = self.store.create_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            role,
            status,
        })?;
        info!(user = %created.id, role = created.role.as_str(), "user created");
        Ok(user_view(&created))
    }

    pub fn list_users(&self) -> Result<Vec<UserView>, AppError> {
        Ok(self.store.list_users()?.iter().map(user_view).collect())
    }

    pub fn list_bdes(&self) -> Result<Vec<UserView>, AppError> {
        Ok(self.store.list_assignable()?.iter().map(user_view).collect())
    }

    fn cached(&self, id: &str) -> Result<&Client, AppError> {
        self.cache
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("client '{}'", id)))
    }

    fn require_note(&self, client_id: &str, note_id: &str) -> Result<(), AppError> {
        let owns_note = self
            .cached(client_id)?
            .notes
            .iter()
            .filter_map(NoteEntry::as_structured)
            .any(|note| note.id == note_id);
        if owns_note {
            Ok(())
        } else {
            Err(AppError::NotFound(format!(
                "note '{}' on client '{}'",
                note_id, client_id
            )))
        }
    }

    fn require_session(&self) -> Result<&SessionContext, AppError> {
        self.session.as_ref().ok_or_else(|| {
            AppError::PermissionDenied("this action needs a signed-in user (--as)".to_string())
        })
    }

    fn require_assignable(&self, user_id: &str) -> Result<(), AppError> {
        let assignable = self.store.list_assignable()?;
        if assignable.iter().any(|user| user.id == user_id) {
            Ok(())
        } else {
            Err(AppError::InvalidArgument(format!(
                "'{}' is not an active user who can own clients",
                user_id
            )))
        }
    }

    /// Stamps `last_interaction` and reloads the cached record with its
    /// notes and attachments.
    fn touch(&mut self, id: &str) -> Result<(), AppError> {
        let patch = ClientPatch {
            last_interaction: Some(self.clock.now()),
            ..ClientPatch::default()
        };
        self.store.update(id, &patch)?;
        self.cache.refresh(&self.store, id)?;
        Ok(())
    }

    fn view(&self, client: &Client) -> ClientView {
        ClientView {
            id: client.id.clone(),
            company_name: client.company_name.clone(),
            contact_person: client.contact_person.clone(),
            email: client.email.clone(),
            phone: client.phone.clone(),
            industry: client.industry.clone(),
            company_size: client.company_size.clone(),
            budget: client.budget.as_ref().map(|budget| budget.amount),
            budget_currency: client.budget.as_ref().map(|budget| budget.currency.clone()),
            requirements: client.requirements.clone(),
            source: client.source.clone(),
            referrer_name: client.referrer_name.clone(),
            assigned_bde: client.assigned_bde.clone(),
            assigned_bde_name: self.store.resolve_assignee(client.assigned_bde.as_deref()),
            stage: client.stage,
            stage_label: client.stage.label(),
            is_dropped: client.is_dropped(),
            drop_reason: client.drop_reason.clone(),
            status: client.status_label(),
            created_at: format_timestamp(client.created_at),
            last_interaction: format_timestamp(client.last_interaction),
            notes: client.notes.iter().map(note_view).collect(),
            attachments: client.attachments.iter().map(attachment_view).collect(),
        }
    }
}

fn note_view(entry: &NoteEntry) -> NoteView {
    match entry {
        NoteEntry::Legacy { text } => NoteView {
            id: None,
            text: text.clone(),
            author: None,
            created_at: None,
            legacy: true,
            attachments: Vec::new(),
        },
        NoteEntry::Structured(note) => NoteView {
            id: Some(note.id.clone()),
            text: note.text.clone(),
            author: Some(note.author.clone()),
            created_at: Some(format_timestamp(note.created_at)),
            legacy: false,
            attachments: note.attachments.iter().map(attachment_view).collect(),
        },
    }
}

fn attachment_view(attachment: &Attachment) -> AttachmentView {
    AttachmentView {
        id: attachment.id.clone(),
        filename: attachment.filename.clone(),
        original_filename: attachment.original_filename.clone(),
        media_type: attachment.media_type.clone(),
        size_bytes: attachment.size_bytes,
        uploaded_by: attachment.uploaded_by.clone(),
        uploaded_at: format_timestamp(attachment.uploaded_at),
    }
}

fn user_view(user: &User) -> UserView {
    UserView {
        id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
        status: user.status,
    }
}

fn parse_stage(raw: &str) -> Result<Stage, AppError> {
    match raw.trim().parse::<i64>() {
        Ok(number) => Ok(Stage::from_number(number).map_err(LifecycleError::from)?),
        Err(_) => Ok(Stage::from_str(raw)?),
    }
}

fn ensure_parent_dir(path: &str) -> Result<(), AppError> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Db(rusqlite::Error),
    Config(ConfigError),
    Json(serde_json::Error),
    Lifecycle(LifecycleError),
    Repository(RepositoryError),
    Query(QueryError),
    Board(BoardError),
    Import(ImportError),
    InvalidArgument(String),
    NotFound(String),
    PermissionDenied(String),
}

impl AppError {
    /// True when the same command may succeed if retried unchanged.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Repository(err) => err.is_recoverable(),
            AppError::Lifecycle(LifecycleError::Repository(err)) => err.is_recoverable(),
            AppError::Db(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::Db(err) => write!(f, "database error: {}", err),
            AppError::Config(err) => write!(f, "{}", err),
            AppError::Json(err) => write!(f, "JSON error: {}", err),
            AppError::Lifecycle(err) => write!(f, "{}", err),
            AppError::Repository(err) => write!(f, "{}", err),
            AppError::Query(err) => write!(f, "{}", err),
            AppError::Board(err) => write!(f, "{}", err),
            AppError::Import(err) => write!(f, "import error: {}", err),
            AppError::InvalidArgument(message) => write!(f, "{}", message),
            AppError::NotFound(what) => write!(f, "{} not found", what),
            AppError::PermissionDenied(message) => write!(f, "permission denied: {}", message),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::Db(err) => Some(err),
            AppError::Config(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::Lifecycle(err) => Some(err),
            AppError::Repository(err) => Some(err),
            AppError::Query(err) => Some(err),
            AppError::Board(err) => Some(err),
            AppError::Import(err) => Some(err),
            AppError::InvalidArgument(_) => None,
            AppError::NotFound(_) => None,
            AppError::PermissionDenied(_) => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Io(value)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        AppError::Db(value)
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::Json(value)
    }
}

impl From<LifecycleError> for AppError {
    fn from(value: LifecycleError) -> Self {
        match value {
            LifecycleError::NotFound(id) => AppError::NotFound(format!("client '{}'", id)),
            other => AppError::Lifecycle(other),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(id) => AppError::NotFound(format!("record '{}'", id)),
            RepositoryError::Unauthorized(message) => AppError::PermissionDenied(message),
            other => AppError::Repository(other),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(value: QueryError) -> Self {
        AppError::Query(value)
    }
}

impl From<BoardError> for AppError {
    fn from(value: BoardError) -> Self {
        match value {
            BoardError::NotFound(id) => AppError::NotFound(format!("client '{}'", id)),
            other => AppError::Board(other),
        }
    }
}

impl From<ImportError> for AppError {
    fn from(value: ImportError) -> Self {
        AppError::Import(value)
    }
}

impl From<ParseStageError> for AppError {
    fn from(value: ParseStageError) -> Self {
        AppError::InvalidArgument(value.to_string())
    }
}

#[cfg(test)]
mod tests;
