use std::str::FromStr;
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result, Row};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::clock::format_timestamp;
use crate::domain::client::{Budget, Client, ClientPatch, NewClient};
use crate::domain::note::{new_note_id, Attachment, AttachmentOwner, Note, NoteEntry};
use crate::domain::session::{NewUser, Role, User, UserStatus};
use crate::domain::stage::Stage;
use crate::repository::{
    AttachmentService, ClientRepository, NoteService, RepositoryError, UserDirectory,
};

pub const CURRENT_SCHEMA_VERSION: i64 = 2;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        name: "baseline_pipeline_schema_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL,
    status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS clients (
    id TEXT PRIMARY KEY,
    company_name TEXT NOT NULL,
    contact_person TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    industry TEXT,
    company_size TEXT,
    budget_amount REAL,
    budget_currency TEXT,
    requirements TEXT,
    source TEXT,
    referrer_name TEXT,
    assigned_bde TEXT,
    stage INTEGER NOT NULL,
    drop_reason TEXT,
    created_at TEXT NOT NULL,
    last_interaction TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_clients_stage ON clients(stage);
CREATE INDEX IF NOT EXISTS idx_clients_assigned_bde ON clients(assigned_bde);
"#,
    },
    Migration {
        version: 2,
        name: "notes_and_attachments_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS notes (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT UNIQUE,
    client_id TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    author TEXT,
    created_at TEXT
);

CREATE TABLE IF NOT EXISTS attachments (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    owner_kind TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    original_filename TEXT NOT NULL,
    media_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    uploaded_by TEXT NOT NULL,
    uploaded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notes_client_id ON notes(client_id);
CREATE INDEX IF NOT EXISTS idx_attachments_owner ON attachments(owner_kind, owner_id);
"#,
    },
];

pub fn open_connection(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_for_speed(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "foreign_keys", "ON")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.pragma_update(None::<DatabaseName>, "busy_timeout", 5000i64)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![
                migration.version,
                migration.name,
                format_timestamp(OffsetDateTime::now_utc())
            ],
        )?;
    }

    tx.execute(
        r#"
INSERT INTO meta (key, value)
VALUES ('schema_version', ?1)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

const CLIENT_COLUMNS: &str = r#"
id, company_name, contact_person, email, phone, industry, company_size,
budget_amount, budget_currency, requirements, source, referrer_name,
assigned_bde, stage, drop_reason, created_at, last_interaction
"#;

const ATTACHMENT_COLUMNS: &str = r#"
id, filename, original_filename, media_type, size_bytes, uploaded_by, uploaded_at
"#;

/// Local SQLite cache implementing every repository seam.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = open_connection(path)?;
        let version = get_meta(&conn, "schema_version")?;
        debug!(
            path,
            schema_version = version.as_deref().unwrap_or("unknown"),
            "database opened"
        );
        Ok(Self { conn })
    }

    pub fn client_exists(&self, id: &str) -> Result<bool> {
        exists(&self.conn, "SELECT EXISTS(SELECT 1 FROM clients WHERE id = ?1)", id)
    }

    pub fn user_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
    }

    /// Runs `apply` inside one transaction. Any error rolls back every write
    /// `apply` made.
    pub fn with_transaction<T, E>(
        &self,
        apply: impl FnOnce(&Connection) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<RepositoryError>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;
        let value = apply(&*tx)?;
        tx.commit().map_err(RepositoryError::from)?;
        Ok(value)
    }

    /// Inserts a client with its notes and attachments, keeping its id.
    /// Returns false without writing when the id is already present.
    pub fn insert_client(&self, client: &Client) -> std::result::Result<bool, RepositoryError> {
        self.with_transaction(|conn| insert_client(conn, client))
    }

    /// Inserts a user with its existing id. Returns false when the id or
    /// email is already taken.
    pub fn insert_user(&self, user: &User) -> Result<bool> {
        insert_user(&self.conn, user)
    }

    fn load_client(&self, mut client: Client) -> Result<Client> {
        client.notes = self.load_notes(&client.id)?;
        client.attachments = load_attachments(&self.conn, AttachmentOwner::Client(&client.id))?;
        Ok(client)
    }

    fn load_notes(&self, client_id: &str) -> Result<Vec<NoteEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT id, text, author, created_at
FROM notes
WHERE client_id = ?1
ORDER BY seq ASC
"#,
        )?;
        let mut rows = stmt.query(params![client_id])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let id: Option<String> = row.get(0)?;
            let text: String = row.get(1)?;
            let author: Option<String> = row.get(2)?;
            let created_at = match row.get::<_, Option<String>>(3)? {
                Some(raw) => Some(parse_column_timestamp(3, &raw)?),
                None => None,
            };
            let entry = match (id, author, created_at) {
                (Some(id), Some(author), Some(created_at)) => {
                    let attachments = load_attachments(&self.conn, AttachmentOwner::Note(&id))?;
                    NoteEntry::Structured(Note {
                        id,
                        text,
                        author,
                        created_at,
                        attachments,
                    })
                }
                _ => NoteEntry::Legacy { text },
            };
            result.push(entry);
        }
        Ok(result)
    }

    fn owner_exists(&self, owner: AttachmentOwner<'_>) -> Result<bool> {
        match owner {
            AttachmentOwner::Client(id) => self.client_exists(id),
            AttachmentOwner::Note(id) => exists(
                &self.conn,
                "SELECT EXISTS(SELECT 1 FROM notes WHERE id = ?1)",
                id,
            ),
        }
    }
}

impl ClientRepository for SqliteStore {
    fn list(&self) -> std::result::Result<Vec<Client>, RepositoryError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY rowid ASC"
        ))?;
        let mut rows = stmt.query([])?;
        let mut bare = Vec::new();
        while let Some(row) = rows.next()? {
            bare.push(client_from_row(row)?);
        }

        let mut result = Vec::with_capacity(bare.len());
        for client in bare {
            result.push(self.load_client(client)?);
        }
        Ok(result)
    }

    fn get(&self, id: &str) -> std::result::Result<Client, RepositoryError> {
        let client = self
            .conn
            .query_row(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"),
                params![id],
                client_from_row,
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        Ok(self.load_client(client)?)
    }

    fn update(
        &self,
        id: &str,
        patch: &ClientPatch,
    ) -> std::result::Result<Client, RepositoryError> {
        let mut client = self.get(id)?;
        patch.apply_to(&mut client);
        if patch.company_name.is_some() || patch.contact_person.is_some() {
            validate_required(&client.company_name, &client.contact_person)?;
        }
        write_client(&self.conn, &client, WriteMode::Update)?;
        Ok(client)
    }

    fn create(
        &self,
        fields: NewClient,
        at: OffsetDateTime,
    ) -> std::result::Result<Client, RepositoryError> {
        let client = fields.into_client(format!("C-{}", Uuid::now_v7()), at);
        validate_required(&client.company_name, &client.contact_person)?;
        write_client(&self.conn, &client, WriteMode::Insert)?;
        Ok(client)
    }
}

impl UserDirectory for SqliteStore {
    fn get_user(&self, id: &str) -> std::result::Result<Option<User>, RepositoryError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, email, role, status FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()?)
    }

    fn list_users(&self) -> std::result::Result<Vec<User>, RepositoryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, email, role, status FROM users ORDER BY name ASC, id ASC")?;
        let mut rows = stmt.query([])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(user_from_row(row)?);
        }
        Ok(result)
    }

    fn create_user(&self, user: NewUser) -> std::result::Result<User, RepositoryError> {
        let name = user.name.trim();
        let email = user.email.trim().to_ascii_lowercase();
        if name.is_empty() || email.is_empty() {
            return Err(RepositoryError::Validation(
                "user name and email are required".to_string(),
            ));
        }
        let created = User {
            id: format!("U-{}", Uuid::now_v7()),
            name: name.to_string(),
            email,
            role: user.role,
            status: user.status,
        };
        if !self.insert_user(&created)? {
            return Err(RepositoryError::Validation(format!(
                "email '{}' is already registered",
                created.email
            )));
        }
        Ok(created)
    }
}

impl NoteService for SqliteStore {
    fn add_note(&self, client_id: &str, note: Note) -> std::result::Result<Note, RepositoryError> {
        if !self.client_exists(client_id)? {
            return Err(RepositoryError::NotFound(client_id.to_string()));
        }
        if note.text.trim().is_empty() {
            return Err(RepositoryError::Validation(
                "note text cannot be empty".to_string(),
            ));
        }
        let tx = self.conn.unchecked_transaction()?;
        insert_note(&tx, client_id, &note)?;
        tx.commit()?;
        Ok(note)
    }

    fn notes_for(&self, client_id: &str) -> std::result::Result<Vec<NoteEntry>, RepositoryError> {
        if !self.client_exists(client_id)? {
            return Err(RepositoryError::NotFound(client_id.to_string()));
        }
        Ok(self.load_notes(client_id)?)
    }

    fn migrate_legacy_notes(
        &self,
        client_id: &str,
        author: &str,
        at: OffsetDateTime,
    ) -> std::result::Result<usize, RepositoryError> {
        if !self.client_exists(client_id)? {
            return Err(RepositoryError::NotFound(client_id.to_string()));
        }
        let tx = self.conn.unchecked_transaction()?;
        let legacy: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT seq FROM notes WHERE client_id = ?1 AND id IS NULL ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![client_id], |row| row.get(0))?;
            let seqs = rows.collect::<Result<Vec<i64>>>()?;
            seqs
        };
        let stamp = format_timestamp(at);
        for seq in &legacy {
            tx.execute(
                "UPDATE notes SET id = ?1, author = ?2, created_at = ?3 WHERE seq = ?4",
                params![new_note_id(), author, stamp, seq],
            )?;
        }
        tx.commit()?;
        Ok(legacy.len())
    }
}

impl AttachmentService for SqliteStore {
    fn add_attachment(
        &self,
        owner: AttachmentOwner<'_>,
        attachment: Attachment,
    ) -> std::result::Result<Attachment, RepositoryError> {
        if !self.owner_exists(owner)? {
            return Err(RepositoryError::NotFound(owner.id().to_string()));
        }
        insert_attachment(&self.conn, owner, &attachment)?;
        Ok(attachment)
    }

    fn attachments_for(
        &self,
        owner: AttachmentOwner<'_>,
    ) -> std::result::Result<Vec<Attachment>, RepositoryError> {
        if !self.owner_exists(owner)? {
            return Err(RepositoryError::NotFound(owner.id().to_string()));
        }
        Ok(load_attachments(&self.conn, owner)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Insert,
    Update,
}

pub fn insert_client(conn: &Connection, client: &Client) -> std::result::Result<bool, RepositoryError> {
    if exists(conn, "SELECT EXISTS(SELECT 1 FROM clients WHERE id = ?1)", &client.id)? {
        return Ok(false);
    }
    write_client(conn, client, WriteMode::Insert)?;
    for entry in &client.notes {
        match entry {
            NoteEntry::Legacy { text } => {
                conn.execute(
                    "INSERT INTO notes (id, client_id, text) VALUES (NULL, ?1, ?2)",
                    params![client.id, text],
                )?;
            }
            NoteEntry::Structured(note) => insert_note(conn, &client.id, note)?,
        }
    }
    for attachment in &client.attachments {
        insert_attachment(conn, AttachmentOwner::Client(&client.id), attachment)?;
    }
    Ok(true)
}

pub fn insert_user(conn: &Connection, user: &User) -> Result<bool> {
    let changed = conn.execute(
        r#"
INSERT OR IGNORE INTO users (id, name, email, role, status)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
        params![
            user.id,
            user.name,
            user.email,
            user.role.as_str(),
            user.status.as_str()
        ],
    )?;
    Ok(changed > 0)
}

fn write_client(conn: &Connection, client: &Client, mode: WriteMode) -> Result<()> {
    let sql = match mode {
        WriteMode::Insert => {
            r#"
INSERT INTO clients (
    id, company_name, contact_person, email, phone, industry, company_size,
    budget_amount, budget_currency, requirements, source, referrer_name,
    assigned_bde, stage, drop_reason, created_at, last_interaction
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
"#
        }
        WriteMode::Update => {
            r#"
UPDATE clients SET
    company_name = ?2,
    contact_person = ?3,
    email = ?4,
    phone = ?5,
    industry = ?6,
    company_size = ?7,
    budget_amount = ?8,
    budget_currency = ?9,
    requirements = ?10,
    source = ?11,
    referrer_name = ?12,
    assigned_bde = ?13,
    stage = ?14,
    drop_reason = ?15,
    created_at = ?16,
    last_interaction = ?17
WHERE id = ?1
"#
        }
    };
    conn.execute(
        sql,
        params![
            client.id,
            client.company_name,
            client.contact_person,
            client.email,
            client.phone,
            client.industry,
            client.company_size,
            client.budget.as_ref().map(|budget| budget.amount),
            client.budget.as_ref().map(|budget| budget.currency.as_str()),
            client.requirements,
            client.source,
            client.referrer_name,
            client.assigned_bde,
            client.stage.number(),
            client.drop_reason,
            format_timestamp(client.created_at),
            format_timestamp(client.last_interaction)
        ],
    )?;
    Ok(())
}

fn insert_note(conn: &Connection, client_id: &str, note: &Note) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO notes (id, client_id, text, author, created_at)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
        params![
            note.id,
            client_id,
            note.text,
            note.author,
            format_timestamp(note.created_at)
        ],
    )?;
    for attachment in &note.attachments {
        insert_attachment(conn, AttachmentOwner::Note(&note.id), attachment)?;
    }
    Ok(())
}

fn insert_attachment(
    conn: &Connection,
    owner: AttachmentOwner<'_>,
    attachment: &Attachment,
) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO attachments (
    id, owner_kind, owner_id, filename, original_filename, media_type,
    size_bytes, uploaded_by, uploaded_at
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
"#,
        params![
            attachment.id,
            owner.kind(),
            owner.id(),
            attachment.filename,
            attachment.original_filename,
            attachment.media_type,
            i64::try_from(attachment.size_bytes).unwrap_or(i64::MAX),
            attachment.uploaded_by,
            format_timestamp(attachment.uploaded_at)
        ],
    )?;
    Ok(())
}

fn load_attachments(conn: &Connection, owner: AttachmentOwner<'_>) -> Result<Vec<Attachment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ATTACHMENT_COLUMNS} FROM attachments \
         WHERE owner_kind = ?1 AND owner_id = ?2 ORDER BY seq ASC"
    ))?;
    let mut rows = stmt.query(params![owner.kind(), owner.id()])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let size: i64 = row.get(4)?;
        result.push(Attachment {
            id: row.get(0)?,
            filename: row.get(1)?,
            original_filename: row.get(2)?,
            media_type: row.get(3)?,
            size_bytes: u64::try_from(size).unwrap_or_default(),
            uploaded_by: row.get(5)?,
            uploaded_at: parse_column_timestamp(6, &row.get::<_, String>(6)?)?,
        });
    }
    Ok(result)
}

fn client_from_row(row: &Row<'_>) -> Result<Client> {
    let amount: Option<f64> = row.get(7)?;
    let currency: Option<String> = row.get(8)?;
    let stage_number: i64 = row.get(13)?;
    let stage = Stage::from_number(stage_number)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(13, Type::Integer, Box::new(err)))?;
    Ok(Client {
        id: row.get(0)?,
        company_name: row.get(1)?,
        contact_person: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        industry: row.get(5)?,
        company_size: row.get(6)?,
        budget: amount.map(|amount| Budget::new(amount, currency.as_deref())),
        requirements: row.get(9)?,
        source: row.get(10)?,
        referrer_name: row.get(11)?,
        assigned_bde: row.get(12)?,
        stage,
        drop_reason: row.get(14)?,
        created_at: parse_column_timestamp(15, &row.get::<_, String>(15)?)?,
        last_interaction: parse_column_timestamp(16, &row.get::<_, String>(16)?)?,
        notes: Vec::new(),
        attachments: Vec::new(),
    })
}

fn user_from_row(row: &Row<'_>) -> Result<User> {
    let role_raw: String = row.get(3)?;
    let role = Role::from_str(&role_raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err)))?;
    let status_raw: String = row.get(4)?;
    let status = UserStatus::parse(&status_raw)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(4, "status".to_string(), Type::Text))?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role,
        status,
    })
}

fn parse_column_timestamp(index: usize, raw: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

fn exists(conn: &Connection, sql: &str, id: &str) -> Result<bool> {
    let found: i64 = conn.query_row(sql, params![id], |row| row.get(0))?;
    Ok(found == 1)
}

fn validate_required(
    company_name: &str,
    contact_person: &str,
) -> std::result::Result<(), RepositoryError> {
    if company_name.trim().is_empty() {
        return Err(RepositoryError::Validation(
            "company name is required".to_string(),
        ));
    }
    if contact_person.trim().is_empty() {
        return Err(RepositoryError::Validation(
            "contact person is required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
