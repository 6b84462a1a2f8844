//! `SQLite`-backed contact table.
//!
//! This is the relational backend: a `contacts` table ordered by creation
//! time, with every successful mutation published on a broadcast channel so
//! a [`ChangeNotifier`](crate::notify::ChangeNotifier) can refresh views.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::config::StorageBackend;
use crate::contact::{Contact, ContactFields, ContactPatch};
use crate::error::{Error, Result};
use crate::notify::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::validate;

use super::schema;
use super::ContactStore;

/// Default capacity of the change-event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

const CONTACT_SELECT_SQL: &str =
    "SELECT id, name, dob, email, mobile, photo, created_at FROM contacts";

/// Relational contact store.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
    /// Publishes committed mutations.
    events: broadcast::Sender<ChangeEvent>,
}

impl SqliteStore {
    /// Open or create a contact database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be initialized.
    pub fn open(path: impl AsRef<Path>, channel_capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets a watcher read while this connection writes.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::initialize(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self::with_connection(path, conn, channel_capacity))
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        schema::initialize(&conn)?;
        Ok(Self::with_connection(path, conn, DEFAULT_CHANNEL_CAPACITY))
    }

    fn with_connection(path: PathBuf, conn: Connection, channel_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(channel_capacity.max(1));
        Self { path, conn, events }
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count stored contacts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM contacts", [], |row| row.get(0))?;
        Ok(count)
    }

    fn publish(&self, kind: ChangeKind, id: &str) {
        // No subscribers is not an error.
        let receivers = self
            .events
            .send(ChangeEvent::new(kind, id))
            .unwrap_or_default();
        trace!("Published {kind} for {id} to {receivers} subscribers");
    }

    fn select_one(conn: &Connection, id: &str) -> Result<Option<Contact>> {
        let contact = conn
            .query_row(
                &format!("{CONTACT_SELECT_SQL} WHERE id = ?1"),
                [id],
                Self::row_to_contact,
            )
            .optional()?;
        Ok(contact)
    }

    /// Convert a database row to a Contact.
    fn row_to_contact(row: &rusqlite::Row) -> rusqlite::Result<Contact> {
        let created_at: String = row.get(6)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(Contact {
            id: row.get(0)?,
            fields: ContactFields {
                name: row.get(1)?,
                dob: row.get(2)?,
                email: row.get(3)?,
                mobile: row.get(4)?,
                photo: row.get(5)?,
            },
            created_at,
        })
    }
}

impl ContactStore for SqliteStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Sqlite
    }

    fn list(&self) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CONTACT_SELECT_SQL} ORDER BY created_at DESC, rowid DESC"
        ))?;
        let contacts = stmt
            .query_map([], Self::row_to_contact)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    fn get(&self, id: &str) -> Result<Option<Contact>> {
        Self::select_one(&self.conn, id)
    }

    fn create(&self, fields: &ContactFields) -> Result<Contact> {
        validate::check(fields)?;

        let contact = Contact::new(fields);
        self.conn.execute(
            r"
            INSERT INTO contacts (id, name, dob, email, mobile, photo, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                contact.id,
                contact.fields.name,
                contact.fields.dob,
                contact.fields.email,
                contact.fields.mobile,
                contact.fields.photo,
                contact
                    .created_at
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;

        debug!("Inserted contact {}", contact.id);
        self.publish(ChangeKind::Insert, &contact.id);
        Ok(contact)
    }

    fn update(&self, id: &str, patch: &ContactPatch) -> Result<Contact> {
        let tx = self.conn.unchecked_transaction()?;

        let mut contact = Self::select_one(&tx, id)?.ok_or_else(|| Error::not_found(id))?;
        let merged = patch.apply_to(&contact.fields);
        validate::check(&merged)?;

        let affected = tx.execute(
            r"
            UPDATE contacts SET name = ?1, dob = ?2, email = ?3, mobile = ?4, photo = ?5
            WHERE id = ?6
            ",
            params![
                merged.name,
                merged.dob,
                merged.email,
                merged.mobile,
                merged.photo,
                id
            ],
        )?;
        if affected == 0 {
            return Err(Error::not_found(id));
        }
        tx.commit()?;

        contact.fields = merged;
        debug!("Updated contact {id}");
        self.publish(ChangeKind::Update, id);
        Ok(contact)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM contacts WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(Error::not_found(id));
        }

        debug!("Deleted contact {id}");
        self.publish(ChangeKind::Delete, id);
        Ok(true)
    }

    fn change_feed(&self) -> Option<&dyn ChangeFeed> {
        Some(self)
    }
}

impl ChangeFeed for SqliteStore {
    fn subscribe(&self) -> Result<broadcast::Receiver<ChangeEvent>> {
        Ok(self.events.subscribe())
    }
}
