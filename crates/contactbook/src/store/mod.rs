//! Storage layer for contactbook.
//!
//! Every backend implements [`ContactStore`], so the form never knows which
//! persistence it talks to. Two backends exist:
//! - [`LocalStore`]: one JSON slot file, read and rewritten in full
//! - [`SqliteStore`]: a `contacts` table with a change-event channel
//!
//! All stores validate before writing, so a record that fails validation is
//! never persisted no matter who calls them.

mod local;
pub mod schema;
mod sqlite;

use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::contact::{Contact, ContactFields, ContactPatch};
use crate::error::Result;
use crate::notify::ChangeFeed;

pub use local::LocalStore;
pub use sqlite::SqliteStore;

/// Persistence for contact records.
pub trait ContactStore: std::fmt::Debug {
    /// Which backend this is.
    fn backend(&self) -> StorageBackend;

    /// All records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn list(&self) -> Result<Vec<Contact>>;

    /// A single record by identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, id: &str) -> Result<Option<Contact>>;

    /// Validate and persist a new record with a fresh identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`](crate::Error::Validation) for bad fields,
    /// or a storage error if the write fails.
    fn create(&self, fields: &ContactFields) -> Result<Contact>;

    /// Merge a patch into an existing record and persist it.
    ///
    /// Identity and creation time are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if no record has
    /// this identity, [`Error::Validation`](crate::Error::Validation) if the
    /// merged record is invalid, or a storage error.
    fn update(&self, id: &str, patch: &ContactPatch) -> Result<Contact>;

    /// Remove a record.
    ///
    /// Returns `true` once the record is gone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if no record has
    /// this identity, or a storage error.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Source of change events, for backends that publish them.
    fn change_feed(&self) -> Option<&dyn ChangeFeed> {
        None
    }
}

impl<S: ContactStore + ?Sized> ContactStore for Box<S> {
    fn backend(&self) -> StorageBackend {
        (**self).backend()
    }

    fn list(&self) -> Result<Vec<Contact>> {
        (**self).list()
    }

    fn get(&self, id: &str) -> Result<Option<Contact>> {
        (**self).get(id)
    }

    fn create(&self, fields: &ContactFields) -> Result<Contact> {
        (**self).create(fields)
    }

    fn update(&self, id: &str, patch: &ContactPatch) -> Result<Contact> {
        (**self).update(id, patch)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        (**self).delete(id)
    }

    fn change_feed(&self) -> Option<&dyn ChangeFeed> {
        (**self).change_feed()
    }
}

/// Open the store selected by configuration.
///
/// # Errors
///
/// Returns an error if the backing storage cannot be opened.
pub fn open(config: &Config) -> Result<Box<dyn ContactStore>> {
    let store: Box<dyn ContactStore> = match config.storage.backend {
        StorageBackend::Local => Box::new(LocalStore::open(config.local_path())?),
        StorageBackend::Sqlite => Box::new(SqliteStore::open(
            config.database_path(),
            config.notify.channel_capacity,
        )?),
    };
    info!("Using {} contact store", store.backend());
    Ok(store)
}
