//! `contactbook` - validated contact records over pluggable storage.
//!
//! Records are checked by the [`validate`] rules before any write, kept by a
//! [`ContactStore`] (a local JSON slot or an `SQLite` table), and edited
//! through a [`ContactForm`] session. The `SQLite` backend publishes change
//! events that a [`notify::ChangeNotifier`] turns into listing refreshes.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod contact;
pub mod error;
pub mod form;
pub mod logging;
pub mod notify;
pub mod photo;
pub mod render;
pub mod store;
pub mod validate;

pub use config::{Config, StorageBackend};
pub use contact::{Contact, ContactFields, ContactId, ContactPatch, Field, PhotoChange};
pub use error::{Error, Result};
pub use form::{ContactForm, Notice, NoticeLevel};
pub use logging::init_logging;
pub use store::{ContactStore, LocalStore, SqliteStore};
pub use validate::{validate, ValidationErrors};
