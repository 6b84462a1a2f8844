//! The contact form session.
//!
//! [`ContactForm`] is the presentation state: the injected store, the
//! transient copy being edited, the current listing, inline field errors and
//! a queue of notices. Every mutation goes through the store's operations and
//! is followed by a reload of the listing.
//!
//! Failures never leave the form unusable. Validation failures keep the draft
//! and record per-field errors; storage and not-found failures keep the draft
//! and queue an error notice.

use tracing::{debug, warn};

use crate::contact::{Contact, ContactFields, ContactId, ContactPatch};
use crate::error::{Error, Result};
use crate::store::ContactStore;
use crate::validate::{self, ValidationErrors};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// The operation completed.
    Success,
    /// The operation failed.
    Error,
}

/// A transient message about the outcome of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Message text.
    pub message: String,
}

impl Notice {
    /// A success notice.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// An error notice.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Form state over an injected store.
#[derive(Debug)]
pub struct ContactForm<S> {
    store: S,
    draft: ContactFields,
    editing_id: Option<ContactId>,
    errors: ValidationErrors,
    rows: Vec<Contact>,
    notices: Vec<Notice>,
}

impl<S: ContactStore> ContactForm<S> {
    /// Create a form and load the current listing.
    ///
    /// A failed initial load leaves the listing empty and queues a notice.
    pub fn new(store: S) -> Self {
        let mut form = Self {
            store,
            draft: ContactFields::default(),
            editing_id: None,
            errors: ValidationErrors::new(),
            rows: Vec::new(),
            notices: Vec::new(),
        };
        let _ = form.reload();
        form
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The listing as of the last reload, newest first.
    pub fn rows(&self) -> &[Contact] {
        &self.rows
    }

    /// Values currently in the form.
    pub fn draft(&self) -> &ContactFields {
        &self.draft
    }

    /// Identity of the record being edited, if any.
    pub fn editing_id(&self) -> Option<&str> {
        self.editing_id.as_deref()
    }

    /// Inline errors from the last submit.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Replace the values in the form.
    pub fn set_draft(&mut self, fields: ContactFields) {
        self.draft = fields;
    }

    /// Change some of the values in the form, leaving the rest.
    pub fn edit_draft(&mut self, patch: &ContactPatch) {
        self.draft = patch.apply_to(&self.draft);
    }

    /// Queued notices, oldest first.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Remove and return queued notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Reload the listing from the store.
    ///
    /// On failure the previous listing is kept and an error notice queued.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub fn reload(&mut self) -> Result<()> {
        match self.store.list() {
            Ok(rows) => {
                debug!("Loaded {} contacts", rows.len());
                self.rows = rows;
                Ok(())
            }
            Err(e) => Err(self.fail("Could not load contacts", e)),
        }
    }

    /// Load a stored record into the form for editing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the record does not exist, or the store
    /// error. The form is unchanged on failure.
    pub fn begin_edit(&mut self, id: &str) -> Result<()> {
        match self.store.get(id) {
            Ok(Some(contact)) => {
                debug!("Editing contact {id}");
                self.draft = contact.fields;
                self.editing_id = Some(contact.id);
                self.errors = ValidationErrors::new();
                Ok(())
            }
            Ok(None) => Err(self.fail("Could not edit contact", Error::not_found(id))),
            Err(e) => Err(self.fail("Could not edit contact", e)),
        }
    }

    /// Validate the draft and save it.
    ///
    /// Creates a new record, or updates the one being edited. On success the
    /// form is cleared and the listing reloaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] with the per-field messages (also kept in
    /// [`errors`](Self::errors)), or the store error. The draft is kept on
    /// failure.
    pub fn submit(&mut self) -> Result<Contact> {
        let errors = validate::validate(&self.draft);
        if !errors.is_empty() {
            debug!("Submission rejected: {errors}");
            self.errors = errors.clone();
            return Err(Error::Validation(errors));
        }
        self.errors = ValidationErrors::new();

        let saved = match &self.editing_id {
            Some(id) => self
                .store
                .update(id, &ContactPatch::from(self.draft.clone())),
            None => self.store.create(&self.draft),
        };

        match saved {
            Ok(contact) => {
                let verb = if self.editing_id.is_some() {
                    "Updated"
                } else {
                    "Saved"
                };
                self.notices
                    .push(Notice::success(format!("{verb} {}", contact.fields.name)));
                self.reset();
                let _ = self.reload();
                Ok(contact)
            }
            Err(Error::Validation(errors)) => {
                self.errors = errors.clone();
                Err(Error::Validation(errors))
            }
            Err(e) => Err(self.fail("Could not save contact", e)),
        }
    }

    /// Delete a record and reload the listing.
    ///
    /// If the deleted record was being edited, the form is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the record does not exist, or the store
    /// error. Nothing changes on failure.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        if let Err(e) = self.store.delete(id) {
            return Err(self.fail("Could not delete contact", e));
        }

        self.notices.push(Notice::success("Contact deleted"));
        if self.editing_id.as_deref() == Some(id) {
            self.reset();
        }
        let _ = self.reload();
        Ok(())
    }

    /// Clear the draft, the editing target, and inline errors.
    pub fn reset(&mut self) {
        self.draft = ContactFields::default();
        self.editing_id = None;
        self.errors = ValidationErrors::new();
    }

    fn fail(&mut self, what: &str, err: Error) -> Error {
        warn!(error = %err, "{what}");
        self.notices.push(Notice::error(format!("{what}: {err}")));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Field;
    use crate::store::{LocalStore, SqliteStore};

    fn jo() -> ContactFields {
        ContactFields::new("Jo", "2020-01-01", "jo@x.com", "1112223333")
    }

    fn sqlite_form() -> ContactForm<SqliteStore> {
        ContactForm::new(SqliteStore::open_in_memory().unwrap())
    }

    #[test]
    fn test_submit_creates_and_lists() {
        let mut form = sqlite_form();
        form.set_draft(jo());

        let saved = form.submit().unwrap();
        assert_eq!(form.rows(), &[saved.clone()]);
        assert_eq!(form.draft(), &ContactFields::default());
        assert!(form.errors().is_empty());
        assert_eq!(form.take_notices(), vec![Notice::success("Saved Jo")]);
        assert!(form.take_notices().is_empty());
    }

    #[test]
    fn test_invalid_submit_keeps_draft_and_errors() {
        let mut form = sqlite_form();
        let draft = ContactFields {
            mobile: "abc".to_string(),
            ..jo()
        };
        form.set_draft(draft.clone());

        let err = form.submit().unwrap_err();
        assert!(err.is_validation());
        assert_eq!(form.errors().get(Field::Mobile), Some("Must be 10 digits"));
        assert_eq!(form.draft(), &draft);
        assert!(form.rows().is_empty());
        assert!(form.take_notices().is_empty());
    }

    #[test]
    fn test_edit_updates_submitted_fields_only() {
        let mut form = sqlite_form();
        form.set_draft(jo().with_photo("data:image/png;base64,AAAA"));
        let saved = form.submit().unwrap();

        form.begin_edit(&saved.id).unwrap();
        assert_eq!(form.editing_id(), Some(saved.id.as_str()));
        form.edit_draft(&ContactPatch {
            email: Some("jo@work.com".to_string()),
            ..ContactPatch::default()
        });
        let updated = form.submit().unwrap();

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.fields.email, "jo@work.com");
        assert_eq!(updated.fields.name, saved.fields.name);
        assert_eq!(updated.fields.photo, saved.fields.photo);
        assert_eq!(form.rows().len(), 1);
        assert!(form.editing_id().is_none());
    }

    #[test]
    fn test_edit_validates_like_create() {
        let mut form = sqlite_form();
        form.set_draft(jo());
        let saved = form.submit().unwrap();

        form.begin_edit(&saved.id).unwrap();
        form.edit_draft(&ContactPatch {
            name: Some("J".to_string()),
            ..ContactPatch::default()
        });
        assert!(form.submit().unwrap_err().is_validation());
        assert_eq!(form.editing_id(), Some(saved.id.as_str()));
        assert_eq!(form.store().get(&saved.id).unwrap(), Some(saved));
    }

    #[test]
    fn test_begin_edit_missing_queues_notice() {
        let mut form = sqlite_form();
        let err = form.begin_edit("missing").unwrap_err();

        assert!(err.is_not_found());
        assert!(form.editing_id().is_none());
        let notices = form.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("missing"));
    }

    #[test]
    fn test_delete_and_delete_again() {
        let mut form = sqlite_form();
        form.set_draft(jo());
        let saved = form.submit().unwrap();
        form.take_notices();

        form.delete(&saved.id).unwrap();
        assert!(form.rows().is_empty());
        assert!(form.delete(&saved.id).unwrap_err().is_not_found());

        let levels: Vec<_> = form.take_notices().into_iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![NoticeLevel::Success, NoticeLevel::Error]);
    }

    #[test]
    fn test_deleting_edited_record_resets_form() {
        let mut form = sqlite_form();
        form.set_draft(jo());
        let saved = form.submit().unwrap();

        form.begin_edit(&saved.id).unwrap();
        form.delete(&saved.id).unwrap();
        assert!(form.editing_id().is_none());
        assert_eq!(form.draft(), &ContactFields::default());
    }

    #[test]
    fn test_storage_failure_keeps_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("contacts-db.json")).unwrap();
        let mut form = ContactForm::new(store);
        form.set_draft(jo());
        form.submit().unwrap();
        let rows = form.rows().to_vec();

        std::fs::write(form.store().path(), "garbage").unwrap();
        form.set_draft(jo());
        assert!(form.submit().is_err());
        assert!(form.reload().is_err());

        assert_eq!(form.rows(), rows.as_slice());
        assert_eq!(form.draft(), &jo());
        assert!(form
            .take_notices()
            .iter()
            .any(|n| n.level == NoticeLevel::Error));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut form = sqlite_form();
        form.set_draft(ContactFields::default());
        let _ = form.submit();
        assert!(!form.errors().is_empty());

        form.reset();
        assert!(form.errors().is_empty());
        assert!(form.editing_id().is_none());
    }
}
