//! Single-slot JSON store.
//!
//! The whole collection lives in one file holding a JSON array. Each
//! mutation reads the array, changes it in memory and rewrites the slot
//! through a sibling temp file that is renamed into place, so a failed write
//! leaves the previous slot untouched.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::config::StorageBackend;
use crate::contact::{Contact, ContactFields, ContactPatch};
use crate::error::{Error, Result};
use crate::validate;

use super::ContactStore;

/// File-backed store holding every record in one JSON slot.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    /// Use the slot at `path`, creating parent directories if needed.
    ///
    /// A missing slot reads as an empty collection; it is written on the
    /// first mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Using contact slot at {}", path.display());
        Ok(Self { path })
    }

    /// Get the path to the slot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_slot(&self) -> Result<Vec<Contact>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut contacts: Vec<Contact> =
            serde_json::from_str(&raw).map_err(|source| Error::CorruptSlot {
                path: self.path.clone(),
                source,
            })?;

        // Older slots may hold untrimmed values or an empty photo string
        for contact in &mut contacts {
            contact.fields = contact.fields.normalized();
        }
        Ok(contacts)
    }

    fn write_slot(&self, contacts: &[Contact]) -> Result<()> {
        let json = serde_json::to_vec(contacts)?;
        let tmp = self.temp_path();

        let mut file = fs::File::create(&tmp)?;
        let written = file.write_all(&json).and_then(|()| file.sync_all());
        drop(file);

        if let Err(e) = written.and_then(|()| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        trace!("Wrote {} contacts to {}", contacts.len(), self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn is_undated(contact: &Contact) -> bool {
    contact.created_at == DateTime::<Utc>::default()
}

impl ContactStore for LocalStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Local
    }

    fn list(&self) -> Result<Vec<Contact>> {
        let mut contacts: Vec<_> = self.read_slot()?.into_iter().enumerate().collect();
        contacts.sort_by(|(pos_a, a), (pos_b, b)| {
            b.created_at.cmp(&a.created_at).then_with(|| {
                // Undated records were appended, dated ones are prepended
                if is_undated(a) {
                    pos_b.cmp(pos_a)
                } else {
                    pos_a.cmp(pos_b)
                }
            })
        });
        Ok(contacts.into_iter().map(|(_, c)| c).collect())
    }

    fn get(&self, id: &str) -> Result<Option<Contact>> {
        Ok(self.read_slot()?.into_iter().find(|c| c.id == id))
    }

    fn create(&self, fields: &ContactFields) -> Result<Contact> {
        validate::check(fields)?;

        let mut contacts = self.read_slot()?;
        let contact = Contact::new(fields);
        contacts.insert(0, contact.clone());
        self.write_slot(&contacts)?;

        debug!("Created contact {}", contact.id);
        Ok(contact)
    }

    fn update(&self, id: &str, patch: &ContactPatch) -> Result<Contact> {
        let mut contacts = self.read_slot()?;
        let contact = contacts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::not_found(id))?;

        let merged = patch.apply_to(&contact.fields);
        validate::check(&merged)?;
        contact.fields = merged;
        let updated = contact.clone();

        self.write_slot(&contacts)?;
        debug!("Updated contact {id}");
        Ok(updated)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut contacts = self.read_slot()?;
        let before = contacts.len();
        contacts.retain(|c| c.id != id);
        if contacts.len() == before {
            return Err(Error::not_found(id));
        }

        self.write_slot(&contacts)?;
        debug!("Deleted contact {id}");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{Field, PhotoChange};

    fn jo() -> ContactFields {
        ContactFields::new("Jo", "2020-01-01", "jo@x.com", "1112223333")
    }

    fn create_test_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("contacts-db.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_missing_slot_is_empty() {
        let (_dir, store) = create_test_store();
        assert!(store.list().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_create_and_list() {
        let (_dir, store) = create_test_store();
        let created = store.create(&jo()).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], created);
        assert_eq!(listed[0].fields, jo());
    }

    #[test]
    fn test_list_is_newest_first() {
        let (_dir, store) = create_test_store();
        let first = store.create(&jo()).unwrap();
        let second = store
            .create(&ContactFields::new("Al", "1990-05-05", "al@x.com", "2223334444"))
            .unwrap();

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_create_rejects_invalid() {
        let (_dir, store) = create_test_store();
        let err = store
            .create(&ContactFields {
                mobile: "abc".to_string(),
                ..jo()
            })
            .unwrap_err();

        assert!(err.validation_errors().unwrap().contains(Field::Mobile));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_update_merges_patch() {
        let (_dir, store) = create_test_store();
        let created = store.create(&jo()).unwrap();

        let updated = store
            .update(
                &created.id,
                &ContactPatch {
                    mobile: Some("9998887777".to_string()),
                    photo: PhotoChange::Set("data:image/gif;base64,R0lG".to_string()),
                    ..ContactPatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.fields.name, "Jo");
        assert_eq!(updated.fields.mobile, "9998887777");
        assert!(updated.has_photo());
        assert_eq!(store.get(&created.id).unwrap(), Some(updated));
    }

    #[test]
    fn test_update_invalid_leaves_slot_unchanged() {
        let (_dir, store) = create_test_store();
        let created = store.create(&jo()).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        let err = store
            .update(
                &created.id,
                &ContactPatch {
                    email: Some("a@b".to_string()),
                    ..ContactPatch::default()
                },
            )
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let (_dir, store) = create_test_store();
        let err = store
            .update("missing", &ContactPatch::from(jo()))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_then_delete_again() {
        let (_dir, store) = create_test_store();
        let created = store.create(&jo()).unwrap();

        assert!(store.delete(&created.id).unwrap());
        assert!(store.list().unwrap().is_empty());
        assert!(store.delete(&created.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_corrupt_slot_is_reported_and_kept() {
        let (_dir, store) = create_test_store();
        fs::write(store.path(), "{not json").unwrap();

        let err = store.list().unwrap_err();
        assert!(matches!(err, Error::CorruptSlot { .. }));

        assert!(store.create(&jo()).is_err());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{not json");
    }

    #[test]
    fn test_reads_slot_without_created_at() {
        let (_dir, store) = create_test_store();
        fs::write(
            store.path(),
            r#"[{"id":"legacy","name":"Jo","dob":"2020-01-01","email":"jo@x.com","mobile":"1112223333","photo":""}]"#,
        )
        .unwrap();

        let legacy = store.get("legacy").unwrap().unwrap();
        assert_eq!(legacy.fields.name, "Jo");

        let newer = store.create(&jo()).unwrap();
        let ids: Vec<_> = store.list().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![newer.id, "legacy".to_string()]);
    }

    #[test]
    fn test_empty_photo_in_older_slot_reads_as_absent() {
        let (_dir, store) = create_test_store();
        fs::write(
            store.path(),
            r#"[{"id":"1700000000000","name":" Jo ","dob":"2020-01-01","email":"jo@x.com","mobile":"1112223333","photo":""}]"#,
        )
        .unwrap();

        let contact = store.get("1700000000000").unwrap().unwrap();
        assert!(!contact.has_photo());
        assert_eq!(contact.fields.photo, None);
        assert_eq!(contact.fields.name, "Jo");
        assert!(!store.list().unwrap()[0].has_photo());
    }

    #[test]
    fn test_undated_records_list_newest_first() {
        let (_dir, store) = create_test_store();
        fs::write(
            store.path(),
            r#"[
                {"id":"older","name":"Jo","dob":"2020-01-01","email":"jo@x.com","mobile":"1112223333","photo":""},
                {"id":"newer","name":"Al","dob":"1990-05-05","email":"al@x.com","mobile":"2223334444","photo":""}
            ]"#,
        )
        .unwrap();

        let dated = store.create(&jo()).unwrap();
        let ids: Vec<_> = store.list().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![dated.id, "newer".to_string(), "older".to_string()]);
    }

    #[test]
    fn test_failed_write_leaves_slot_intact() {
        let (_dir, store) = create_test_store();
        store.create(&jo()).unwrap();
        let before = fs::read(store.path()).unwrap();

        // A directory where the temp file goes makes the write fail
        fs::create_dir(store.temp_path()).unwrap();
        let err = store
            .create(&ContactFields::new("Al", "1990-05-05", "al@x.com", "2223334444"))
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(fs::read(store.path()).unwrap(), before);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let (dir, store) = create_test_store();
        store.create(&jo()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["contacts-db.json".to_string()]);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/contacts-db.json");

        let store = LocalStore::open(&nested).unwrap();
        store.create(&jo()).unwrap();
        assert!(nested.exists());
    }
}
