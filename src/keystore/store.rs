//! KeyStore implementation.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{Error, Result};
use crate::types::{KeyKind, KeyRecord};

use super::document::KeyDatabase;

/// Document-backed key storage.
///
/// The `KeyStore` owns the [`KeyDatabase`] for the lifetime of a command:
/// loaded once from a single JSON document, mutated in memory, and written
/// back atomically on change. No cross-process lock is taken; concurrent
/// invocations racing a save is a documented last-writer-wins limitation.
///
/// # Lookup priority
///
/// [`KeyStore::find_any`] searches self, then friends, then PGP, then the
/// Keybase/GitHub namespace, matching on name, email, or canonical
/// identifier.
pub struct KeyStore {
    db: KeyDatabase,
    path: PathBuf,
}

impl KeyStore {
    /// Open the keystore at the given document path.
    ///
    /// A missing or empty document is treated as "no keys yet" — first runs
    /// never fail. Parent directories are created on the first save.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pastevault::KeyStore;
    ///
    /// let store = KeyStore::open("/home/user/.local/share/pastevault/keys.json").unwrap();
    /// println!("Keys in store: {}", store.database().count());
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => KeyDatabase::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => KeyDatabase::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { db, path })
    }

    /// Open the keystore at the default per-user location.
    pub fn open_default() -> Result<Self> {
        Self::open(default_document_path()?)
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read access to the in-memory database.
    pub fn database(&self) -> &KeyDatabase {
        &self.db
    }

    /// Persist the database, fully replacing the on-disk document.
    ///
    /// The document is written to a sibling temporary file and renamed into
    /// place so a crash mid-write never leaves a torn document behind.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&self.db)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Find a record by name, email, or canonical identifier.
    ///
    /// Searches self, friends, PGP, then Keybase/GitHub, in that order.
    /// Returns `None` when nothing matches; lookup itself never fails.
    pub fn find_any(&self, identifier: &str) -> Option<&KeyRecord> {
        if let Some(own) = &self.db.own {
            if record_matches(own, identifier) || identifier == "self" {
                return Some(own);
            }
        }

        for collection in [&self.db.friends, &self.db.pgp, &self.db.remote] {
            if let Some(record) = collection.get(identifier) {
                return Some(record);
            }
            if let Some(record) = collection.values().find(|r| record_matches(r, identifier)) {
                return Some(record);
            }
        }

        None
    }

    /// Find a record by exact kind and name.
    ///
    /// Keybase and GitHub share one namespace; the stored record's kind
    /// must still match the one asked for.
    pub fn find_by_kind(&self, kind: KeyKind, name: &str) -> Option<&KeyRecord> {
        match kind {
            KeyKind::Own => self.db.own.as_ref(),
            kind => self
                .db
                .collection(kind)
                .get(name)
                .filter(|record| record.kind == kind),
        }
    }

    /// Find a PGP record by name or email.
    ///
    /// Searches the PGP collection only, so a self or friend record that
    /// shares the email cannot shadow an imported PGP key.
    pub fn find_pgp(&self, identifier: &str) -> Option<&KeyRecord> {
        self.db
            .pgp
            .get(identifier)
            .or_else(|| {
                self.db
                    .pgp
                    .values()
                    .find(|r| r.email.as_deref() == Some(identifier))
            })
    }

    /// Find a record whose fingerprint matches exactly.
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Option<&KeyRecord> {
        self.db.iter().find(|r| r.fingerprint == fingerprint)
    }

    /// Insert or replace a record, then persist.
    ///
    /// The self record replaces any existing one (at most one exists);
    /// other kinds are keyed by name within their collection.
    pub fn upsert(&mut self, record: KeyRecord) -> Result<()> {
        match record.kind {
            KeyKind::Own => self.db.own = Some(record),
            kind => {
                self.db
                    .collection_mut(kind)
                    .insert(record.name.clone(), record);
            }
        }
        self.save()
    }

    /// Remove a record by kind and name.
    ///
    /// Returns `false` when nothing was removed; a missing name is not an
    /// error. Dangling `default_friend`/`last_used` pointers are cleared.
    pub fn remove(&mut self, kind: KeyKind, name: &str) -> Result<bool> {
        let removed = match kind {
            KeyKind::Own => self.db.own.take().is_some(),
            kind => self.db.collection_mut(kind).remove(name).is_some(),
        };
        if removed {
            let id = kind.canonical_id(name);
            if self.db.last_used.as_deref() == Some(id.as_str()) {
                self.db.last_used = None;
            }
            if kind == KeyKind::Friend && self.db.default_friend.as_deref() == Some(name) {
                self.db.default_friend = None;
            }
            self.save()?;
        }
        Ok(removed)
    }

    /// Record a successful encrypt/decrypt against this record: bumps
    /// `last_used_at`, moves the `last_used` pointer, and persists.
    pub fn touch(&mut self, kind: KeyKind, name: &str) -> Result<()> {
        let now = Utc::now();
        let id = kind.canonical_id(name);
        match kind {
            KeyKind::Own => {
                if let Some(own) = &mut self.db.own {
                    own.last_used_at = Some(now);
                }
            }
            kind => {
                if let Some(record) = self.db.collection_mut(kind).get_mut(name) {
                    record.last_used_at = Some(now);
                }
            }
        }
        self.db.last_used = Some(id);
        self.save()
    }

    /// The user's own record, if an identity has been generated.
    pub fn own(&self) -> Option<&KeyRecord> {
        self.db.own.as_ref()
    }

    /// The default friend record, if the pointer is set and still valid.
    pub fn default_friend(&self) -> Option<&KeyRecord> {
        let name = self.db.default_friend.as_deref()?;
        self.db.friends.get(name)
    }

    /// Point `default_friend` at an existing friend.
    pub fn set_default_friend(&mut self, name: &str) -> Result<()> {
        if !self.db.friends.contains_key(name) {
            return Err(Error::not_found(
                format!("friend:{name}"),
                "Add the friend first with `key add-friend`.",
            ));
        }
        self.db.default_friend = Some(name.to_string());
        self.save()
    }

    /// Members of a named group, if it exists.
    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.db.groups.get(name).map(Vec::as_slice)
    }

    /// Create or replace a group. An empty member list is rejected.
    pub fn set_group(&mut self, name: &str, members: Vec<String>) -> Result<()> {
        if members.is_empty() {
            return Err(Error::Validation(format!(
                "group '{name}' must have at least one member"
            )));
        }
        self.db.groups.insert(name.to_string(), members);
        self.save()
    }

    /// Remove a group. Returns `false` when no such group existed.
    pub fn remove_group(&mut self, name: &str) -> Result<bool> {
        let removed = self.db.groups.remove(name).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }
}

/// Default location of the key database document.
pub fn default_document_path() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| Error::Validation("could not determine a data directory".to_string()))?;
    Ok(base.join("pastevault").join("keys.json"))
}

fn record_matches(record: &KeyRecord, identifier: &str) -> bool {
    record.name == identifier
        || record.email.as_deref() == Some(identifier)
        || record.canonical_id() == identifier
}
