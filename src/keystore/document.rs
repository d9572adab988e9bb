//! On-disk document shape for the key database.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{KeyKind, KeyRecord};

/// The aggregate root persisted as a single JSON document.
///
/// One optional self record, three name-keyed collections (Keybase and
/// GitHub keys share one namespace), named groups, and two pointers. A
/// missing or empty document deserializes to the default (no keys yet).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDatabase {
    /// The user's own keypair, at most one
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub own: Option<KeyRecord>,
    /// Friend keys, keyed by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub friends: BTreeMap<String, KeyRecord>,
    /// PGP keyserver keys, keyed by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pgp: BTreeMap<String, KeyRecord>,
    /// Keybase and GitHub keys, one shared namespace keyed by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub remote: BTreeMap<String, KeyRecord>,
    /// Named lists of recipient specifiers (not key material)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, Vec<String>>,
    /// Name of the friend used when no recipient is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_friend: Option<String>,
    /// Canonical identifier of the most recently used record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<String>,
}

impl KeyDatabase {
    /// The collection a record of this kind lives in, for non-self kinds.
    pub(crate) fn collection_mut(&mut self, kind: KeyKind) -> &mut BTreeMap<String, KeyRecord> {
        match kind {
            KeyKind::Friend => &mut self.friends,
            KeyKind::Pgp => &mut self.pgp,
            KeyKind::Keybase | KeyKind::Github => &mut self.remote,
            KeyKind::Own => unreachable!("self record is not collection-keyed"),
        }
    }

    pub(crate) fn collection(&self, kind: KeyKind) -> &BTreeMap<String, KeyRecord> {
        match kind {
            KeyKind::Friend => &self.friends,
            KeyKind::Pgp => &self.pgp,
            KeyKind::Keybase | KeyKind::Github => &self.remote,
            KeyKind::Own => unreachable!("self record is not collection-keyed"),
        }
    }

    /// Total number of stored records.
    pub fn count(&self) -> usize {
        self.own.iter().count() + self.friends.len() + self.pgp.len() + self.remote.len()
    }

    /// Iterate all records: self first, then friends, PGP, remote.
    pub fn iter(&self) -> impl Iterator<Item = &KeyRecord> {
        self.own
            .iter()
            .chain(self.friends.values())
            .chain(self.pgp.values())
            .chain(self.remote.values())
    }
}
