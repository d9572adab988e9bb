//! Public type definitions for the pastevault engine.
//!
//! This module contains the data model shared across the key store, the
//! recipient resolver, and the envelope engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The source a managed key came from.
///
/// A closed set: callers match on the variant instead of probing shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    /// The user's own keypair (public and private material)
    #[serde(rename = "self")]
    Own,
    /// A friend's plain RSA public key, exchanged out of band
    Friend,
    /// A key fetched from a PGP keyserver or imported as armored PGP
    Pgp,
    /// A Keybase user's published PGP key
    Keybase,
    /// A GitHub user's published key
    Github,
}

impl KeyKind {
    /// Wire name used in envelope metadata and canonical identifiers.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Own => "self",
            KeyKind::Friend => "friend",
            KeyKind::Pgp => "pgp",
            KeyKind::Keybase => "keybase",
            KeyKind::Github => "github",
        }
    }

    /// Whether keys of this kind hold OpenPGP material (as opposed to the
    /// plain RSA PEM used for self/friend keys).
    pub fn is_pgp(&self) -> bool {
        matches!(self, KeyKind::Pgp | KeyKind::Keybase | KeyKind::Github)
    }

    /// Canonical identifier for a key of this kind with the given name.
    pub fn canonical_id(&self, name: &str) -> String {
        match self {
            KeyKind::Own => "self".to_string(),
            _ => format!("{}:{}", self.as_str(), name),
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One managed identity: a key plus its provenance.
///
/// The fingerprint is computed once at creation and never changes; rotating
/// a key means creating a new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    /// Which source this key came from
    pub kind: KeyKind,
    /// Unique human label within its kind (for `Own`, implicit `"self"`)
    pub name: String,
    /// Public key material: PEM for self/friend keys, ASCII armor for the
    /// PGP family
    pub public_material: String,
    /// Private key material; present only for `Own` and imported PGP
    /// private keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_material: Option<String>,
    /// Stable identity hash of the public key
    pub fingerprint: String,
    /// Email taken from key provenance, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Remote username (Keybase/GitHub), if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// Updated on every successful encrypt/decrypt using this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    /// Create a record with a fresh creation timestamp.
    pub fn new(
        kind: KeyKind,
        name: impl Into<String>,
        public_material: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        KeyRecord {
            kind,
            name: name.into(),
            public_material: public_material.into(),
            private_material: None,
            fingerprint: fingerprint.into(),
            email: None,
            username: None,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    /// Canonical identifier (`self`, `friend:alice`, `github:bob`, ...).
    pub fn canonical_id(&self) -> String {
        self.kind.canonical_id(&self.name)
    }

    /// Whether this record can decrypt (has private material).
    pub fn has_private(&self) -> bool {
        self.private_material.is_some()
    }
}

/// Recipient kinds produced by resolution. Mirrors [`KeyKind`] plus groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    /// The user themselves
    Own,
    /// A friend's RSA key
    Friend,
    /// PGP keyserver identity
    Pgp,
    /// Keybase identity
    Keybase,
    /// GitHub identity
    Github,
    /// A named list of recipient specifiers
    Group,
}

impl From<KeyKind> for RecipientKind {
    fn from(kind: KeyKind) -> Self {
        match kind {
            KeyKind::Own => RecipientKind::Own,
            KeyKind::Friend => RecipientKind::Friend,
            KeyKind::Pgp => RecipientKind::Pgp,
            KeyKind::Keybase => RecipientKind::Keybase,
            KeyKind::Github => RecipientKind::Github,
        }
    }
}

/// Output of resolving one recipient specifier.
///
/// Constructed fresh per resolution call, never persisted.
#[derive(Debug, Clone)]
pub struct ResolvedRecipient {
    /// What the specifier resolved to
    pub kind: RecipientKind,
    /// Canonical form, e.g. `github:alice`
    pub identifier: String,
    /// The specifier exactly as the caller supplied it
    pub original_input: String,
    /// The concrete key, absent for groups
    pub key_record: Option<KeyRecord>,
    /// Expanded members, present only for groups
    pub members: Option<Vec<ResolvedRecipient>>,
    /// True when the key was fetched from a remote source during this call
    pub auto_fetched: bool,
}

impl ResolvedRecipient {
    pub(crate) fn from_record(record: KeyRecord, original_input: &str, auto_fetched: bool) -> Self {
        ResolvedRecipient {
            kind: record.kind.into(),
            identifier: record.canonical_id(),
            original_input: original_input.to_string(),
            key_record: Some(record),
            members: None,
            auto_fetched,
        }
    }
}

/// Raw key material returned by an external fetcher, plus best-effort
/// identity metadata.
#[derive(Debug, Clone)]
pub struct FetchedKey {
    /// Raw public key bytes (usually ASCII armor)
    pub material: Vec<u8>,
    /// Username on the remote service, if the fetcher knows it
    pub username: Option<String>,
    /// Email from the key's user IDs, if the fetcher extracted one
    pub email: Option<String>,
}
