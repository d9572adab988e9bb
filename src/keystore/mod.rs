//! Document-backed key storage.
//!
//! The key database is one JSON document holding every managed identity:
//! the user's own keypair, friend keys, PGP keyserver keys, and the shared
//! Keybase/GitHub namespace, plus named recipient groups and the
//! `default_friend`/`last_used` pointers.
//!
//! The document is loaded once per process, owned exclusively for the
//! duration of a command, and replaced atomically on every mutation.
//!
//! # Basic Usage
//!
//! ```no_run
//! use pastevault::{KeyKind, KeyRecord, KeyStore};
//!
//! let mut store = KeyStore::open_default().unwrap();
//!
//! // Add a friend's RSA public key
//! let pem = std::fs::read_to_string("alice.pem").unwrap();
//! let fingerprint = pastevault::rsa_fingerprint(&pem).unwrap();
//! store
//!     .upsert(KeyRecord::new(KeyKind::Friend, "alice", pem, fingerprint))
//!     .unwrap();
//!
//! // Look it up by name, email, or canonical identifier
//! let record = store.find_any("friend:alice").unwrap();
//! println!("{} -> {}", record.name, record.fingerprint);
//! ```

mod document;
mod store;

pub use document::KeyDatabase;
pub use store::{default_document_path, KeyStore};
