//! # pastevault
//!
//! Key management and encryption engine for end-to-end encrypted paste
//! sharing. A paste is encrypted locally, handed to a dumb blob store as
//! opaque bytes, and decrypted by its recipient — no server ever sees
//! plaintext or keys.
//!
//! The engine covers:
//!
//! - **Key store**: one JSON document holding the user's own RSA keypair,
//!   friend keys, and PGP/Keybase/GitHub keys, replaced atomically on
//!   every change
//! - **Recipient resolution**: free-form specifiers (`alice`, `gh:bob`,
//!   `user@example.com`, `0xABCD1234`, group names) resolved to concrete
//!   keys, with auto-fetch from GitHub/Keybase
//! - **Versioned envelopes**: hybrid RSA-OAEP + AES-256-GCM (v1/v2) and
//!   OpenPGP (v3) wire formats, dispatched by an explicit version tag
//! - **Keyring interop**: native OpenPGP via [rpgp](https://docs.rs/pgp),
//!   with a timeout-guarded gpg subprocess as decryption fallback
//! - **Diagnostics**: store consistency and keyring health reporting
//!
//! ## Quick Start
//!
//! ```no_run
//! use pastevault::{create_identity, Engine, KeyKind, KeyRecord, KeyStore, Resolver};
//!
//! let mut store = KeyStore::open_default().unwrap();
//!
//! // First run: generate your own keypair
//! create_identity(&mut store, 2048).unwrap();
//!
//! // Add a friend's public key
//! let pem = std::fs::read_to_string("alice.pem").unwrap();
//! let fp = pastevault::rsa_fingerprint(&pem).unwrap();
//! store
//!     .upsert(KeyRecord::new(KeyKind::Friend, "alice", pem, fp))
//!     .unwrap();
//!
//! // Encrypt a paste for alice
//! let recipient = Resolver::new(&mut store).resolve("alice").unwrap();
//! let envelope = Engine::new(&mut store)
//!     .encrypt_for(&recipient, Some("me"), b"hello alice")
//!     .unwrap();
//! let wire_bytes = envelope.to_bytes().unwrap();
//! // hand wire_bytes to the storage service...
//! ```
//!
//! ## Features
//!
//! - `network` (default): HTTP fetchers for GitHub, Keybase, and VKS
//!   keyservers

// Modules
mod error;
mod internal;
mod types;

mod engine;
mod envelope;
mod hybrid;
mod openpgp;
mod resolve;

pub mod diagnostics;
pub mod fetch;
pub mod gpg;
pub mod keystore;

// Re-export error types
pub use error::{Error, Result};

// Re-export the data model
pub use types::{FetchedKey, KeyKind, KeyRecord, RecipientKind, ResolvedRecipient};

// Re-export the key store
pub use keystore::{default_document_path, KeyDatabase, KeyStore};

// Re-export resolution
pub use resolve::Resolver;

// Re-export the envelope wire format
pub use envelope::{
    Envelope, EnvelopeMetadata, HybridEnvelopeV1, HybridEnvelopeV2, PgpEnvelopeV3, PgpMetadata,
    RecipientMetadata,
};

// Re-export the engines
pub use engine::{create_identity, import_pgp_key, Engine};
pub use hybrid::{generate_identity, rsa_fingerprint, GeneratedIdentity};
pub use openpgp::{decrypt_armored, encrypt_armored, encrypted_for, summarize_cert, CertSummary};

// Re-export keyring interop
pub use gpg::{Keyring, KeyringConfig, KeyringKey};

// Re-export diagnostics
pub use diagnostics::{run_diagnostics, DiagnosticsReport, HealthCheck, HealthStatus};
