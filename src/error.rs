//! Error types for the pastevault engine.
//!
//! Every failure mode of resolution, envelope handling, and keyring interop
//! is covered here so callers can render a user-facing message with a
//! suggested next step instead of crashing.

use thiserror::Error;

/// The main error type for pastevault operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Empty or malformed input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Resolution exhausted every source; the hint names the command that
    /// would make the identifier resolvable.
    #[error("Key not found: {identifier}. {hint}")]
    KeyNotFound {
        /// The identifier that could not be resolved
        identifier: String,
        /// Remediation hint (which command to run)
        hint: String,
    },

    /// An external key fetcher failed
    #[error("Failed to fetch key from {origin}: {reason}")]
    Fetch {
        /// Which fetcher failed ("github", "keybase", "keyserver")
        origin: String,
        /// Best-effort failure reason
        reason: String,
    },

    /// Envelope doesn't match any known version, or PGP armor is invalid
    #[error("Unrecognized envelope format: {0}")]
    Format(String),

    /// Wrong key, wrong passphrase, or tampered ciphertext. Deliberately
    /// carries no detail; the causes must stay indistinguishable.
    #[error("Decryption failed: wrong key or corrupted data")]
    Decryption,

    /// The envelope names a recipient fingerprint that is not the caller's
    #[error("This paste was encrypted for {}", intended.as_deref().unwrap_or("someone else"))]
    RecipientMismatch {
        /// Name of the intended recipient, when the fingerprint matches a
        /// known friend
        intended: Option<String>,
        /// The fingerprint the envelope was addressed to
        fingerprint: String,
    },

    /// The external keyring binary did not respond within the deadline
    #[error("Keyring did not respond within {0} seconds")]
    KeyringTimeout(u64),

    /// The external keyring binary is not installed or not executable
    #[error("Keyring binary unavailable: {0}")]
    KeyringUnavailable(String),

    /// Certificate or key material parsing failed
    #[error("Key parsing failed: {0}")]
    Parse(String),

    /// Cryptographic operation failed
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key database document error
    #[error("Key database error: {0}")]
    Document(#[from] serde_json::Error),

    /// rpgp OpenPGP error
    #[error("OpenPGP error: {0}")]
    OpenPgp(#[from] pgp::errors::Error),

    /// Network error (network feature)
    #[error("Network error: {0}")]
    Network(String),
}

/// A specialized Result type for pastevault operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Construct a [`Error::KeyNotFound`] with a remediation hint matching
    /// the kind of identifier that failed to resolve.
    pub(crate) fn not_found(identifier: impl Into<String>, hint: impl Into<String>) -> Self {
        Error::KeyNotFound {
            identifier: identifier.into(),
            hint: hint.into(),
        }
    }
}
