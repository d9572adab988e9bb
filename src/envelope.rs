//! Versioned envelope wire format.
//!
//! An envelope is the JSON object handed to the storage collaborator: a
//! `version` integer plus base64-encoded binary fields. Three versions are
//! live on the wire and the field names are frozen for backward
//! compatibility:
//!
//! - **v1** (legacy hybrid): ciphertext fields only, no metadata. The
//!   caller must already know which private key to try.
//! - **v2** (hybrid): adds recipient metadata so the engine can tell
//!   "encrypted for someone else" apart from "wrong key" before touching
//!   any cryptography.
//! - **v3** (PGP): an armored OpenPGP message plus metadata.
//!
//! Parsing dispatches on the explicit `version` tag — never on which
//! fields happen to be present — and each version's decoder is total over
//! its own shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Non-secret routing metadata attached to v2 and v3 envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    /// Free-form sender label, if the producer chose to identify itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Who the envelope is addressed to
    pub recipient: RecipientMetadata,
    /// When the envelope was produced
    pub timestamp: DateTime<Utc>,
}

/// The addressed recipient of an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientMetadata {
    /// Key kind wire name ("self", "friend", "pgp", "keybase", "github")
    #[serde(rename = "type")]
    pub kind: String,
    /// Record name, when the producer knew it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fingerprint of the recipient's public key
    pub fingerprint: String,
}

/// v1 hybrid envelope: RSA-wrapped key + AES-256-GCM content, no metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridEnvelopeV1 {
    /// Always 1
    pub version: u32,
    /// RSA-OAEP-wrapped symmetric key, base64
    pub encrypted_key: String,
    /// AES-GCM nonce, base64
    pub iv: String,
    /// AES-GCM authentication tag, base64
    pub auth_tag: String,
    /// Symmetric ciphertext, base64
    pub encrypted_content: String,
}

/// v2 hybrid envelope: v1 fields plus routing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridEnvelopeV2 {
    /// Always 2
    pub version: u32,
    /// RSA-OAEP-wrapped symmetric key, base64
    pub encrypted_key: String,
    /// AES-GCM nonce, base64
    pub iv: String,
    /// AES-GCM authentication tag, base64
    pub auth_tag: String,
    /// Symmetric ciphertext, base64
    pub encrypted_content: String,
    /// Routing metadata
    pub metadata: EnvelopeMetadata,
}

/// Metadata attached to v3 PGP envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PgpMetadata {
    /// Always true; marks the envelope as PGP-carried
    pub pgp: bool,
    /// Who the envelope is addressed to
    pub recipient: RecipientMetadata,
    /// When the envelope was produced
    pub timestamp: DateTime<Utc>,
}

/// v3 envelope: the content is a self-contained armored OpenPGP message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PgpEnvelopeV3 {
    /// Always 3
    pub version: u32,
    /// Armored OpenPGP message
    pub pgp_encrypted: String,
    /// Routing metadata
    pub metadata: PgpMetadata,
}

/// A parsed envelope, one of the three live wire versions.
///
/// Immutable once constructed; consumed exactly once by the matching
/// decrypt path.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Legacy hybrid envelope without metadata
    V1(HybridEnvelopeV1),
    /// Hybrid envelope with recipient metadata
    V2(HybridEnvelopeV2),
    /// OpenPGP envelope
    V3(PgpEnvelopeV3),
}

impl Envelope {
    /// Parse envelope bytes, dispatching on the `version` field.
    ///
    /// Anything that is not valid JSON, carries an unknown version, or
    /// fails its version's shape (e.g. a v3 envelope missing
    /// `pgpEncrypted`) is a [`Error::Format`], never a decryption error.
    pub fn parse(bytes: &[u8]) -> Result<Envelope> {
        #[derive(Deserialize)]
        struct VersionProbe {
            version: u32,
        }

        let probe: VersionProbe = serde_json::from_slice(bytes)
            .map_err(|e| Error::Format(format!("not a versioned envelope: {e}")))?;

        match probe.version {
            1 => serde_json::from_slice(bytes)
                .map(Envelope::V1)
                .map_err(|e| Error::Format(format!("invalid v1 envelope: {e}"))),
            2 => serde_json::from_slice(bytes)
                .map(Envelope::V2)
                .map_err(|e| Error::Format(format!("invalid v2 envelope: {e}"))),
            3 => serde_json::from_slice(bytes)
                .map(Envelope::V3)
                .map_err(|e| Error::Format(format!("invalid v3 envelope: {e}"))),
            v => Err(Error::Format(format!("unknown envelope version {v}"))),
        }
    }

    /// Serialize the envelope to wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            Envelope::V1(e) => serde_json::to_vec(e)?,
            Envelope::V2(e) => serde_json::to_vec(e)?,
            Envelope::V3(e) => serde_json::to_vec(e)?,
        };
        Ok(bytes)
    }

    /// The wire version tag.
    pub fn version(&self) -> u32 {
        match self {
            Envelope::V1(_) => 1,
            Envelope::V2(_) => 2,
            Envelope::V3(_) => 3,
        }
    }

    /// Recipient metadata, absent for v1.
    pub fn recipient(&self) -> Option<&RecipientMetadata> {
        match self {
            Envelope::V1(_) => None,
            Envelope::V2(e) => Some(&e.metadata.recipient),
            Envelope::V3(e) => Some(&e.metadata.recipient),
        }
    }
}
