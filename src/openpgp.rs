//! Native OpenPGP encryption and decryption.
//!
//! PGP, Keybase, and GitHub recipients hold OpenPGP certificates, so their
//! envelopes carry an armored OpenPGP message directly (v3): OpenPGP does
//! its own symmetric wrapping internally and no hybrid step is layered on
//! top. Decryption prefers local secret material; the external keyring
//! fallback lives in [`crate::gpg`].

use std::io::{BufReader, Cursor, Read};

use chrono::Utc;
use pgp::armor::Dearmor;
use pgp::composed::{Message, MessageBuilder, SignedPublicKey};
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::packet::{Packet, PacketParser, PublicKeyEncryptedSessionKey};
use pgp::types::{Password, PublicKeyTrait};
use rand::thread_rng;

use crate::envelope::{PgpEnvelopeV3, PgpMetadata, RecipientMetadata};
use crate::error::{Error, Result};
use crate::internal::{
    fingerprint_to_hex, is_subkey_valid, parse_public_key, parse_secret_key,
};
use crate::types::KeyRecord;

/// Parsed summary of an OpenPGP certificate: enough to build a key record.
#[derive(Debug, Clone)]
pub struct CertSummary {
    /// Primary key fingerprint, upper hex
    pub fingerprint: String,
    /// User ID strings on the certificate
    pub user_ids: Vec<String>,
    /// Whether the data carried secret key material
    pub is_secret: bool,
}

/// Parse an OpenPGP certificate (armored or binary) and summarize it.
pub fn summarize_cert(data: &[u8]) -> Result<CertSummary> {
    let is_secret = parse_secret_key(data).is_ok();
    let public_key = parse_public_key(data)?;
    let user_ids = public_key
        .details
        .users
        .iter()
        .map(|u| String::from_utf8_lossy(u.id.id()).to_string())
        .collect();
    Ok(CertSummary {
        fingerprint: fingerprint_to_hex(&public_key.primary_key),
        user_ids,
        is_secret,
    })
}

/// Encrypt plaintext to a PGP-family recipient, producing a v3 envelope.
///
/// # Arguments
/// * `recipient` - Record whose public material is an OpenPGP certificate
/// * `plaintext` - The content to encrypt
pub fn encrypt_v3(recipient: &KeyRecord, plaintext: &[u8]) -> Result<PgpEnvelopeV3> {
    let armored = encrypt_armored(recipient.public_material.as_bytes(), plaintext)?;

    Ok(PgpEnvelopeV3 {
        version: 3,
        pgp_encrypted: armored,
        metadata: PgpMetadata {
            pgp: true,
            recipient: RecipientMetadata {
                kind: recipient.kind.as_str().to_string(),
                name: Some(recipient.name.clone()),
                fingerprint: recipient.fingerprint.clone(),
            },
            timestamp: Utc::now(),
        },
    })
}

/// OpenPGP-encrypt plaintext to a certificate, returning ASCII armor.
pub fn encrypt_armored(recipient_cert: &[u8], plaintext: &[u8]) -> Result<String> {
    let public_key = parse_public_key(recipient_cert)?;
    let encryption_keys = find_valid_encryption_subkeys(&public_key)?;

    let mut rng = thread_rng();
    let mut builder = MessageBuilder::from_bytes("", plaintext.to_vec())
        .seipd_v1(&mut rng, SymmetricKeyAlgorithm::AES256);

    for key in &encryption_keys {
        builder
            .encrypt_to_key(&mut rng, key)
            .map_err(|e| Error::Crypto(e.to_string()))?;
    }

    builder
        .to_armored_string(&mut rng, None.into())
        .map_err(|e| Error::Crypto(e.to_string()))
}

/// Decrypt an armored OpenPGP message with local secret key material.
///
/// # Arguments
/// * `secret_cert` - Secret key (armored or binary)
/// * `armored` - The armored message
/// * `passphrase` - Passphrase unlocking the secret key
pub fn decrypt_armored(secret_cert: &[u8], armored: &str, passphrase: &str) -> Result<Vec<u8>> {
    let secret_key = parse_secret_key(secret_cert)?;
    let password: Password = passphrase.into();
    let ciphertext = armored.as_bytes();

    let message = match Message::from_armor(Cursor::new(ciphertext)) {
        Ok((msg, _headers)) => msg,
        Err(_) => Message::from_bytes(ciphertext)
            .map_err(|e| Error::Format(format!("invalid PGP message: {e}")))?,
    };

    // Standard decrypt first, then the legacy mode some old messages need.
    // Wrong key and wrong passphrase both collapse into Decryption.
    let decrypted = match message.decrypt(&password, &secret_key) {
        Ok(msg) => msg,
        Err(_) => {
            let msg = match Message::from_armor(Cursor::new(ciphertext)) {
                Ok((m, _headers)) => m,
                Err(_) => Message::from_bytes(ciphertext)
                    .map_err(|e| Error::Format(format!("invalid PGP message: {e}")))?,
            };
            msg.decrypt_legacy(&password, &secret_key)
                .map_err(|_| Error::Decryption)?
        }
    };

    let mut decompressed = if decrypted.is_compressed() {
        decrypted.decompress().map_err(|_| Error::Decryption)?
    } else {
        decrypted
    };

    decompressed.as_data_vec().map_err(|_| Error::Decryption)
}

/// List the key IDs an armored message was encrypted for.
///
/// Parsed from the message's PKESK packets; used to tell the user which
/// key to import when no decryption path worked.
pub fn encrypted_for(armored: &str) -> Result<Vec<String>> {
    let ciphertext = armored.as_bytes();
    let data = if ciphertext.starts_with(b"-----BEGIN PGP") {
        let cursor = Cursor::new(ciphertext);
        let dearmor = Dearmor::new(cursor);
        let mut buf = Vec::new();
        let mut reader = BufReader::new(dearmor);
        reader.read_to_end(&mut buf)?;
        buf
    } else {
        ciphertext.to_vec()
    };

    let parser = PacketParser::new(Cursor::new(&data));
    let mut key_ids = Vec::new();

    for packet_result in parser {
        match packet_result {
            Ok(Packet::PublicKeyEncryptedSessionKey(pkesk)) => {
                let key_id = match pkesk {
                    PublicKeyEncryptedSessionKey::V3 { id, .. } => {
                        format!("{}", id).to_uppercase()
                    }
                    PublicKeyEncryptedSessionKey::V6 { fingerprint, .. } => match fingerprint {
                        Some(fp) => format!("{}", fp).to_uppercase(),
                        // Anonymous recipient
                        None => continue,
                    },
                    PublicKeyEncryptedSessionKey::Other { .. } => continue,
                };
                key_ids.push(key_id);
            }
            Ok(_) => {}
            // Parsing stops once we hit the encrypted payload
            Err(_) => break,
        }
    }

    Ok(key_ids)
}

/// Find valid (non-revoked, non-expired, encryption-capable) subkeys.
fn find_valid_encryption_subkeys(
    key: &SignedPublicKey,
) -> Result<Vec<pgp::composed::SignedPublicSubKey>> {
    let mut valid_keys = Vec::new();

    for subkey in &key.public_subkeys {
        if !subkey.key.is_encryption_key() {
            continue;
        }

        let has_encryption_flag = subkey.signatures.iter().any(|sig| {
            let flags = sig.key_flags();
            flags.encrypt_comms() || flags.encrypt_storage()
        });
        if !has_encryption_flag {
            continue;
        }

        if !is_subkey_valid(subkey) {
            continue;
        }

        valid_keys.push(subkey.clone());
    }

    if valid_keys.is_empty() {
        return Err(Error::Parse(
            "certificate has no usable encryption subkey".to_string(),
        ));
    }

    Ok(valid_keys)
}
