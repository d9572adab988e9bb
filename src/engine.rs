//! Encrypt/decrypt orchestration.
//!
//! One command performs one resolve → encrypt-or-decrypt → persist
//! sequence. The engine picks the envelope version from the recipient's
//! key kind on the write path, sniffs the version tag on the read path,
//! and handles the keyring fallback for v3 envelopes. Every successful
//! operation bumps the used record's `last_used_at`.

use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::gpg::Keyring;
use crate::hybrid;
use crate::keystore::KeyStore;
use crate::openpgp;
use crate::types::{KeyKind, KeyRecord, ResolvedRecipient};

/// The encryption engine: a key store plus a keyring handle.
pub struct Engine<'a> {
    store: &'a mut KeyStore,
    keyring: Keyring,
}

impl<'a> Engine<'a> {
    /// An engine over the given store with the default keyring.
    pub fn new(store: &'a mut KeyStore) -> Self {
        Self {
            store,
            keyring: Keyring::default(),
        }
    }

    /// Replace the keyring handle (binary path, timeouts).
    pub fn with_keyring(mut self, keyring: Keyring) -> Self {
        self.keyring = keyring;
        self
    }

    /// Encrypt plaintext for one resolved recipient.
    ///
    /// Self and friend keys get a v2 hybrid envelope; PGP-family keys get
    /// a v3 envelope. Groups must be flattened by
    /// [`crate::Resolver::resolve_many`] first.
    pub fn encrypt_for(
        &mut self,
        recipient: &ResolvedRecipient,
        sender: Option<&str>,
        plaintext: &[u8],
    ) -> Result<Envelope> {
        let record = recipient.key_record.as_ref().ok_or_else(|| {
            Error::Validation(format!(
                "'{}' is a group; expand it before encrypting",
                recipient.original_input
            ))
        })?;

        let envelope = match record.kind {
            KeyKind::Own | KeyKind::Friend => {
                Envelope::V2(hybrid::encrypt_v2(record, sender, plaintext)?)
            }
            KeyKind::Pgp | KeyKind::Keybase | KeyKind::Github => {
                Envelope::V3(openpgp::encrypt_v3(record, plaintext)?)
            }
        };

        self.store.touch(record.kind, &record.name)?;
        Ok(envelope)
    }

    /// Decrypt envelope bytes addressed to the caller.
    ///
    /// v1/v2 use the own identity's private key; v2 additionally fails
    /// fast with [`Error::RecipientMismatch`] when the metadata names a
    /// different fingerprint, before any cryptographic attempt. v3 tries
    /// local secret material first and then the external keyring.
    ///
    /// # Arguments
    /// * `bytes` - Raw envelope bytes from the storage collaborator
    /// * `passphrase` - Passphrase for local PGP secret material, if any
    pub fn decrypt(&mut self, bytes: &[u8], passphrase: Option<&str>) -> Result<Vec<u8>> {
        match Envelope::parse(bytes)? {
            Envelope::V1(envelope) => {
                let (private_pem, name) = self.own_private()?;
                let plaintext = hybrid::decrypt_v1(&envelope, &private_pem)?;
                self.store.touch(KeyKind::Own, &name)?;
                Ok(plaintext)
            }
            Envelope::V2(envelope) => {
                let (private_pem, name) = self.own_private()?;
                self.check_recipient(&envelope.metadata.recipient.fingerprint)?;
                let plaintext = hybrid::decrypt_v2(&envelope, &private_pem)?;
                self.store.touch(KeyKind::Own, &name)?;
                Ok(plaintext)
            }
            Envelope::V3(envelope) => self.decrypt_v3(&envelope, passphrase),
        }
    }

    fn decrypt_v3(
        &mut self,
        envelope: &crate::envelope::PgpEnvelopeV3,
        passphrase: Option<&str>,
    ) -> Result<Vec<u8>> {
        let armored = &envelope.pgp_encrypted;
        let target_fp = &envelope.metadata.recipient.fingerprint;

        // Prefer local secret material for the addressed key
        let local = self
            .store
            .find_by_fingerprint(target_fp)
            .filter(|r| r.has_private())
            .map(|r| (r.kind, r.name.clone(), r.private_material.clone().unwrap_or_default()));

        if let (Some((kind, name, secret)), Some(pass)) = (local, passphrase) {
            match openpgp::decrypt_armored(secret.as_bytes(), armored, pass) {
                Ok(plaintext) => {
                    self.store.touch(kind, &name)?;
                    return Ok(plaintext);
                }
                Err(e) => {
                    debug!(error = %e, "native PGP decrypt failed, trying keyring");
                }
            }
        }

        match self.keyring.decrypt(armored) {
            Ok(plaintext) => Ok(plaintext),
            // A hung keyring must stay distinguishable from a wrong key
            Err(e @ Error::KeyringTimeout(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, "keyring fallback failed");
                let key_ids = openpgp::encrypted_for(armored).unwrap_or_default();
                if key_ids.is_empty() {
                    Err(Error::Decryption)
                } else {
                    Err(Error::not_found(
                        key_ids.join(", "),
                        "This paste needs one of these keys; import it with \
                         `key import-pgp <key-id>`."
                            .to_string(),
                    ))
                }
            }
        }
    }

    /// v2 precheck: the envelope must be addressed to our fingerprint.
    fn check_recipient(&self, envelope_fp: &str) -> Result<()> {
        let own_fp = self
            .store
            .own()
            .map(|r| r.fingerprint.clone())
            .unwrap_or_default();
        if envelope_fp == own_fp {
            return Ok(());
        }

        // Name the intended recipient when the fingerprint is a known friend
        let intended = self
            .store
            .find_by_fingerprint(envelope_fp)
            .map(|r| r.name.clone());
        Err(Error::RecipientMismatch {
            intended,
            fingerprint: envelope_fp.to_string(),
        })
    }

    fn own_private(&self) -> Result<(String, String)> {
        let own = self.store.own().ok_or_else(|| {
            Error::not_found("self", "Generate your identity first with `key init`.")
        })?;
        let private = own.private_material.clone().ok_or_else(|| {
            Error::not_found(
                "self",
                "Your identity has no private key on this machine.",
            )
        })?;
        Ok((private, own.name.clone()))
    }
}

/// Generate and install the user's own RSA identity.
///
/// Fails if an identity already exists: a record's fingerprint never
/// changes, so rotation means removing the old record first.
pub fn create_identity(store: &mut KeyStore, bits: usize) -> Result<KeyRecord> {
    if store.own().is_some() {
        return Err(Error::Validation(
            "an identity already exists; remove it before generating a new one".to_string(),
        ));
    }

    let identity = hybrid::generate_identity(bits)?;
    let mut record = KeyRecord::new(
        KeyKind::Own,
        "self",
        identity.public_pem,
        identity.fingerprint,
    );
    record.private_material = Some(identity.private_pem);
    store.upsert(record.clone())?;
    Ok(record)
}

/// Import an OpenPGP certificate (public or secret) as a PGP record.
///
/// Secret material is kept so v3 envelopes addressed to this key can be
/// decrypted natively, without the external keyring.
pub fn import_pgp_key(store: &mut KeyStore, name: &str, material: &[u8]) -> Result<KeyRecord> {
    if name.trim().is_empty() {
        return Err(Error::Validation("key name must not be empty".to_string()));
    }

    let summary = openpgp::summarize_cert(material)?;

    // Public material is always stored as public armor, even when a secret
    // key was imported
    let public_armored =
        crate::internal::public_key_to_armored(&crate::internal::parse_public_key(material)?)?;

    let mut record = KeyRecord::new(KeyKind::Pgp, name, public_armored, summary.fingerprint);
    if summary.is_secret {
        let text = String::from_utf8(material.to_vec())
            .map_err(|_| Error::Parse("secret key material must be ASCII armor".to_string()))?;
        record.private_material = Some(text);
    }
    record.email = summary
        .user_ids
        .first()
        .and_then(|uid| crate::internal::extract_email(uid));

    store.upsert(record.clone())?;
    Ok(record)
}
