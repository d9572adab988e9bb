//! Hybrid RSA + AES-256-GCM encryption.
//!
//! Self and friend keys are plain RSA keypairs. Content is encrypted with a
//! fresh AES-256-GCM key and 128-bit nonce per call; the symmetric key is
//! wrapped with the recipient's RSA public key using OAEP. The result is a
//! v2 envelope ([`crate::envelope::HybridEnvelopeV2`]); v1 envelopes are the
//! same ciphertext shape without metadata and remain decryptable.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::envelope::{EnvelopeMetadata, HybridEnvelopeV1, HybridEnvelopeV2, RecipientMetadata};
use crate::error::{Error, Result};
use crate::types::KeyRecord;

/// AES-256-GCM with the 16-byte nonce used by v1/v2 envelopes since the
/// beginning. Not the usual 12-byte GCM nonce; changing it would break
/// every envelope already issued.
type ContentCipher = AesGcm<Aes256, U16>;

const SYMMETRIC_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// A freshly generated RSA identity.
#[derive(Debug)]
pub struct GeneratedIdentity {
    /// PKCS#8 PEM public key
    pub public_pem: String,
    /// PKCS#8 PEM private key
    pub private_pem: String,
    /// SHA-256 fingerprint of the public key, upper hex
    pub fingerprint: String,
}

/// Generate a new RSA keypair for the user's own identity.
///
/// # Arguments
/// * `bits` - Modulus size; 2048 or 4096
///
/// # Example
///
/// ```no_run
/// use pastevault::generate_identity;
///
/// let identity = generate_identity(2048).unwrap();
/// println!("Your fingerprint: {}", identity.fingerprint);
/// ```
pub fn generate_identity(bits: usize) -> Result<GeneratedIdentity> {
    if bits != 2048 && bits != 4096 {
        return Err(Error::Validation(format!(
            "unsupported RSA key size: {bits}"
        )));
    }

    let private_key =
        RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| Error::Crypto(e.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| Error::Crypto(e.to_string()))?
        .to_string();
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| Error::Crypto(e.to_string()))?;
    let fingerprint = fingerprint_of(&public_key)?;

    Ok(GeneratedIdentity {
        public_pem,
        private_pem,
        fingerprint,
    })
}

/// Compute the fingerprint of an RSA public key in PEM form.
///
/// SHA-256 over the SPKI DER encoding, upper hex. Stable for the lifetime
/// of the key; used for recipient-mismatch detection.
pub fn rsa_fingerprint(public_pem: &str) -> Result<String> {
    let key = parse_rsa_public(public_pem)?;
    fingerprint_of(&key)
}

/// Encrypt plaintext to a friend or self key, producing a v2 envelope.
///
/// Every call draws a fresh symmetric key and nonce; neither is ever
/// reused.
///
/// # Arguments
/// * `recipient` - Record holding an RSA public key in PEM form
/// * `sender` - Optional sender label carried in the metadata
/// * `plaintext` - The content to encrypt
pub fn encrypt_v2(
    recipient: &KeyRecord,
    sender: Option<&str>,
    plaintext: &[u8],
) -> Result<HybridEnvelopeV2> {
    let public_key = parse_rsa_public(&recipient.public_material)?;

    let mut sym_key = [0u8; SYMMETRIC_KEY_LEN];
    OsRng.fill_bytes(&mut sym_key);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = ContentCipher::new_from_slice(&sym_key)
        .map_err(|e| Error::Crypto(e.to_string()))?;
    let nonce = Nonce::<U16>::from_slice(&nonce_bytes);
    let mut sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| Error::Crypto("AES-GCM encryption failed".to_string()))?;

    // aes-gcm appends the tag; the wire format carries it separately
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    let encrypted_key = public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &sym_key)
        .map_err(|e| Error::Crypto(e.to_string()))?;

    Ok(HybridEnvelopeV2 {
        version: 2,
        encrypted_key: BASE64.encode(encrypted_key),
        iv: BASE64.encode(nonce_bytes),
        auth_tag: BASE64.encode(tag),
        encrypted_content: BASE64.encode(sealed),
        metadata: EnvelopeMetadata {
            sender: sender.map(str::to_string),
            recipient: RecipientMetadata {
                kind: recipient.kind.as_str().to_string(),
                name: Some(recipient.name.clone()),
                fingerprint: recipient.fingerprint.clone(),
            },
            timestamp: Utc::now(),
        },
    })
}

/// Decrypt a v1 envelope.
///
/// v1 carries no recipient hint; the caller must already know which
/// private key to try.
pub fn decrypt_v1(envelope: &HybridEnvelopeV1, private_pem: &str) -> Result<Vec<u8>> {
    decrypt_hybrid(
        private_pem,
        &envelope.encrypted_key,
        &envelope.iv,
        &envelope.auth_tag,
        &envelope.encrypted_content,
    )
}

/// Decrypt a v2 envelope.
///
/// The recipient-fingerprint precheck happens at the engine level before
/// this is called; this function only performs the cryptography.
pub fn decrypt_v2(envelope: &HybridEnvelopeV2, private_pem: &str) -> Result<Vec<u8>> {
    decrypt_hybrid(
        private_pem,
        &envelope.encrypted_key,
        &envelope.iv,
        &envelope.auth_tag,
        &envelope.encrypted_content,
    )
}

fn decrypt_hybrid(
    private_pem: &str,
    encrypted_key: &str,
    iv: &str,
    auth_tag: &str,
    encrypted_content: &str,
) -> Result<Vec<u8>> {
    let private_key = parse_rsa_private(private_pem)?;

    let wrapped = decode_field(encrypted_key, "encryptedKey")?;
    let nonce_bytes = decode_field(iv, "iv")?;
    let tag = decode_field(auth_tag, "authTag")?;
    let content = decode_field(encrypted_content, "encryptedContent")?;

    if nonce_bytes.len() != NONCE_LEN || tag.len() != TAG_LEN {
        return Err(Error::Format(
            "envelope nonce or tag has the wrong length".to_string(),
        ));
    }

    // Wrong private key and tampered wrap are indistinguishable by design
    let sym_key = private_key
        .decrypt(Oaep::new::<Sha256>(), &wrapped)
        .map_err(|_| Error::Decryption)?;

    let cipher =
        ContentCipher::new_from_slice(&sym_key).map_err(|_| Error::Decryption)?;
    let nonce = Nonce::<U16>::from_slice(&nonce_bytes);

    // aes-gcm expects ciphertext || tag
    let mut sealed = content;
    sealed.extend_from_slice(&tag);

    cipher
        .decrypt(nonce, sealed.as_slice())
        .map_err(|_| Error::Decryption)
}

fn fingerprint_of(key: &RsaPublicKey) -> Result<String> {
    let der = key
        .to_public_key_der()
        .map_err(|e| Error::Crypto(e.to_string()))?;
    let digest = Sha256::digest(der.as_bytes());
    Ok(hex::encode_upper(digest))
}

fn parse_rsa_public(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::Parse(format!("not an RSA public key: {e}")))
}

fn parse_rsa_private(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::Parse(format!("not an RSA private key: {e}")))
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|_| Error::Format(format!("invalid base64 in {field}")))
}
