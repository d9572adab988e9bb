//! Shared helpers for integration tests.

use pgp::composed::{
    KeyType, SecretKeyParamsBuilder, SignedPublicKey, SubkeyParamsBuilder,
};
use pgp::crypto::ecc_curve::ECCCurve;
use pgp::types::KeyDetails;
use rand::thread_rng;

pub const TEST_PASSWORD: &str = "test-password-123";

/// A generated OpenPGP test key: (secret armor, public armor, fingerprint).
pub fn create_pgp_key(uid: &str) -> (String, String, String) {
    let mut rng = thread_rng();

    let mut enc_builder = SubkeyParamsBuilder::default();
    enc_builder
        .key_type(KeyType::ECDH(ECCCurve::Curve25519))
        .can_encrypt(true)
        .can_sign(false)
        .can_authenticate(false)
        .passphrase(Some(TEST_PASSWORD.to_string()));
    let enc_subkey = enc_builder.build().unwrap();

    let mut key_params = SecretKeyParamsBuilder::default();
    key_params
        .key_type(KeyType::Ed25519Legacy)
        .can_certify(true)
        .can_sign(false)
        .can_encrypt(false)
        .primary_user_id(uid.to_string())
        .passphrase(Some(TEST_PASSWORD.to_string()))
        .subkeys(vec![enc_subkey]);

    let secret_key = key_params
        .build()
        .unwrap()
        .generate(&mut rng)
        .unwrap()
        .sign(&mut rng, &TEST_PASSWORD.into())
        .unwrap();
    let secret_armored = secret_key.to_armored_string(None.into()).unwrap();

    let public_key = SignedPublicKey::from(secret_key);
    let fingerprint = hex::encode_upper(public_key.primary_key.fingerprint().as_bytes());
    let public_armored = public_key.to_armored_string(None.into()).unwrap();

    (secret_armored, public_armored, fingerprint)
}
