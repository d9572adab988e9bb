mod common;

use pastevault::{
    create_identity, import_pgp_key, run_diagnostics, HealthStatus, KeyKind, KeyRecord, KeyStore,
    Keyring, KeyringConfig,
};
use tempfile::tempdir;

fn no_keyring() -> Keyring {
    Keyring::new(KeyringConfig {
        binary: "pastevault-no-such-binary".to_string(),
        ..KeyringConfig::default()
    })
}

#[test]
fn fresh_store_warns_about_missing_identity() {
    let dir = tempdir().unwrap();
    let store = KeyStore::open(dir.path().join("keys.json")).unwrap();

    let report = run_diagnostics(&store, &no_keyring());
    assert_eq!(report.status, HealthStatus::Warning);
    assert!(report.keyring_version.is_none());

    let identity = report
        .checks
        .iter()
        .find(|c| c.name == "identity")
        .unwrap();
    assert_eq!(identity.status, HealthStatus::Warning);
    assert!(identity.detail.contains("key init"));

    let keyring = report.checks.iter().find(|c| c.name == "keyring").unwrap();
    assert_eq!(keyring.status, HealthStatus::Warning);
    assert!(keyring.detail.contains("not installed"));
}

#[test]
fn healthy_store_passes_identity_and_key_checks() {
    let dir = tempdir().unwrap();
    let (_, public_armored, _) = common::create_pgp_key("Mia <mia@example.com>");
    let mut store = KeyStore::open(dir.path().join("keys.json")).unwrap();

    create_identity(&mut store, 2048).unwrap();
    import_pgp_key(&mut store, "mia", public_armored.as_bytes()).unwrap();

    let report = run_diagnostics(&store, &no_keyring());

    let identity = report
        .checks
        .iter()
        .find(|c| c.name == "identity")
        .unwrap();
    assert_eq!(identity.status, HealthStatus::Ok);
    // Valid stored keys produce no warnings of their own
    assert!(!report
        .checks
        .iter()
        .any(|c| c.name == "pgp:mia" && c.status != HealthStatus::Ok));
}

#[test]
fn invalid_stored_key_is_flagged() {
    let dir = tempdir().unwrap();
    let mut store = KeyStore::open(dir.path().join("keys.json")).unwrap();
    create_identity(&mut store, 2048).unwrap();
    store
        .upsert(KeyRecord::new(
            KeyKind::Pgp,
            "broken",
            "not a certificate",
            "FP-X",
        ))
        .unwrap();

    let report = run_diagnostics(&store, &no_keyring());
    assert_eq!(report.status, HealthStatus::Warning);
    let check = report
        .checks
        .iter()
        .find(|c| c.name == "pgp:broken")
        .unwrap();
    assert_eq!(check.status, HealthStatus::Warning);
    assert!(check.detail.contains("does not parse"));
}

#[test]
fn identity_without_private_key_is_an_error() {
    let dir = tempdir().unwrap();
    let mut store = KeyStore::open(dir.path().join("keys.json")).unwrap();
    let record = create_identity(&mut store, 2048).unwrap();

    let mut public_only = record;
    public_only.private_material = None;
    store.upsert(public_only).unwrap();

    let report = run_diagnostics(&store, &no_keyring());
    assert_eq!(report.status, HealthStatus::Error);
    let identity = report
        .checks
        .iter()
        .find(|c| c.name == "identity")
        .unwrap();
    assert_eq!(identity.status, HealthStatus::Error);
}
