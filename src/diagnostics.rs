//! Store and keyring health checks.
//!
//! Produces a report a front end can print verbatim: filesystem state of
//! the key database, validity of every stored key, and reachability of
//! the external keyring. Nothing here mutates the store.

use std::fs;

use tracing::debug;

use crate::gpg::{Keyring, KeyringKey};
use crate::hybrid;
use crate::keystore::KeyStore;
use crate::openpgp;
use crate::types::KeyKind;

/// Severity of one check, and of the whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    /// Everything checked out
    Ok,
    /// Degraded but usable
    Warning,
    /// Something the user must fix
    Error,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Ok => write!(f, "ok"),
            HealthStatus::Warning => write!(f, "warning"),
            HealthStatus::Error => write!(f, "error"),
        }
    }
}

/// One named check with its outcome.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// What was checked
    pub name: String,
    /// How it went
    pub status: HealthStatus,
    /// Human-readable detail
    pub detail: String,
}

/// The full diagnostics report.
#[derive(Debug, Clone)]
pub struct DiagnosticsReport {
    /// Worst status across all checks
    pub status: HealthStatus,
    /// Individual check results
    pub checks: Vec<HealthCheck>,
    /// Keyring version line, when the probe succeeded
    pub keyring_version: Option<String>,
}

impl DiagnosticsReport {
    fn push(&mut self, name: impl Into<String>, status: HealthStatus, detail: impl Into<String>) {
        self.checks.push(HealthCheck {
            name: name.into(),
            status,
            detail: detail.into(),
        });
        if status > self.status {
            self.status = status;
        }
    }
}

/// Run every check against the store and keyring.
pub fn run_diagnostics(store: &KeyStore, keyring: &Keyring) -> DiagnosticsReport {
    let mut report = DiagnosticsReport {
        status: HealthStatus::Ok,
        checks: Vec::new(),
        keyring_version: None,
    };

    check_filesystem(store, &mut report);

    // Probe the keyring first so key checks can use its holdings for
    // corroboration
    let keyring_keys = check_keyring(keyring, &mut report);

    check_identity(store, &mut report);
    check_stored_keys(store, &keyring_keys, &mut report);

    report
}

fn check_filesystem(store: &KeyStore, report: &mut DiagnosticsReport) {
    let path = store.path();

    match path.parent() {
        Some(dir) if dir.as_os_str().is_empty() => {}
        Some(dir) => match fs::metadata(dir) {
            Ok(meta) if meta.permissions().readonly() => {
                report.push(
                    "data directory",
                    HealthStatus::Error,
                    format!("{} is not writable", dir.display()),
                );
            }
            Ok(_) => {
                report.push("data directory", HealthStatus::Ok, dir.display().to_string());
            }
            Err(_) => {
                report.push(
                    "data directory",
                    HealthStatus::Warning,
                    format!("{} does not exist yet (created on first save)", dir.display()),
                );
            }
        },
        None => {}
    }

    if path.exists() {
        report.push(
            "key database",
            HealthStatus::Ok,
            format!("{} ({} keys)", path.display(), store.database().count()),
        );
    } else {
        report.push(
            "key database",
            HealthStatus::Warning,
            "no key database yet (no keys stored)",
        );
    }
}

fn check_identity(store: &KeyStore, report: &mut DiagnosticsReport) {
    match store.own() {
        None => {
            report.push(
                "identity",
                HealthStatus::Warning,
                "no identity generated; run `key init`",
            );
        }
        Some(own) => {
            if hybrid::rsa_fingerprint(&own.public_material).is_err() {
                report.push(
                    "identity",
                    HealthStatus::Error,
                    "own public key does not parse",
                );
            } else if own.private_material.is_none() {
                report.push(
                    "identity",
                    HealthStatus::Error,
                    "own private key is missing; decryption is impossible",
                );
            } else {
                report.push("identity", HealthStatus::Ok, own.fingerprint.clone());
            }
        }
    }
}

fn check_stored_keys(
    store: &KeyStore,
    keyring_keys: &[KeyringKey],
    report: &mut DiagnosticsReport,
) {
    for record in store.database().iter() {
        let label = record.canonical_id();
        match record.kind {
            KeyKind::Own => {} // covered by check_identity
            KeyKind::Friend => {
                if hybrid::rsa_fingerprint(&record.public_material).is_err() {
                    report.push(label, HealthStatus::Warning, "RSA key does not parse");
                }
            }
            KeyKind::Pgp | KeyKind::Keybase | KeyKind::Github => {
                if openpgp::summarize_cert(record.public_material.as_bytes()).is_err() {
                    // Invalid material is only a warning, and not even
                    // that when the external keyring holds the same key
                    let in_keyring = keyring_keys.iter().any(|k| {
                        k.fingerprint.as_deref() == Some(record.fingerprint.as_str())
                            // An empty key ID matches every suffix
                            || (!k.key_id.is_empty() && record.fingerprint.ends_with(&k.key_id))
                    });
                    if in_keyring {
                        debug!(key = %record.name, "invalid local key usable via keyring");
                        report.push(
                            label,
                            HealthStatus::Ok,
                            "local copy invalid, but the keyring holds this key",
                        );
                    } else {
                        report.push(label, HealthStatus::Warning, "key does not parse as OpenPGP");
                    }
                }
            }
        }
    }
}

fn check_keyring(keyring: &Keyring, report: &mut DiagnosticsReport) -> Vec<KeyringKey> {
    match keyring.version() {
        Ok(version) => {
            report.keyring_version = Some(version.clone());
            report.push("keyring", HealthStatus::Ok, version);
        }
        Err(crate::Error::KeyringUnavailable(binary)) => {
            report.push(
                "keyring",
                HealthStatus::Warning,
                format!("'{binary}' not installed; PGP fallback decryption unavailable"),
            );
            return Vec::new();
        }
        Err(crate::Error::KeyringTimeout(secs)) => {
            report.push(
                "keyring",
                HealthStatus::Warning,
                format!("keyring hung (no response within {secs}s)"),
            );
            return Vec::new();
        }
        Err(e) => {
            report.push("keyring", HealthStatus::Warning, e.to_string());
            return Vec::new();
        }
    }

    match keyring.list_keys() {
        Ok(keys) => {
            report.push(
                "keyring keys",
                HealthStatus::Ok,
                format!("{} keys in external keyring", keys.len()),
            );
            keys
        }
        Err(e) => {
            report.push("keyring keys", HealthStatus::Warning, e.to_string());
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyRecord;

    #[test]
    fn empty_keyring_key_id_does_not_corroborate_broken_keys() {
        let dir = std::env::temp_dir().join("pastevault-diag-empty-keyid");
        let mut store = KeyStore::open(dir.join("keys.json")).unwrap();
        store
            .upsert(KeyRecord::new(
                KeyKind::Pgp,
                "mallory",
                "not an openpgp certificate",
                "0123456789ABCDEF0123456789ABCDEF01234567",
            ))
            .unwrap();

        // A listing entry with a blank key ID must not match every
        // fingerprint suffix
        let keyring_keys = vec![KeyringKey {
            key_id: String::new(),
            fingerprint: None,
            user_id: None,
        }];

        let mut report = DiagnosticsReport {
            status: HealthStatus::Ok,
            checks: Vec::new(),
            keyring_version: None,
        };
        check_stored_keys(&store, &keyring_keys, &mut report);

        let check = report
            .checks
            .iter()
            .find(|c| c.name == "pgp:mallory")
            .unwrap();
        assert_eq!(check.status, HealthStatus::Warning);
    }

    #[test]
    fn status_aggregation_prefers_worst() {
        let mut report = DiagnosticsReport {
            status: HealthStatus::Ok,
            checks: Vec::new(),
            keyring_version: None,
        };
        report.push("a", HealthStatus::Ok, "");
        assert_eq!(report.status, HealthStatus::Ok);
        report.push("b", HealthStatus::Warning, "");
        assert_eq!(report.status, HealthStatus::Warning);
        report.push("c", HealthStatus::Error, "");
        assert_eq!(report.status, HealthStatus::Error);
        report.push("d", HealthStatus::Warning, "");
        assert_eq!(report.status, HealthStatus::Error);
    }
}
