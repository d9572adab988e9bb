//! External keyring binary bridge.
//!
//! Decryption fallback and diagnostics probe for a locally installed
//! keyring binary (gpg). The binary can be absent, or it can hang waiting
//! for an agent or pinentry, so every invocation races subprocess
//! completion against a deadline: on expiry the child is force-killed and
//! the call resolves to [`Error::KeyringTimeout`] — a distinct outcome
//! from "wrong key", and never an orphaned process.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Deadline for decrypt and armored-export calls.
pub const DEFAULT_DECRYPT_TIMEOUT: Duration = Duration::from_secs(8);
/// Deadline for the version probe and key listing.
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(5);

/// How the external keyring binary is invoked.
#[derive(Debug, Clone)]
pub struct KeyringConfig {
    /// Binary name or path
    pub binary: String,
    /// Deadline for decrypt/export operations
    pub decrypt_timeout: Duration,
    /// Deadline for version probe and key listing
    pub list_timeout: Duration,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            binary: "gpg".to_string(),
            decrypt_timeout: DEFAULT_DECRYPT_TIMEOUT,
            list_timeout: DEFAULT_LIST_TIMEOUT,
        }
    }
}

/// One key as reported by the keyring's colon-delimited listing.
#[derive(Debug, Clone)]
pub struct KeyringKey {
    /// Long key ID
    pub key_id: String,
    /// Full fingerprint, when the listing included an fpr record
    pub fingerprint: Option<String>,
    /// Primary user ID
    pub user_id: Option<String>,
}

/// Handle to the external keyring binary.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    config: KeyringConfig,
}

impl Keyring {
    /// Create a keyring handle with the given configuration.
    pub fn new(config: KeyringConfig) -> Self {
        Self { config }
    }

    /// Probe the binary's version string (first output line).
    pub fn version(&self) -> Result<String> {
        let output = self.run(&["--version"], None, self.config.list_timeout)?;
        let stdout = self.output_or_error(output)?;
        let text = String::from_utf8_lossy(&stdout);
        Ok(text.lines().next().unwrap_or_default().to_string())
    }

    /// Enumerate keys via the colon-delimited listing.
    pub fn list_keys(&self) -> Result<Vec<KeyringKey>> {
        let output = self.run(
            &[
                "--list-keys",
                "--with-colons",
                "--fingerprint",
                "--keyid-format",
                "LONG",
            ],
            None,
            self.config.list_timeout,
        )?;
        let stdout = self.output_or_error(output)?;
        Ok(parse_key_listing(&stdout))
    }

    /// Decrypt an armored message via the keyring.
    ///
    /// A non-zero exit is a [`Error::Decryption`]; callers can tell it
    /// apart from [`Error::KeyringTimeout`] (hung) and
    /// [`Error::KeyringUnavailable`] (not installed).
    pub fn decrypt(&self, armored: &str) -> Result<Vec<u8>> {
        let output = self.run(
            &["--batch", "--quiet", "--decrypt"],
            Some(armored.as_bytes()),
            self.config.decrypt_timeout,
        )?;
        if output.success {
            Ok(output.stdout)
        } else {
            debug!(
                stderr = %String::from_utf8_lossy(&output.stderr),
                "keyring decrypt failed"
            );
            Err(Error::Decryption)
        }
    }

    /// Export a public key as ASCII armor.
    pub fn export_key(&self, key_id: &str) -> Result<String> {
        let output = self.run(
            &["--export", "--armor", key_id],
            None,
            self.config.decrypt_timeout,
        )?;
        let stdout = self.output_or_error(output)?;
        let armored = String::from_utf8_lossy(&stdout).to_string();
        if armored.trim().is_empty() {
            return Err(Error::not_found(
                key_id.to_string(),
                "The keyring does not hold this key.".to_string(),
            ));
        }
        Ok(armored)
    }

    /// Spawn the binary and race completion against `timeout`.
    ///
    /// stdout/stderr are drained on background threads so a chatty child
    /// can never fill a pipe and stall. On deadline the child is killed
    /// and reaped before the timeout error is returned.
    fn run(&self, args: &[&str], input: Option<&[u8]>, timeout: Duration) -> Result<RunOutput> {
        debug!(binary = %self.config.binary, ?args, "invoking keyring");

        let mut child = Command::new(&self.config.binary)
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::KeyringUnavailable(self.config.binary.clone())
                } else {
                    Error::KeyringUnavailable(e.to_string())
                }
            })?;

        // stdin is fed from a background thread: a child that never reads
        // (hung on an agent) would otherwise block write_all once the
        // payload exceeds the pipe buffer, and the deadline below would
        // never fire. A write failure means the child already exited;
        // its exit status tells the real story.
        if let Some(bytes) = input {
            if let Some(mut stdin) = child.stdin.take() {
                let bytes = bytes.to_vec();
                thread::spawn(move || {
                    let _ = stdin.write_all(&bytes);
                });
            }
        }

        let stdout_handle = drain(child.stdout.take());
        let stderr_handle = drain(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None => {
                    if Instant::now() >= deadline {
                        warn!(binary = %self.config.binary, ?timeout, "keyring call timed out, killing");
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(Error::KeyringTimeout(timeout.as_secs()));
                    }
                    thread::sleep(Duration::from_millis(25));
                }
            }
        };

        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();

        Ok(RunOutput {
            success: status.success(),
            stdout,
            stderr,
        })
    }

    fn output_or_error(&self, output: RunOutput) -> Result<Vec<u8>> {
        if output.success {
            Ok(output.stdout)
        } else {
            Err(Error::Crypto(format!(
                "keyring error: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[derive(Debug)]
struct RunOutput {
    success: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

fn drain(pipe: Option<impl Read + Send + 'static>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Parse `--with-colons` output into key entries.
fn parse_key_listing(output: &[u8]) -> Vec<KeyringKey> {
    let text = String::from_utf8_lossy(output);
    let mut keys = Vec::new();
    let mut current: Option<KeyringKey> = None;

    for line in text.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        match fields.first().copied() {
            Some("pub") | Some("sec") => {
                if let Some(key) = current.take() {
                    keys.push(key);
                }
                current = Some(KeyringKey {
                    key_id: fields.get(4).unwrap_or(&"").to_string(),
                    fingerprint: None,
                    user_id: None,
                });
            }
            Some("fpr") => {
                if let Some(ref mut key) = current {
                    if key.fingerprint.is_none() {
                        if let Some(fpr) = fields.get(9) {
                            if !fpr.is_empty() {
                                key.fingerprint = Some(fpr.to_string());
                            }
                        }
                    }
                }
            }
            Some("uid") => {
                if let Some(ref mut key) = current {
                    if key.user_id.is_none() {
                        if let Some(uid) = fields.get(9) {
                            if !uid.is_empty() {
                                key.user_id = Some(uid.to_string());
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(key) = current {
        keys.push(key);
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_listing_pairs_fingerprints() {
        let listing = b"tru::1:1:0:\n\
pub:u:4096:1:AAAA1111BBBB2222:1577836800:::u:::scESC::::::23::0:\n\
fpr:::::::::0123456789ABCDEF0123456789ABCDEF01234567:\n\
uid:u::::1577836800::HASH::Alice <alice@example.com>::::::::::0:\n\
pub:u:255:22:CCCC3333DDDD4444:1577836800:::u:::scESC::::::23::0:\n\
fpr:::::::::89ABCDEF0123456789ABCDEF0123456789ABCDEF:\n";
        let keys = parse_key_listing(listing);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].key_id, "AAAA1111BBBB2222");
        assert_eq!(
            keys[0].fingerprint.as_deref(),
            Some("0123456789ABCDEF0123456789ABCDEF01234567")
        );
        assert_eq!(
            keys[0].user_id.as_deref(),
            Some("Alice <alice@example.com>")
        );
        assert_eq!(keys[1].key_id, "CCCC3333DDDD4444");
        assert!(keys[1].user_id.is_none());
    }

    #[test]
    fn missing_binary_is_unavailable_not_timeout() {
        let keyring = Keyring::new(KeyringConfig {
            binary: "definitely-not-a-real-binary".to_string(),
            ..KeyringConfig::default()
        });
        let err = keyring.version().unwrap_err();
        assert!(matches!(err, Error::KeyringUnavailable(_)));
    }

    #[test]
    fn hung_binary_times_out_and_is_reaped() {
        let keyring = Keyring::new(KeyringConfig {
            binary: "sleep".to_string(),
            list_timeout: Duration::from_millis(200),
            ..KeyringConfig::default()
        });
        // "sleep --version" exits instantly, so probe with run() directly
        let started = Instant::now();
        let err = keyring
            .run(&["30"], None, Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, Error::KeyringTimeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn large_stdin_payload_does_not_block_the_deadline() {
        let keyring = Keyring::new(KeyringConfig {
            binary: "sleep".to_string(),
            ..KeyringConfig::default()
        });
        // "sleep" never reads stdin, so a payload well past the OS pipe
        // buffer would wedge a synchronous write_all forever.
        let payload = vec![b'A'; 1024 * 1024];
        let started = Instant::now();
        let err = keyring
            .run(&["30"], Some(&payload), Duration::from_millis(300))
            .unwrap_err();
        assert!(matches!(err, Error::KeyringTimeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
