//! Remote key fetching (GitHub, Keybase, PGP keyservers).
//!
//! Fetchers return raw public key bytes plus best-effort identity
//! metadata, or fail with a reason. The resolver treats them as pluggable
//! collaborators so tests can substitute canned responses; the HTTP
//! implementations here require the `network` feature.

use crate::error::{Error, Result};
use crate::types::FetchedKey;

/// A source of public keys for identities not yet in the local store.
pub trait KeyFetcher {
    /// Short name used in errors and canonical identifiers
    /// ("github", "keybase", "keyserver").
    fn origin(&self) -> &'static str;

    /// Fetch the public key for a username (or email/fingerprint, for
    /// keyserver fetchers).
    fn fetch(&self, name: &str) -> Result<FetchedKey>;
}

#[cfg(feature = "network")]
fn http_client(origin: &'static str) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .user_agent(concat!("pastevault/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Fetch {
            origin: origin.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(feature = "network")]
fn http_get(origin: &'static str, url: &str) -> Result<Vec<u8>> {
    let client = http_client(origin)?;
    let response = client.get(url).send().map_err(|e| Error::Fetch {
        origin: origin.to_string(),
        reason: e.to_string(),
    })?;

    if !response.status().is_success() {
        return Err(Error::Fetch {
            origin: origin.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().map_err(|e| Error::Fetch {
        origin: origin.to_string(),
        reason: e.to_string(),
    })?;
    Ok(bytes.to_vec())
}

/// Fetches a GitHub user's published GPG key from
/// `https://github.com/<user>.gpg`.
#[cfg(feature = "network")]
#[derive(Debug, Default, Clone)]
pub struct GithubFetcher;

#[cfg(feature = "network")]
impl KeyFetcher for GithubFetcher {
    fn origin(&self) -> &'static str {
        "github"
    }

    fn fetch(&self, name: &str) -> Result<FetchedKey> {
        let url = format!("https://github.com/{name}.gpg");
        let material = http_get(self.origin(), &url)?;

        // GitHub serves an empty armor block for users with no key
        let summary = crate::openpgp::summarize_cert(&material).map_err(|_| Error::Fetch {
            origin: self.origin().to_string(),
            reason: format!("GitHub user '{name}' has no published GPG key"),
        })?;

        Ok(FetchedKey {
            material,
            username: Some(name.to_string()),
            email: summary
                .user_ids
                .first()
                .and_then(|uid| crate::internal::extract_email(uid)),
        })
    }
}

/// Fetches a Keybase user's PGP key from
/// `https://keybase.io/<user>/pgp_keys.asc`.
#[cfg(feature = "network")]
#[derive(Debug, Default, Clone)]
pub struct KeybaseFetcher;

#[cfg(feature = "network")]
impl KeyFetcher for KeybaseFetcher {
    fn origin(&self) -> &'static str {
        "keybase"
    }

    fn fetch(&self, name: &str) -> Result<FetchedKey> {
        let url = format!("https://keybase.io/{name}/pgp_keys.asc");
        let material = http_get(self.origin(), &url)?;

        let summary = crate::openpgp::summarize_cert(&material).map_err(|_| Error::Fetch {
            origin: self.origin().to_string(),
            reason: format!("Keybase user '{name}' has no PGP key"),
        })?;

        Ok(FetchedKey {
            material,
            username: Some(name.to_string()),
            email: summary
                .user_ids
                .first()
                .and_then(|uid| crate::internal::extract_email(uid)),
        })
    }
}

/// Fetches keys from a VKS keyserver (default `keys.openpgp.org`) by email
/// address or fingerprint.
#[cfg(feature = "network")]
#[derive(Debug, Clone)]
pub struct KeyserverFetcher {
    server: String,
}

#[cfg(feature = "network")]
impl Default for KeyserverFetcher {
    fn default() -> Self {
        Self {
            server: "https://keys.openpgp.org".to_string(),
        }
    }
}

#[cfg(feature = "network")]
impl KeyserverFetcher {
    /// Use a non-default keyserver.
    pub fn with_server(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }
}

#[cfg(feature = "network")]
impl KeyFetcher for KeyserverFetcher {
    fn origin(&self) -> &'static str {
        "keyserver"
    }

    fn fetch(&self, name: &str) -> Result<FetchedKey> {
        // Email lookups and fingerprint lookups use different VKS routes
        let url = if name.contains('@') {
            format!("{}/vks/v1/by-email/{}", self.server, name)
        } else {
            let fingerprint = name.trim_start_matches("0x").to_uppercase();
            format!("{}/vks/v1/by-fingerprint/{}", self.server, fingerprint)
        };
        let material = http_get(self.origin(), &url)?;

        let summary = crate::openpgp::summarize_cert(&material).map_err(|e| Error::Fetch {
            origin: self.origin().to_string(),
            reason: format!("keyserver returned an unparseable key: {e}"),
        })?;

        Ok(FetchedKey {
            material,
            username: None,
            email: summary
                .user_ids
                .first()
                .and_then(|uid| crate::internal::extract_email(uid)),
        })
    }
}
