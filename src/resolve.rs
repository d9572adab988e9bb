//! Recipient resolution.
//!
//! Turns a free-form recipient string (`alice`, `gh:bob`,
//! `user@example.com`, `0xABCD1234`, a group name) into a concrete key
//! record or an expanded group, with an auto-fetch fallback for GitHub and
//! Keybase identities.
//!
//! Resolution order: group check, prefix normalization, type detection,
//! store lookup, auto-fetch. Canonical prefixes always win over literal
//! local names with the same text — a friend literally named
//! `github:alice` can never shadow the GitHub user `alice`.

use tracing::debug;

use crate::error::{Error, Result};
use crate::fetch::KeyFetcher;
use crate::keystore::KeyStore;
use crate::types::{FetchedKey, KeyKind, KeyRecord, RecipientKind, ResolvedRecipient};

/// What a recipient string looks like, before consulting the store.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Detected {
    /// `github:<user>` (or `gh:`)
    Github(String),
    /// `keybase:<user>` (or `kb:`)
    Keybase(String),
    /// `pgp:<something>` explicit prefix
    Pgp(String),
    /// contains `@` and `.`: a PGP key known by email
    PgpEmail(String),
    /// `0x` + hex: a PGP key known by fingerprint
    PgpFingerprint(String),
    /// anything else: resolved purely by store lookup
    Unknown(String),
}

fn detect(input: &str) -> Detected {
    // Short aliases rewrite to canonical prefixes first
    let normalized = if let Some(rest) = input.strip_prefix("gh:") {
        format!("github:{rest}")
    } else if let Some(rest) = input.strip_prefix("kb:") {
        format!("keybase:{rest}")
    } else {
        input.to_string()
    };

    if let Some(name) = normalized.strip_prefix("github:") {
        return Detected::Github(name.to_string());
    }
    if let Some(name) = normalized.strip_prefix("keybase:") {
        return Detected::Keybase(name.to_string());
    }
    if let Some(name) = normalized.strip_prefix("pgp:") {
        return Detected::Pgp(name.to_string());
    }
    if normalized.contains('@') && normalized.contains('.') {
        return Detected::PgpEmail(normalized);
    }
    if let Some(hex) = normalized.strip_prefix("0x") {
        if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Detected::PgpFingerprint(hex.to_uppercase());
        }
    }
    Detected::Unknown(normalized)
}

/// Resolves recipient specifiers against the key store, optionally
/// fetching GitHub/Keybase keys that are not yet local.
///
/// Holds the store mutably: a successful auto-fetch inserts the new record
/// and persists before resolution returns.
pub struct Resolver<'a> {
    store: &'a mut KeyStore,
    github: Option<Box<dyn KeyFetcher>>,
    keybase: Option<Box<dyn KeyFetcher>>,
    auto_fetch: bool,
}

impl<'a> Resolver<'a> {
    /// A resolver with no fetchers: store lookups only.
    pub fn new(store: &'a mut KeyStore) -> Self {
        Self {
            store,
            github: None,
            keybase: None,
            auto_fetch: false,
        }
    }

    /// A resolver with the default HTTP fetchers and auto-fetch enabled.
    #[cfg(feature = "network")]
    pub fn with_default_fetchers(store: &'a mut KeyStore) -> Self {
        Self::new(store)
            .github_fetcher(crate::fetch::GithubFetcher)
            .keybase_fetcher(crate::fetch::KeybaseFetcher)
            .auto_fetch(true)
    }

    /// Install a GitHub fetcher.
    pub fn github_fetcher(mut self, fetcher: impl KeyFetcher + 'static) -> Self {
        self.github = Some(Box::new(fetcher));
        self
    }

    /// Install a Keybase fetcher.
    pub fn keybase_fetcher(mut self, fetcher: impl KeyFetcher + 'static) -> Self {
        self.keybase = Some(Box::new(fetcher));
        self
    }

    /// Enable or disable the auto-fetch fallback.
    pub fn auto_fetch(mut self, enabled: bool) -> Self {
        self.auto_fetch = enabled;
        self
    }

    /// Resolve one recipient specifier.
    ///
    /// Groups resolve to `kind = Group` with each member resolved
    /// individually; a group with zero members is a hard failure, and a
    /// member that is itself a group is rejected (one level only).
    pub fn resolve(&mut self, input: &str) -> Result<ResolvedRecipient> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::Validation("recipient must not be empty".to_string()));
        }

        // Groups are checked before any prefix handling
        if let Some(members) = self.store.group(input).map(<[String]>::to_vec) {
            if members.is_empty() {
                return Err(Error::Validation(format!(
                    "group '{input}' has no members"
                )));
            }
            let mut resolved_members = Vec::with_capacity(members.len());
            for member in &members {
                if self.store.group(member).is_some() {
                    return Err(Error::Validation(format!(
                        "group '{input}' contains group '{member}': nested groups are not supported"
                    )));
                }
                resolved_members.push(self.resolve(member)?);
            }
            return Ok(ResolvedRecipient {
                kind: RecipientKind::Group,
                identifier: format!("group:{input}"),
                original_input: input.to_string(),
                key_record: None,
                members: Some(resolved_members),
                auto_fetched: false,
            });
        }

        match detect(input) {
            Detected::Github(name) => self.resolve_remote(KeyKind::Github, &name, input),
            Detected::Keybase(name) => self.resolve_remote(KeyKind::Keybase, &name, input),
            Detected::Pgp(name) => self.resolve_pgp(&name, input),
            Detected::PgpEmail(email) => self.resolve_pgp(&email, input),
            Detected::PgpFingerprint(hex) => self.resolve_pgp_fingerprint(&hex, input),
            Detected::Unknown(name) => self.resolve_unknown(&name, input),
        }
    }

    /// Resolve each entry, expand groups one level, and deduplicate by
    /// final identifier, preserving first-seen order.
    pub fn resolve_many(&mut self, inputs: &[&str]) -> Result<Vec<ResolvedRecipient>> {
        let mut out: Vec<ResolvedRecipient> = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for input in inputs {
            let resolved = self.resolve(input)?;
            let flattened = match resolved.members {
                Some(members) => members,
                None => vec![resolved],
            };
            for recipient in flattened {
                if seen.insert(recipient.identifier.clone()) {
                    out.push(recipient);
                }
            }
        }

        Ok(out)
    }

    fn resolve_remote(
        &mut self,
        kind: KeyKind,
        name: &str,
        original: &str,
    ) -> Result<ResolvedRecipient> {
        if name.is_empty() {
            return Err(Error::Validation(format!(
                "'{original}' is missing a username"
            )));
        }

        if let Some(record) = self.store.find_by_kind(kind, name) {
            return Ok(ResolvedRecipient::from_record(record.clone(), original, false));
        }

        if self.auto_fetch {
            let fetcher = match kind {
                KeyKind::Github => self.github.as_deref(),
                KeyKind::Keybase => self.keybase.as_deref(),
                _ => None,
            };
            if let Some(fetcher) = fetcher {
                debug!(kind = %kind, name, "no local key, auto-fetching");
                let fetched = fetcher.fetch(name).map_err(|e| match e {
                    Error::Fetch { origin, reason } => Error::Fetch {
                        origin,
                        reason: format!(
                            "{reason}. Check the username, or add the key manually \
                             with `key add {}:{name}`",
                            kind.as_str()
                        ),
                    },
                    other => other,
                })?;
                self.install_fetched(kind, name, fetched)?;
                // One retry against the store after installing
                if let Some(record) = self.store.find_by_kind(kind, name) {
                    return Ok(ResolvedRecipient::from_record(record.clone(), original, true));
                }
            }
        }

        Err(Error::not_found(
            kind.canonical_id(name),
            format!("Fetch it with `key fetch {}:{name}`.", kind.as_str()),
        ))
    }

    fn resolve_pgp(&mut self, name: &str, original: &str) -> Result<ResolvedRecipient> {
        if let Some(record) = self.store.find_pgp(name) {
            return Ok(ResolvedRecipient::from_record(record.clone(), original, false));
        }
        Err(Error::not_found(
            format!("pgp:{name}"),
            format!("Import it from a keyserver with `key import-pgp {name}`."),
        ))
    }

    fn resolve_pgp_fingerprint(&mut self, hex: &str, original: &str) -> Result<ResolvedRecipient> {
        let hit = self
            .store
            .database()
            .iter()
            .find(|r| r.kind == KeyKind::Pgp && r.fingerprint.to_uppercase().ends_with(hex));
        if let Some(record) = hit {
            return Ok(ResolvedRecipient::from_record(record.clone(), original, false));
        }
        Err(Error::not_found(
            format!("0x{hex}"),
            format!("Import it from a keyserver with `key import-pgp 0x{hex}`."),
        ))
    }

    fn resolve_unknown(&mut self, name: &str, original: &str) -> Result<ResolvedRecipient> {
        if let Some(record) = self.store.find_any(name) {
            return Ok(ResolvedRecipient::from_record(record.clone(), original, false));
        }
        Err(Error::not_found(
            name.to_string(),
            "Add a friend key with `key add-friend`, use a `github:`/`keybase:` \
             prefix, or create a group with `group create`."
                .to_string(),
        ))
    }

    fn install_fetched(&mut self, kind: KeyKind, name: &str, fetched: FetchedKey) -> Result<()> {
        let summary = crate::openpgp::summarize_cert(&fetched.material)?;
        let material = String::from_utf8(fetched.material)
            .map_err(|_| Error::Parse("fetched key is not ASCII armor".to_string()))?;

        let mut record = KeyRecord::new(kind, name, material, summary.fingerprint);
        record.username = fetched.username;
        record.email = fetched
            .email
            .or_else(|| summary.user_ids.first().and_then(|u| crate::internal::extract_email(u)));
        self.store.upsert(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_normalizes_short_aliases() {
        assert_eq!(detect("gh:alice"), Detected::Github("alice".to_string()));
        assert_eq!(detect("kb:bob"), Detected::Keybase("bob".to_string()));
    }

    #[test]
    fn detect_email_and_fingerprint() {
        assert_eq!(
            detect("user@example.com"),
            Detected::PgpEmail("user@example.com".to_string())
        );
        assert_eq!(
            detect("0xABCD1234"),
            Detected::PgpFingerprint("ABCD1234".to_string())
        );
        // 0x with no hex after it is just an odd name
        assert_eq!(detect("0x"), Detected::Unknown("0x".to_string()));
    }

    #[test]
    fn detect_prefix_wins_over_pattern() {
        assert_eq!(
            detect("github:user@example.com"),
            Detected::Github("user@example.com".to_string())
        );
    }
}
