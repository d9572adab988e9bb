mod common;

use pastevault::fetch::KeyFetcher;
use pastevault::{
    Error, FetchedKey, KeyKind, KeyRecord, KeyStore, RecipientKind, Resolver,
};
use tempfile::tempdir;

/// Serves one canned armored key for any username.
struct StubFetcher {
    origin: &'static str,
    armored: String,
}

impl StubFetcher {
    fn new(origin: &'static str, armored: String) -> Self {
        Self { origin, armored }
    }
}

impl KeyFetcher for StubFetcher {
    fn origin(&self) -> &'static str {
        self.origin
    }

    fn fetch(&self, name: &str) -> pastevault::Result<FetchedKey> {
        Ok(FetchedKey {
            material: self.armored.clone().into_bytes(),
            username: Some(name.to_string()),
            email: None,
        })
    }
}

/// Always fails, as if the remote user does not exist.
struct FailingFetcher(&'static str);

impl KeyFetcher for FailingFetcher {
    fn origin(&self) -> &'static str {
        self.0
    }

    fn fetch(&self, _name: &str) -> pastevault::Result<FetchedKey> {
        Err(Error::Fetch {
            origin: self.0.to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        })
    }
}

fn open_store(dir: &tempfile::TempDir) -> KeyStore {
    KeyStore::open(dir.path().join("keys.json")).unwrap()
}

fn friend(name: &str, fp: &str) -> KeyRecord {
    KeyRecord::new(KeyKind::Friend, name, "-----BEGIN PUBLIC KEY-----\n...", fp)
}

#[test]
fn plain_name_resolves_to_stored_friend() {
    let dir = tempdir().unwrap();
    let mut store = open_store(&dir);
    store.upsert(friend("alice", "FP-A")).unwrap();

    let resolved = Resolver::new(&mut store).resolve("alice").unwrap();
    assert_eq!(resolved.kind, RecipientKind::Friend);
    assert_eq!(resolved.identifier, "friend:alice");
    assert!(!resolved.auto_fetched);
}

#[test]
fn empty_recipient_is_rejected() {
    let dir = tempdir().unwrap();
    let mut store = open_store(&dir);
    assert!(matches!(
        Resolver::new(&mut store).resolve("  ").unwrap_err(),
        Error::Validation(_)
    ));
}

#[test]
fn unknown_name_suggests_every_avenue() {
    let dir = tempdir().unwrap();
    let mut store = open_store(&dir);

    let err = Resolver::new(&mut store).resolve("nobody").unwrap_err();
    match err {
        Error::KeyNotFound { identifier, hint } => {
            assert_eq!(identifier, "nobody");
            assert!(hint.contains("add-friend"));
            assert!(hint.contains("github:"));
        }
        other => panic!("expected KeyNotFound, got {other:?}"),
    }
}

#[test]
fn auto_fetch_installs_and_marks_the_record() {
    let dir = tempdir().unwrap();
    let (_, public_armored, fingerprint) = common::create_pgp_key("Eve <eve@example.com>");
    let mut store = open_store(&dir);

    let resolved = Resolver::new(&mut store)
        .github_fetcher(StubFetcher::new("github", public_armored))
        .auto_fetch(true)
        .resolve("github:eve")
        .unwrap();

    assert_eq!(resolved.kind, RecipientKind::Github);
    assert_eq!(resolved.identifier, "github:eve");
    assert!(resolved.auto_fetched);
    let record = resolved.key_record.unwrap();
    assert_eq!(record.fingerprint, fingerprint);
    assert_eq!(record.username.as_deref(), Some("eve"));
    assert_eq!(record.email.as_deref(), Some("eve@example.com"));

    // Installed: the next resolution is a plain store hit
    let again = Resolver::new(&mut store).resolve("gh:eve").unwrap();
    assert!(!again.auto_fetched);
}

#[test]
fn failed_fetch_names_the_manual_fallback() {
    let dir = tempdir().unwrap();
    let mut store = open_store(&dir);

    let err = Resolver::new(&mut store)
        .keybase_fetcher(FailingFetcher("keybase"))
        .auto_fetch(true)
        .resolve("keybase:ghost")
        .unwrap_err();
    match err {
        Error::Fetch { origin, reason } => {
            assert_eq!(origin, "keybase");
            assert!(reason.contains("404"));
            assert!(reason.contains("key add keybase:ghost"));
        }
        other => panic!("expected Fetch, got {other:?}"),
    }
}

#[test]
fn without_auto_fetch_the_hint_names_the_fetch_command() {
    let dir = tempdir().unwrap();
    let mut store = open_store(&dir);

    let err = Resolver::new(&mut store).resolve("github:eve").unwrap_err();
    match err {
        Error::KeyNotFound { identifier, hint } => {
            assert_eq!(identifier, "github:eve");
            assert!(hint.contains("key fetch github:eve"));
        }
        other => panic!("expected KeyNotFound, got {other:?}"),
    }
}

#[test]
fn prefix_beats_a_literal_local_name() {
    let dir = tempdir().unwrap();
    let mut store = open_store(&dir);
    // A friend whose name happens to look like a prefixed specifier
    store.upsert(friend("github:alice", "FP-ODD")).unwrap();

    // The prefix routes to the github namespace, which is empty
    let err = Resolver::new(&mut store).resolve("github:alice").unwrap_err();
    assert!(matches!(err, Error::KeyNotFound { .. }));
}

#[test]
fn email_and_fingerprint_resolve_pgp_keys() {
    let dir = tempdir().unwrap();
    let (_, public_armored, fingerprint) = common::create_pgp_key("Dan <dan@example.com>");
    let mut store = open_store(&dir);

    let mut record = KeyRecord::new(KeyKind::Pgp, "dan", public_armored, fingerprint.clone());
    record.email = Some("dan@example.com".to_string());
    store.upsert(record).unwrap();

    let by_email = Resolver::new(&mut store).resolve("dan@example.com").unwrap();
    assert_eq!(by_email.identifier, "pgp:dan");

    // Fingerprint suffix, case-insensitive via 0x normalization
    let suffix = fingerprint[fingerprint.len() - 16..].to_lowercase();
    let by_fp = Resolver::new(&mut store)
        .resolve(&format!("0x{suffix}"))
        .unwrap();
    assert_eq!(by_fp.identifier, "pgp:dan");
}

#[test]
fn shared_email_still_resolves_the_pgp_key() {
    let dir = tempdir().unwrap();
    let (_, public_armored, fingerprint) = common::create_pgp_key("Dan <dan@example.com>");
    let mut store = open_store(&dir);

    // A friend record carries the same email as an imported PGP key
    let mut dan_friend = friend("dan-rsa", "FP-DAN-RSA");
    dan_friend.email = Some("dan@example.com".to_string());
    store.upsert(dan_friend).unwrap();

    let mut record = KeyRecord::new(KeyKind::Pgp, "dan", public_armored, fingerprint);
    record.email = Some("dan@example.com".to_string());
    store.upsert(record).unwrap();

    // Email routes into the PGP namespace; the friend cannot shadow it
    let by_email = Resolver::new(&mut store).resolve("dan@example.com").unwrap();
    assert_eq!(by_email.identifier, "pgp:dan");
}

#[test]
fn group_expands_each_member() {
    let dir = tempdir().unwrap();
    let mut store = open_store(&dir);
    store.upsert(friend("alice", "FP-A")).unwrap();
    store.upsert(friend("bob", "FP-B")).unwrap();
    store
        .set_group("team", vec!["alice".to_string(), "bob".to_string()])
        .unwrap();

    let resolved = Resolver::new(&mut store).resolve("team").unwrap();
    assert_eq!(resolved.kind, RecipientKind::Group);
    assert_eq!(resolved.identifier, "group:team");
    let members = resolved.members.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].identifier, "friend:alice");
    assert_eq!(members[1].identifier, "friend:bob");
}

#[test]
fn group_with_unresolvable_member_fails_whole() {
    let dir = tempdir().unwrap();
    let mut store = open_store(&dir);
    store.upsert(friend("alice", "FP-A")).unwrap();
    store
        .set_group("team", vec!["alice".to_string(), "ghost".to_string()])
        .unwrap();

    let err = Resolver::new(&mut store).resolve("team").unwrap_err();
    assert!(matches!(err, Error::KeyNotFound { .. }));
}

#[test]
fn nested_groups_are_rejected() {
    let dir = tempdir().unwrap();
    let mut store = open_store(&dir);
    store.upsert(friend("alice", "FP-A")).unwrap();
    store.set_group("inner", vec!["alice".to_string()]).unwrap();
    store.set_group("outer", vec!["inner".to_string()]).unwrap();

    let err = Resolver::new(&mut store).resolve("outer").unwrap_err();
    match err {
        Error::Validation(msg) => assert!(msg.contains("nested")),
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn resolve_many_flattens_and_deduplicates() {
    let dir = tempdir().unwrap();
    let mut store = open_store(&dir);
    store.upsert(friend("alice", "FP-A")).unwrap();
    store.upsert(friend("bob", "FP-B")).unwrap();
    store
        .set_group("team", vec!["alice".to_string(), "bob".to_string()])
        .unwrap();

    // alice appears via the group and directly; she is kept once, in
    // first-seen order
    let resolved = Resolver::new(&mut store)
        .resolve_many(&["team", "alice", "bob"])
        .unwrap();
    let ids: Vec<&str> = resolved.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids, ["friend:alice", "friend:bob"]);
}
