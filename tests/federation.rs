//! Feed-layer behavior that runs without a live IPFS daemon: identity
//! vectors, follow-list management, and post mirroring.

use std::fs;
use std::sync::Arc;

use memex::{
    create_post, decode_did_key, did_to_ipns_name, encode_did_key, petname_from_did, sign_post,
    verify_post, FeedEntry, FeedError, FeedIndex, FeedManager, Identity, KuboClient, Repository,
};
use tempfile::TempDir;

const TEST_DID: &str = "did:key:z6MkehRgf7yJbgaGfYsdoAsKdBPE3dj2CYhowQdcjqSJgvVd";
const OTHER_DID: &str = "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK";

fn offline_manager(dir: &TempDir) -> (Arc<Repository>, FeedManager) {
    let repo = Arc::new(Repository::open_with_author(dir.path(), String::new()).unwrap());
    let identity = Identity::generate_at(&dir.path().join("identity.json")).unwrap();
    // nothing listens here; only offline operations are exercised
    let kubo = KuboClient::new("http://127.0.0.1:1/api/v0").unwrap();
    let manager = FeedManager::new(kubo, identity, Arc::clone(&repo));
    (repo, manager)
}

#[test]
fn did_and_ipns_known_vectors_line_up() {
    let public_key = decode_did_key(TEST_DID).unwrap();
    assert_eq!(encode_did_key(&public_key), TEST_DID);
    assert_eq!(
        did_to_ipns_name(TEST_DID).unwrap(),
        "k51qzi5uqu5dg9ufswxt229ntzdy7p4125xzv5rtyjso89ajdujg6csfxcj260"
    );
    assert_eq!(petname_from_did(TEST_DID), "rare-frost");
    assert_eq!(petname_from_did(OTHER_DID), "clear-dune");
}

#[test]
fn follow_assigns_petname_and_refuses_duplicates() {
    let dir = TempDir::new().unwrap();
    let (_repo, manager) = offline_manager(&dir);

    manager.follow(TEST_DID, "").unwrap();

    let entries = manager.list_following();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].did, TEST_DID);
    assert_eq!(entries[0].alias, "rare-frost");
    assert!(entries[0].last_seen_cids.is_empty());
    assert!(!entries[0].added_at.is_empty());

    assert!(matches!(
        manager.follow(TEST_DID, "other-name"),
        Err(FeedError::AlreadyFollowing(_))
    ));
}

#[test]
fn follow_rejects_non_did_key_identifiers() {
    let dir = TempDir::new().unwrap();
    let (_repo, manager) = offline_manager(&dir);

    assert!(matches!(
        manager.follow("did:web:example.com", ""),
        Err(FeedError::InvalidDid(_))
    ));
    assert!(matches!(
        manager.follow("not a did", ""),
        Err(FeedError::InvalidDid(_))
    ));
}

#[test]
fn unfollow_works_by_did_or_alias() {
    let dir = TempDir::new().unwrap();
    let (_repo, manager) = offline_manager(&dir);

    manager.follow(TEST_DID, "friend").unwrap();
    manager.follow(OTHER_DID, "").unwrap();

    manager.unfollow("friend").unwrap();
    assert_eq!(manager.list_following().len(), 1);

    manager.unfollow(OTHER_DID).unwrap();
    assert!(manager.list_following().is_empty());

    assert!(matches!(
        manager.unfollow("nobody"),
        Err(FeedError::NotFollowing(_))
    ));
}

#[test]
fn follow_list_persists_as_pretty_json() {
    let dir = TempDir::new().unwrap();
    let (_repo, manager) = offline_manager(&dir);

    manager.follow(TEST_DID, "friend").unwrap();

    let path = dir.path().join(".mx").join("dagit").join("following.json");
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains('\n'), "follow list should be pretty-printed");

    let entries: Vec<memex::FollowEntry> = serde_json::from_str(&text).unwrap();
    assert_eq!(entries[0].alias, "friend");
}

#[test]
fn ingest_post_mirrors_once_per_cid() {
    let dir = TempDir::new().unwrap();
    let (repo, manager) = offline_manager(&dir);

    let post = create_post(TEST_DID, "hello fediverse", Vec::new(), vec!["intro".into()]);
    let cid = "bafyreigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

    manager.ingest_post(&post, cid);
    manager.ingest_post(&post, cid);

    let ids = repo.list_nodes(0).unwrap();
    assert_eq!(ids, vec![format!("post:{}", &cid[..16])]);

    let node = repo.get_node(&ids[0]).unwrap();
    assert_eq!(node.node_type, "Post");
    assert_eq!(node.content.as_deref(), Some(b"hello fediverse".as_slice()));
    let meta = node.meta.unwrap();
    assert_eq!(meta["ipfs_cid"], cid);
    assert_eq!(meta["author"], TEST_DID);
    assert_eq!(meta["verified"], true);
    assert_eq!(meta["tags"][0], "intro");
}

#[test]
fn post_ids_by_author_filters_on_metadata() {
    let dir = TempDir::new().unwrap();
    let (_repo, manager) = offline_manager(&dir);

    let mine = create_post(TEST_DID, "mine", Vec::new(), Vec::new());
    let theirs = create_post(OTHER_DID, "theirs", Vec::new(), Vec::new());
    manager.ingest_post(&mine, "bafymine000000000000");
    manager.ingest_post(&theirs, "bafytheirs0000000000");

    let ids = manager.post_ids_by_author(TEST_DID);
    assert_eq!(ids, vec!["post:bafymine00000000"]);
}

#[test]
fn own_post_ids_come_from_the_local_feed_index() {
    let dir = TempDir::new().unwrap();
    let (_repo, manager) = offline_manager(&dir);

    let feed = FeedIndex {
        author: TEST_DID.to_string(),
        posts: vec![
            FeedEntry {
                cid: "bafynewest00000000001111".to_string(),
                timestamp: "2024-01-02T00:00:00Z".to_string(),
            },
            FeedEntry {
                cid: "bafyolder000000000002222".to_string(),
                timestamp: "2024-01-01T00:00:00Z".to_string(),
            },
        ],
    };
    let dagit = dir.path().join(".mx").join("dagit");
    fs::create_dir_all(&dagit).unwrap();
    fs::write(
        dagit.join("feed.json"),
        serde_json::to_vec_pretty(&feed).unwrap(),
    )
    .unwrap();

    assert_eq!(
        manager.own_post_ids(),
        vec!["post:bafynewest000000", "post:bafyolder0000000"]
    );
}

#[test]
fn check_feeds_without_follows_reports_it() {
    let dir = TempDir::new().unwrap();
    let (_repo, manager) = offline_manager(&dir);
    assert_eq!(manager.check_feeds(), "Not following anyone.");
}

#[test]
fn signed_posts_from_a_loaded_identity_verify() {
    let dir = TempDir::new().unwrap();
    let identity = Identity::generate_at(&dir.path().join("identity.json")).unwrap();

    let post = create_post(&identity.did, "fresh identity post", Vec::new(), Vec::new());
    let signed = sign_post(&post, &identity.signing_key().unwrap()).unwrap();
    assert!(verify_post(&signed).unwrap());

    let mut tampered = signed.clone();
    tampered.tags = vec!["sneaky".to_string()];
    assert!(!verify_post(&tampered).unwrap());
}
