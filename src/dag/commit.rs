//! Commit chain: snapshots of (refs, links) stored as canonical objects.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use cid::Cid;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::canon::to_canon_json_bytes;
use super::error::DagError;
use super::link::{LinkEntry, LinkIndex};
use super::refs::RefStore;
use super::safefile::safe_write;
use super::store::{cid_filename, parse_cid, ObjectStore};

pub const COMMIT_VERSION: u32 = 1;

/// A snapshot of all refs and links at a point in time, chained through
/// `parent`. Stored in the object store like any other object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitObject {
    pub v: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// id → textual CID, sorted by id.
    pub refs: BTreeMap<String, String>,
    /// Sorted by (source, target, type).
    pub links: Vec<LinkEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Manages the commit chain. HEAD is a single-line file holding the textual
/// CID of the latest commit.
#[derive(Debug, Clone)]
pub struct CommitLog {
    head_path: PathBuf,
    store: ObjectStore,
    /// DID of the local identity, stamped on every commit. Empty when no
    /// identity is available.
    author: String,
}

impl CommitLog {
    pub fn new(head_path: PathBuf, store: ObjectStore, author: String) -> Self {
        Self {
            head_path,
            store,
            author,
        }
    }

    /// CID of the current HEAD commit, or `None` before the first commit.
    pub fn head(&self) -> Result<Option<Cid>, DagError> {
        let data = match fs::read_to_string(&self.head_path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let text = data.trim();
        if text.is_empty() {
            return Ok(None);
        }
        parse_cid(text).map(Some)
    }

    /// Create a commit from the current state of `refs` and `links`,
    /// store it, and advance HEAD. Returns the new commit's CID.
    pub fn commit(
        &self,
        refs: &RefStore,
        links: &LinkIndex,
        message: &str,
    ) -> Result<Cid, DagError> {
        let mut snapshot = BTreeMap::new();
        for id in refs.list()? {
            match refs.get(&id) {
                Ok(cid) => {
                    snapshot.insert(id, cid_filename(&cid));
                }
                Err(_) => continue,
            }
        }

        let mut all_links = links.all_entries();
        all_links.sort();

        let parent = self
            .head()
            .unwrap_or(None)
            .map(|cid| cid_filename(&cid));

        let commit = CommitObject {
            v: COMMIT_VERSION,
            parent,
            author: self.author.clone(),
            timestamp: OffsetDateTime::now_utc(),
            refs: snapshot,
            links: all_links,
            message: if message.is_empty() {
                None
            } else {
                Some(message.to_string())
            },
        };

        let data = to_canon_json_bytes(&commit)?;
        let cid = self.store.put(&data)?;

        let mut head_line = cid_filename(&cid);
        head_line.push('\n');
        safe_write(&self.head_path, head_line.as_bytes(), 0o644)?;

        Ok(cid)
    }

    pub fn get_commit(&self, cid: &Cid) -> Result<CommitObject, DagError> {
        let data = self.store.get(cid)?;
        serde_json::from_slice(&data).map_err(|err| DagError::decode("commit", err))
    }

    /// Walk the parent chain from HEAD, newest first, for up to `n`
    /// commits. Read or decode failures end the walk silently.
    pub fn log(&self, n: usize) -> Result<Vec<CommitObject>, DagError> {
        let mut current = match self.head()? {
            Some(head) => head,
            None => return Ok(Vec::new()),
        };

        let mut commits = Vec::new();
        for _ in 0..n {
            let commit = match self.get_commit(&current) {
                Ok(commit) => commit,
                Err(_) => break,
            };
            let parent = commit.parent.clone();
            commits.push(commit);

            let Some(parent) = parent else { break };
            current = match parse_cid(&parent) {
                Ok(cid) => cid,
                Err(_) => break,
            };
        }
        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_log(dir: &TempDir) -> (CommitLog, RefStore, LinkIndex) {
        let store = ObjectStore::new(dir.path().join("objects")).unwrap();
        let refs = RefStore::new(dir.path().join("refs")).unwrap();
        let links = LinkIndex::new(dir.path().join("links.jsonl")).unwrap();
        let log = CommitLog::new(
            dir.path().join("HEAD"),
            store,
            "did:key:ztest".to_string(),
        );
        (log, refs, links)
    }

    #[test]
    fn head_is_none_before_first_commit() {
        let dir = TempDir::new().unwrap();
        let (log, _refs, _links) = test_log(&dir);
        assert!(log.head().unwrap().is_none());
        assert!(log.log(10).unwrap().is_empty());
    }

    #[test]
    fn commit_advances_head_and_chains_parents() {
        let dir = TempDir::new().unwrap();
        let (log, refs, links) = test_log(&dir);
        let store = ObjectStore::new(dir.path().join("objects")).unwrap();

        refs.set("a", &store.put(b"one").unwrap()).unwrap();
        let first = log.commit(&refs, &links, "first").unwrap();

        refs.set("b", &store.put(b"two").unwrap()).unwrap();
        let second = log.commit(&refs, &links, "second").unwrap();

        assert_eq!(log.head().unwrap(), Some(second));

        let commits = log.log(10).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].message.as_deref(), Some("second"));
        assert_eq!(commits[0].parent.as_deref(), Some(cid_filename(&first).as_str()));
        assert!(commits[1].parent.is_none());
        assert_eq!(commits[1].refs.len(), 1);
        assert_eq!(commits[0].refs.len(), 2);
    }

    #[test]
    fn commit_snapshots_sorted_links() {
        let dir = TempDir::new().unwrap();
        let (log, refs, links) = test_log(&dir);
        links.add(LinkEntry::new("z", "a", "refs")).unwrap();
        links.add(LinkEntry::new("a", "b", "refs")).unwrap();
        links.add(LinkEntry::new("a", "b", "cites")).unwrap();

        let cid = log.commit(&refs, &links, "links").unwrap();
        let commit = log.get_commit(&cid).unwrap();
        assert_eq!(
            commit.links,
            vec![
                LinkEntry::new("a", "b", "cites"),
                LinkEntry::new("a", "b", "refs"),
                LinkEntry::new("z", "a", "refs"),
            ]
        );
    }

    #[test]
    fn log_respects_requested_depth() {
        let dir = TempDir::new().unwrap();
        let (log, refs, links) = test_log(&dir);
        let store = ObjectStore::new(dir.path().join("objects")).unwrap();

        for i in 0..5 {
            refs.set("n", &store.put(format!("v{i}").as_bytes()).unwrap())
                .unwrap();
            log.commit(&refs, &links, &format!("c{i}")).unwrap();
        }

        let commits = log.log(3).unwrap();
        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0].message.as_deref(), Some("c4"));
        assert_eq!(commits[2].message.as_deref(), Some("c2"));
    }

    #[test]
    fn author_is_stamped() {
        let dir = TempDir::new().unwrap();
        let (log, refs, links) = test_log(&dir);
        let cid = log.commit(&refs, &links, "stamp").unwrap();
        assert_eq!(log.get_commit(&cid).unwrap().author, "did:key:ztest");
    }
}
