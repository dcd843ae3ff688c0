//! Repository facade over the Merkle DAG store.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::canon::to_canon_json_bytes;
use super::coaccess::{CoAccessIndex, DEFAULT_ACCESS_WINDOW};
use super::cochange::{CoChangeIndex, DEFAULT_CHANGE_WINDOW};
use super::commit::CommitLog;
use super::error::DagError;
use super::identity::Identity;
use super::link::{LinkEntry, LinkIndex};
use super::node::{NodeEnvelope, ENVELOPE_VERSION};
use super::refs::RefStore;
use super::related::RelatednessIndex;
use super::search::SearchIndex;
use super::store::{cid_filename, ObjectStore};
use crate::paths;

/// The top-level handle to a repository rooted at a directory.
///
/// Subcomponents use interior locking, so a shared `Repository` can serve
/// concurrent readers and writers; per-ID mutation ordering comes from each
/// operation committing before it returns.
pub struct Repository {
    root: PathBuf,
    pub store: ObjectStore,
    pub refs: RefStore,
    pub links: LinkIndex,
    pub search: SearchIndex,
    pub commits: CommitLog,
    pub co_access: Arc<CoAccessIndex>,
    pub co_change: Arc<CoChangeIndex>,
    pub related: RelatednessIndex,
}

impl Repository {
    /// Open or create a repository, loading the shared identity for commit
    /// authorship. Identity trouble is a warning, not a failure.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, DagError> {
        let author = match Identity::load() {
            Ok(identity) => identity.did,
            Err(err) => {
                tracing::warn!("identity warning: {err}");
                String::new()
            }
        };
        Self::open_with_author(root, author)
    }

    /// Open or create a repository with an explicit commit author DID
    /// (empty for none).
    pub fn open_with_author(root: impl AsRef<Path>, author: String) -> Result<Self, DagError> {
        let root = root.as_ref().to_path_buf();
        let mx = paths::mx_dir(&root);
        fs::create_dir_all(&mx)?;

        let meta_path = paths::meta_path(&mx);
        if !meta_path.exists() {
            let created = OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default();
            let meta = json!({"version": 1, "created": created});
            fs::write(&meta_path, serde_json::to_vec_pretty(&meta).unwrap_or_default())?;
        }

        let store = ObjectStore::new(paths::objects_dir(&mx))?;
        let refs = RefStore::new(paths::refs_dir(&mx))?;
        let links = LinkIndex::new(paths::links_path(&mx))?;
        let search = SearchIndex::new();
        let commits = CommitLog::new(paths::head_path(&mx), store.clone(), author);

        let co_access = Arc::new(CoAccessIndex::new(
            &paths::access_log_path(&mx),
            DEFAULT_ACCESS_WINDOW,
        ));
        let co_change = Arc::new(CoChangeIndex::new(commits.clone(), DEFAULT_CHANGE_WINDOW));
        co_change.build();
        let related = RelatednessIndex::new(Arc::clone(&co_access), Arc::clone(&co_change));

        let repo = Self {
            root,
            store,
            refs,
            links,
            search,
            commits,
            co_access,
            co_change,
            related,
        };
        repo.rebuild_search_index()?;
        Ok(repo)
    }

    /// Path to the `.mx/` data directory.
    pub fn mx_dir(&self) -> PathBuf {
        paths::mx_dir(&self.root)
    }

    /// Commit after a successful mutation. Commits are derived state, so
    /// failures warn instead of propagating.
    fn commit_after(&self, message: &str) {
        if let Err(err) = self.commits.commit(&self.refs, &self.links, message) {
            tracing::warn!("commit warning: {err}");
        }
    }

    /// Scan all refs and index every live node.
    fn rebuild_search_index(&self) -> Result<(), DagError> {
        for id in self.refs.list()? {
            let Ok(node) = self.get_envelope(&id) else {
                continue; // skip broken refs
            };
            if !node.deleted {
                self.search.index_node(&id, &node);
            }
        }
        Ok(())
    }

    /// Resolve a ref to its envelope, tombstones included.
    fn get_envelope(&self, id: &str) -> Result<NodeEnvelope, DagError> {
        let cid = self.refs.get(id)?;
        let data = self.store.get(&cid)?;
        serde_json::from_slice(&data).map_err(|err| DagError::decode("node", err))
    }

    fn store_envelope(&self, node: &NodeEnvelope) -> Result<(), DagError> {
        let data = to_canon_json_bytes(node)?;
        let cid = self.store.put(&data)?;
        self.refs.set(&node.id, &cid)?;
        Ok(())
    }

    /// Create a new node and bind its ref.
    pub fn create_node(
        &self,
        id: &str,
        node_type: &str,
        content: Option<Vec<u8>>,
        meta: Option<Map<String, Value>>,
    ) -> Result<NodeEnvelope, DagError> {
        let now = OffsetDateTime::now_utc();
        let node = NodeEnvelope {
            v: ENVELOPE_VERSION,
            id: id.to_string(),
            node_type: node_type.to_string(),
            content,
            meta,
            created: now,
            modified: now,
            prev: None,
            deleted: false,
        };

        self.store_envelope(&node)?;
        self.search.index_node(id, &node);
        self.commit_after(&format!("create {id}"));
        Ok(node)
    }

    /// Retrieve a live node by ID.
    pub fn get_node(&self, id: &str) -> Result<NodeEnvelope, DagError> {
        let node = self.get_envelope(id)?;
        if node.deleted {
            return Err(DagError::Deleted(id.to_string()));
        }
        Ok(node)
    }

    /// All live node IDs. Limit 0 means no cap.
    pub fn list_nodes(&self, limit: usize) -> Result<Vec<String>, DagError> {
        let mut result = Vec::new();
        for id in self.refs.list()? {
            match self.get_envelope(&id) {
                Ok(node) if !node.deleted => result.push(id),
                _ => continue,
            }
        }
        if limit > 0 && result.len() > limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    /// Patch a node's metadata, producing a new version. A null value
    /// removes the key; anything else overwrites it.
    pub fn update_node(
        &self,
        id: &str,
        meta_updates: Map<String, Value>,
    ) -> Result<NodeEnvelope, DagError> {
        let current = self.get_envelope(id)?;
        if current.deleted {
            return Err(DagError::Deleted(id.to_string()));
        }
        let prev = self.refs.get(id).ok().map(|cid| cid_filename(&cid));

        let mut meta = current.meta.unwrap_or_default();
        for (key, value) in meta_updates {
            if value.is_null() {
                meta.remove(&key);
            } else {
                meta.insert(key, value);
            }
        }

        let node = NodeEnvelope {
            v: ENVELOPE_VERSION,
            id: id.to_string(),
            node_type: current.node_type,
            content: current.content,
            meta: Some(meta),
            created: current.created,
            modified: OffsetDateTime::now_utc(),
            prev,
            deleted: false,
        };

        self.store_envelope(&node)?;
        self.search.remove_node(id);
        self.search.index_node(id, &node);
        self.commit_after(&format!("update meta {id}"));
        Ok(node)
    }

    /// Replace a node's content, producing a new version.
    pub fn update_content(&self, id: &str, content: Vec<u8>) -> Result<NodeEnvelope, DagError> {
        let current = self.get_envelope(id)?;
        if current.deleted {
            return Err(DagError::Deleted(id.to_string()));
        }
        let prev = self.refs.get(id).ok().map(|cid| cid_filename(&cid));

        let node = NodeEnvelope {
            v: ENVELOPE_VERSION,
            id: id.to_string(),
            node_type: current.node_type,
            content: Some(content),
            meta: current.meta,
            created: current.created,
            modified: OffsetDateTime::now_utc(),
            prev,
            deleted: false,
        };

        self.store_envelope(&node)?;
        self.search.remove_node(id);
        self.search.index_node(id, &node);
        self.commit_after(&format!("update content {id}"));
        Ok(node)
    }

    /// Soft delete writes a tombstone that preserves type, metadata, and
    /// history; `force` removes the ref outright.
    pub fn delete_node(&self, id: &str, force: bool) -> Result<(), DagError> {
        if force {
            self.search.remove_node(id);
            self.refs.delete(id)?;
            self.commit_after(&format!("delete {id}"));
            return Ok(());
        }

        let current = self.get_envelope(id)?;
        let prev = self.refs.get(id).ok().map(|cid| cid_filename(&cid));

        let tombstone = NodeEnvelope {
            v: ENVELOPE_VERSION,
            id: id.to_string(),
            node_type: current.node_type,
            content: None,
            meta: current.meta,
            created: current.created,
            modified: OffsetDateTime::now_utc(),
            prev,
            deleted: true,
        };

        self.store_envelope(&tombstone)?;
        self.search.remove_node(id);
        self.commit_after(&format!("delete {id}"));
        Ok(())
    }

    /// Create a typed link between two node IDs.
    pub fn create_link(&self, source: &str, target: &str, link_type: &str) -> Result<(), DagError> {
        self.links
            .add(LinkEntry::new(source, target, link_type))?;
        self.commit_after(&format!("link {source} -[{link_type}]-> {target}"));
        Ok(())
    }

    /// All links involving the given node.
    pub fn get_links(&self, id: &str) -> Vec<LinkEntry> {
        self.links.all_links(id)
    }

    /// Content-address raw content into a `Source` node. Returns the
    /// stable `sha256:<hex>` ID and whether a node was created.
    pub fn ingest(&self, content: &str, format: &str) -> Result<(String, bool), DagError> {
        let digest = Sha256::digest(content.as_bytes());
        let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        let id = format!("sha256:{hex}");

        if self.refs.has(&id) {
            return Ok((id, false));
        }

        let mut meta = Map::new();
        meta.insert("format".to_string(), json!(format));
        meta.insert("size_bytes".to_string(), json!(content.len()));

        self.create_node(&id, "Source", Some(content.as_bytes().to_vec()), Some(meta))?;
        Ok((id, true))
    }

    /// Full-text search, materialized to envelopes. Never fails; missing
    /// or tombstoned hits are dropped.
    pub fn search_nodes(&self, query: &str, limit: usize) -> Vec<NodeEnvelope> {
        self.search
            .search(query, limit)
            .iter()
            .filter_map(|id| self.get_node(id).ok())
            .collect()
    }

    /// Nodes of a given type, materialized to envelopes.
    pub fn filter_nodes(&self, node_type: &str, limit: usize) -> Vec<NodeEnvelope> {
        self.search
            .filter_by_type(node_type, limit)
            .iter()
            .filter_map(|id| self.get_node(id).ok())
            .collect()
    }

    /// Breadth-first traversal following links in both directions, up to
    /// `depth` hops from `start`.
    pub fn traverse(&self, start: &str, depth: usize) -> Vec<NodeEnvelope> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut order: Vec<String> = Vec::new();
        let mut queue = vec![start.to_string()];
        visited.insert(start.to_string());
        order.push(start.to_string());

        for _ in 0..depth {
            if queue.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for id in &queue {
                for link in self.links.all_links(id) {
                    let neighbor = if link.target == *id {
                        link.source
                    } else {
                        link.target
                    };
                    if visited.insert(neighbor.clone()) {
                        order.push(neighbor.clone());
                        next.push(neighbor);
                    }
                }
            }
            queue = next;
        }

        order
            .iter()
            .filter_map(|id| self.get_node(id).ok())
            .collect()
    }
}
