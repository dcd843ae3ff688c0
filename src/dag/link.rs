//! Append-only link journal with in-memory forward/reverse indexes.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::error::DagError;
use super::safefile::safe_append;

/// A directed, typed edge between two node IDs.
///
/// Derived ordering is (source, target, type), the order commit snapshots
/// are sorted in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkEntry {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub link_type: String,
}

impl LinkEntry {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        link_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            link_type: link_type.into(),
        }
    }

    fn key(&self) -> String {
        format!("{}|{}|{}", self.source, self.target, self.link_type)
    }
}

#[derive(Default)]
struct LinkMaps {
    forward: HashMap<String, Vec<LinkEntry>>,
    reverse: HashMap<String, Vec<LinkEntry>>,
}

impl LinkMaps {
    fn insert(&mut self, entry: LinkEntry) {
        self.forward
            .entry(entry.source.clone())
            .or_default()
            .push(entry.clone());
        self.reverse
            .entry(entry.target.clone())
            .or_default()
            .push(entry);
    }
}

/// The journal on disk is the source of truth; the maps are a replayable
/// cache. Additions append under the writer lock so journal order matches
/// map insertion order.
pub struct LinkIndex {
    path: PathBuf,
    maps: RwLock<LinkMaps>,
}

impl LinkIndex {
    /// Open the index, replaying any existing journal. Malformed lines are
    /// skipped.
    pub fn new(path: PathBuf) -> Result<Self, DagError> {
        let mut maps = LinkMaps::default();
        match File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line?;
                    match serde_json::from_str::<LinkEntry>(&line) {
                        Ok(entry) => maps.insert(entry),
                        Err(_) => continue,
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(Self {
            path,
            maps: RwLock::new(maps),
        })
    }

    /// Append a link. Duplicate (source, target, type) triples are no-ops.
    pub fn add(&self, entry: LinkEntry) -> Result<(), DagError> {
        let mut maps = self.maps.write().unwrap_or_else(|err| err.into_inner());

        if let Some(existing) = maps.forward.get(&entry.source) {
            if existing
                .iter()
                .any(|e| e.target == entry.target && e.link_type == entry.link_type)
            {
                return Ok(());
            }
        }

        let mut line = serde_json::to_vec(&entry).map_err(|err| DagError::decode("link", err))?;
        line.push(b'\n');
        safe_append(&self.path, &line)?;

        maps.insert(entry);
        Ok(())
    }

    /// Links where `id` is the source, in insertion order.
    pub fn links_from(&self, id: &str) -> Vec<LinkEntry> {
        let maps = self.maps.read().unwrap_or_else(|err| err.into_inner());
        maps.forward.get(id).cloned().unwrap_or_default()
    }

    /// Links where `id` is the target, in insertion order.
    pub fn links_to(&self, id: &str) -> Vec<LinkEntry> {
        let maps = self.maps.read().unwrap_or_else(|err| err.into_inner());
        maps.reverse.get(id).cloned().unwrap_or_default()
    }

    /// All links touching `id`, deduplicated across the two directions.
    pub fn all_links(&self, id: &str) -> Vec<LinkEntry> {
        let maps = self.maps.read().unwrap_or_else(|err| err.into_inner());
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let forward = maps.forward.get(id).map(Vec::as_slice).unwrap_or_default();
        let reverse = maps.reverse.get(id).map(Vec::as_slice).unwrap_or_default();
        for entry in forward.iter().chain(reverse) {
            if seen.insert(entry.key()) {
                result.push(entry.clone());
            }
        }
        result
    }

    /// Every link in the index.
    pub fn all_entries(&self) -> Vec<LinkEntry> {
        let maps = self.maps.read().unwrap_or_else(|err| err.into_inner());
        maps.forward.values().flatten().cloned().collect()
    }
}
