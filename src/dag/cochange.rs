//! Co-change signals derived from the commit chain.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use time::OffsetDateTime;

use super::coaccess::rank_counts;
use super::commit::CommitLog;

/// Commits whose timestamps fall within this window of each other count as
/// one editing burst.
pub const DEFAULT_CHANGE_WINDOW: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// How far back `build` walks the chain.
const BUILD_COMMIT_DEPTH: usize = 1000;

type PairCounts = HashMap<String, HashMap<String, u64>>;

/// One commit's changed refs, used for temporal grouping.
struct ChangeEvent {
    ts: OffsetDateTime,
    changed: Vec<String>,
}

/// Symmetric co-change counts: nodes whose refs changed within the same
/// time window of commits. Rebuilt from the chain, never updated online.
pub struct CoChangeIndex {
    commits: CommitLog,
    window: time::Duration,
    pairs: RwLock<PairCounts>,
}

/// IDs whose CID differs between the two snapshots, or that exist in only
/// one of them.
fn diff_refs(parent: &BTreeMap<String, String>, child: &BTreeMap<String, String>) -> Vec<String> {
    let mut changed = HashSet::new();

    for (id, cid) in child {
        match parent.get(id) {
            Some(parent_cid) if parent_cid == cid => {}
            _ => {
                changed.insert(id.clone());
            }
        }
    }
    for id in parent.keys() {
        if !child.contains_key(id) {
            changed.insert(id.clone());
        }
    }

    changed.into_iter().collect()
}

fn flush_window(pairs: &mut PairCounts, events: &[ChangeEvent]) {
    let mut unique = HashSet::new();
    for event in events {
        for id in &event.changed {
            unique.insert(id.clone());
        }
    }

    let nodes: Vec<String> = unique.into_iter().collect();
    if nodes.len() < 2 {
        return;
    }

    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            let (a, b) = (&nodes[i], &nodes[j]);
            *pairs
                .entry(a.clone())
                .or_default()
                .entry(b.clone())
                .or_default() += 1;
            *pairs
                .entry(b.clone())
                .or_default()
                .entry(a.clone())
                .or_default() += 1;
        }
    }
}

impl CoChangeIndex {
    pub fn new(commits: CommitLog, window: std::time::Duration) -> Self {
        Self {
            commits,
            window: time::Duration::try_from(window).unwrap_or(time::Duration::MAX),
            pairs: RwLock::new(PairCounts::new()),
        }
    }

    /// Rebuild the pair matrix from the most recent commits.
    ///
    /// Adjacent commits are diffed to find changed refs; the oldest commit
    /// in the walked range counts all of its refs as changed. Events are
    /// then grouped into maximal windows and every unordered pair of nodes
    /// changed within a window counts once. Deterministic for a given
    /// chain.
    pub fn build(&self) {
        let commits = match self.commits.log(BUILD_COMMIT_DEPTH) {
            Ok(commits) => commits,
            Err(_) => return,
        };
        if commits.len() < 2 {
            return;
        }

        // newest-first: commits[i + 1] is the parent of commits[i]
        let mut events: Vec<ChangeEvent> = Vec::new();
        for pair in commits.windows(2) {
            let (child, parent) = (&pair[0], &pair[1]);
            let changed = diff_refs(&parent.refs, &child.refs);
            if !changed.is_empty() {
                events.push(ChangeEvent {
                    ts: child.timestamp,
                    changed,
                });
            }
        }

        // the oldest commit has no parent in the walked range: every ref is new
        if let Some(first) = commits.last() {
            if !first.refs.is_empty() {
                events.push(ChangeEvent {
                    ts: first.timestamp,
                    changed: first.refs.keys().cloned().collect(),
                });
            }
        }

        events.sort_by_key(|event| event.ts);

        let mut pairs = PairCounts::new();
        let mut window_events: Vec<ChangeEvent> = Vec::new();
        let mut window_start: Option<OffsetDateTime> = None;

        for event in events {
            if let Some(start) = window_start {
                if event.ts - start > self.window {
                    flush_window(&mut pairs, &window_events);
                    window_events.clear();
                    window_start = Some(event.ts);
                }
            } else {
                window_start = Some(event.ts);
            }
            window_events.push(event);
        }
        flush_window(&mut pairs, &window_events);

        *self.pairs.write().unwrap_or_else(|err| err.into_inner()) = pairs;
    }

    /// Top co-changed peers for `node_id`, by count descending then ID.
    /// Limit 0 means no cap.
    pub fn related(&self, node_id: &str, limit: usize) -> Vec<String> {
        rank_counts(self.pair_counts(node_id), limit)
    }

    pub(crate) fn pair_counts(&self, node_id: &str) -> Vec<(String, u64)> {
        let pairs = self.pairs.read().unwrap_or_else(|err| err.into_inner());
        pairs
            .get(node_id)
            .map(|peers| peers.iter().map(|(id, n)| (id.clone(), *n)).collect())
            .unwrap_or_default()
    }
}
