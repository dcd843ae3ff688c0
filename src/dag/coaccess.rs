//! Co-access sessions: which nodes are read together.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::safefile::safe_append;

/// Session gap threshold: accesses further apart than this start a new
/// session.
pub const DEFAULT_ACCESS_WINDOW: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// One read-access record in the access journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEntry {
    #[serde(rename = "ts")]
    pub timestamp: String,
    #[serde(rename = "node")]
    pub node_id: String,
    pub field: String,
}

/// Observer invoked for each recorded access.
pub type AccessObserver = Box<dyn Fn(&str, OffsetDateTime) + Send + Sync>;

/// Appends read-access entries to an append-only JSONL file.
///
/// The filesystem projection owns the calls into this; the observer hook
/// feeds the co-access index. Write failures are logged, never surfaced to
/// the reader path.
pub struct AccessLog {
    path: PathBuf,
    write_lock: Mutex<()>,
    observer: Option<AccessObserver>,
}

impl AccessLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: AccessObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Record a read access for `node_id` on the given field
    /// ("content", "meta", "type", "links").
    pub fn log(&self, node_id: &str, field: &str) {
        let _guard = self.write_lock.lock().unwrap_or_else(|err| err.into_inner());

        let now = OffsetDateTime::now_utc();
        let entry = AccessEntry {
            timestamp: now.format(&Rfc3339).unwrap_or_default(),
            node_id: node_id.to_string(),
            field: field.to_string(),
        };

        match serde_json::to_vec(&entry) {
            Ok(mut line) => {
                line.push(b'\n');
                if let Err(err) = safe_append(&self.path, &line) {
                    tracing::warn!("access log write: {err}");
                    return;
                }
            }
            Err(err) => {
                tracing::warn!("access log marshal: {err}");
                return;
            }
        }

        if let Some(observer) = &self.observer {
            observer(node_id, now);
        }
    }
}

type PairCounts = HashMap<String, HashMap<String, u64>>;

struct CoAccessState {
    pairs: PairCounts,
    /// Deduplicated node IDs of the active session, in first-access order.
    current: Vec<String>,
    last_access: Option<OffsetDateTime>,
}

/// Symmetric co-occurrence counts over time-windowed access sessions.
///
/// A session is a maximal run of accesses whose adjacent gaps stay within
/// the window; when it closes, every unordered pair of distinct IDs seen in
/// the session counts once.
pub struct CoAccessIndex {
    window: time::Duration,
    state: RwLock<CoAccessState>,
}

fn flush_session(pairs: &mut PairCounts, session: &[String]) {
    if session.len() < 2 {
        return;
    }
    for i in 0..session.len() {
        for j in (i + 1)..session.len() {
            let (a, b) = (&session[i], &session[j]);
            if a == b {
                continue;
            }
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

/// Top-k peers by count, ties broken by ID. Shared by the three relatedness
/// rankings.
pub(crate) fn rank_counts(peers: Vec<(String, u64)>, limit: usize) -> Vec<String> {
    let mut results = peers;
    results.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if limit > 0 && results.len() > limit {
        results.truncate(limit);
    }
    results.into_iter().map(|(id, _)| id).collect()
}

impl CoAccessIndex {
    /// Create the index, replaying historical sessions from the access
    /// journal at `log_path`. Malformed lines are skipped.
    pub fn new(log_path: &Path, window: std::time::Duration) -> Self {
        let window = time::Duration::try_from(window).unwrap_or(time::Duration::MAX);
        let mut pairs = PairCounts::new();
        Self::replay(log_path, window, &mut pairs);
        Self {
            window,
            state: RwLock::new(CoAccessState {
                pairs,
                current: Vec::new(),
                last_access: None,
            }),
        }
    }

    fn replay(log_path: &Path, window: time::Duration, pairs: &mut PairCounts) {
        let file = match File::open(log_path) {
            Ok(file) => file,
            Err(_) => return,
        };

        let mut session: Vec<String> = Vec::new();
        let mut last_ts: Option<OffsetDateTime> = None;

        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            let Ok(entry) = serde_json::from_str::<AccessEntry>(&line) else {
                continue;
            };
            let Ok(ts) = OffsetDateTime::parse(&entry.timestamp, &Rfc3339) else {
                continue;
            };

            if let Some(last) = last_ts {
                if ts - last > window {
                    flush_session(pairs, &session);
                    session.clear();
                }
            }
            if !session.contains(&entry.node_id) {
                session.push(entry.node_id);
            }
            last_ts = Some(ts);
        }
        flush_session(pairs, &session);
    }

    /// Feed one access event into the active session. A gap larger than the
    /// window closes the session and starts a new one at `ts`.
    pub fn record(&self, node_id: &str, ts: OffsetDateTime) {
        let mut state = self.state.write().unwrap_or_else(|err| err.into_inner());

        if let Some(last) = state.last_access {
            if ts - last > self.window {
                let session = std::mem::take(&mut state.current);
                flush_session(&mut state.pairs, &session);
            }
        }

        if !state.current.iter().any(|id| id == node_id) {
            state.current.push(node_id.to_string());
        }
        state.last_access = Some(ts);
    }

    /// Top co-accessed peers for `node_id`, by count descending then ID.
    /// Limit 0 means no cap.
    pub fn related(&self, node_id: &str, limit: usize) -> Vec<String> {
        rank_counts(self.pair_counts(node_id), limit)
    }

    pub(crate) fn pair_counts(&self, node_id: &str) -> Vec<(String, u64)> {
        let state = self.state.read().unwrap_or_else(|err| err.into_inner());
        state
            .pairs
            .get(node_id)
            .map(|peers| peers.iter().map(|(id, n)| (id.clone(), *n)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use time::macros::datetime;

    const WINDOW: std::time::Duration = std::time::Duration::from_secs(300);

    fn empty_index(dir: &TempDir) -> CoAccessIndex {
        CoAccessIndex::new(&dir.path().join("access.jsonl"), WINDOW)
    }

    #[test]
    fn accesses_within_window_pair_up_on_flush() {
        let dir = TempDir::new().unwrap();
        let index = empty_index(&dir);

        let t0 = datetime!(2024-01-01 10:00:00 UTC);
        index.record("a", t0);
        index.record("b", t0 + time::Duration::seconds(60));
        // gap beyond the window closes the session
        index.record("c", t0 + time::Duration::seconds(60 + 301));

        assert_eq!(index.related("a", 0), vec!["b"]);
        assert_eq!(index.related("b", 0), vec!["a"]);
        assert!(index.related("c", 0).is_empty());
    }

    #[test]
    fn repeat_access_counts_once_per_session() {
        let dir = TempDir::new().unwrap();
        let index = empty_index(&dir);

        let t0 = datetime!(2024-01-01 10:00:00 UTC);
        index.record("a", t0);
        index.record("a", t0 + time::Duration::seconds(1));
        index.record("b", t0 + time::Duration::seconds(2));
        index.record("x", t0 + time::Duration::seconds(1000));

        let counts = index.pair_counts("a");
        assert_eq!(counts, vec![("b".to_string(), 1)]);
    }

    #[test]
    fn no_self_pairs() {
        let dir = TempDir::new().unwrap();
        let index = empty_index(&dir);

        let t0 = datetime!(2024-01-01 10:00:00 UTC);
        index.record("a", t0);
        index.record("a", t0 + time::Duration::seconds(1));
        index.record("x", t0 + time::Duration::seconds(1000));

        assert!(index.related("a", 0).is_empty());
    }

    #[test]
    fn replay_rebuilds_sessions_from_journal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.jsonl");
        let lines = [
            r#"{"ts":"2024-01-01T10:00:00Z","node":"a","field":"content"}"#,
            r#"{"ts":"2024-01-01T10:01:00Z","node":"b","field":"content"}"#,
            "garbage line",
            r#"{"ts":"2024-01-01T12:00:00Z","node":"c","field":"meta"}"#,
            r#"{"ts":"2024-01-01T12:02:00Z","node":"d","field":"content"}"#,
        ];
        fs::write(&path, lines.join("\n")).unwrap();

        let index = CoAccessIndex::new(&path, WINDOW);
        assert_eq!(index.related("a", 0), vec!["b"]);
        assert_eq!(index.related("c", 0), vec!["d"]);
        assert!(index.related("b", 0).contains(&"a".to_string()));
        assert!(!index.related("a", 0).contains(&"c".to_string()));
    }

    #[test]
    fn related_orders_by_count_then_id() {
        let dir = TempDir::new().unwrap();
        let index = empty_index(&dir);
        let mut t = datetime!(2024-01-01 10:00:00 UTC);

        // session 1: a, b, c give every pair once
        for id in ["a", "b", "c"] {
            index.record(id, t);
            t += time::Duration::seconds(1);
        }
        // session 2 (after gap): a, b again
        t += time::Duration::seconds(600);
        for id in ["a", "b"] {
            index.record(id, t);
            t += time::Duration::seconds(1);
        }
        // force a final flush
        t += time::Duration::seconds(600);
        index.record("zz", t);

        assert_eq!(index.related("a", 0), vec!["b", "c"]);
        assert_eq!(index.related("a", 1), vec!["b"]);
        assert_eq!(index.related("c", 0), vec!["a", "b"]);
    }

    #[test]
    fn access_log_writes_jsonl_and_notifies_observer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.jsonl");

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = std::sync::Arc::clone(&seen);
        let log = AccessLog::new(path.clone()).with_observer(Box::new(move |id, _ts| {
            seen_clone.lock().unwrap().push(id.to_string());
        }));

        log.log("node-1", "content");
        log.log("node-2", "meta");

        let data = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = data.lines().collect();
        assert_eq!(lines.len(), 2);
        let entry: AccessEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(entry.node_id, "node-1");
        assert_eq!(entry.field, "content");
        OffsetDateTime::parse(&entry.timestamp, &Rfc3339).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["node-1", "node-2"]);
    }
}
