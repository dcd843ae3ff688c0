//! In-memory inverted index for full-text search plus a type index.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use super::node::NodeEnvelope;

#[derive(Default)]
struct SearchMaps {
    /// term → set of ref IDs
    index: HashMap<String, HashSet<String>>,
    /// type → set of ref IDs
    types: HashMap<String, HashSet<String>>,
}

#[derive(Default)]
pub struct SearchIndex {
    maps: RwLock<SearchMaps>,
}

/// Lowercase terms split on non-alphanumeric codepoints, minimum two
/// codepoints, deduplicated in first-seen order.
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for word in lowered.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() < 2 {
            continue;
        }
        if seen.insert(word.to_string()) {
            result.push(word.to_string());
        }
    }
    result
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the search and type indexes.
    ///
    /// Indexed text is the ID, type, content, and metadata values. Content
    /// that parses as base64 is decoded first, matching how envelopes
    /// serialize bytes.
    pub fn index_node(&self, id: &str, node: &NodeEnvelope) {
        let mut parts: Vec<String> = vec![id.to_string(), node.node_type.clone()];

        if let Some(content) = &node.content {
            let text = String::from_utf8_lossy(content).into_owned();
            match STANDARD.decode(text.as_bytes()) {
                Ok(decoded) => parts.push(String::from_utf8_lossy(&decoded).into_owned()),
                Err(_) => parts.push(text),
            }
        }

        if let Some(meta) = &node.meta {
            for value in meta.values() {
                match value {
                    Value::String(s) => parts.push(s.clone()),
                    other => parts.push(other.to_string()),
                }
            }
        }

        let mut maps = self.maps.write().unwrap_or_else(|err| err.into_inner());
        for term in tokenize(&parts.join(" ")) {
            maps.index.entry(term).or_default().insert(id.to_string());
        }
        if !node.node_type.is_empty() {
            maps.types
                .entry(node.node_type.clone())
                .or_default()
                .insert(id.to_string());
        }
    }

    /// Remove a node from both indexes.
    pub fn remove_node(&self, id: &str) {
        let mut maps = self.maps.write().unwrap_or_else(|err| err.into_inner());
        maps.index.retain(|_, ids| {
            ids.remove(id);
            !ids.is_empty()
        });
        maps.types.retain(|_, ids| {
            ids.remove(id);
            !ids.is_empty()
        });
    }

    /// Rank ref IDs by the number of query terms they match. Ties break by
    /// ID so a query is deterministic. Limit 0 means no cap.
    pub fn search(&self, query: &str, limit: usize) -> Vec<String> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let maps = self.maps.read().unwrap_or_else(|err| err.into_inner());
        let mut scores: HashMap<&str, usize> = HashMap::new();
        for term in &terms {
            if let Some(ids) = maps.index.get(term) {
                for id in ids {
                    *scores.entry(id.as_str()).or_default() += 1;
                }
            }
        }

        let mut results: Vec<(&str, usize)> = scores.into_iter().collect();
        results.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        if limit > 0 && results.len() > limit {
            results.truncate(limit);
        }
        results.into_iter().map(|(id, _)| id.to_string()).collect()
    }

    /// All ref IDs with the given type, sorted. Limit 0 means no cap.
    pub fn filter_by_type(&self, node_type: &str, limit: usize) -> Vec<String> {
        let maps = self.maps.read().unwrap_or_else(|err| err.into_inner());
        let mut ids: Vec<String> = maps
            .types
            .get(node_type)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        if limit > 0 && ids.len() > limit {
            ids.truncate(limit);
        }
        ids
    }

    /// Sorted list of every known type.
    pub fn all_types(&self) -> Vec<String> {
        let maps = self.maps.read().unwrap_or_else(|err| err.into_inner());
        let mut types: Vec<String> = maps.types.keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn note(id: &str, content: &str) -> NodeEnvelope {
        NodeEnvelope {
            v: 1,
            id: id.to_string(),
            node_type: "Note".to_string(),
            content: Some(content.as_bytes().to_vec()),
            meta: None,
            created: OffsetDateTime::UNIX_EPOCH,
            modified: OffsetDateTime::UNIX_EPOCH,
            prev: None,
            deleted: false,
        }
    }

    #[test]
    fn tokenize_lowercases_splits_and_dedups() {
        let terms = tokenize("The quick, QUICK brown-fox! a");
        assert_eq!(terms, vec!["the", "quick", "brown", "fox"]);
    }

    #[test]
    fn more_matching_terms_rank_higher() {
        let index = SearchIndex::new();
        index.index_node("sr-1", &note("sr-1", "the quick brown fox"));
        index.index_node("sr-2", &note("sr-2", "lazy dog sleeps"));

        let results = index.search("quick fox", 10);
        assert_eq!(results, vec!["sr-1"]);

        let results = index.search("quick dog", 10);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn remove_node_drops_it_from_results() {
        let index = SearchIndex::new();
        index.index_node("n1", &note("n1", "alpha beta"));
        index.remove_node("n1");
        assert!(index.search("alpha", 10).is_empty());
        assert!(index.filter_by_type("Note", 0).is_empty());
        assert!(index.all_types().is_empty());
    }

    #[test]
    fn filter_by_type_sorted_and_capped() {
        let index = SearchIndex::new();
        for id in ["c", "a", "b"] {
            index.index_node(id, &note(id, "x"));
        }
        assert_eq!(index.filter_by_type("Note", 0), vec!["a", "b", "c"]);
        assert_eq!(index.filter_by_type("Note", 2), vec!["a", "b"]);
        assert!(index.filter_by_type("Post", 0).is_empty());
    }

    #[test]
    fn metadata_values_are_searchable() {
        let index = SearchIndex::new();
        let mut node = note("m1", "body");
        let mut meta = serde_json::Map::new();
        meta.insert("format".into(), serde_json::json!("markdown"));
        meta.insert("size_bytes".into(), serde_json::json!(42));
        node.meta = Some(meta);
        index.index_node("m1", &node);

        assert_eq!(index.search("markdown", 0), vec!["m1"]);
        assert_eq!(index.search("42", 0), vec!["m1"]);
    }

    #[test]
    fn base64_content_is_decoded_before_indexing() {
        let index = SearchIndex::new();
        // "graph theory" as the envelope would serialize it
        let mut node = note("b1", "");
        node.content = Some(b"Z3JhcGggdGhlb3J5".to_vec());
        index.index_node("b1", &node);

        assert_eq!(index.search("graph theory", 0), vec!["b1"]);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let index = SearchIndex::new();
        index.index_node("n1", &note("n1", "alpha"));
        assert!(index.search("", 10).is_empty());
        assert!(index.search("a !", 10).is_empty());
    }
}
