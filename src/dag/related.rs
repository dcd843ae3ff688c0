//! Combined relatedness ranking over the two behavioral indexes.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use super::coaccess::CoAccessIndex;
use super::cochange::CoChangeIndex;

/// Co-change outweighs co-access: editing together is intentional
/// authorship, reading together is often incidental.
const CO_ACCESS_WEIGHT: f64 = 1.0;
const CO_CHANGE_WEIGHT: f64 = 2.0;

/// Fuses co-access and co-change pair counts into a single score.
pub struct RelatednessIndex {
    co_access: Arc<CoAccessIndex>,
    co_change: Arc<CoChangeIndex>,
}

impl RelatednessIndex {
    pub fn new(co_access: Arc<CoAccessIndex>, co_change: Arc<CoChangeIndex>) -> Self {
        Self {
            co_access,
            co_change,
        }
    }

    /// Top related nodes by weighted score, ties broken by ID ascending.
    /// Limit 0 means no cap.
    pub fn related(&self, node_id: &str, limit: usize) -> Vec<String> {
        let mut scores: HashMap<String, f64> = HashMap::new();

        for (id, count) in self.co_access.pair_counts(node_id) {
            *scores.entry(id).or_default() += count as f64 * CO_ACCESS_WEIGHT;
        }
        for (id, count) in self.co_change.pair_counts(node_id) {
            *scores.entry(id).or_default() += count as f64 * CO_CHANGE_WEIGHT;
        }

        let mut results: Vec<(String, f64)> = scores.into_iter().collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        if limit > 0 && results.len() > limit {
            results.truncate(limit);
        }
        results.into_iter().map(|(id, _)| id).collect()
    }
}
