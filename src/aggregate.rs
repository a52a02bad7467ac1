//! Grouped counts over an in-memory record set.
//!
//! Every aggregation is a single pass that accumulates counts per distinct
//! key, remembering the order in which keys were first seen. Rankings use a
//! stable sort on count, so equal counts keep first-seen order.

use std::borrow::Borrow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::error::ConfigError;
use crate::parser::{LogRecord, Timestamp};

pub const DEFAULT_TOP_K: usize = 3;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket<K> {
    pub key: K,
    pub count: usize,
}

/// Immutable result of one aggregation pass, in presentation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AggregationResult<K> {
    buckets: Vec<Bucket<K>>,
}

impl<K> AggregationResult<K> {
    fn from_tallies<T>(tallies: Vec<(T, usize)>, key: impl Fn(T) -> K) -> Self {
        Self {
            buckets: tallies
                .into_iter()
                .map(|(k, count)| Bucket { key: key(k), count })
                .collect(),
        }
    }

    pub fn buckets(&self) -> &[Bucket<K>] {
        &self.buckets
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bucket<K>> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sum of all bucket counts.
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }

    pub fn count_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.buckets
            .iter()
            .find(|b| b.key.borrow() == key)
            .map(|b| b.count)
    }
}

impl<'a, K> IntoIterator for &'a AggregationResult<K> {
    type Item = &'a Bucket<K>;
    type IntoIter = std::slice::Iter<'a, Bucket<K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// Counting helpers
// ---------------------------------------------------------------------------

/// Count occurrences of each key, in first-seen order.
pub(crate) fn tally<K, I>(keys: I) -> Vec<(K, usize)>
where
    K: Eq + Hash + Copy,
    I: IntoIterator<Item = K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut tallies: Vec<(K, usize)> = Vec::new();

    for key in keys {
        match index.entry(key) {
            Entry::Occupied(e) => tallies[*e.get()].1 += 1,
            Entry::Vacant(e) => {
                e.insert(tallies.len());
                tallies.push((key, 1));
            }
        }
    }
    tallies
}

/// Order by count descending. Stable, so ties stay in first-seen order.
fn rank_by_count<K>(tallies: &mut [(K, usize)]) {
    tallies.sort_by(|a, b| b.1.cmp(&a.1));
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the validated record set for one analysis run. All operations are
/// read-only, so independent aggregations can run concurrently.
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    records: Vec<LogRecord>,
}

impl AggregationEngine {
    pub fn new(records: Vec<LogRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn total_count(&self) -> usize {
        self.records.len()
    }

    /// Requests per status code, ascending by status. Only statuses that
    /// occur are present.
    pub fn status_distribution(&self) -> AggregationResult<u16> {
        let mut tallies = tally(self.records.iter().map(|r| r.status));
        tallies.sort_by_key(|&(status, _)| status);
        AggregationResult::from_tallies(tallies, |s| s)
    }

    /// The `k` most requested paths.
    pub fn top_pages(&self, k: usize) -> Result<AggregationResult<String>, ConfigError> {
        if k == 0 {
            return Err(ConfigError::InvalidTopK(k));
        }
        let mut tallies = tally(self.records.iter().map(|r| r.path.as_str()));
        rank_by_count(&mut tallies);
        tallies.truncate(k);
        Ok(AggregationResult::from_tallies(tallies, str::to_string))
    }

    /// Requests per minute, in chronological order.
    pub fn traffic_trend(&self) -> AggregationResult<Timestamp> {
        let mut tallies = tally(self.records.iter().map(|r| r.timestamp));
        tallies.sort_by_key(|&(ts, _)| ts);
        AggregationResult::from_tallies(tallies, |ts| ts)
    }

    /// Requests per user agent, most common first. The empty agent is a
    /// bucket of its own.
    pub fn agent_distribution(&self) -> AggregationResult<String> {
        let mut tallies = tally(self.records.iter().map(|r| r.agent.as_str()));
        rank_by_count(&mut tallies);
        AggregationResult::from_tallies(tallies, str::to_string)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    fn engine(lines: &[&str]) -> AggregationEngine {
        AggregationEngine::new(lines.iter().map(|l| parse_line(l).unwrap()).collect())
    }

    fn keys<K: Clone>(r: &AggregationResult<K>) -> Vec<K> {
        r.iter().map(|b| b.key.clone()).collect()
    }

    #[test]
    fn empty_engine() {
        let e = AggregationEngine::default();
        assert_eq!(e.total_count(), 0);
        assert!(e.status_distribution().is_empty());
        assert!(e.top_pages(3).unwrap().is_empty());
        assert!(e.traffic_trend().is_empty());
        assert!(e.agent_distribution().is_empty());
    }

    #[test]
    fn tally_first_seen_order() {
        let t = tally(["b", "a", "b", "c", "a", "b"]);
        assert_eq!(t, vec![("b", 3), ("a", 2), ("c", 1)]);
    }

    #[test]
    fn status_sorted_ascending() {
        let e = engine(&[
            "a,2024-02-01 10:00,/x,500,ua",
            "a,2024-02-01 10:00,/x,200,ua",
            "a,2024-02-01 10:00,/x,404,ua",
            "a,2024-02-01 10:00,/x,200,ua",
        ]);
        let d = e.status_distribution();
        assert_eq!(keys(&d), vec![200, 404, 500]);
        assert_eq!(d.count_of(&200), Some(2));
        assert_eq!(d.count_of(&301), None);
        assert_eq!(d.total(), e.total_count());
    }

    #[test]
    fn top_pages_ties_first_seen() {
        let e = engine(&[
            "a,2024-02-01 10:00,/c,200,ua",
            "a,2024-02-01 10:00,/b,200,ua",
            "a,2024-02-01 10:00,/a,200,ua",
            "a,2024-02-01 10:00,/a,200,ua",
        ]);
        let top = e.top_pages(3).unwrap();
        assert_eq!(keys(&top), vec!["/a", "/c", "/b"]);
        assert_eq!(top.count_of("/a"), Some(2));
    }

    #[test]
    fn top_pages_truncates() {
        let e = engine(&[
            "a,2024-02-01 10:00,/a,200,ua",
            "a,2024-02-01 10:00,/b,200,ua",
            "a,2024-02-01 10:00,/c,200,ua",
        ]);
        assert_eq!(e.top_pages(2).unwrap().len(), 2);
        assert_eq!(e.top_pages(10).unwrap().len(), 3);
    }

    #[test]
    fn top_pages_rejects_zero() {
        let e = AggregationEngine::default();
        assert_eq!(e.top_pages(0), Err(ConfigError::InvalidTopK(0)));
    }

    #[test]
    fn trend_chronological() {
        let e = engine(&[
            "a,2024-02-01 10:05,/a,200,ua",
            "a,2023-12-31 23:59,/a,200,ua",
            "a,2024-02-01 10:05,/a,200,ua",
            "a,2024-02-01 09:00,/a,200,ua",
        ]);
        let trend = e.traffic_trend();
        let shown: Vec<String> = trend.iter().map(|b| b.key.to_string()).collect();
        assert_eq!(shown, vec!["2023-12-31 23:59", "2024-02-01 09:00", "2024-02-01 10:05"]);
        assert_eq!(trend.buckets()[2].count, 2);
    }

    #[test]
    fn empty_agent_is_a_bucket() {
        let e = engine(&[
            "a,2024-02-01 10:00,/a,200,",
            "a,2024-02-01 10:00,/a,200,curl",
            "a,2024-02-01 10:00,/a,200,",
        ]);
        let d = e.agent_distribution();
        assert_eq!(keys(&d), vec!["", "curl"]);
        assert_eq!(d.count_of(""), Some(2));
    }

    #[test]
    fn serializes_as_list() {
        let e = engine(&["a,2024-02-01 10:00,/a,200,ua"]);
        let json = serde_json::to_string(&e.traffic_trend()).unwrap();
        assert_eq!(json, r#"[{"key":"2024-02-01 10:00","count":1}]"#);
    }
}
