use crate::CandidateUrl;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Every URL the frontier has ever admitted, with the time it was admitted.
///
/// Without a retention window the set only grows. With one, [`SeenSet::prune`]
/// forgets old URLs so they may be discovered again.
#[derive(Debug, Default)]
pub struct SeenSet {
    admitted: HashMap<CandidateUrl, Instant>,
    retention: Option<Duration>,
}

impl SeenSet {
    pub fn new(retention: Option<Duration>) -> Self {
        Self {
            admitted: HashMap::new(),
            retention,
        }
    }

    pub fn contains(&self, url: &CandidateUrl) -> bool {
        self.admitted.contains_key(url)
    }

    /// Returns false if the URL was already present.
    pub fn insert(&mut self, url: CandidateUrl, now: Instant) -> bool {
        match self.admitted.entry(url) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    pub fn remove(&mut self, url: &CandidateUrl) -> bool {
        self.admitted.remove(url).is_some()
    }

    /// Drops URLs older than the retention window unless they are still
    /// pending. Returns how many were dropped.
    pub fn prune(&mut self, now: Instant, pending: &HashSet<&CandidateUrl>) -> usize {
        let retention = match self.retention {
            Some(retention) => retention,
            None => return 0,
        };

        let before = self.admitted.len();
        self.admitted.retain(|url, admitted_at| {
            pending.contains(url) || now.saturating_duration_since(*admitted_at) < retention
        });
        before - self.admitted.len()
    }

    pub fn retention(&self) -> Option<Duration> {
        self.retention
    }

    pub fn len(&self) -> usize {
        self.admitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }
}
