//! Admission control: the filters every URL passes before it is scored.
//!
//! Every rejection here is a normal outcome of crawling, so nothing in this
//! module produces an error.

use crate::{CandidateUrl, CapacityPolicy, Config};
use serde::Serialize;
use std::fmt;

/// Result of offering a URL to the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted { priority: i64 },
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted { .. })
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Admission::Rejected(reason) => Some(*reason),
            Admission::Accepted { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Scheme other than http or https
    UnsupportedScheme,
    ExcludedHost,
    FilteredFragment,
    /// The frontier closed after running out of capacity, or was shut down
    Closed,
    /// Already admitted once
    Duplicate,
    /// The queue is full; this rejection closes the frontier
    AtCapacity,
    /// The host used up its request budget and is being evicted
    HostOverThreshold,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnsupportedScheme => write!(f, "unsupported scheme"),
            RejectReason::ExcludedHost => write!(f, "excluded host"),
            RejectReason::FilteredFragment => write!(f, "filtered fragment"),
            RejectReason::Closed => write!(f, "frontier closed"),
            RejectReason::Duplicate => write!(f, "duplicate"),
            RejectReason::AtCapacity => write!(f, "at capacity"),
            RejectReason::HostOverThreshold => write!(f, "host over threshold"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdmissionControl {
    host_exclusions: Vec<String>,
    fragment_filters: Vec<String>,
    capacity: usize,
    policy: CapacityPolicy,
}

impl AdmissionControl {
    pub fn new(
        host_exclusions: &[String],
        fragment_filters: &[String],
        capacity: usize,
        policy: CapacityPolicy,
    ) -> Self {
        Self {
            host_exclusions: normalize_patterns(host_exclusions),
            fragment_filters: normalize_patterns(fragment_filters),
            capacity,
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.host_exclusions,
            &config.url_fragment_filters,
            config.queue_capacity,
            config.capacity_policy,
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Filters that depend only on the URL.
    pub fn screen(&self, url: &CandidateUrl) -> Result<(), RejectReason> {
        if !url.is_web() {
            return Err(RejectReason::UnsupportedScheme);
        }

        let host = url.host().unwrap_or_default().to_lowercase();
        if self.host_exclusions.iter().any(|pattern| host.contains(pattern)) {
            return Err(RejectReason::ExcludedHost);
        }

        let text = url.as_str().to_lowercase();
        if self.fragment_filters.iter().any(|pattern| text.contains(pattern)) {
            return Err(RejectReason::FilteredFragment);
        }

        Ok(())
    }

    /// Rejects while the frontier is closed, reopening it first when the
    /// policy allows and there is room again.
    pub fn check_open(&self, pending: usize, open: &mut bool) -> Result<(), RejectReason> {
        if *open {
            return Ok(());
        }

        match self.policy {
            CapacityPolicy::ReopenBelowCapacity if pending < self.capacity => {
                *open = true;
                Ok(())
            }
            _ => Err(RejectReason::Closed),
        }
    }

    /// Rejects when the queue is full and closes the frontier.
    pub fn check_capacity(&self, pending: usize, open: &mut bool) -> Result<(), RejectReason> {
        if pending >= self.capacity {
            *open = false;
            return Err(RejectReason::AtCapacity);
        }
        Ok(())
    }
}

fn normalize_patterns(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}
