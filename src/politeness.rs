//! Per-host pacing.
//!
//! The soft side of the gate is a score term: hosts hit within the fetch
//! interval are pushed down the queue but still admitted. The hard side is a
//! request budget per host; a host that uses it up is flagged, and the
//! frontier evicts everything it still has queued for that host.
//!
//! The `-10` threshold term is informational. A verdict carrying it is always
//! over threshold, and the frontier rejects such a URL instead of queueing it,
//! so the term never reaches a pending entry's priority.

use crate::HostState;
use std::time::Duration;
use tokio::time::Instant;

/// Magnitude of the soft politeness term.
pub const POLITENESS_WEIGHT: i64 = 10;
/// Penalty applied to a host that is already at its request budget.
pub const HARD_THRESHOLD_PENALTY: i64 = 10;

/// Outcome of running a host through the gate for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolitenessVerdict {
    /// Soft interval term, `-10` or `+10`
    pub interval_term: i64,
    /// `-10` when the host was already at its budget, else `0`; only ever
    /// set together with `over_threshold`
    pub threshold_term: i64,
    /// The host has reached its budget and must be evicted
    pub over_threshold: bool,
}

impl PolitenessVerdict {
    pub fn total(&self) -> i64 {
        self.interval_term + self.threshold_term
    }
}

pub trait PolitenessGate: Send + Sync {
    /// Scores a sighting of `host` and records it.
    ///
    /// Updates the host's last access time and, while it is under budget, its
    /// access count.
    fn observe(&self, host: &mut HostState, now: Instant) -> PolitenessVerdict;

    /// Interval term for an entry that is already queued, recomputed from the
    /// time elapsed since the host was last seen. Does not touch the host.
    fn decayed_term(&self, host: &HostState, now: Instant) -> i64;

    fn is_over_threshold(&self, host: &HostState) -> bool;
}

/// Fixed interval and fixed request budget for every host.
#[derive(Debug, Clone)]
pub struct IntervalGate {
    fetch_interval: Duration,
    hard_threshold: u32,
}

impl IntervalGate {
    pub fn new(fetch_interval: Duration, hard_threshold: u32) -> Self {
        Self {
            fetch_interval,
            hard_threshold,
        }
    }

    pub fn from_config(config: &crate::Config) -> Self {
        Self::new(config.host_fetch_interval, config.hard_host_request_threshold)
    }

    pub fn fetch_interval(&self) -> Duration {
        self.fetch_interval
    }

    pub fn hard_threshold(&self) -> u32 {
        self.hard_threshold
    }

    fn recently_accessed(&self, host: &HostState, now: Instant) -> bool {
        host.idle_time(now)
            .map_or(false, |idle| idle < self.fetch_interval)
    }
}

impl PolitenessGate for IntervalGate {
    fn observe(&self, host: &mut HostState, now: Instant) -> PolitenessVerdict {
        let interval_term = if self.recently_accessed(host, now) {
            -POLITENESS_WEIGHT
        } else {
            POLITENESS_WEIGHT
        };
        host.last_access = Some(now);

        let threshold_term = if host.access_count >= self.hard_threshold {
            -HARD_THRESHOLD_PENALTY
        } else {
            host.access_count += 1;
            0
        };

        if host.access_count >= self.hard_threshold {
            host.over_threshold = true;
        }

        PolitenessVerdict {
            interval_term,
            threshold_term,
            over_threshold: host.over_threshold,
        }
    }

    fn decayed_term(&self, host: &HostState, now: Instant) -> i64 {
        let idle = match host.idle_time(now) {
            Some(idle) => idle,
            None => return POLITENESS_WEIGHT,
        };

        if self.fetch_interval.is_zero() || idle >= self.fetch_interval {
            return POLITENESS_WEIGHT;
        }

        // Linear from -10 right after the access to +10 once the interval is over.
        let fraction = idle.as_secs_f64() / self.fetch_interval.as_secs_f64();
        let span = (2 * POLITENESS_WEIGHT) as f64;
        (-POLITENESS_WEIGHT as f64 + span * fraction).floor() as i64
    }

    fn is_over_threshold(&self, host: &HostState) -> bool {
        host.over_threshold || host.access_count >= self.hard_threshold
    }
}
