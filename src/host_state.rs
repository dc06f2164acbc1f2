use std::collections::HashMap;
use tokio::time::Instant;

/// Per-host bookkeeping shared by every entry of that host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostState {
    pub host: String,
    /// Last time a URL of this host was scored
    pub last_access: Option<Instant>,
    /// Number of scored sightings that counted toward the hard threshold
    pub access_count: u32,
    pub first_seen: Instant,
    /// Set once the hard threshold has been reached; never cleared
    pub over_threshold: bool,
}

impl HostState {
    pub fn new(host: impl Into<String>, now: Instant) -> Self {
        Self {
            host: host.into(),
            last_access: None,
            access_count: 0,
            first_seen: now,
            over_threshold: false,
        }
    }

    pub fn idle_time(&self, now: Instant) -> Option<std::time::Duration> {
        self.last_access
            .map(|last| now.saturating_duration_since(last))
    }
}

/// Owns the [`HostState`] of every host the frontier has seen.
///
/// Entries are created lazily and live as long as the registry. The registry
/// has no locking of its own; the frontier keeps it behind its state lock.
#[derive(Debug, Default)]
pub struct HostRegistry {
    hosts: HashMap<String, HostState>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, host: &str) -> Option<&HostState> {
        self.hosts.get(host)
    }

    pub fn get_or_insert(&mut self, host: &str, now: Instant) -> &mut HostState {
        self.hosts
            .entry(host.to_string())
            .or_insert_with(|| HostState::new(host, now))
    }

    pub fn is_over_threshold(&self, host: &str) -> bool {
        self.hosts.get(host).map_or(false, |state| state.over_threshold)
    }

    pub fn over_threshold_hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts
            .values()
            .filter(|state| state.over_threshold)
            .map(|state| state.host.as_str())
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
