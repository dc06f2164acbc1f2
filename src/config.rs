//! Configuration management with serde serialization/deserialization
//!
//! All settings are supplied when the frontier is built and stay fixed for its
//! lifetime. The binary loads them from a JSON file and layers CLI overrides
//! on top.

use crate::FrontierError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the crawl frontier
///
/// # Examples
///
/// ```rust
/// use crawl_frontier::Config;
///
/// // Use default configuration
/// let config = Config::default();
///
/// // Focus the crawl on a topic with a small queue
/// let config = Config {
///     search_term: "rust".to_string(),
///     queue_capacity: 500,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Host substrings that are never admitted (case-insensitive)
    pub host_exclusions: Vec<String>,

    /// Substrings that disqualify a URL anywhere in its text (case-insensitive)
    ///
    /// Used to keep `mailto` and `ftp:` style links out of the queue.
    pub url_fragment_filters: Vec<String>,

    /// Topic the crawl is focused on (default: empty, no bonus)
    ///
    /// URLs whose scheme, authority, path or query contain this term get the
    /// largest scoring bonus.
    pub search_term: String,

    /// Maximum number of pending entries (default: 10000)
    ///
    /// Reaching it closes the frontier and writes a snapshot of the queue.
    pub queue_capacity: usize,

    /// Minimum spacing between two hits on the same host (default: 15 seconds)
    ///
    /// Hosts seen more recently than this are deprioritized, not rejected.
    pub host_fetch_interval: Duration,

    /// Number of scored sightings after which a host is evicted (default: 100)
    pub hard_host_request_threshold: u32,

    /// Number of crawl workers pulling from the frontier (default: CPU count)
    pub worker_count: usize,

    /// How often pending entries are re-scored (default: 30 seconds)
    pub rebalance_interval: Duration,

    /// What happens after the queue has filled up once
    pub capacity_policy: CapacityPolicy,

    /// Where the queue snapshot is written when capacity is exhausted
    ///
    /// `None` disables the snapshot.
    pub snapshot_path: Option<PathBuf>,

    /// Forget admitted URLs after this long (default: never)
    ///
    /// URLs still waiting in the queue are always kept.
    pub dedup_retention: Option<Duration>,

    /// Per-request timeout of the bundled HTTP fetcher (default: 10 seconds)
    pub fetch_timeout: Duration,

    /// User agent sent by the bundled HTTP fetcher
    pub user_agent: Option<String>,

    /// Follow links that leave the host of the page they were found on (default: true)
    ///
    /// When off, the bundled HTTP fetcher only reports links on the page's own host.
    pub follow_external_links: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_exclusions: vec![
                "twitter.com".to_string(),
                "microsoft.com".to_string(),
                "google.com".to_string(),
                "bing.com".to_string(),
                "pineapplesupport.org".to_string(),
                "instagram.com".to_string(),
                "facebook.com".to_string(),
            ],
            url_fragment_filters: vec!["mailto".to_string(), "ftp:".to_string()],
            search_term: String::new(),
            queue_capacity: 10_000,
            host_fetch_interval: Duration::from_secs(15),
            hard_host_request_threshold: 100,
            worker_count: num_cpus::get(),
            rebalance_interval: Duration::from_secs(30),
            capacity_policy: CapacityPolicy::default(),
            snapshot_path: Some(PathBuf::from("frontier_queue.bak")),
            dedup_retention: None,
            fetch_timeout: Duration::from_secs(10),
            user_agent: None,
            follow_external_links: true,
        }
    }
}

impl Config {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self, FrontierError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FrontierError> {
        if self.queue_capacity == 0 {
            return Err(FrontierError::Configuration(
                "Queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.worker_count == 0 {
            return Err(FrontierError::Configuration(
                "Worker count must be greater than 0".to_string(),
            ));
        }

        if self.hard_host_request_threshold == 0 {
            return Err(FrontierError::Configuration(
                "Hard host request threshold must be greater than 0".to_string(),
            ));
        }

        if self.rebalance_interval.is_zero() {
            return Err(FrontierError::Configuration(
                "Rebalance interval must be greater than 0".to_string(),
            ));
        }

        if self.fetch_timeout.is_zero() {
            return Err(FrontierError::Configuration(
                "Fetch timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Behaviour of the frontier once the queue has been full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Stop admitting URLs for the rest of the crawl (default)
    #[default]
    StayClosed,
    /// Accept URLs again as soon as the queue drops below capacity
    ReopenBelowCapacity,
}
