//! # Crawl Frontier
//!
//! A concurrent URL frontier for web crawlers. It decides which discovered
//! URL is fetched next, keeps any one host from being hammered, never hands
//! out the same URL twice, and stops taking new work once its queue is full.
//!
//! ## How a URL moves through the frontier
//!
//! 1. **Admission control**: scheme, excluded hosts and filtered substrings
//!    are checked, then the open flag, the dedup set and the queue capacity.
//! 2. **Scoring**: a priority is built from the search term, URL diversity,
//!    video content and the host's politeness state.
//! 3. **Queueing**: the entry goes into a binary heap keyed by priority, with
//!    ties broken by arrival order.
//! 4. **Dispatch**: crawl workers block on [`Frontier::dequeue`], fetch the
//!    page, extract its links and feed them back through admission.
//! 5. **Rebalancing**: a background task re-scores pending entries as host
//!    penalties wear off and evicts hosts that used up their budget.
//!
//! ## Scoring
//!
//! | Term | Condition | Value |
//! |------|-----------|-------|
//! | Search term | URL (without fragment) contains the term | +30 |
//! | Diversity | No pending URL differs from it only by fragment | +5 |
//! | Video | Path or query contains `video` | +10 |
//! | Politeness | Host hit within the fetch interval | -10, else +10 |
//! | Hard threshold | Host already at its request budget | -10 |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crawl_frontier::{Config, CrawlWorkerPool, Frontier, HttpFetcher, PeriodicRebalancer};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let frontier = Arc::new(Frontier::new(&config)?);
//!     frontier.add("https://www.rust-lang.org/")?;
//!
//!     let cancel = CancellationToken::new();
//!     let _rebalancer = PeriodicRebalancer::new(frontier.clone(), config.rebalance_interval)
//!         .spawn(cancel.clone());
//!     let pool = CrawlWorkerPool::start(
//!         frontier.clone(),
//!         Arc::new(HttpFetcher::from_config(&config)?),
//!         config.worker_count,
//!         cancel,
//!     );
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!     let stats = pool.shutdown().await;
//!     println!("Crawled {} pages", stats.total_processed);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! crawl-frontier crawl --seed https://www.rust-lang.org/ --max-pages 200 --search-term async
//! crawl-frontier crawl --config frontier.json --seed https://www.rust-lang.org/
//! crawl-frontier validate frontier.json
//! crawl-frontier score --url https://example.com/video/intro
//! ```

/// Configuration and settings for the frontier
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Parsed candidate URLs
pub mod candidate;

/// Per-host access bookkeeping
pub mod host_state;

/// Host pacing and request budgets
pub mod politeness;

/// Priority scoring rules
pub mod scorer;

/// Admission filters and rejection reasons
pub mod admission;

/// Set of URLs ever admitted
pub mod dedup;

/// The priority queue shared by producers and workers
pub mod frontier;

/// Page fetching and link extraction
pub mod fetcher;

/// Crawl workers pulling from the frontier
pub mod worker;

/// Background re-scoring of pending entries
pub mod rebalancer;

/// Command-line interface implementation
pub mod cli;

/// Performance metrics collection and export
pub mod metrics;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod tests;

pub use admission::*;
pub use candidate::*;
pub use cli::*;
pub use config::*;
pub use dedup::*;
pub use error::*;
pub use fetcher::*;
pub use frontier::*;
pub use host_state::*;
pub use self::metrics::*;
pub use politeness::*;
pub use rebalancer::*;
pub use scorer::*;
pub use utils::*;
pub use worker::*;
