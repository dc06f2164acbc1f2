use crate::RejectReason;
use metrics::{Counter, Gauge, Histogram};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

/// Handles for everything the frontier and its workers report.
///
/// Handles come from whatever recorder is installed when the frontier is
/// built; with none installed they are no-ops.
pub struct FrontierMetrics {
    pub urls_admitted: Counter,
    pub urls_rejected: Counter,
    pub urls_duplicate: Counter,
    pub urls_dequeued: Counter,
    pub urls_evicted: Counter,
    pub scoring_failures: Counter,
    pub pending: Gauge,
    pub hosts: Gauge,
    pub pages_fetched: Counter,
    pub fetch_failures: Counter,
    pub fetch_duration: Histogram,
    pub links_dropped: Counter,
    pub rebalance_cycles: Counter,
}

impl FrontierMetrics {
    pub fn new() -> Self {
        Self {
            urls_admitted: metrics::register_counter!("frontier_urls_admitted_total"),
            urls_rejected: metrics::register_counter!("frontier_urls_rejected_total"),
            urls_duplicate: metrics::register_counter!("frontier_urls_duplicate_total"),
            urls_dequeued: metrics::register_counter!("frontier_urls_dequeued_total"),
            urls_evicted: metrics::register_counter!("frontier_urls_evicted_total"),
            scoring_failures: metrics::register_counter!("frontier_scoring_failures_total"),
            pending: metrics::register_gauge!("frontier_pending"),
            hosts: metrics::register_gauge!("frontier_hosts"),
            pages_fetched: metrics::register_counter!("crawl_pages_fetched_total"),
            fetch_failures: metrics::register_counter!("crawl_fetch_failures_total"),
            fetch_duration: metrics::register_histogram!("crawl_fetch_duration_seconds"),
            links_dropped: metrics::register_counter!("crawl_links_dropped_total"),
            rebalance_cycles: metrics::register_counter!("frontier_rebalance_cycles_total"),
        }
    }

    pub fn noop() -> Self {
        Self {
            urls_admitted: Counter::noop(),
            urls_rejected: Counter::noop(),
            urls_duplicate: Counter::noop(),
            urls_dequeued: Counter::noop(),
            urls_evicted: Counter::noop(),
            scoring_failures: Counter::noop(),
            pending: Gauge::noop(),
            hosts: Gauge::noop(),
            pages_fetched: Counter::noop(),
            fetch_failures: Counter::noop(),
            fetch_duration: Histogram::noop(),
            links_dropped: Counter::noop(),
            rebalance_cycles: Counter::noop(),
        }
    }

    pub fn record_rejection(&self, reason: RejectReason) {
        match reason {
            RejectReason::Duplicate => self.urls_duplicate.increment(1),
            _ => self.urls_rejected.increment(1),
        }
    }

    pub fn record_fetch(&self, duration: Duration, success: bool) {
        if success {
            self.pages_fetched.increment(1);
        } else {
            self.fetch_failures.increment(1);
        }

        self.fetch_duration.record(duration.as_secs_f64());
    }

    pub fn set_sizes(&self, pending: usize, hosts: usize) {
        self.pending.set(pending as f64);
        self.hosts.set(hosts as f64);
    }
}

impl Default for FrontierMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PrometheusExporter {
    addr: SocketAddr,
}

impl PrometheusExporter {
    pub fn new(port: u16) -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }

    /// Installs the global recorder and serves `/metrics`. Must run inside a
    /// tokio runtime and before the frontier is built.
    pub fn install(&self) -> Result<(), Box<dyn std::error::Error>> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .install()?;

        info!("Serving Prometheus metrics on {}", self.addr);
        Ok(())
    }
}
