use crate::Frontier;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Background task that periodically re-scores the frontier.
pub struct PeriodicRebalancer {
    frontier: Arc<Frontier>,
    interval: Duration,
}

impl PeriodicRebalancer {
    pub fn new(frontier: Arc<Frontier>, interval: Duration) -> Self {
        Self { frontier, interval }
    }

    /// Spawns the rebalancing loop. The first cycle runs one interval after
    /// the call.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Rebalancing frontier every {:?}", self.interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.cycle(),
            }
        }

        info!("Frontier rebalancer stopped");
    }

    fn cycle(&self) {
        let frontier = &self.frontier;
        match std::panic::catch_unwind(AssertUnwindSafe(|| frontier.rebalance())) {
            Ok(report) => debug!(
                "Rebalanced frontier: {} rescored, {} evicted, {} pruned",
                report.rescored, report.evicted, report.pruned
            ),
            Err(_) => error!("Frontier rebalancing panicked, retrying next cycle"),
        }
    }
}
