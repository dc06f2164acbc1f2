use crate::{Admission, CandidateUrl, FetchError, Frontier, FrontierEntry, PageFetcher, RejectReason};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happened to the links found on one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOutcome {
    pub links_found: usize,
    pub links_admitted: usize,
    /// Links never offered because the frontier was closed
    pub links_dropped: usize,
}

/// One consumer of the frontier: dequeue, fetch, extract, add, repeat.
pub struct CrawlWorker {
    id: usize,
    frontier: Arc<Frontier>,
    fetcher: Arc<dyn PageFetcher>,
    is_running: Arc<AtomicBool>,
    is_busy: Arc<AtomicBool>,
    processed_count: Arc<AtomicUsize>,
    error_count: Arc<AtomicUsize>,
    links_found: Arc<AtomicUsize>,
    links_admitted: Arc<AtomicUsize>,
    links_dropped: Arc<AtomicUsize>,
}

impl CrawlWorker {
    pub fn new(id: usize, frontier: Arc<Frontier>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            id,
            frontier,
            fetcher,
            is_running: Arc::new(AtomicBool::new(false)),
            is_busy: Arc::new(AtomicBool::new(false)),
            processed_count: Arc::new(AtomicUsize::new(0)),
            error_count: Arc::new(AtomicUsize::new(0)),
            links_found: Arc::new(AtomicUsize::new(0)),
            links_admitted: Arc::new(AtomicUsize::new(0)),
            links_dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Runs until `cancel` fires or the frontier shuts down.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Starting crawl worker {}", self.id);
        self.is_running.store(true, Ordering::Relaxed);

        while !cancel.is_cancelled() {
            let entry = match self.frontier.dequeue(&cancel).await {
                Some(entry) => entry,
                None => break,
            };
            let url = entry.url.clone();
            self.is_busy.store(true, Ordering::Relaxed);

            let result = AssertUnwindSafe(self.process_entry(entry)).catch_unwind().await;
            self.is_busy.store(false, Ordering::Relaxed);

            match result {
                Ok(Ok(outcome)) => {
                    self.processed_count.fetch_add(1, Ordering::Relaxed);
                    self.links_found.fetch_add(outcome.links_found, Ordering::Relaxed);
                    self.links_admitted.fetch_add(outcome.links_admitted, Ordering::Relaxed);
                    self.links_dropped.fetch_add(outcome.links_dropped, Ordering::Relaxed);
                    debug!(
                        "Worker {} crawled {}: {} links, {} admitted",
                        self.id, url, outcome.links_found, outcome.links_admitted
                    );
                }
                Ok(Err(e)) => {
                    self.error_count.fetch_add(1, Ordering::Relaxed);
                    warn!("Worker {} failed to fetch {}: {}", self.id, url, e);
                }
                Err(panic) => {
                    self.error_count.fetch_add(1, Ordering::Relaxed);
                    error!(
                        "Worker {} panicked while processing {}: {}",
                        self.id,
                        url,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        self.is_running.store(false, Ordering::Relaxed);
        info!("Crawl worker {} stopped", self.id);
    }

    pub async fn process_entry(&self, entry: FrontierEntry) -> Result<PageOutcome, FetchError> {
        debug!(
            "Worker {} fetching {} (priority {})",
            self.id, entry.url, entry.priority
        );

        let started = Instant::now();
        let fetched = self.fetcher.fetch(&entry.url).await;
        self.frontier
            .metrics()
            .record_fetch(started.elapsed(), fetched.is_ok());

        let content = fetched?;
        let links = self.fetcher.extract_links(&entry.url, &content);
        Ok(self.offer_links(&entry.url, links))
    }

    fn offer_links(&self, page: &CandidateUrl, links: Vec<String>) -> PageOutcome {
        let mut outcome = PageOutcome {
            links_found: links.len(),
            ..Default::default()
        };

        for (index, link) in links.iter().enumerate() {
            if !self.frontier.is_open() {
                outcome.links_dropped = links.len() - index;
                break;
            }

            match self.frontier.add(link) {
                Ok(Admission::Accepted { .. }) => outcome.links_admitted += 1,
                Ok(Admission::Rejected(RejectReason::AtCapacity | RejectReason::Closed)) => {
                    outcome.links_dropped = links.len() - index - 1;
                    break;
                }
                Ok(Admission::Rejected(_)) => {}
                Err(e) => debug!("Skipping link {} on {}: {}", link, page, e),
            }
        }

        if outcome.links_dropped > 0 {
            debug!(
                "Frontier closed, dropped {} links from {}",
                outcome.links_dropped, page
            );
            self.frontier
                .metrics()
                .links_dropped
                .increment(outcome.links_dropped as u64);
        }

        outcome
    }

    pub fn get_stats(&self) -> WorkerStats {
        WorkerStats {
            id: self.id,
            is_running: self.is_running(),
            processed_count: self.processed_count(),
            error_count: self.error_count(),
            links_found: self.links_found.load(Ordering::Relaxed),
            links_admitted: self.links_admitted.load(Ordering::Relaxed),
            links_dropped: self.links_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// True while the worker holds a dequeued entry.
    pub fn is_busy(&self) -> bool {
        self.is_busy.load(Ordering::Relaxed)
    }

    pub fn processed_count(&self) -> usize {
        self.processed_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }
}

impl Clone for CrawlWorker {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            frontier: self.frontier.clone(),
            fetcher: self.fetcher.clone(),
            is_running: self.is_running.clone(),
            is_busy: self.is_busy.clone(),
            processed_count: self.processed_count.clone(),
            error_count: self.error_count.clone(),
            links_found: self.links_found.clone(),
            links_admitted: self.links_admitted.clone(),
            links_dropped: self.links_dropped.clone(),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    pub id: usize,
    pub is_running: bool,
    pub processed_count: usize,
    pub error_count: usize,
    pub links_found: usize,
    pub links_admitted: usize,
    pub links_dropped: usize,
}

/// Fixed set of workers sharing one frontier and one cancellation token.
pub struct CrawlWorkerPool {
    workers: Vec<CrawlWorker>,
    handles: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl CrawlWorkerPool {
    pub fn start(
        frontier: Arc<Frontier>,
        fetcher: Arc<dyn PageFetcher>,
        worker_count: usize,
        cancel: CancellationToken,
    ) -> Self {
        let workers: Vec<CrawlWorker> = (0..worker_count)
            .map(|i| CrawlWorker::new(i, frontier.clone(), fetcher.clone()))
            .collect();

        let handles = workers
            .iter()
            .map(|worker| {
                let worker = worker.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { worker.run(cancel).await })
            })
            .collect();

        info!("Started {} crawl workers", worker_count);

        Self {
            workers,
            handles,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels every worker and waits for them to exit.
    pub async fn shutdown(mut self) -> PoolStats {
        self.cancel.cancel();

        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Crawl worker task failed: {}", e);
            }
        }

        let stats = self.get_stats();
        info!(
            "Worker pool stopped. Processed: {}, Errors: {}",
            stats.total_processed, stats.total_errors
        );
        stats
    }

    pub fn get_worker_stats(&self) -> Vec<WorkerStats> {
        self.workers.iter().map(|w| w.get_stats()).collect()
    }

    pub fn total_processed(&self) -> usize {
        self.workers.iter().map(|w| w.processed_count()).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.workers.iter().map(|w| w.error_count()).sum()
    }

    pub fn active_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.is_running()).count()
    }

    pub fn busy_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.is_busy()).count()
    }

    pub fn get_stats(&self) -> PoolStats {
        let worker_stats = self.get_worker_stats();
        PoolStats {
            total_processed: self.total_processed(),
            total_errors: self.total_errors(),
            active_workers: self.active_workers(),
            links_admitted: worker_stats.iter().map(|w| w.links_admitted).sum(),
            links_dropped: worker_stats.iter().map(|w| w.links_dropped).sum(),
            worker_stats,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub worker_stats: Vec<WorkerStats>,
    pub total_processed: usize,
    pub total_errors: usize,
    pub active_workers: usize,
    pub links_admitted: usize,
    pub links_dropped: usize,
}
