//! The frontier store: pending URLs in priority order, the dedup set and the
//! per-host state, all behind one lock.
//!
//! `add` never waits for anything but that lock. `dequeue` is the only call
//! that suspends: every successful `add` releases one permit on a semaphore,
//! and a waiting consumer takes the permit before it takes the lock. Host
//! evictions retire the permits of the entries they drop; a consumer that
//! still wins a stale permit finds the queue empty and goes back to waiting.

use crate::{
    Admission, AdmissionControl, BaselineScorer, CandidateUrl, Config, FrontierError,
    FrontierMetrics, HostRegistry, HostState, IntervalGate, PolitenessGate, PriorityScorer,
    RejectReason, Score, ScoringContext, SeenSet,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A scored URL waiting in the frontier.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: CandidateUrl,
    pub priority: i64,
    pub enqueued_at: Instant,
    /// Score minus the interval term; fixed at insertion
    base: i64,
    /// Interval term, recomputed by rebalancing
    politeness: i64,
    seq: u64,
}

impl FrontierEntry {
    fn new(url: CandidateUrl, score: Score, enqueued_at: Instant, seq: u64) -> Self {
        let politeness = score.politeness.interval_term;
        let base = score.priority() - politeness;
        Self {
            url,
            priority: score.priority(),
            enqueued_at,
            base,
            politeness,
            seq,
        }
    }

    pub fn politeness_term(&self) -> i64 {
        self.politeness
    }

    pub fn into_url(self) -> CandidateUrl {
        self.url
    }

    fn rescore(&mut self, politeness: i64) -> bool {
        if politeness == self.politeness {
            return false;
        }
        self.politeness = politeness;
        self.priority = self.base + politeness;
        true
    }
}

// Highest priority first; among equals, the one inserted first.
impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| Reverse(self.seq).cmp(&Reverse(other.seq)))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for FrontierEntry {}

/// Everything the frontier mutates, guarded together.
struct FrontierState {
    pending: BinaryHeap<FrontierEntry>,
    seen: SeenSet,
    hosts: HostRegistry,
    diversity: HashMap<u64, usize>,
    open: bool,
    next_seq: u64,
}

impl FrontierState {
    fn new(dedup_retention: Option<std::time::Duration>) -> Self {
        Self {
            pending: BinaryHeap::new(),
            seen: SeenSet::new(dedup_retention),
            hosts: HostRegistry::new(),
            diversity: HashMap::new(),
            open: true,
            next_seq: 0,
        }
    }

    fn push(&mut self, entry: FrontierEntry) {
        *self.diversity.entry(entry.url.diversity_hash()).or_insert(0) += 1;
        self.pending.push(entry);
    }

    fn pop(&mut self) -> Option<FrontierEntry> {
        let entry = self.pending.pop()?;
        self.forget_diversity(&entry.url);
        Some(entry)
    }

    fn forget_diversity(&mut self, url: &CandidateUrl) {
        let key = url.diversity_hash();
        if let Some(count) = self.diversity.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.diversity.remove(&key);
            }
        }
    }

    /// Drops evicted entries from the dedup set so they can be found again.
    fn forget_evicted(&mut self, evicted: &[CandidateUrl]) {
        for url in evicted {
            self.forget_diversity(url);
            self.seen.remove(url);
        }
    }

    fn ordered_urls(&self) -> Vec<CandidateUrl> {
        let mut entries: Vec<&FrontierEntry> = self.pending.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|e| e.url.clone()).collect()
    }
}

/// Counters for [`FrontierStats`]; mirrored into the metrics recorder.
#[derive(Debug, Default)]
struct FrontierCounters {
    admitted: AtomicU64,
    rejected: AtomicU64,
    duplicates: AtomicU64,
    dequeued: AtomicU64,
    evicted: AtomicU64,
    scoring_failures: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrontierStats {
    pub pending: usize,
    pub seen: usize,
    pub hosts: usize,
    pub hosts_over_threshold: usize,
    pub open: bool,
    pub admitted: u64,
    pub rejected: u64,
    pub duplicates: u64,
    pub dequeued: u64,
    pub evicted: u64,
    pub scoring_failures: u64,
    pub captured_at: DateTime<Utc>,
}

impl std::fmt::Display for FrontierStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frontier: {} pending, {} seen, {} hosts ({} over threshold), {} admitted, {} dequeued, {} evicted, {}",
            self.pending,
            self.seen,
            self.hosts,
            self.hosts_over_threshold,
            self.admitted,
            self.dequeued,
            self.evicted,
            if self.open { "open" } else { "closed" }
        )
    }
}

/// What one rebalancing cycle changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebalanceReport {
    pub rescored: usize,
    pub evicted: usize,
    pub pruned: usize,
}

/// Priority-ordered, deduplicating, capacity-bounded crawl frontier.
///
/// # Examples
///
/// ```rust
/// use crawl_frontier::{Config, Frontier};
///
/// let frontier = Frontier::new(&Config { snapshot_path: None, ..Default::default() })?;
/// frontier.add("https://example.com/videos")?;
/// frontier.add("https://example.com/videos")?; // duplicate, ignored
///
/// assert_eq!(frontier.size(), 1);
/// let entry = frontier.try_dequeue().unwrap();
/// assert_eq!(entry.url.as_str(), "https://example.com/videos");
/// # Ok::<(), crawl_frontier::FrontierError>(())
/// ```
pub struct Frontier {
    state: Mutex<FrontierState>,
    available: Semaphore,
    admission: AdmissionControl,
    scorer: Box<dyn PriorityScorer>,
    gate: Box<dyn PolitenessGate>,
    metrics: FrontierMetrics,
    snapshot_path: Option<PathBuf>,
    pending_len: AtomicUsize,
    open: AtomicBool,
    counters: FrontierCounters,
}

impl Frontier {
    /// Builds a frontier with the standard scorer and gate.
    pub fn new(config: &Config) -> Result<Self, FrontierError> {
        Self::with_strategies(
            config,
            Box::new(BaselineScorer::new(&config.search_term)),
            Box::new(IntervalGate::from_config(config)),
        )
    }

    pub fn with_strategies(
        config: &Config,
        scorer: Box<dyn PriorityScorer>,
        gate: Box<dyn PolitenessGate>,
    ) -> Result<Self, FrontierError> {
        config.validate()?;

        Ok(Self {
            state: Mutex::new(FrontierState::new(config.dedup_retention)),
            available: Semaphore::new(0),
            admission: AdmissionControl::from_config(config),
            scorer,
            gate,
            metrics: FrontierMetrics::new(),
            snapshot_path: config.snapshot_path.clone(),
            pending_len: AtomicUsize::new(0),
            open: AtomicBool::new(true),
            counters: FrontierCounters::default(),
        })
    }

    pub fn with_metrics(mut self, metrics: FrontierMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &FrontierMetrics {
        &self.metrics
    }

    /// Offers a URL to the frontier.
    ///
    /// Fails only when `input` is blank or not an absolute URL. Every other
    /// refusal is returned as [`Admission::Rejected`].
    pub fn add(&self, input: &str) -> Result<Admission, FrontierError> {
        let url = CandidateUrl::parse(input)?;
        Ok(self.add_url(url))
    }

    pub fn add_url(&self, url: CandidateUrl) -> Admission {
        if let Err(reason) = self.admission.screen(&url) {
            return self.rejected(&url, reason);
        }

        let mut snapshot = None;
        let outcome = {
            let mut guard = self.lock_state();
            self.admit_locked(&mut guard, url.clone(), Instant::now(), &mut snapshot)
        };

        if let Some(urls) = snapshot {
            self.persist_snapshot(&urls);
        }

        match outcome {
            Ok(priority) => {
                self.counters.admitted.fetch_add(1, Ordering::Relaxed);
                self.metrics.urls_admitted.increment(1);
                debug!("Admitted {} with priority {}", url, priority);
                Admission::Accepted { priority }
            }
            Err(reason) => self.rejected(&url, reason),
        }
    }

    /// Adds many URLs, skipping invalid ones. Returns how many were accepted.
    pub fn seed<I, S>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accepted = 0;
        for url in urls {
            match self.add(url.as_ref()) {
                Ok(admission) if admission.is_accepted() => accepted += 1,
                Ok(_) => {}
                Err(e) => warn!("Skipping seed '{}': {}", url.as_ref(), e),
            }
        }
        accepted
    }

    fn admit_locked(
        &self,
        state: &mut FrontierState,
        url: CandidateUrl,
        now: Instant,
        snapshot: &mut Option<Vec<CandidateUrl>>,
    ) -> Result<i64, RejectReason> {
        if self.available.is_closed() {
            return Err(RejectReason::Closed);
        }

        let pending = state.pending.len();

        let was_open = state.open;
        self.admission.check_open(pending, &mut state.open)?;
        if !was_open {
            info!("Frontier reopened with {} pending entries", pending);
            self.open.store(true, Ordering::Release);
        }

        if state.seen.contains(&url) {
            return Err(RejectReason::Duplicate);
        }

        if let Err(reason) = self.admission.check_capacity(pending, &mut state.open) {
            self.open.store(false, Ordering::Release);
            warn!(
                "Frontier reached capacity of {} entries and is now closed",
                self.admission.capacity()
            );
            *snapshot = Some(state.ordered_urls());
            return Err(reason);
        }

        let score = self.score_locked(state, &url, now);

        if score.politeness.over_threshold {
            if let Some(host) = url.host() {
                self.evict_host_locked(state, host);
            }
            return Err(RejectReason::HostOverThreshold);
        }

        let priority = score.priority();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.seen.insert(url.clone(), now);
        state.push(FrontierEntry::new(url, score, now, seq));

        self.pending_len.store(state.pending.len(), Ordering::Release);
        self.metrics.set_sizes(state.pending.len(), state.hosts.len());
        self.available.add_permits(1);

        Ok(priority)
    }

    fn score_locked(&self, state: &mut FrontierState, url: &CandidateUrl, now: Instant) -> Score {
        let ctx = ScoringContext {
            hosts: &mut state.hosts,
            gate: self.gate.as_ref(),
            pending_diversity: &state.diversity,
            now,
        };

        match self.scorer.score(url, ctx) {
            Ok(score) => score,
            Err(e) => {
                warn!("Scoring failed for {}, using priority 0: {}", url, e);
                self.counters.scoring_failures.fetch_add(1, Ordering::Relaxed);
                self.metrics.scoring_failures.increment(1);
                Score::fallback()
            }
        }
    }

    /// Removes every pending entry of `host`. Returns how many were removed.
    fn evict_host_locked(&self, state: &mut FrontierState, host: &str) -> usize {
        let mut evicted = Vec::new();
        state.pending.retain(|entry| {
            if entry.url.host() == Some(host) {
                evicted.push(entry.url.clone());
                false
            } else {
                true
            }
        });

        if !evicted.is_empty() {
            info!(
                "Host {} reached its request budget, evicted {} pending entries",
                host,
                evicted.len()
            );
        }

        self.after_eviction(state, &evicted);
        evicted.len()
    }

    fn after_eviction(&self, state: &mut FrontierState, evicted: &[CandidateUrl]) {
        if evicted.is_empty() {
            return;
        }

        state.forget_evicted(evicted);
        self.retire_permits(evicted.len());

        let count = evicted.len() as u64;
        self.counters.evicted.fetch_add(count, Ordering::Relaxed);
        self.metrics.urls_evicted.increment(count);
        self.after_removal(state);
    }

    fn retire_permits(&self, count: usize) {
        for _ in 0..count {
            match self.available.try_acquire() {
                Ok(permit) => permit.forget(),
                Err(_) => break,
            }
        }
    }

    fn after_removal(&self, state: &mut FrontierState) {
        let pending = state.pending.len();
        self.pending_len.store(pending, Ordering::Release);
        self.metrics.set_sizes(pending, state.hosts.len());

        if !state.open
            && !self.available.is_closed()
            && self.admission.check_open(pending, &mut state.open).is_ok()
        {
            info!("Frontier reopened with {} pending entries", pending);
            self.open.store(true, Ordering::Release);
        }
    }

    fn rejected(&self, url: &CandidateUrl, reason: RejectReason) -> Admission {
        match reason {
            RejectReason::Duplicate => {
                self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.metrics.record_rejection(reason);
        debug!("Rejected {}: {}", url, reason);
        Admission::Rejected(reason)
    }

    /// Waits for the highest-priority entry.
    ///
    /// Returns `None` once `cancel` fires or the frontier is shut down.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Option<FrontierEntry> {
        loop {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                permit = self.available.acquire() => permit,
            };

            match permit {
                Ok(permit) => permit.forget(),
                Err(_) => return None,
            }

            if let Some(entry) = self.pop_best() {
                return Some(entry);
            }
        }
    }

    /// Takes the highest-priority entry if one is ready, without waiting.
    pub fn try_dequeue(&self) -> Option<FrontierEntry> {
        let permit = self.available.try_acquire().ok()?;
        permit.forget();
        self.pop_best()
    }

    fn pop_best(&self) -> Option<FrontierEntry> {
        let mut guard = self.lock_state();
        let entry = guard.pop()?;
        self.after_removal(&mut guard);
        drop(guard);

        self.counters.dequeued.fetch_add(1, Ordering::Relaxed);
        self.metrics.urls_dequeued.increment(1);
        debug!("Dequeued {} with priority {}", entry.url, entry.priority);
        Some(entry)
    }

    /// Wakes every pending and future `dequeue` with `None` and rejects
    /// every later `add` as closed.
    pub fn shutdown(&self) {
        {
            let mut state = self.lock_state();
            self.available.close();
            state.open = false;
            self.open.store(false, Ordering::Release);
        }
        info!("Frontier shut down with {} pending entries", self.size());
    }

    /// Number of pending entries. Never waits on the lock.
    pub fn size(&self) -> usize {
        self.pending_len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Recomputes the interval term of every pending entry, evicts hosts that
    /// are over their budget and prunes the dedup set.
    ///
    /// The gate is consulted once per pending host before the queue is
    /// touched, so a gate that panics leaves every entry in place.
    pub fn rebalance(&self) -> RebalanceReport {
        let now = Instant::now();
        let mut guard = self.lock_state();
        let state = &mut *guard;

        // `None` marks a host to evict, `Some(term)` its new interval term.
        let mut terms: HashMap<String, Option<i64>> = HashMap::new();
        for entry in state.pending.iter() {
            let name = match entry.url.host() {
                Some(name) if !terms.contains_key(name) => name,
                _ => continue,
            };
            if let Some(host) = state.hosts.get(name) {
                let term = if self.gate.is_over_threshold(host) {
                    None
                } else {
                    Some(self.gate.decayed_term(host, now))
                };
                terms.insert(name.to_string(), term);
            }
        }

        let mut report = RebalanceReport::default();
        let mut kept = Vec::with_capacity(state.pending.len());
        let mut evicted = Vec::new();

        for mut entry in std::mem::take(&mut state.pending).into_vec() {
            match entry.url.host().and_then(|name| terms.get(name)) {
                Some(None) => evicted.push(entry.url),
                Some(Some(term)) => {
                    if entry.rescore(*term) {
                        report.rescored += 1;
                    }
                    kept.push(entry);
                }
                None => kept.push(entry),
            }
        }

        state.pending = BinaryHeap::from(kept);
        report.evicted = evicted.len();
        if !evicted.is_empty() {
            info!("Rebalancing evicted {} entries of hosts over budget", evicted.len());
        }
        self.after_eviction(state, &evicted);

        if state.seen.retention().is_some() {
            let pending: HashSet<&CandidateUrl> = state.pending.iter().map(|e| &e.url).collect();
            report.pruned = state.seen.prune(now, &pending);
        }

        self.metrics.rebalance_cycles.increment(1);
        report
    }

    pub fn stats(&self) -> FrontierStats {
        let state = self.lock_state();
        FrontierStats {
            pending: state.pending.len(),
            seen: state.seen.len(),
            hosts: state.hosts.len(),
            hosts_over_threshold: state.hosts.over_threshold_hosts().count(),
            open: state.open,
            admitted: self.counters.admitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            dequeued: self.counters.dequeued.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
            scoring_failures: self.counters.scoring_failures.load(Ordering::Relaxed),
            captured_at: Utc::now(),
        }
    }

    /// Pending URLs in the order they would be dequeued.
    pub fn pending_urls(&self) -> Vec<CandidateUrl> {
        self.lock_state().ordered_urls()
    }

    /// Pending entries in the order they would be dequeued.
    pub fn pending_entries(&self) -> Vec<FrontierEntry> {
        let state = self.lock_state();
        let mut entries: Vec<FrontierEntry> = state.pending.iter().cloned().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries
    }

    pub fn contains(&self, url: &CandidateUrl) -> bool {
        self.lock_state().seen.contains(url)
    }

    pub fn host_state(&self, host: &str) -> Option<HostState> {
        self.lock_state().hosts.get(&host.to_lowercase()).cloned()
    }

    /// Writes the pending URLs, one per line, in dequeue order.
    pub fn write_snapshot(&self, path: &Path) -> Result<usize, FrontierError> {
        let urls = self.pending_urls();
        write_url_lines(path, &urls)?;
        Ok(urls.len())
    }

    fn persist_snapshot(&self, urls: &[CandidateUrl]) {
        let path = match &self.snapshot_path {
            Some(path) => path,
            None => return,
        };

        match write_url_lines(path, urls) {
            Ok(()) => info!("Wrote {} pending URLs to {}", urls.len(), path.display()),
            Err(e) => warn!("Failed to write frontier snapshot to {}: {}", path.display(), e),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_url_lines(path: &Path, urls: &[CandidateUrl]) -> Result<(), FrontierError> {
    let mut content = String::with_capacity(urls.len() * 64);
    for url in urls {
        content.push_str(url.as_str());
        content.push('\n');
    }
    std::fs::write(path, content)?;
    Ok(())
}
