use crate::{
    format_duration, pages_per_second, parse_url_list, Admission, CandidateUrl, Config,
    CrawlWorkerPool, Frontier, FrontierStats, HttpFetcher, PeriodicRebalancer, PoolStats,
};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "crawl-frontier")]
#[command(about = "Prioritized, polite web crawl frontier")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Number of crawl workers")]
    pub workers: Option<usize>,

    #[arg(long, global = true, help = "Maximum number of pending URLs")]
    pub capacity: Option<usize>,

    #[arg(long, global = true, help = "Term that boosts matching URLs")]
    pub search_term: Option<String>,

    #[arg(long, global = true, help = "Fetch timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, global = true, help = "Serve Prometheus metrics on this port")]
    pub metrics_port: Option<u16>,

    #[arg(long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl outward from seed URLs
    Crawl {
        #[arg(short, long, help = "Seed URL (repeatable)")]
        seed: Vec<String>,

        #[arg(long, help = "File containing seed URLs (one per line)")]
        seed_file: Option<PathBuf>,

        #[arg(long, help = "Stop after this many pages")]
        max_pages: Option<usize>,

        #[arg(long, help = "Stop after this many seconds")]
        duration: Option<u64>,

        #[arg(long, help = "Progress reporting interval in seconds")]
        progress_interval: Option<u64>,

        #[arg(long, help = "Print the summary as JSON")]
        json: bool,
    },

    /// Validate configuration
    Validate {
        #[arg(help = "Configuration file to validate")]
        file: PathBuf,
    },

    /// Show the priority a fresh frontier would give a URL
    Score {
        #[arg(short, long, help = "URL to score")]
        url: String,
    },
}

impl Cli {
    /// Layers command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if let Some(capacity) = self.capacity {
            config.queue_capacity = capacity;
        }
        if let Some(search_term) = &self.search_term {
            config.search_term = search_term.clone();
        }
        if let Some(timeout) = self.timeout {
            config.fetch_timeout = Duration::from_secs(timeout);
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub seeds: Vec<String>,
    pub seed_file: Option<PathBuf>,
    pub max_pages: Option<usize>,
    pub duration: Option<Duration>,
    pub progress_interval: Option<Duration>,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub elapsed_secs: f64,
    pub pages_per_second: f64,
    pub frontier: FrontierStats,
    pub workers: PoolStats,
}

pub struct CliRunner {
    pub config: Config,
}

impl CliRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&self, command: Commands, shutdown: CancellationToken) -> anyhow::Result<()> {
        match command {
            Commands::Crawl {
                seed,
                seed_file,
                max_pages,
                duration,
                progress_interval,
                json,
            } => {
                self.run_crawl(
                    CrawlOptions {
                        seeds: seed,
                        seed_file,
                        max_pages,
                        duration: duration.map(Duration::from_secs),
                        progress_interval: progress_interval.map(Duration::from_secs),
                        json,
                    },
                    shutdown,
                )
                .await
            }
            Commands::Validate { file } => self.validate_config(file).await,
            Commands::Score { url } => self.show_score(&url),
        }
    }

    pub async fn run_crawl(
        &self,
        options: CrawlOptions,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        let seeds = self.collect_seeds(&options).await?;
        if seeds.is_empty() {
            bail!("No seed URLs given, use --seed or --seed-file");
        }

        let frontier = Arc::new(Frontier::new(&self.config)?);
        let accepted = frontier.seed(&seeds);
        info!("Seeded frontier with {} of {} URLs", accepted, seeds.len());
        if accepted == 0 {
            bail!("None of the seed URLs were admitted");
        }

        let fetcher = Arc::new(HttpFetcher::from_config(&self.config)?);
        let cancel = shutdown.child_token();

        let rebalancer = PeriodicRebalancer::new(frontier.clone(), self.config.rebalance_interval)
            .spawn(cancel.clone());
        let pool = CrawlWorkerPool::start(
            frontier.clone(),
            fetcher,
            self.config.worker_count,
            cancel.clone(),
        );

        let started = Instant::now();
        self.wait_for_stop(&pool, &frontier, &options, &cancel, started)
            .await;

        frontier.shutdown();
        let workers = pool.shutdown().await;
        if let Err(e) = rebalancer.await {
            error!("Rebalancer task failed: {}", e);
        }

        let elapsed = started.elapsed();
        let summary = CrawlSummary {
            elapsed_secs: elapsed.as_secs_f64(),
            pages_per_second: pages_per_second(workers.total_processed, elapsed),
            frontier: frontier.stats(),
            workers,
        };

        if options.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary, elapsed);
        }

        Ok(())
    }

    async fn collect_seeds(&self, options: &CrawlOptions) -> anyhow::Result<Vec<String>> {
        let mut seeds = options.seeds.clone();

        if let Some(path) = &options.seed_file {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read seed file {}", path.display()))?;
            let from_file = parse_url_list(&content);
            info!("Loaded {} seed URLs from {}", from_file.len(), path.display());
            seeds.extend(from_file);
        }

        Ok(seeds)
    }

    /// Returns once the crawl is cancelled, a budget is used up, or there is
    /// nothing left to crawl.
    async fn wait_for_stop(
        &self,
        pool: &CrawlWorkerPool,
        frontier: &Frontier,
        options: &CrawlOptions,
        cancel: &CancellationToken,
        started: Instant,
    ) {
        let mut ticker = tokio::time::interval(Duration::from_millis(250));
        let mut last_report = Instant::now();
        let mut idle_ticks = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Crawl cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if let Some(max_pages) = options.max_pages {
                if pool.total_processed() >= max_pages {
                    info!("Page budget of {} reached", max_pages);
                    return;
                }
            }

            if let Some(duration) = options.duration {
                if started.elapsed() >= duration {
                    info!("Time budget of {} reached", format_duration(duration));
                    return;
                }
            }

            // A worker between dequeue and marking itself busy looks idle for
            // a moment, so require two quiet ticks in a row.
            if frontier.is_empty() && pool.busy_workers() == 0 {
                idle_ticks += 1;
                if idle_ticks >= 2 {
                    info!("Frontier drained");
                    return;
                }
            } else {
                idle_ticks = 0;
            }

            if let Some(interval) = options.progress_interval {
                if last_report.elapsed() >= interval {
                    last_report = Instant::now();
                    println!(
                        "Progress: {} pages in {} ({:.1}/s) - {}",
                        pool.total_processed(),
                        format_duration(started.elapsed()),
                        pages_per_second(pool.total_processed(), started.elapsed()),
                        frontier.stats()
                    );
                }
            }
        }
    }

    pub async fn validate_config(&self, config_path: PathBuf) -> anyhow::Result<()> {
        println!("Validating configuration: {}", config_path.display());

        let config = Config::from_json_file(&config_path)?;

        println!("Configuration is valid:");
        println!("  Queue capacity: {}", config.queue_capacity);
        println!("  Workers: {}", config.worker_count);
        println!("  Host fetch interval: {:?}", config.host_fetch_interval);
        println!("  Hard host threshold: {}", config.hard_host_request_threshold);
        println!("  Rebalance interval: {:?}", config.rebalance_interval);
        println!("  Capacity policy: {:?}", config.capacity_policy);
        println!("  Excluded hosts: {}", config.host_exclusions.join(", "));
        println!("  Follow external links: {}", config.follow_external_links);
        if !config.search_term.is_empty() {
            println!("  Search term: {}", config.search_term);
        }

        Ok(())
    }

    pub fn show_score(&self, url: &str) -> anyhow::Result<()> {
        let config = Config {
            snapshot_path: None,
            ..self.config.clone()
        };
        let frontier = Frontier::new(&config)?;
        let candidate = CandidateUrl::parse(url)?;

        match frontier.add_url(candidate.clone()) {
            Admission::Accepted { priority } => {
                println!("URL: {}", candidate);
                println!("  Priority: {}", priority);
            }
            Admission::Rejected(reason) => {
                println!("URL: {}", candidate);
                println!("  Rejected: {}", reason);
            }
        }

        Ok(())
    }
}

fn print_summary(summary: &CrawlSummary, elapsed: Duration) {
    println!("Crawl finished in {}", format_duration(elapsed));
    println!(
        "  Pages: {} fetched, {} failed ({:.1}/s)",
        summary.workers.total_processed, summary.workers.total_errors, summary.pages_per_second
    );
    println!(
        "  Links: {} admitted, {} dropped after close",
        summary.workers.links_admitted, summary.workers.links_dropped
    );
    println!("  {}", summary.frontier);
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;

    Ok(())
}
