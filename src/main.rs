use anyhow::Context;
use clap::Parser;
use crawl_frontier::{setup_logging, Cli, CliRunner, Config, PrometheusExporter};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting crawl-frontier v{}", env!("CARGO_PKG_VERSION"));

    // The recorder has to exist before any frontier registers its metrics
    if let Some(port) = args.metrics_port {
        PrometheusExporter::new(port)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
    }

    let config = load_config(&args).await?;
    let cli_runner = CliRunner::new(config);

    // Setup graceful shutdown
    let shutdown = CancellationToken::new();
    let _shutdown_handler = setup_shutdown_handler(shutdown.clone());

    if let Err(e) = cli_runner.run(args.command, shutdown).await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    info!("crawl-frontier stopped");
    Ok(())
}

async fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let mut config = if let Some(config_path) = &args.config {
        let config_content = tokio::fs::read_to_string(config_path)
            .await
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        serde_json::from_str(&config_content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?
    } else {
        Config::default()
    };

    args.apply_overrides(&mut config);
    config.validate()?;

    info!("Configuration loaded successfully");
    info!("Queue capacity: {}", config.queue_capacity);
    info!("Workers: {}", config.worker_count);
    info!("Host fetch interval: {:?}", config.host_fetch_interval);

    Ok(config)
}

fn setup_shutdown_handler(shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => shutdown.cancel(),
            Err(e) => error!("Failed to install signal handlers: {}", e),
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
    }

    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");
    Ok(())
}
