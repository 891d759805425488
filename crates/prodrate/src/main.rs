//! prodrate — live production rate of a Prometheus counter.
//!
//! Scrapes the producer's metrics page once per interval, keeps a sliding
//! window of counter samples, and prints the derived events/s series.
//!
//! # Usage
//!
//! ```text
//! prodrate --producer-connection localhost:3001 --mode sum
//! prodrate --config prodrate.toml --output json
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use prodrate_scrape::{HttpFetcher, PresentationPort, ScrapeScheduler, SystemClock};

mod cli;
mod render;

use cli::{Cli, LogFormat, OutputFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = cli.resolve_config()?;
    let fetcher = HttpFetcher::from_config(&config);

    let presenter: Box<dyn PresentationPort> = match cli.output {
        OutputFormat::Text => {
            println!("Producer metrics (events/s)");
            println!(
                "Scraping `{}` from `{}` every {}s",
                config.metric_name,
                fetcher.uri(),
                config.scrape_interval_seconds
            );
            Box::new(render::TextPresenter::new(std::io::stdout()))
        }
        OutputFormat::Json => Box::new(render::JsonPresenter::new(std::io::stdout())),
    };

    info!(
        uri = %fetcher.uri(),
        metric = %config.metric_name,
        mode = ?config.mode,
        counter_reset = ?config.counter_reset,
        "prodrate starting"
    );

    let mut scheduler = ScrapeScheduler::new(
        &config,
        Box::new(fetcher),
        Arc::new(SystemClock::new()),
        presenter,
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Keep the sender alive so the loop runs until the process is killed.
                warn!(error = %e, "failed to install CTRL+C handler");
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    scheduler.run(shutdown_rx).await;

    info!("prodrate stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
