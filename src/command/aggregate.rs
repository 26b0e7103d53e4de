//! The `agg` command: poll feeds until interrupted.

use std::io::Write;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use super::State;
use crate::config::AggregatorConfig;
use crate::db::Database;
use crate::interval::parse_interval;
use crate::rss::{FeedFetcher, IngestPipeline, PollLoop};
use crate::Result;

pub(super) async fn agg<W: Write>(state: &State, interval: &str, out: &mut W) -> Result<()> {
    let every = parse_interval(interval)?;

    writeln!(out, "Collecting feeds every {every:?}")?;
    out.flush()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    run_aggregator(
        state.db.clone(),
        &state.config.aggregator,
        every,
        shutdown_rx,
    )
    .await
}

/// Poll feeds stored in `db` every `every` until `shutdown` carries `true`.
pub async fn run_aggregator(
    db: Database,
    config: &AggregatorConfig,
    every: Duration,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let fetcher = FeedFetcher::new(config)?;
    let pipeline = IngestPipeline::new(db, fetcher)
        .mark_fetched_on_failure(config.mark_fetched_on_failure);

    PollLoop::new(pipeline, every).run(shutdown).await;
    Ok(())
}
