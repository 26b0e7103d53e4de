//! Background poll loop for Gator.
//!
//! Runs one ingestion cycle per interval until a shutdown signal arrives.

use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::rss::pipeline::{CycleOutcome, IngestPipeline};
use crate::rss::store::{Clock, FeedSource, FeedStore, PostStore, SystemClock};
use crate::Result;

/// Timer-driven driver for an [`IngestPipeline`].
///
/// Cycles are awaited inside the loop body, so a slow cycle delays the next
/// tick instead of running alongside it. Missed ticks are skipped.
pub struct PollLoop<S, F, C = SystemClock> {
    pipeline: IngestPipeline<S, F, C>,
    interval: Duration,
}

impl<S, F, C> PollLoop<S, F, C>
where
    S: FeedStore + PostStore,
    F: FeedSource,
    C: Clock,
{
    /// Create a loop running `pipeline` every `interval`.
    pub fn new(pipeline: IngestPipeline<S, F, C>, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Time between cycles.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The driven pipeline.
    pub fn pipeline(&self) -> &IngestPipeline<S, F, C> {
        &self.pipeline
    }

    /// Run until `shutdown` carries `true`.
    ///
    /// The first cycle starts immediately. A shutdown while a cycle is in
    /// flight drops that cycle, aborting its fetch.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Collecting feeds every {:?}", self.interval);

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = timer.tick() => {}
            }

            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Shutdown requested, abandoning in-flight cycle");
                    break;
                }
                result = self.pipeline.run_cycle() => log_outcome(result),
            }
        }

        info!("Poll loop stopped");
    }
}

fn log_outcome(result: Result<CycleOutcome>) {
    match result {
        Ok(CycleOutcome::Idle) => debug!("No feeds registered, nothing to do"),
        Ok(CycleOutcome::FetchFailed { feed_id, .. }) => {
            debug!(%feed_id, "Cycle ended without ingesting");
        }
        Ok(CycleOutcome::Ingested(report)) => debug!(
            feed_id = %report.feed_id,
            created = report.created,
            duplicates = report.duplicates,
            skipped = report.skipped,
            failed = report.failed,
            "Cycle complete"
        ),
        Err(e) => error!("Feed cycle failed: {}", e),
    }
}

/// Resolve once the channel carries `true`. A closed channel never resolves.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
