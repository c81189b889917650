//! Periodic background drivers that have no natural home inside the
//! components they call: retention sweeps and job-table coalesced flushes
//! (§4.D, §4.G). Mirrors the agent scheduler's cadence-loop shape, one task
//! per concern rather than a single `select!` — the server is
//! multi-threaded/multi-tasked (§5), unlike the agent's single cooperative
//! loop.

use aetheris_jobs::JobTracker;
use aetheris_timeseries::TimeSeriesWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Runs `TimeSeriesWriter::retention_sweep` on `interval` until `stopping`
/// is set.
pub async fn run_retention_sweeps(timeseries: Arc<TimeSeriesWriter>, interval: Duration, stopping: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if stopping.load(Ordering::Relaxed) {
            return;
        }
        info!("running time-series retention sweep");
        if let Err(e) = timeseries.retention_sweep() {
            error!(error = %e, "retention sweep failed");
        }
    }
}

/// Runs `JobTracker::flush_due` on `interval` until `stopping` is set.
pub async fn run_job_flushes(jobs: Arc<JobTracker>, interval: Duration, stopping: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if stopping.load(Ordering::Relaxed) {
            return;
        }
        jobs.flush_due().await;
    }
}
