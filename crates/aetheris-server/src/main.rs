//! AETHERIS Fleet Server
//!
//! Wires the Broker Adapter onto the Ingestion Dispatcher, Time-Series
//! Writer, Entity Store, Alert Engine, Job Tracker and Command Router
//! (§3). Multi-threaded/multi-tasked (§5): each subsystem runs on its own
//! task over the shared Tokio runtime, unlike the agent's single
//! cooperative loop.

use aetheris_alerts::AlertEngine;
use aetheris_broker::adapter::BrokerAdapter;
use aetheris_broker::config::BrokerConfig;
use aetheris_commands::CommandRouter;
use aetheris_dispatcher::Dispatcher;
use aetheris_jobs::{JobTracker, JobTrackerConfig};
use aetheris_shared::{AlertMessage, TopicSet};
use aetheris_store::EntityStore;
use aetheris_timeseries::{TimeSeriesConfig, TimeSeriesWriter};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod publisher;
mod supervisor;

use config::ServerConfig;
use publisher::BrokerCommandPublisher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aetheris_server=info,aetheris_broker=debug,rumqttc=warn")),
        )
        .init();

    let config = ServerConfig::parse();
    info!(namespace = %config.namespace, broker_host = %config.broker_host, "aetheris server starting");

    let store = Arc::new(match &config.store_db_path {
        Some(path) => EntityStore::open(path)?,
        None => EntityStore::open_in_memory()?,
    });

    let timeseries_config = TimeSeriesConfig {
        flush_count: config.flush_count,
        flush_interval: config.flush_interval(),
        ..TimeSeriesConfig::default()
    };
    let timeseries = Arc::new(match &config.timeseries_db_path {
        Some(path) => TimeSeriesWriter::open(path, timeseries_config)?,
        None => TimeSeriesWriter::open_in_memory(timeseries_config)?,
    });

    let (alert_tx, alert_rx) = tokio::sync::mpsc::channel::<AlertMessage>(256);
    let alerts = Arc::new(AlertEngine::new(store.clone(), alert_tx));
    alerts.reconstruct().await?;

    let job_tracker_config = JobTrackerConfig {
        stale_timeout: config.job_stale_timeout(),
        flush_interval: config.job_flush_interval(),
    };
    let jobs = Arc::new(JobTracker::new(store.clone(), job_tracker_config));
    jobs.reconstruct().await?;

    let topics = TopicSet::new(config.namespace.clone());

    let broker_config = BrokerConfig {
        broker_host: config.broker_host.clone(),
        broker_port: config.broker_port,
        client_id: "aetheris-server".to_string(),
        namespace: config.namespace.clone(),
        ingress_buffer: config.ingress_buffer,
        outbound_buffer: config.outbound_buffer,
        ..BrokerConfig::default()
    };
    let (adapter, eventloop) = BrokerAdapter::connect(&broker_config)?;

    let publisher = Arc::new(BrokerCommandPublisher::new(adapter.clone(), topics.clone()));
    let commands = Arc::new(CommandRouter::new(store.clone(), publisher));

    let dispatcher = Arc::new(Dispatcher::new(
        timeseries.clone(),
        store.clone(),
        alerts.clone(),
        jobs.clone(),
        commands.clone(),
    ));

    let ingress_pattern = format!("{}/#", config.namespace);
    let mut ingress_rx = adapter.subscribe(&ingress_pattern).await?;

    let stopping = Arc::new(AtomicBool::new(false));

    let run_handle = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.run(eventloop).await })
    };

    let dispatch_handle = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            loop {
                let message = ingress_rx.recv().await;
                dispatcher.dispatch(message).await;
            }
        })
    };

    let timeseries_run_handle = {
        let timeseries = timeseries.clone();
        tokio::spawn(async move { timeseries.run().await })
    };

    let retention_handle = tokio::spawn(supervisor::run_retention_sweeps(
        timeseries.clone(),
        config.retention_sweep_interval(),
        stopping.clone(),
    ));

    let job_flush_handle = tokio::spawn(supervisor::run_job_flushes(
        jobs.clone(),
        config.job_flush_interval(),
        stopping.clone(),
    ));

    let alert_drain_handle = tokio::spawn(drain_alerts(alert_rx));

    info!("aetheris server running, awaiting shutdown signal");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining up to grace period");

    stopping.store(true, Ordering::Relaxed);
    adapter.stop();
    timeseries.stop();

    let grace = config.shutdown_grace();
    let _ = tokio::time::timeout(grace, async {
        let _ = tokio::join!(run_handle, timeseries_run_handle);
    })
    .await;

    dispatch_handle.abort();
    retention_handle.abort();
    job_flush_handle.abort();
    alert_drain_handle.abort();

    info!("aetheris server stopped");
    Ok(())
}

/// Drains the Alert Engine's outbound channel. The external API layer that
/// would forward these to operators is out of scope (§1 module boundary);
/// this keeps `AlertEngine::observe` from blocking on a full channel and
/// gives every authoritative transition a visible log line.
async fn drain_alerts(mut rx: tokio::sync::mpsc::Receiver<AlertMessage>) {
    while let Some(alert) = rx.recv().await {
        match alert.severity.as_str() {
            "critical" => error!(robot_id = %alert.robot_id, metric = %alert.metric, value = alert.value, "{}", alert.message),
            _ => info!(robot_id = %alert.robot_id, metric = %alert.metric, value = alert.value, "{}", alert.message),
        }
    }
}
