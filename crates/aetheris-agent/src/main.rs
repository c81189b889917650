//! AETHERIS Robot Agent
//!
//! Runs on the edge device. Single-process, cooperatively scheduled (§4.A):
//! one runtime drives a small set of named periodic tasks plus command
//! handling, never two hardware accesses at once.

use aetheris_broker::adapter::{offline_will_payload, BrokerAdapter, DeliveryQos, IncomingMessage};
use aetheris_broker::config::BrokerConfig;
use aetheris_broker::queue::DropOldestReceiver;
use aetheris_shared::{Command, CommandAck, Stream, TopicSet};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod capability;
mod commands;
mod config;
mod outbound;
mod prealert;
mod scheduler;
mod servo_table;
mod state;

use capability::AgentCapabilities;
use config::AgentConfig;
use outbound::OutboundQueues;
use state::AgentState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aetheris_agent=info,rumqttc=warn")),
        )
        .init();

    let agent_config = AgentConfig::parse();
    let robot_id = agent_config.robot_id.clone();
    let topics = TopicSet::new(agent_config.namespace.clone());

    info!(robot_id = %robot_id, namespace = %agent_config.namespace, "aetheris agent starting");

    let broker_config = BrokerConfig {
        broker_host: agent_config.broker_host.clone(),
        broker_port: agent_config.broker_port,
        client_id: format!("aetheris-agent-{robot_id}"),
        namespace: agent_config.namespace.clone(),
        ..BrokerConfig::default()
    };

    let will_topic = topics.publish(Stream::Status, &robot_id);
    let will_payload = offline_will_payload(&robot_id)?;
    let (adapter, eventloop) = BrokerAdapter::connect_with_will(&broker_config, will_topic, will_payload)?;

    let state = Arc::new(AgentState::new());
    let capabilities = Arc::new(AgentCapabilities::acquire());
    info!(
        imu = %capabilities.imu_source,
        sonar = %capabilities.sonar_source,
        camera = %capabilities.camera_source,
        servo_bus = %capabilities.servo_bus_source,
        gpio_light = %capabilities.gpio_light_source,
        "peripheral capabilities acquired"
    );
    let outbound = Arc::new(OutboundQueues::spawn(adapter.clone(), agent_config.outbound_queue_size));

    let commands_rx = adapter.subscribe(&topics.commands(&robot_id)).await?;
    let broadcast_rx = adapter.subscribe(&topics.commands_broadcast()).await?;

    let run_handle = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.run(eventloop).await })
    };

    let command_handle = {
        let adapter = adapter.clone();
        let topics = topics.clone();
        let robot_id = robot_id.clone();
        let state = state.clone();
        let capabilities = capabilities.clone();
        tokio::spawn(async move {
            command_loop(adapter, topics, robot_id, state, capabilities, commands_rx, broadcast_rx).await;
        })
    };

    let reconnect_handle = {
        let notify = adapter.reconnect_notify();
        let outbound = outbound.clone();
        let topics = topics.clone();
        let robot_id = robot_id.clone();
        tokio::spawn(async move {
            loop {
                notify.notified().await;
                info!("reconnected to broker, publishing fresh status");
                scheduler::tick_status(&outbound, &topics, &robot_id).await;
            }
        })
    };

    scheduler::run(&agent_config, &topics, &capabilities, &outbound, &state, &robot_id).await;

    info!("agent shutting down, draining outbound queues");
    adapter.stop();
    tokio::time::sleep(Duration::from_millis(500)).await;
    outbound.stop();
    command_handle.abort();
    reconnect_handle.abort();
    run_handle.abort();

    Ok(())
}

/// Drains both the directed and broadcast command subscriptions, handling
/// each command and publishing its ack (§4.A). A `shutdown` command sets
/// `state.is_shutting_down()`, which the scheduler in `main` polls to
/// return; this loop keeps draining until explicitly aborted by `main`
/// after the scheduler exits, so a `shutdown`'s own ack is never lost.
async fn command_loop(
    adapter: BrokerAdapter,
    topics: TopicSet,
    robot_id: String,
    state: Arc<AgentState>,
    capabilities: Arc<AgentCapabilities>,
    mut commands_rx: DropOldestReceiver<IncomingMessage>,
    mut broadcast_rx: DropOldestReceiver<IncomingMessage>,
) {
    loop {
        let incoming = tokio::select! {
            msg = commands_rx.recv() => msg,
            msg = broadcast_rx.recv() => msg,
        };

        let command: Command = match serde_json::from_slice(&incoming.payload) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!(topic = %incoming.topic, error = %e, "failed to parse incoming command");
                continue;
            }
        };

        let ack = commands::handle_command(&state, &capabilities, &robot_id, &command);
        if let Err(e) = publish_ack(&adapter, &topics, &robot_id, &ack).await {
            error!(error = %e, command_id = %ack.command_id, "failed to publish command ack");
        }
    }
}

async fn publish_ack(
    adapter: &BrokerAdapter,
    topics: &TopicSet,
    robot_id: &str,
    ack: &CommandAck,
) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(ack)?;
    adapter
        .publish(&topics.command_ack(robot_id), payload, DeliveryQos::AtLeastOnce)
        .await?;
    Ok(())
}
