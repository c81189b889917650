//! The Broker Adapter (§4.B): one MQTT connection per process, offering
//! `subscribe`, `publish`, and a cancellable `run`/`stop` lifecycle.

use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};
use crate::pattern::topic_matches;
use crate::queue::{self, DropOldestReceiver, DropOldestSender};
use aetheris_shared::{Backoff, OfflineWill};
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

/// A single incoming publish, topic and payload only — the adapter never
/// interprets payload bytes (§4.B).
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

struct Subscription {
    pattern: String,
    tx: DropOldestSender<IncomingMessage>,
}

/// Maps a §4.B QoS request onto `rumqttc::QoS`. The core only ever asks for
/// at-least-once delivery (§1 non-goals: exactly-once is not required).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryQos {
    AtMostOnce,
    AtLeastOnce,
}

impl From<DeliveryQos> for QoS {
    fn from(value: DeliveryQos) -> Self {
        match value {
            DeliveryQos::AtMostOnce => QoS::AtMostOnce,
            DeliveryQos::AtLeastOnce => QoS::AtLeastOnce,
        }
    }
}

/// Single-writer MQTT connection. Clone to share the publish handle across
/// tasks; subscriptions and the event loop are owned by whoever calls
/// `run`.
#[derive(Clone)]
pub struct BrokerAdapter {
    client: AsyncClient,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    stopping: Arc<AtomicBool>,
    ingress_buffer: usize,
    reconnected: Arc<Notify>,
}

impl BrokerAdapter {
    /// Connects to the broker and returns the adapter plus the raw event
    /// loop the caller must drive with `run`.
    pub fn connect(config: &BrokerConfig) -> Result<(Self, rumqttc::EventLoop)> {
        let mut opts = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        opts.set_keep_alive(config.keep_alive);
        opts.set_clean_session(config.clean_session);

        let (client, eventloop) = AsyncClient::new(opts, config.outbound_buffer);

        let adapter = Self {
            client,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            stopping: Arc::new(AtomicBool::new(false)),
            ingress_buffer: config.ingress_buffer,
            reconnected: Arc::new(Notify::new()),
        };
        Ok((adapter, eventloop))
    }

    /// Like `connect`, but also registers a Last-Will-and-Testament that the
    /// broker publishes on the client's behalf if it disconnects
    /// ungracefully (§4.B LWT).
    pub fn connect_with_will(
        config: &BrokerConfig,
        will_topic: String,
        will_payload: Vec<u8>,
    ) -> Result<(Self, rumqttc::EventLoop)> {
        let mut opts = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        opts.set_keep_alive(config.keep_alive);
        opts.set_clean_session(config.clean_session);
        opts.set_last_will(LastWill::new(will_topic, will_payload, QoS::AtLeastOnce, true));

        let (client, eventloop) = AsyncClient::new(opts, config.outbound_buffer);

        let adapter = Self {
            client,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            stopping: Arc::new(AtomicBool::new(false)),
            ingress_buffer: config.ingress_buffer,
            reconnected: Arc::new(Notify::new()),
        };
        Ok((adapter, eventloop))
    }

    /// Subscribes to `pattern` (which may contain `+`/`#` wildcards) and
    /// returns a receiver fed by drop-oldest backpressure (§4.B).
    pub async fn subscribe(&self, pattern: &str) -> Result<DropOldestReceiver<IncomingMessage>> {
        let (tx, rx) = queue::channel(self.ingress_buffer);
        self.subscriptions.lock().await.push(Subscription {
            pattern: pattern.to_string(),
            tx,
        });
        self.client.subscribe(pattern, QoS::AtLeastOnce).await?;
        Ok(rx)
    }

    /// Publishes `payload` on `topic`. Synchronous to the adapter's outbound
    /// queue, asynchronous to the wire (§4.B).
    pub async fn publish(&self, topic: &str, payload: Vec<u8>, qos: DeliveryQos) -> Result<()> {
        self.client
            .publish(topic, qos.into(), false, payload)
            .await?;
        Ok(())
    }

    /// Drives the event loop until `stop()` is called or the loop is
    /// dropped. Reconnects with capped exponential backoff + jitter on
    /// disconnect, identical to the agent's policy (§4.B).
    pub async fn run(&self, mut eventloop: rumqttc::EventLoop) {
        let mut backoff = Backoff::default();

        loop {
            if self.stopping.load(Ordering::Relaxed) {
                info!("broker adapter stopping");
                return;
            }

            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.route_incoming(&publish.topic, publish.payload.to_vec())
                        .await;
                }
                Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                    let was_reconnect = backoff.attempt() > 0;
                    backoff.reset();
                    info!("connected to mqtt broker");
                    if !connack.session_present {
                        self.resubscribe_all().await;
                    }
                    if was_reconnect {
                        self.reconnected.notify_waiters();
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(error = %e, delay_ms = delay.as_millis() as u64, "mqtt connection error, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Signals `run` to stop after draining in-flight work.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Relaxed);
    }

    /// A `Notify` fired every time `run` re-establishes a connection after
    /// having lost one (not on the very first connect). Callers await this
    /// to re-publish fresh state and resume tasks after a disconnect (§4.A:
    /// "On reconnect, the agent publishes a fresh status message and
    /// resumes tasks").
    pub fn reconnect_notify(&self) -> Arc<Notify> {
        self.reconnected.clone()
    }

    async fn route_incoming(&self, topic: &str, payload: Vec<u8>) {
        let subscriptions = self.subscriptions.lock().await;
        let mut matched = false;
        for sub in subscriptions.iter() {
            if topic_matches(&sub.pattern, topic) {
                matched = true;
                sub.tx
                    .push(IncomingMessage {
                        topic: topic.to_string(),
                        payload: payload.clone(),
                    })
                    .await;
            }
        }
        if !matched {
            debug!(topic = %topic, "no subscriber for incoming topic");
        }
    }

    async fn resubscribe_all(&self) {
        let subscriptions = self.subscriptions.lock().await;
        for sub in subscriptions.iter() {
            if let Err(e) = self.client.subscribe(&sub.pattern, QoS::AtLeastOnce).await {
                error!(pattern = %sub.pattern, error = %e, "failed to resubscribe after reconnect");
            }
        }
    }
}

/// Helper for emitting a JSON-encoded Last-Will status payload, used by the
/// agent (§4.A/§4.B) to announce offline status.
pub fn offline_will_payload(robot_id: &str) -> Result<Vec<u8>> {
    let payload = OfflineWill {
        robot_id: robot_id.to_string(),
        is_online: false,
    };
    serde_json::to_vec(&payload).map_err(|e| BrokerError::Options(e.to_string()))
}
