//! Bounded outbound publication queue, one per `(stream, robot_id)` (§4.A).
//!
//! The scheduler never awaits a broker publish directly — that would let a
//! slow or disconnected broker stall the cooperative scheduler. Instead each
//! stream gets its own drop-oldest queue (the same primitive the Broker
//! Adapter uses for ingress, `aetheris_broker::queue`); a background task
//! per stream drains it into `BrokerAdapter::publish`. When a queue is
//! full, the oldest pending sample for that stream is dropped, never the
//! newest, and a counter is exported — folded into the next `status`
//! payload as `dropped_samples`.

use aetheris_broker::adapter::{BrokerAdapter, DeliveryQos};
use aetheris_broker::queue::{self, DropOldestSender};
use aetheris_shared::Stream;
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tracing::error;

pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Owns one drop-oldest queue per stream and the drain tasks that publish
/// from them. Constructed once at agent startup.
pub struct OutboundQueues {
    senders: HashMap<Stream, DropOldestSender<OutboundMessage>>,
    drain_handles: Vec<JoinHandle<()>>,
}

impl OutboundQueues {
    /// Creates one queue of `capacity` per stream and spawns its drain task
    /// against `adapter`.
    pub fn spawn(adapter: BrokerAdapter, capacity: usize) -> Self {
        let mut senders = HashMap::new();
        let mut drain_handles = Vec::new();

        for &stream in Stream::all() {
            let (tx, mut rx) = queue::channel(capacity);
            let adapter = adapter.clone();
            let handle = tokio::spawn(async move {
                loop {
                    let msg = rx.recv().await;
                    if let Err(e) = adapter
                        .publish(&msg.topic, msg.payload, DeliveryQos::AtLeastOnce)
                        .await
                    {
                        error!(stream = %stream, topic = %msg.topic, error = %e, "failed to publish outbound sample");
                    }
                }
            });
            senders.insert(stream, tx);
            drain_handles.push(handle);
        }

        Self { senders, drain_handles }
    }

    /// Enqueues a payload for publication on `stream`'s topic. Never blocks
    /// and never awaits the wire (§4.A: "the scheduler must not block on
    /// broker publication").
    pub async fn enqueue(&self, stream: Stream, topic: String, payload: Vec<u8>) {
        if let Some(tx) = self.senders.get(&stream) {
            tx.push(OutboundMessage { topic, payload }).await;
        }
    }

    /// Total samples dropped across every stream's queue since startup,
    /// folded into the next `status` publish.
    pub fn total_dropped(&self) -> u64 {
        self.senders.values().map(|tx| tx.dropped_count()).sum()
    }

    /// Stops every drain task. Used on graceful shutdown.
    pub fn stop(&self) {
        for handle in &self.drain_handles {
            handle.abort();
        }
    }
}
