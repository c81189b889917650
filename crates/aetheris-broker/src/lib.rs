//! AETHERIS Broker Adapter
//!
//! Single MQTT connection per process (§4.B). Used by both the Robot Agent
//! and the server's Ingestion Dispatcher / Command Router so there is
//! exactly one place in the codebase that owns a broker socket.

pub mod adapter;
pub mod config;
pub mod error;
pub mod pattern;
pub mod queue;

pub use adapter::{offline_will_payload, BrokerAdapter, DeliveryQos, IncomingMessage};
pub use config::BrokerConfig;
pub use error::{BrokerError, Result};
pub use pattern::topic_matches;
pub use queue::{DropOldestReceiver, DropOldestSender};
