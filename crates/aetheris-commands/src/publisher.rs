//! The narrow seam between the Command Router and the Broker Adapter,
//! grounded on the trait-object pattern other example repos in the pack use
//! at their transport boundary (`knhk`'s `async-trait` services).

use aetheris_shared::Command;
use async_trait::async_trait;

/// Publishes a single command to a robot's command topic. Implemented by
/// `aetheris-server` over a `BrokerAdapter`; kept as a trait so the router
/// can be unit tested without a broker connection.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    async fn publish(&self, robot_id: &str, command: &Command) -> anyhow::Result<()>;
}
