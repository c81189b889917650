//! The Command Router's broker-backed `CommandPublisher` (§4.H).

use aetheris_broker::adapter::{BrokerAdapter, DeliveryQos};
use aetheris_commands::CommandPublisher;
use aetheris_shared::{Command, TopicSet};
use async_trait::async_trait;

pub struct BrokerCommandPublisher {
    adapter: BrokerAdapter,
    topics: TopicSet,
}

impl BrokerCommandPublisher {
    pub fn new(adapter: BrokerAdapter, topics: TopicSet) -> Self {
        Self { adapter, topics }
    }
}

#[async_trait]
impl CommandPublisher for BrokerCommandPublisher {
    async fn publish(&self, robot_id: &str, command: &Command) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(command)?;
        self.adapter
            .publish(&self.topics.commands(robot_id), payload, DeliveryQos::AtLeastOnce)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aetheris_broker::config::BrokerConfig;

    #[tokio::test]
    async fn publish_builds_directed_command_topic() {
        let config = BrokerConfig {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 1,
            ..BrokerConfig::default()
        };
        let (adapter, _eventloop) = BrokerAdapter::connect(&config).unwrap();
        let publisher = BrokerCommandPublisher::new(adapter, TopicSet::new("tonypi"));
        let command = Command::new(aetheris_shared::CommandType::Stop, serde_json::Value::Null);
        // The in-process client queues the publish locally regardless of
        // whether the eventloop is ever polled, so this exercises topic
        // construction without needing a live broker.
        publisher.publish("RV-001", &command).await.unwrap();
    }
}
