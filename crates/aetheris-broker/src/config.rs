use aetheris_shared::BackoffConfig;
use std::time::Duration;

/// Broker connection configuration, loaded from the environment by whichever
/// binary (agent or server) owns the connection (§6 Configuration).
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub clean_session: bool,
    pub namespace: String,
    /// Size of each per-pattern ingress buffer before drop-oldest kicks in
    /// (§4.B).
    pub ingress_buffer: usize,
    /// Size of the outbound publish queue before drop-oldest kicks in
    /// (§4.A).
    pub outbound_buffer: usize,
    pub backoff: BackoffConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: format!("aetheris-{}", uuid::Uuid::new_v4()),
            keep_alive: Duration::from_secs(30),
            clean_session: true,
            namespace: "tonypi".to_string(),
            ingress_buffer: 256,
            outbound_buffer: 256,
            backoff: BackoffConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// Loads configuration from the environment, falling back to defaults
    /// for anything unset (§6 Configuration: "Broker address and
    /// credentials; namespace").
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            broker_host: std::env::var("AETHERIS_BROKER_HOST").unwrap_or(defaults.broker_host),
            broker_port: std::env::var("AETHERIS_BROKER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.broker_port),
            client_id: std::env::var("AETHERIS_CLIENT_ID").unwrap_or(defaults.client_id),
            namespace: std::env::var("AETHERIS_NAMESPACE").unwrap_or(defaults.namespace),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_reasonable() {
        let config = BrokerConfig::default();
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.namespace, "tonypi");
        assert!(config.clean_session);
    }
}
