//! Server configuration (§6 Configuration), loaded once at startup from CLI
//! flags or environment variables (`AETHERIS_*`), matching the agent's
//! `clap` derive+env pattern.

use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "aetheris-server", about = "AETHERIS fleet telemetry and control server")]
pub struct ServerConfig {
    /// MQTT topic namespace shared with the fleet's agents.
    #[arg(long, env = "AETHERIS_NAMESPACE", default_value = "tonypi")]
    pub namespace: String,

    #[arg(long, env = "AETHERIS_BROKER_HOST", default_value = "localhost")]
    pub broker_host: String,

    #[arg(long, env = "AETHERIS_BROKER_PORT", default_value_t = 1883)]
    pub broker_port: u16,

    /// SQLite path for the Entity Store, or omit for an in-memory store
    /// (used by default in development and by tests).
    #[arg(long, env = "AETHERIS_STORE_DB_PATH")]
    pub store_db_path: Option<String>,

    /// SQLite path for the Time-Series Writer, or omit for an in-memory
    /// store.
    #[arg(long, env = "AETHERIS_TIMESERIES_DB_PATH")]
    pub timeseries_db_path: Option<String>,

    /// Per-pattern ingress buffer before drop-oldest kicks in (§4.B).
    #[arg(long, env = "AETHERIS_INGRESS_BUFFER", default_value_t = 1024)]
    pub ingress_buffer: usize,

    /// Outbound publish queue depth before drop-oldest kicks in (§4.B).
    #[arg(long, env = "AETHERIS_OUTBOUND_BUFFER", default_value_t = 256)]
    pub outbound_buffer: usize,

    /// How often the Time-Series Writer flushes its buffer (§4.D).
    #[arg(long, env = "AETHERIS_FLUSH_INTERVAL_SECS", default_value_t = 1)]
    pub flush_interval_secs: u64,

    /// Buffered points before an immediate flush is triggered (§4.D).
    #[arg(long, env = "AETHERIS_FLUSH_COUNT", default_value_t = 500)]
    pub flush_count: usize,

    /// How often the Time-Series Writer rolls up and prunes expired tiers
    /// (§4.D).
    #[arg(long, env = "AETHERIS_RETENTION_SWEEP_INTERVAL_SECS", default_value_t = 3600)]
    pub retention_sweep_interval_secs: u64,

    /// Maximum age a job's in-memory progress may lag the Entity Store
    /// before a coalesced flush is forced (§4.G).
    #[arg(long, env = "AETHERIS_JOB_FLUSH_INTERVAL_SECS", default_value_t = 2)]
    pub job_flush_interval_secs: u64,

    /// How long a job may go without an update before it is considered
    /// stale (§4.G).
    #[arg(long, env = "AETHERIS_JOB_STALE_TIMEOUT_SECS", default_value_t = 300)]
    pub job_stale_timeout_secs: u64,

    /// Grace period for draining the outbound broker queue and flushing
    /// pending time-series batches on shutdown (§5).
    #[arg(long, env = "AETHERIS_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn retention_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.retention_sweep_interval_secs)
    }

    pub fn job_flush_interval(&self) -> Duration {
        Duration::from_secs(self.job_flush_interval_secs)
    }

    pub fn job_stale_timeout(&self) -> Duration {
        Duration::from_secs(self.job_stale_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_defaults() {
        let config = ServerConfig::parse_from(["aetheris-server"]);
        assert_eq!(config.namespace, "tonypi");
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.flush_interval_secs, 1);
        assert!(config.store_db_path.is_none());
    }

    #[test]
    fn accepts_explicit_db_paths() {
        let config = ServerConfig::parse_from([
            "aetheris-server",
            "--store-db-path",
            "/tmp/store.db",
            "--timeseries-db-path",
            "/tmp/ts.db",
        ]);
        assert_eq!(config.store_db_path.as_deref(), Some("/tmp/store.db"));
        assert_eq!(config.timeseries_db_path.as_deref(), Some("/tmp/ts.db"));
    }
}
