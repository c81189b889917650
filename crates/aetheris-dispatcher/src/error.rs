use thiserror::Error;

/// Errors surfaced by the Ingestion Dispatcher (§4.C, §7). Handlers never
/// propagate these to the hot dispatch loop; they are logged and counted.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("payload parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unrecognised sensor_type {sensor_type:?}")]
    UnknownSensorType { sensor_type: String },

    #[error("malformed topic {topic:?}")]
    MalformedTopic { topic: String },

    #[error("entity store error: {0}")]
    Store(#[from] aetheris_store::StoreError),

    #[error("time series error: {0}")]
    TimeSeries(#[from] aetheris_timeseries::TimeSeriesError),

    #[error("alert engine error: {0}")]
    Alerts(#[from] aetheris_alerts::AlertError),

    #[error("job tracker error: {0}")]
    Jobs(#[from] aetheris_jobs::JobError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
