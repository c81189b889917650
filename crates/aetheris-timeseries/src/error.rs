use thiserror::Error;

/// Errors surfaced by the Time-Series Writer (§4.D, §7).
#[derive(Debug, Error)]
pub enum TimeSeriesError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TimeSeriesError>;
