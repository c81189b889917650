use thiserror::Error;

/// Errors surfaced by the Job Tracker (§4.G, §7).
#[derive(Debug, Error)]
pub enum JobError {
    #[error("entity store error: {0}")]
    Store(#[from] aetheris_store::StoreError),
}

pub type Result<T> = std::result::Result<T, JobError>;
