use thiserror::Error;

/// Errors surfaced by the Alert Engine (§4.F, §7).
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("entity store error: {0}")]
    Store(#[from] aetheris_store::StoreError),
}

pub type Result<T> = std::result::Result<T, AlertError>;
