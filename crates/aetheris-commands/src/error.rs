use thiserror::Error;

/// Errors surfaced by the Command Router (§4.H, §7).
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("entity store error: {0}")]
    Store(#[from] aetheris_store::StoreError),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("no response channel for command {command_id}")]
    NoResponder { command_id: uuid::Uuid },
}

pub type Result<T> = std::result::Result<T, CommandError>;
