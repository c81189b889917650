use thiserror::Error;

/// Errors surfaced by the Entity Store (§4.E, §7).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A job transition was attempted from a terminal status (§3, §7:
    /// "invariant violation on persistence" — rejected, never overwritten).
    #[error("job {job_id} is already terminal, rejecting transition")]
    JobAlreadyTerminal { job_id: String },

    /// `createAlert` was asked to reference a robot that does not exist
    /// (§8 invariant 1 is enforced at the call site by auto-creating the
    /// robot first; this variant exists for defensive callers).
    #[error("robot {robot_id} does not exist")]
    UnknownRobot { robot_id: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
