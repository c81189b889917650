//! AETHERIS Alert Engine
//!
//! Per-`(robot_id, metric)` hysteresis state machine (§3, §4.F), reconciled
//! against the Entity Store's open alerts on startup and fed by the
//! Ingestion Dispatcher's numeric observations.

pub mod engine;
pub mod error;
pub mod state;

pub use engine::AlertEngine;
pub use error::{AlertError, Result};
pub use state::{AlertEvent, AlertState};
