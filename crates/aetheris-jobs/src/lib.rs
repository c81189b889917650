//! AETHERIS Job Tracker
//!
//! Single-writer in-memory job table keyed by `robot_id` (§3, §4.G), backed
//! by the Entity Store for coalesced progress persistence and immediate
//! terminal-transition persistence.

pub mod error;
pub mod tracker;

pub use error::{JobError, Result};
pub use tracker::{JobEvent, JobTracker, JobTrackerConfig};
