//! AETHERIS Ingestion Dispatcher
//!
//! Typed per-stream handlers (§3, §4.C) sitting between the Broker Adapter
//! and the Time-Series Writer / Entity Store / Alert Engine / Job Tracker /
//! Command Router.

pub mod dispatcher;
pub mod error;
pub mod rate_limit;

pub use dispatcher::{DispatchMetrics, Dispatcher};
pub use error::{DispatchError, Result};
