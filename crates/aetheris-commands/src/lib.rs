//! AETHERIS Command Router
//!
//! Per-robot FIFO command delivery with emergency-stop priority and
//! timeout-driven ack correlation (§3, §4.H).

pub mod error;
pub mod publisher;
pub mod router;

pub use error::{CommandError, Result};
pub use publisher::CommandPublisher;
pub use router::CommandRouter;
