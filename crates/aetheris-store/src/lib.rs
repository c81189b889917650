//! AETHERIS Entity Store
//!
//! Relational persistence (§3, §4.E) for Robots, Thresholds, Alerts, Jobs
//! and the append-only audit log. Grounded on `hdds-persistence`'s
//! `SqliteStore`: a `Mutex<Connection>` behind a small struct, schema
//! created idempotently with `CREATE TABLE IF NOT EXISTS`, synchronous
//! rusqlite calls made directly from async call sites without
//! `spawn_blocking`.

pub mod entity_store;
pub mod error;

pub use entity_store::EntityStore;
pub use error::{Result, StoreError};
