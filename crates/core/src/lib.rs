//! Offline-first persistence and synchronization of recreational harvest
//! reports.
//!
//! Reports are written to a device-local store first. From there they travel
//! two independent paths: directly to the government reporting endpoint
//! (with an offline retry queue) and to the application backend (with a
//! pending-sync index and dedup-before-create). Storage, HTTP and platform
//! facilities are injected through the port traits in this crate.

pub mod config;
pub mod delivery;
pub mod errors;
pub mod identity;
pub mod remote;
pub mod reports;
pub mod secrets;
pub mod storage;
pub mod submissions;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use config::EngineConfig;
pub use errors::{Error, RemoteError, RemoteResult, Result};
