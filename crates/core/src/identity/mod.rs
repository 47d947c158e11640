//! Device and member identities, and the rules that decide report ownership.

mod identity_model;
mod identity_service;

pub use identity_model::*;
pub use identity_service::*;
