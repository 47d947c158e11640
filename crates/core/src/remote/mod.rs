//! Application backend port and the atomic-create client built on it.

mod persistence_client;
mod remote_model;
mod remote_traits;

pub use persistence_client::*;
pub use remote_model::*;
pub use remote_traits::*;
