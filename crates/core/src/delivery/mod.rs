//! Delivery-confirmation (SMS / email webhook) payloads and retries.

mod delivery_model;
mod delivery_retry_manager;
mod delivery_traits;

pub use delivery_model::*;
pub use delivery_retry_manager::*;
pub use delivery_traits::*;
