//! Device-local persisted state: the storage port and typed helpers on top of it.

mod key_value_store;
mod local_state;

pub use key_value_store::*;
pub use local_state::*;
