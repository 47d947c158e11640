//! Government-direct submission path: client port, offline queue and history.

mod government_traits;
mod submission_queue;
mod submissions_model;

pub use government_traits::*;
pub use submission_queue::*;
pub use submissions_model::*;
