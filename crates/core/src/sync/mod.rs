//! Backend synchronization: retry classification, connectivity probing and
//! the pending-sync orchestrator.

mod connectivity;
mod sync_model;
mod sync_orchestrator;

pub use connectivity::*;
pub use sync_model::*;
pub use sync_orchestrator::*;

