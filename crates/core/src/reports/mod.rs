//! Harvest reports: schema, local repository and the submission pipeline.

mod harvest_report_service;
mod reports_model;
mod reports_repository;

pub use harvest_report_service::*;
pub use reports_model::*;
pub use reports_repository::*;
