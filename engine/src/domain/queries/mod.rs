//! Queries
//! Read-only use cases

pub mod status;

pub use status::{DaemonStatus, ResourceSummary, ServiceStatusEntry, StatusQuery, StatusReport};
