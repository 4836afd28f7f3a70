//! Job identity, submission, and waiting for completion

/// Write-once job identity and last observed state
pub mod record;
/// Submit and poll through the remote executor
pub mod controller;
/// Grafana link to a job's performance data
pub mod dashboard;

pub use controller::{JobController, WaitPolicy};
pub use record::JobRecord;
