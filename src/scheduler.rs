//! Everything that knows what PBS/Torque output looks like

/// Job states and the polling decision for each scheduler code
pub mod state;
/// Parse `qstat` tables into rows
pub mod status;

pub use state::JobState;
pub use status::{JobStatusParser, JobStatusRow, QstatParser};
