//! Submit experiments to a PBS/Torque cluster over ssh, wait for them, and collect their logs

use std::path::PathBuf;

/// Error taxonomy shared by every stage of a run
pub mod error;
/// Load and validate backend and experiment configuration
pub mod config;
/// Capabilities shared by the components of a run
pub mod context;
/// ssh command execution and rsync staging
pub mod remote;
/// qstat output parsing and scheduler state codes
pub mod scheduler;
/// Job identity, submission and the polling state machine
pub mod job;
/// Remote log path resolution and retrieval
pub mod logs;
/// Stage-in, submit, wait, collect
pub mod runner;
/// SQLite ledger of submitted jobs
pub mod db;
/// Report output formats
pub mod format;

/// Local directory holding the job ledger
pub struct WorkingDirectory {
    pub path: PathBuf,
}
