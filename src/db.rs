//! Submitted jobs are recorded in a SQLite database so they can be cleaned up by a later invocation

/// Connect to a SQLite database
pub mod open;
/// Record, update and look up submitted jobs
pub mod job;
