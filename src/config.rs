//! Configuration files are JSON, validated against embedded schemas before deserialising

/// Compile the embedded JSON schemas
pub mod schema;
/// Read, validate and deserialise a configuration file
pub mod load;
/// Connection and path facts for one HPC system
pub mod backend;
/// Declarative experiment parameters
pub mod experiment;

pub use backend::BackendConfig;
pub use experiment::{ExperimentDescriptor, JobKind, NodeRequest};
