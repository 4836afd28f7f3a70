use crate::config::BackendConfig;
use crate::remote::{FileTransfer, RemoteExecutor};
use crate::scheduler::JobStatusParser;

/// Capabilities for one HPC system, handed to every component of a run
///
/// Immutable and cheap to copy; nothing in a run needs exclusive access to the connection.
#[derive(Clone, Copy)]
pub struct Backend<'a> {
    pub config: &'a BackendConfig,
    pub executor: &'a dyn RemoteExecutor,
    pub transfer: &'a dyn FileTransfer,
    pub parser: &'a dyn JobStatusParser,
}
