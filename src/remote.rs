//! Remote execution boundary
//!
//! Everything above this module talks to the cluster through [`RemoteExecutor`] and
//! [`FileTransfer`]. Neither retries; retry policy belongs to the callers.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// ssh and rsync implementations of the traits below
pub mod ssh;
#[cfg(test)]
pub(crate) mod scripted;

/// Captured stdout of a remote command that exited successfully
///
/// Non-zero exits never get here, the executor reports them as errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub stdout: String,
}

impl RemoteOutput {
    pub fn new(stdout: impl Into<String>) -> Self {
        RemoteOutput { stdout: stdout.into() }
    }

    /// stdout split into lines without their terminators
    pub fn lines(&self) -> Vec<&str> {
        self.stdout.lines().collect()
    }
}

/// Runs a named command with arguments on the configured host
///
/// A non-zero exit status or a transport failure is an [`crate::error::HpcError::RemoteCommand`].
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, command: &str, args: &[String]) -> Result<RemoteOutput>;
}

/// Copies a local file or directory tree into a remote directory
#[async_trait]
pub trait FileTransfer: Send + Sync {
    async fn copy_to_remote(&self, local: &Path, remote_dir: &str) -> Result<()>;
}
