use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{HpcError, Result};
use crate::remote::{FileTransfer, RemoteExecutor, RemoteOutput};

/// Replays canned responses in order and records every call
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    responses: Mutex<VecDeque<Result<RemoteOutput>>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
    copies: Mutex<Vec<(PathBuf, String)>>,
}

impl ScriptedExecutor {
    pub(crate) fn new(responses: Vec<Result<RemoteOutput>>) -> Self {
        ScriptedExecutor { responses: Mutex::new(responses.into()), ..Default::default() }
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn copies(&self) -> Vec<(PathBuf, String)> {
        self.copies.lock().unwrap().clone()
    }
}

pub(crate) fn failure(command: &str) -> HpcError {
    HpcError::RemoteCommand {
        command: command.to_string(),
        stderr: "ssh: connect to host frontend port 22: Connection refused".to_string(),
        exit_status: Some(255),
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn execute(&self, command: &str, args: &[String]) -> Result<RemoteOutput> {
        self.calls.lock().unwrap().push((command.to_string(), args.to_vec()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(HpcError::RemoteCommand {
                command: command.to_string(),
                stderr: "no scripted response left".to_string(),
                exit_status: None,
            }))
    }
}

#[async_trait]
impl FileTransfer for ScriptedExecutor {
    async fn copy_to_remote(&self, local: &Path, remote_dir: &str) -> Result<()> {
        self.copies.lock().unwrap().push((local.to_path_buf(), remote_dir.to_string()));
        Ok(())
    }
}
