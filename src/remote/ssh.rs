use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use log::{debug, info};
use tokio::process::Command;

use crate::config::BackendConfig;
use crate::error::{HpcError, Result};
use crate::remote::{FileTransfer, RemoteExecutor, RemoteOutput};

/// Connection parameters for the submission host, shared by every remote call of a run
///
/// Holds no session state, each call spawns its own `ssh` or `rsync` process.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    host: String,
    user_name: String,
    port: u16,
    key: String,
}

impl SshExecutor {
    pub fn new(config: &BackendConfig) -> SshExecutor {
        debug!(
            "SSH properties host: {}, user: {}, port: {}",
            config.host, config.user_name, config.ssh_port
        );
        SshExecutor {
            host: config.host.clone(),
            user_name: config.user_name.clone(),
            port: config.ssh_port,
            key: config.ssh_key.clone(),
        }
    }

    fn ssh_args(&self) -> Vec<String> {
        vec![
            "-n".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-l".to_string(),
            self.user_name.clone(),
            "-p".to_string(),
            self.port.to_string(),
            "-i".to_string(),
            self.key.clone(),
            self.host.clone(),
        ]
    }

    /// Remote shell used by rsync, so staging authenticates the same way as commands do
    fn rsync_shell(&self) -> String {
        format!("ssh -o BatchMode=yes -p {} -i {}", self.port, self.key)
    }

    fn destination(&self, remote_dir: &str) -> String {
        format!("{}@{}:{}", self.user_name, self.host, remote_dir)
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, command: &str, args: &[String]) -> Result<RemoteOutput> {
        let mut ssh = Command::new("ssh");
        let cmd = ssh.args(self.ssh_args()).arg(command).args(args);
        debug!("{:?}", &cmd);

        let output = cmd.output().await.map_err(|err| HpcError::RemoteCommand {
            command: command.to_string(),
            stderr: format!("failed to spawn ssh: {err}"),
            exit_status: None,
        })?;

        let result = into_remote_output(command, output)?;
        debug!("{} output:\n{}", command, result.stdout);
        Ok(result)
    }
}

#[async_trait]
impl FileTransfer for SshExecutor {
    async fn copy_to_remote(&self, local: &Path, remote_dir: &str) -> Result<()> {
        let destination = self.destination(remote_dir);
        info!("Staging {} to {}", local.display(), destination);

        let mut rsync = Command::new("rsync");
        let cmd = rsync
            .arg("-azvrg")
            .arg("-e")
            .arg(self.rsync_shell())
            .arg(local)
            .arg(&destination);
        debug!("{:?}", &cmd);

        let output = cmd.output().await.map_err(|err| HpcError::RemoteCommand {
            command: "rsync".to_string(),
            stderr: format!("failed to spawn rsync: {err}"),
            exit_status: None,
        })?;

        let result = into_remote_output("rsync", output)?;
        debug!("rsync output:\n{}", result.stdout);
        Ok(())
    }
}

fn into_remote_output(command: &str, output: Output) -> Result<RemoteOutput> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        Ok(RemoteOutput { stdout })
    } else {
        Err(HpcError::RemoteCommand {
            command: command.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            exit_status: output.status.code(),
        })
    }
}
