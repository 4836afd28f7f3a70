use thiserror::Error;

pub type Result<T> = std::result::Result<T, HpcError>;

#[derive(Debug, Error)]
pub enum HpcError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("remote command `{command}` failed ({}): {stderr}", status_text(.exit_status))]
    RemoteCommand {
        command: String,
        stderr: String,
        exit_status: Option<i32>,
    },

    #[error("unexpected scheduler output: {0}")]
    Parse(String),

    #[error("job submission rejected by scheduler: {0}")]
    SubmissionRejected(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("job {job_id} is on hold")]
    JobHeld { job_id: String },

    #[error("job {job_id} is in an unknown state {code}")]
    JobUnknownState { job_id: String, code: String },

    #[error("job {job_id} still active after {waited_secs} seconds")]
    WaitTimeout { job_id: String, waited_secs: u64 },

    #[error("waiting for job {job_id} was cancelled")]
    Cancelled { job_id: String },

    #[error("job ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),
}

fn status_text(exit_status: &Option<i32>) -> String {
    match exit_status {
        Some(code) => format!("exit status {code}"),
        None => "no exit status".to_string(),
    }
}

impl HpcError {
    /// Transport and remote exit failures are the only errors worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, HpcError::RemoteCommand { .. })
    }
}
