use log::debug;

use crate::error::{HpcError, Result};
use crate::scheduler::JobState;

/// Identity and last known state of one submitted job
///
/// `job_id` and `start_time` are write-once. `stripped_job_id` is derived from `job_id` and is what
/// qstat and the log file names use.
#[derive(Debug, Clone)]
pub struct JobRecord {
    job_id: Option<String>,
    stripped_job_id: Option<String>,
    start_time: Option<i64>,
    state: JobState,
}

impl Default for JobRecord {
    fn default() -> Self {
        JobRecord::new()
    }
}

impl JobRecord {
    pub fn new() -> JobRecord {
        JobRecord { job_id: None, stripped_job_id: None, start_time: None, state: JobState::Unsubmitted }
    }

    pub fn set_job_id(&mut self, job_id: &str) -> Result<()> {
        if let Some(existing) = &self.job_id {
            return Err(HpcError::InvariantViolation(format!(
                "job id cannot be overridden, already set to {existing}"
            )));
        }
        let stripped = numeric_prefix(job_id);
        if stripped.is_empty() {
            return Err(HpcError::Parse(format!("job id '{job_id}' has no numeric prefix")));
        }
        self.stripped_job_id = Some(stripped.to_string());
        self.job_id = Some(job_id.to_string());
        Ok(())
    }

    pub fn set_start_time(&mut self, millis: i64) -> Result<()> {
        if let Some(existing) = self.start_time {
            return Err(HpcError::InvariantViolation(format!(
                "start time cannot be overridden, already set to {existing}"
            )));
        }
        self.start_time = Some(millis);
        Ok(())
    }

    /// Record a polled state; a completed job stays completed
    pub fn observe(&mut self, state: JobState) {
        if self.state == JobState::Complete {
            debug!("Ignoring state {state} for completed job");
            return;
        }
        self.state = state;
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn stripped_job_id(&self) -> Option<&str> {
        self.stripped_job_id.as_deref()
    }

    pub fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Full and numeric job id, for operations that only make sense after submission
    pub fn submitted_ids(&self) -> Result<(&str, &str)> {
        match (self.job_id.as_deref(), self.stripped_job_id.as_deref()) {
            (Some(job_id), Some(stripped)) => Ok((job_id, stripped)),
            _ => Err(HpcError::InvariantViolation("job has not been submitted".to_string())),
        }
    }
}

/// Longest leading run of ASCII digits
pub fn numeric_prefix(job_id: &str) -> &str {
    let end = job_id
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(job_id.len(), |(index, _)| index);
    &job_id[..end]
}

/// A job id that can name one directory on the remote host
///
/// Trailing whitespace is dropped. The id must start with digits and may only contain ASCII
/// alphanumerics, `.`, `-` and `_`, so it can't leave its parent directory or reach the remote shell
/// as anything but a single word.
pub fn checked_job_id(job_id: &str) -> Result<&str> {
    let job_id = job_id.trim_end();
    if numeric_prefix(job_id).is_empty() {
        return Err(HpcError::Configuration(format!("job id '{job_id}' has no numeric prefix")));
    }
    if let Some(c) = job_id.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))) {
        return Err(HpcError::Configuration(format!("job id '{job_id}' contains '{c}'")));
    }
    Ok(job_id)
}
