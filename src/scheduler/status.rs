use log::debug;

use crate::error::{HpcError, Result};
use crate::job::record::numeric_prefix;

/// One row of the `qstat` job table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusRow {
    pub job_id: String,
    pub job_name: String,
    pub job_user: String,
    pub job_time: String,
    pub job_state: String,
    pub job_queue: String,
}

/// Turns raw status query output into the row of the tracked job
///
/// `Ok(None)` means the scheduler doesn't know the job.
pub trait JobStatusParser: Send + Sync {
    fn parse(&self, raw_output: &str, stripped_job_id: &str) -> Result<Option<JobStatusRow>>;
}

/// Parser for the default Torque `qstat` table
///
/// ```text
/// Job ID                    Name             User            Time Use S Queue
/// ------------------------- ---------------- --------------- -------- - -----
/// 1234.cluster               job_script.sh    ci              00:01:00 R batch
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct QstatParser;

/// header and separator
const HEADER_LINES: usize = 2;
const FIELDS: usize = 6;

impl QstatParser {
    /// Every job row of the table
    pub fn parse_rows(&self, raw_output: &str) -> Result<Vec<JobStatusRow>> {
        raw_output
            .split('\n')
            .skip(HEADER_LINES)
            .filter(|line| !line.trim().is_empty())
            .map(parse_row)
            .collect()
    }
}

impl JobStatusParser for QstatParser {
    fn parse(&self, raw_output: &str, stripped_job_id: &str) -> Result<Option<JobStatusRow>> {
        if raw_output.trim().is_empty() {
            debug!("Empty qstat output for job {stripped_job_id}");
            return Ok(None);
        }

        let mut rows = self.parse_rows(raw_output)?;
        if let Some(position) = rows.iter().position(|row| numeric_prefix(&row.job_id) == stripped_job_id) {
            return Ok(Some(rows.swap_remove(position)));
        }

        // a query filtered to one job id lists just that job, even when the id is truncated
        match rows.len() {
            1 => Ok(rows.pop()),
            _ => Ok(None),
        }
    }
}

fn parse_row(line: &str) -> Result<JobStatusRow> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [job_id, job_name, job_user, job_time, job_state, job_queue] => Ok(JobStatusRow {
            job_id: job_id.to_string(),
            job_name: job_name.to_string(),
            job_user: job_user.to_string(),
            job_time: job_time.to_string(),
            job_state: job_state.to_string(),
            job_queue: job_queue.to_string(),
        }),
        _ => Err(HpcError::Parse(format!(
            "expected {} qstat columns, found {} in '{}'",
            FIELDS,
            fields.len(),
            line.trim()
        ))),
    }
}
