use std::fmt;

/// Last observed scheduler state of a job
///
/// Torque reports a one letter code. Codes that mean the same thing for polling share a state:
/// `Q` and `W` are both queued, `S` and `R` both running. A job the scheduler no longer knows
/// about is assumed to have finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Unsubmitted,
    Queued,
    Running,
    Finishing,
    Complete,
    Held,
    Unknown(String),
}

impl JobState {
    /// Map a qstat state code, `None` meaning the job wasn't listed
    pub fn from_code(code: Option<&str>) -> JobState {
        match code {
            Some("Q") | Some("W") => JobState::Queued,
            Some("S") | Some("R") => JobState::Running,
            Some("E") => JobState::Finishing,
            Some("C") => JobState::Complete,
            Some("H") => JobState::Held,
            Some(other) => JobState::Unknown(other.to_string()),
            None => JobState::Complete,
        }
    }

    /// Keep polling while the job is queued, running or finishing
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Queued | JobState::Running | JobState::Finishing)
    }

    /// Terminal states other than a clean completion
    pub fn is_failure(&self) -> bool {
        matches!(self, JobState::Held | JobState::Unknown(_))
    }

    /// db columns are plain text
    pub fn to_db_string(&self) -> String {
        match self {
            JobState::Unknown(code) => format!("unknown:{code}"),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobState::Unsubmitted => write!(f, "unsubmitted"),
            JobState::Queued => write!(f, "queued"),
            JobState::Running => write!(f, "running"),
            JobState::Finishing => write!(f, "finishing"),
            JobState::Complete => write!(f, "complete"),
            JobState::Held => write!(f, "held"),
            JobState::Unknown(code) => write!(f, "unknown ({code})"),
        }
    }
}
