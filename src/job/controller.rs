use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{ExperimentDescriptor, JobKind};
use crate::context::Backend;
use crate::error::{HpcError, Result};
use crate::job::dashboard::dashboard_link;
use crate::job::record::JobRecord;
use crate::remote::RemoteOutput;
use crate::scheduler::JobState;

/// Upper bound on waiting for one job unless the operator asks for something else
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_STATUS_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// How long and how patiently to wait for a job
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    /// Sleep before every status query
    pub poll_interval: Duration,
    /// Give up while the job is still active after this long, `None` waits forever
    pub max_wait: Option<Duration>,
    /// Extra attempts for a failing status query before the run fails
    pub status_retries: u32,
    /// First pause between attempts, doubled after each one
    pub retry_backoff: Duration,
}

impl WaitPolicy {
    pub fn new(poll_interval: Duration) -> WaitPolicy {
        WaitPolicy {
            poll_interval,
            max_wait: Some(DEFAULT_MAX_WAIT),
            status_retries: DEFAULT_STATUS_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Submits one job and follows it to a terminal state
///
/// The controller is the only writer of its [`JobRecord`].
pub struct JobController<'a> {
    backend: Backend<'a>,
    policy: WaitPolicy,
    record: JobRecord,
}

impl<'a> JobController<'a> {
    pub fn new(backend: Backend<'a>, policy: WaitPolicy) -> JobController<'a> {
        JobController { backend, policy, record: JobRecord::new() }
    }

    pub fn record(&self) -> &JobRecord {
        &self.record
    }

    /// Scheduler arguments first, VM arguments second
    pub fn build_submission_args(descriptor: &ExperimentDescriptor) -> Vec<String> {
        let mut args = Vec::new();

        match descriptor.scheduler_args() {
            Some(qsub_args) => args.push(qsub_args.to_string()),
            None => warn!("Parameter 'qsub_args' not found for experiment {}", descriptor.name()),
        }
        if let Some(request) = descriptor.node_request() {
            args.push("-l".to_string());
            args.push(request.to_resource_list());
        }
        if let JobKind::Vm { vm_args } = descriptor.kind() {
            args.push(vm_args.clone());
        }

        debug!("Submission arguments: {:?}", args);
        args
    }

    pub async fn submit(&mut self, descriptor: &ExperimentDescriptor) -> Result<()> {
        info!("Submitting experiment '{}' to HPC system", descriptor.name());
        let config = self.backend.config;

        let mut args = Self::build_submission_args(descriptor);
        args.push(descriptor.script_name().to_string());

        let command = match descriptor.kind() {
            JobKind::Vm { .. } => {
                info!("VM job detected");
                &config.path_vsub
            }
            JobKind::BareMetal => {
                info!("Bare-metal job detected");
                &config.path_qsub
            }
        };
        info!("Using command '{}' with arguments {:?} for job submission", command, args);

        self.record.set_start_time(Utc::now().timestamp_millis())?;
        let output = self.backend.executor.execute(command, &args).await?;
        let job_id = find_job_id(&output, &config.domain)?;

        self.record.set_job_id(job_id)?;
        self.record.observe(JobState::Queued);
        info!("Job id: {job_id}");

        if let Some(start_time) = self.record.start_time() {
            match dashboard_link(config, job_id, start_time) {
                Ok(Some(link)) => info!("Job performance data at: {link}"),
                Ok(None) => {}
                Err(err) => warn!("No dashboard link for job {job_id}: {err}"),
            }
        }
        Ok(())
    }

    /// Query the scheduler once and record the state; `true` while the job is still active
    ///
    /// Cancelling `cancel` abandons the query, including any retries still pending.
    pub async fn poll(&mut self, cancel: &CancellationToken) -> Result<bool> {
        let (job_id, stripped) = self.record.submitted_ids()?;
        let (job_id, stripped) = (job_id.to_string(), stripped.to_string());

        let output = self.query_status(&job_id, &stripped, cancel).await?;
        let row = self.backend.parser.parse(&output.stdout, &stripped)?;
        let state = JobState::from_code(row.as_ref().map(|row| row.job_state.as_str()));

        match (&state, &row) {
            (JobState::Complete, None) => debug!("Job ID '{job_id}' not found, assume finished"),
            (JobState::Held, _) => error!("Job with ID '{job_id}' is on hold, aborting"),
            (JobState::Unknown(code), _) => error!("Job with ID '{job_id}' is in an unknown state {code}"),
            (state, _) => debug!("Job with ID '{job_id}' is {state}"),
        }

        self.record.observe(state);
        Ok(self.record.state().is_active())
    }

    /// Sleep and poll until the job leaves the active states
    ///
    /// Held and unknown states are returned, not raised; the caller decides what happens next.
    pub async fn wait_until_terminal(&mut self, cancel: &CancellationToken) -> Result<JobState> {
        let job_id = self.record.submitted_ids()?.0.to_string();
        info!("Waiting for job {job_id} to complete. This may take quite some time ...");
        let started = Instant::now();

        loop {
            debug!("Sleeping for {:?}", self.policy.poll_interval);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(&job_id)),
                _ = sleep(self.policy.poll_interval) => {}
            }

            if !self.poll(cancel).await? {
                break;
            }

            if let Some(max_wait) = self.policy.max_wait {
                let waited = started.elapsed();
                if waited >= max_wait {
                    error!("Job {job_id} still {} after {:?}", self.record.state(), waited);
                    return Err(HpcError::WaitTimeout { job_id, waited_secs: waited.as_secs() });
                }
            }
        }

        let state = self.record.state().clone();
        if state.is_failure() {
            error!("Job {job_id} stopped in state {state}");
        } else {
            info!("Job {job_id} finished. Unblocking now.");
        }
        Ok(state)
    }

    async fn query_status(
        &self,
        job_id: &str,
        stripped_job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RemoteOutput> {
        let qstat = &self.backend.config.path_qstat;
        let args = vec![stripped_job_id.to_string()];
        let mut backoff = self.policy.retry_backoff;
        let mut attempt = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(job_id)),
                result = self.backend.executor.execute(qstat, &args) => result,
            };
            match result {
                Ok(output) => return Ok(output),
                Err(err) if err.is_transient() && attempt < self.policy.status_retries => {
                    attempt += 1;
                    warn!(
                        "Error checking state of job {stripped_job_id}: {err}. Retry {attempt}/{} in {:?}",
                        self.policy.status_retries, backoff
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled(job_id)),
                        _ = sleep(backoff) => {}
                    }
                    backoff = backoff.saturating_mul(2);
                }
                Err(err) => {
                    error!("Error checking state of job {stripped_job_id}: {err}");
                    return Err(err);
                }
            }
        }
    }
}

fn cancelled(job_id: &str) -> HpcError {
    warn!("Stopped waiting for job {job_id}");
    HpcError::Cancelled { job_id: job_id.to_string() }
}

/// The job id is the first line containing the domain, unless any line reports an error
fn find_job_id<'o>(output: &'o RemoteOutput, domain: &str) -> Result<&'o str> {
    let lines = output.lines();

    if let Some(line) = lines.iter().find(|line| line.contains("error")) {
        error!("Job submission failed: {line}");
        return Err(HpcError::SubmissionRejected(line.to_string()));
    }

    match lines.iter().find(|line| line.contains(domain)) {
        Some(line) => {
            debug!("Job id found: {line}");
            Ok(*line)
        }
        None => Err(HpcError::Parse(format!("no job id found in submission output:\n{}", output.stdout))),
    }
}
