//! One experiment, start to finish
//!
//! Stage-in, submit, wait and collect run strictly in sequence and the first failure ends the run.
//! Held or unrecognised jobs still get their logs collected before the run is reported as failed.

use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::ExperimentDescriptor;
use crate::context::Backend;
use crate::db::job::update::mark_cleaned;
use crate::error::{HpcError, Result};
use crate::job::record::checked_job_id;
use crate::job::{JobController, WaitPolicy};
use crate::logs::{CollectedLog, LogCollector, StdStream};
use crate::scheduler::JobState;

/// What a successful run hands back to the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub endpoint: Endpoint,
    pub data: RunData,
    pub job_id: String,
    pub backend: String,
    #[serde(skip)]
    pub logs: Vec<CollectedLog>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Endpoint {
    pub identifier: String,
    pub host: String,
}

/// Remote locations of the job's log files
#[derive(Debug, Clone, Serialize)]
pub struct RunData {
    pub stdout: String,
    pub stderr: String,
    pub vtorque_log: Option<String>,
}

/// Operator choices that aren't part of the experiment itself
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Remove the remote vTorque log directory once logs have been collected
    pub clean_up: bool,
}

pub struct ExperimentRunner<'a> {
    backend: Backend<'a>,
    policy: WaitPolicy,
    ledger: Option<&'a Connection>,
}

impl<'a> ExperimentRunner<'a> {
    pub fn new(backend: Backend<'a>, policy: WaitPolicy) -> Self {
        ExperimentRunner { backend, policy, ledger: None }
    }

    /// Record submitted jobs and their final state in `conn`
    pub fn with_ledger(mut self, conn: &'a Connection) -> Self {
        self.ledger = Some(conn);
        self
    }

    pub async fn run(
        &self,
        descriptor: &ExperimentDescriptor,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        info!("Experiment execution starts");
        info!("Executing experiment '{}'", descriptor.name());

        self.stage_in(descriptor).await?;

        let mut controller = JobController::new(self.backend, self.policy.clone());
        controller.submit(descriptor).await?;
        if let Some(conn) = self.ledger {
            controller.record().save(conn, descriptor.name(), &self.backend.config.host)?;
        }

        let waited = controller.wait_until_terminal(cancel).await;
        if let Some(conn) = self.ledger {
            controller.record().update_state(conn)?;
        }
        let state = waited?;

        let record = controller.record();
        let (job_id, _) = record.submitted_ids()?;
        let collector = LogCollector::new(self.backend, record, descriptor);
        let logs = collector.collect_all().await?;

        match state {
            JobState::Held => return Err(HpcError::JobHeld { job_id: job_id.to_string() }),
            JobState::Unknown(code) => {
                return Err(HpcError::JobUnknownState { job_id: job_id.to_string(), code });
            }
            _ => {}
        }

        if options.clean_up {
            self.clean(job_id).await;
        }

        let report = RunReport {
            endpoint: Endpoint { identifier: "submission host".to_string(), host: self.backend.config.host.clone() },
            data: RunData {
                stdout: collector.std_log_path(StdStream::Stdout)?,
                stderr: collector.std_log_path(StdStream::Stderr)?,
                vtorque_log: collector.vm_debug_log_path()?,
            },
            job_id: job_id.to_string(),
            backend: "HPC".to_string(),
            logs,
        };
        info!("Experiment execution finished");
        Ok(report)
    }

    /// Copy input data and the job script into the remote execution directory
    pub async fn stage_in(&self, descriptor: &ExperimentDescriptor) -> Result<()> {
        info!("Staging data into the HPC system");
        let execution_dir = &self.backend.config.execution_dir;

        match descriptor.input_data() {
            Some(input_data) => self.backend.transfer.copy_to_remote(input_data, execution_dir).await?,
            None => info!("No input data for experiment '{}'", descriptor.name()),
        }
        self.backend.transfer.copy_to_remote(descriptor.job_script(), execution_dir).await
    }

    /// Remove the job's remote vTorque log directory, logging rather than raising failures
    ///
    /// Ids that could name anything but one directory below the log root are skipped.
    pub async fn clean(&self, job_id: &str) {
        let job_id = match checked_job_id(job_id) {
            Ok(job_id) => job_id,
            Err(err) => {
                warn!("Not cleaning up: {err}");
                return;
            }
        };
        let path = format!("{}/{}", self.backend.config.path_vtorque_log, job_id);
        info!("Removing remote directory {path}");

        let args = vec!["-rf".to_string(), path];
        match self.backend.executor.execute("rm", &args).await {
            Ok(_) => {
                if let Some(conn) = self.ledger {
                    if let Err(err) = mark_cleaned(conn, job_id) {
                        warn!("Cleaned {job_id} but couldn't update the ledger: {err}");
                    }
                }
            }
            Err(err) => warn!("Clean up of job {job_id} failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::config::backend::tests::backend;
    use crate::db::job::load::find_job;
    use crate::db::open::create_schema;
    use crate::remote::scripted::{failure, ScriptedExecutor};
    use crate::remote::RemoteOutput;
    use crate::scheduler::status::tests::qstat_table;
    use crate::scheduler::QstatParser;

    fn instant_policy() -> WaitPolicy {
        WaitPolicy { poll_interval: Duration::ZERO, max_wait: None, status_retries: 0, retry_backoff: Duration::ZERO }
    }

    fn state(code: &str) -> Result<RemoteOutput> {
        Ok(RemoteOutput::new(qstat_table(&[&format!("1234.cluster job.sh ci 00:01:00 {code} batch")])))
    }

    fn ok(stdout: &str) -> Result<RemoteOutput> {
        Ok(RemoteOutput::new(stdout))
    }

    #[tokio::test]
    async fn stage_in_copies_input_data_then_job_script() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };
        let descriptor = ExperimentDescriptor::new("exp", "/ci/job.sh").unwrap().with_input_data("/ci/input/");

        ExperimentRunner::new(backend, instant_policy()).stage_in(&descriptor).await.unwrap();

        assert_eq!(
            executor.copies(),
            vec![(PathBuf::from("/ci/input/"), "~/".to_string()), (PathBuf::from("/ci/job.sh"), "~/".to_string())]
        );
    }

    #[tokio::test]
    async fn successful_run_reports_log_paths() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![
            ok("1234.cluster.example.org\n"),
            state("R"),
            state("C"),
            ok("stdout"),
            ok("stderr"),
        ]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };
        let descriptor = ExperimentDescriptor::new("exp", "/ci/job.sh").unwrap();

        let report = ExperimentRunner::new(backend, instant_policy())
            .run(&descriptor, &RunOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.job_id, "1234.cluster.example.org");
        assert_eq!(report.endpoint.host, "frontend.cluster.example.org");
        assert_eq!(report.data.stdout, "~/job.sh.o1234");
        assert_eq!(report.data.stderr, "~/job.sh.e1234");
        assert_eq!(report.data.vtorque_log, None);
        assert_eq!(report.logs.len(), 2);
        assert!(executor.calls().iter().all(|(command, _)| command != "rm"));
    }

    #[tokio::test]
    async fn held_job_collects_logs_then_fails() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![ok("1234.cluster.example.org\n"), state("H"), ok("out"), ok("err")]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };
        let descriptor = ExperimentDescriptor::new("exp", "/ci/job.sh").unwrap();

        let err = ExperimentRunner::new(backend, instant_policy())
            .run(&descriptor, &RunOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HpcError::JobHeld { .. }));
        assert_eq!(executor.calls().iter().filter(|(command, _)| command == "cat").count(), 2);
    }

    #[tokio::test]
    async fn rejected_submission_stops_before_waiting() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![ok("qsub: error: unknown queue\n")]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };
        let descriptor = ExperimentDescriptor::new("exp", "/ci/job.sh").unwrap();

        let err = ExperimentRunner::new(backend, instant_policy())
            .run(&descriptor, &RunOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HpcError::SubmissionRejected(_)));
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn clean_up_on_request_removes_vtorque_logs_and_updates_ledger() {
        let config = backend();
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        let executor = ScriptedExecutor::new(vec![
            ok("1234.cluster.example.org\n"),
            state("C"),
            ok("out"),
            ok("err"),
            ok("debug"),
            ok(""),
        ]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };
        let descriptor = ExperimentDescriptor::new("exp", "/ci/job.sh").unwrap().with_vm_args("-vm vcpus=2");

        let report = ExperimentRunner::new(backend, instant_policy())
            .with_ledger(&conn)
            .run(&descriptor, &RunOptions { clean_up: true }, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.data.vtorque_log.as_deref(), Some("/var/log/vtorque/1234.cluster.example.org/debug.log"));
        let (command, args) = executor.calls().pop().unwrap();
        assert_eq!(command, "rm");
        assert_eq!(args, vec!["-rf", "/var/log/vtorque/1234.cluster.example.org"]);

        let entry = find_job(&conn, "1234.cluster.example.org").unwrap().unwrap();
        assert_eq!(entry.state, "complete");
        assert!(entry.cleaned);
    }

    #[tokio::test]
    async fn clean_never_removes_outside_one_job_directory() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };
        let runner = ExperimentRunner::new(backend, instant_policy());

        for job_id in ["", " \n", "../..", "1234/..", "1234; rm -rf ~", "$(reboot)"] {
            runner.clean(job_id).await;
        }

        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn clean_drops_trailing_newline_from_job_id() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![ok("")]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };

        ExperimentRunner::new(backend, instant_policy()).clean("1234.cluster.example.org\n").await;

        assert_eq!(
            executor.calls(),
            vec![("rm".to_string(), vec!["-rf".to_string(), "/var/log/vtorque/1234.cluster.example.org".to_string()])]
        );
    }

    #[tokio::test]
    async fn failed_clean_is_only_logged() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![Err(failure("rm"))]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };

        ExperimentRunner::new(backend, instant_policy()).clean("1234.cluster.example.org").await;

        assert_eq!(executor.calls().len(), 1);
    }
}
