//! Remote log files of a finished job
//!
//! Torque writes stdout and stderr to `~/<script>.o<id>` and `~/<script>.e<id>`. VM jobs also leave a
//! vTorque debug log under the configured log directory, keyed by the full job id.

use std::fmt;

use log::{debug, info};
use serde::Serialize;

use crate::config::ExperimentDescriptor;
use crate::context::Backend;
use crate::error::Result;
use crate::job::JobRecord;

/// Frames every printed log so operators can find them in CI output
pub const BANNER: &str = "----------------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdout,
    Stderr,
}

impl StdStream {
    fn suffix(&self) -> char {
        match self {
            StdStream::Stdout => 'o',
            StdStream::Stderr => 'e',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogKind {
    Stdout,
    Stderr,
    VmDebug,
}

impl From<StdStream> for LogKind {
    fn from(stream: StdStream) -> Self {
        match stream {
            StdStream::Stdout => LogKind::Stdout,
            StdStream::Stderr => LogKind::Stderr,
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogKind::Stdout => write!(f, "STDOUT"),
            LogKind::Stderr => write!(f, "STDERR"),
            LogKind::VmDebug => write!(f, "VTORQUE_DEBUG_LOG"),
        }
    }
}

/// A fetched log artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectedLog {
    pub kind: LogKind,
    pub path: String,
    pub content: String,
}

pub struct LogCollector<'a> {
    backend: Backend<'a>,
    record: &'a JobRecord,
    descriptor: &'a ExperimentDescriptor,
}

impl<'a> LogCollector<'a> {
    pub fn new(backend: Backend<'a>, record: &'a JobRecord, descriptor: &'a ExperimentDescriptor) -> Self {
        LogCollector { backend, record, descriptor }
    }

    pub fn std_log_path(&self, stream: StdStream) -> Result<String> {
        let (_, stripped) = self.record.submitted_ids()?;
        let path = format!("~/{}.{}{}", self.descriptor.script_name(), stream.suffix(), stripped);
        debug!("Remote {} log at {}", LogKind::from(stream), path);
        Ok(path)
    }

    /// `None` for bare-metal experiments, which have no vTorque log
    pub fn vm_debug_log_path(&self) -> Result<Option<String>> {
        if !self.descriptor.is_vm() {
            return Ok(None);
        }
        let (job_id, _) = self.record.submitted_ids()?;
        let job_id: String = job_id.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        Ok(Some(format!("{}/{}/debug.log", self.backend.config.path_vtorque_log, job_id)))
    }

    pub async fn fetch(&self, path: &str) -> Result<String> {
        info!("Fetching remote log file '{path}'");
        let output = self.backend.executor.execute("cat", &[path.to_string()]).await?;
        Ok(output.stdout)
    }

    /// Fetch and print stdout, stderr and, for VM jobs, the vTorque debug log
    pub async fn collect_all(&self) -> Result<Vec<CollectedLog>> {
        let mut targets = vec![
            (LogKind::Stdout, self.std_log_path(StdStream::Stdout)?),
            (LogKind::Stderr, self.std_log_path(StdStream::Stderr)?),
        ];
        match self.vm_debug_log_path()? {
            Some(path) => targets.push((LogKind::VmDebug, path)),
            None => debug!("No {} for bare-metal job", LogKind::VmDebug),
        }

        let mut logs = Vec::with_capacity(targets.len());
        for (kind, path) in targets {
            let content = self.fetch(&path).await?;
            print_log(kind, &content);
            logs.push(CollectedLog { kind, path, content });
        }
        Ok(logs)
    }
}

fn print_log(kind: LogKind, content: &str) {
    println!("{BANNER}\nLog file content: {kind}\n{BANNER}");
    println!("{content}");
    println!("{BANNER}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::backend::tests::backend;
    use crate::error::HpcError;
    use crate::remote::scripted::{failure, ScriptedExecutor};
    use crate::remote::RemoteOutput;
    use crate::scheduler::QstatParser;

    fn submitted(job_id: &str) -> JobRecord {
        let mut record = JobRecord::new();
        record.set_job_id(job_id).unwrap();
        record
    }

    #[test]
    fn std_log_paths_use_script_name_and_stripped_id() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };
        let record = submitted("1234.cluster.example.org");
        let descriptor = ExperimentDescriptor::new("exp", "/ci/experiment01/job_script.sh").unwrap();
        let collector = LogCollector::new(backend, &record, &descriptor);

        assert_eq!(collector.std_log_path(StdStream::Stdout).unwrap(), "~/job_script.sh.o1234");
        assert_eq!(collector.std_log_path(StdStream::Stderr).unwrap(), "~/job_script.sh.e1234");
        assert_eq!(
            collector.std_log_path(StdStream::Stdout).unwrap(),
            collector.std_log_path(StdStream::Stdout).unwrap()
        );
        assert_eq!(collector.vm_debug_log_path().unwrap(), None);
    }

    #[test]
    fn vm_debug_log_path_strips_newlines() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };
        let record = submitted("1234.cluster.example.org\n");
        let descriptor = ExperimentDescriptor::new("exp", "/ci/job.sh").unwrap().with_vm_args("-vm vcpus=2");
        let collector = LogCollector::new(backend, &record, &descriptor);

        let path = collector.vm_debug_log_path().unwrap();
        assert_eq!(path.as_deref(), Some("/var/log/vtorque/1234.cluster.example.org/debug.log"));
        assert_eq!(collector.vm_debug_log_path().unwrap(), path);
    }

    #[test]
    fn paths_need_a_submitted_job() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };
        let record = JobRecord::new();
        let descriptor = ExperimentDescriptor::new("exp", "/ci/job.sh").unwrap();
        let collector = LogCollector::new(backend, &record, &descriptor);

        assert!(matches!(collector.std_log_path(StdStream::Stdout), Err(HpcError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn vm_jobs_collect_three_logs_in_order() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![
            Ok(RemoteOutput::new("hello\n")),
            Ok(RemoteOutput::new("")),
            Ok(RemoteOutput::new("vm booted\n")),
        ]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };
        let record = submitted("1234.cluster.example.org");
        let descriptor = ExperimentDescriptor::new("exp", "/ci/job.sh").unwrap().with_vm_args("-vm vcpus=2");

        let logs = LogCollector::new(backend, &record, &descriptor).collect_all().await.unwrap();

        let kinds: Vec<LogKind> = logs.iter().map(|log| log.kind).collect();
        assert_eq!(kinds, vec![LogKind::Stdout, LogKind::Stderr, LogKind::VmDebug]);
        assert_eq!(logs[0].content, "hello\n");
        let fetched: Vec<String> = executor.calls().into_iter().map(|(_, args)| args[0].clone()).collect();
        assert_eq!(
            fetched,
            vec![
                "~/job.sh.o1234",
                "~/job.sh.e1234",
                "/var/log/vtorque/1234.cluster.example.org/debug.log"
            ]
        );
    }

    #[tokio::test]
    async fn bare_metal_jobs_collect_two_logs() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![Ok(RemoteOutput::new("out")), Ok(RemoteOutput::new("err"))]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };
        let record = submitted("1234.cluster.example.org");
        let descriptor = ExperimentDescriptor::new("exp", "/ci/job.sh").unwrap();

        let logs = LogCollector::new(backend, &record, &descriptor).collect_all().await.unwrap();

        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].kind, LogKind::Stderr);
        assert!(executor.calls().iter().all(|(command, _)| command == "cat"));
    }

    #[tokio::test]
    async fn fetch_failure_is_fatal() {
        let config = backend();
        let executor = ScriptedExecutor::new(vec![Err(failure("cat"))]);
        let backend = Backend { config: &config, executor: &executor, transfer: &executor, parser: &QstatParser };
        let record = submitted("1234.cluster.example.org");
        let descriptor = ExperimentDescriptor::new("exp", "/ci/job.sh").unwrap();

        let result = LogCollector::new(backend, &record, &descriptor).collect_all().await;
        assert!(matches!(result, Err(HpcError::RemoteCommand { .. })));
        assert_eq!(executor.calls().len(), 1);
    }
}
