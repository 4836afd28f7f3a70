use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use crate::config::load::ConfigFile;
use crate::config::schema::experiment_schema;
use crate::error::{HpcError, Result};

/// Backend configuration used when neither the CLI nor the experiment names one
pub const DEFAULT_BACKEND_CONFIG: &str = "hpc_backend.json";

/// Bare-metal jobs go through qsub, VM jobs through vsub with their extra arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    BareMetal,
    Vm { vm_args: String },
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobKind::BareMetal => write!(f, "bare-metal"),
            JobKind::Vm { .. } => write!(f, "vm"),
        }
    }
}

/// A `-l nodes=N[:ppn=M]` resource request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRequest {
    pub nodes: u32,
    pub processes_per_node: Option<u32>,
}

impl NodeRequest {
    pub fn to_resource_list(&self) -> String {
        match self.processes_per_node {
            Some(ppn) => format!("nodes={}:ppn={}", self.nodes, ppn),
            None => format!("nodes={}", self.nodes),
        }
    }
}

/// Experiment file as written by the pipeline author
#[derive(Debug, Deserialize)]
struct ExperimentFile {
    name: String,
    params: ExperimentParams,
}

#[derive(Debug, Deserialize)]
struct ExperimentParams {
    job_script: String,
    input_data: Option<String>,
    hpc_config: Option<String>,
    qsub_args: Option<String>,
    vsub_args: Option<String>,
    qsub_number_of_nodes: Option<u32>,
    qsub_number_of_processes_per_node: Option<u32>,
}

/// Everything needed to run one experiment, fixed at construction
#[derive(Debug, Clone)]
pub struct ExperimentDescriptor {
    name: String,
    job_script: PathBuf,
    script_name: String,
    input_data: Option<PathBuf>,
    scheduler_args: Option<String>,
    node_request: Option<NodeRequest>,
    kind: JobKind,
    backend_config: Option<PathBuf>,
}

impl ExperimentDescriptor {
    /// A bare-metal experiment with no optional parameters
    pub fn new(name: &str, job_script: impl Into<PathBuf>) -> Result<ExperimentDescriptor> {
        let job_script = job_script.into();
        let script_name = job_script
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                HpcError::Configuration(format!("job script {} has no file name", job_script.display()))
            })?;

        Ok(ExperimentDescriptor {
            name: name.to_string(),
            job_script,
            script_name,
            input_data: None,
            scheduler_args: None,
            node_request: None,
            kind: JobKind::BareMetal,
            backend_config: None,
        })
    }

    pub fn with_input_data(mut self, input_data: impl Into<PathBuf>) -> Self {
        self.input_data = Some(input_data.into());
        self
    }

    /// Blank arguments count as none
    pub fn with_scheduler_args(mut self, args: &str) -> Self {
        self.scheduler_args = Some(args.trim()).filter(|args| !args.is_empty()).map(str::to_string);
        self
    }

    pub fn with_node_request(mut self, request: NodeRequest) -> Self {
        self.node_request = Some(request);
        self
    }

    pub fn with_vm_args(mut self, vm_args: &str) -> Self {
        self.kind = JobKind::Vm { vm_args: vm_args.to_string() };
        self
    }

    pub fn with_backend_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.backend_config = Some(path.into());
        self
    }

    /// Load an experiment file, resolving relative paths against `base_dir`
    pub fn load(path: &Path, base_dir: &Path) -> Result<ExperimentDescriptor> {
        let schema = experiment_schema()?;
        let file = ConfigFile { path: path.to_path_buf(), compiled_schema: &schema };
        let experiment: ExperimentFile = file.read()?;
        Self::from_file(experiment, base_dir)
    }

    fn from_file(experiment: ExperimentFile, base_dir: &Path) -> Result<ExperimentDescriptor> {
        let params = experiment.params;
        let mut descriptor = ExperimentDescriptor::new(&experiment.name, unify_path(base_dir, &params.job_script))?;

        if let Some(input_data) = params.input_data {
            descriptor = descriptor.with_input_data(unify_path(base_dir, &input_data));
        }
        if let Some(qsub_args) = params.qsub_args {
            descriptor = descriptor.with_scheduler_args(&qsub_args);
        }
        match (params.qsub_number_of_nodes, params.qsub_number_of_processes_per_node) {
            (Some(nodes), ppn) => {
                descriptor = descriptor.with_node_request(NodeRequest { nodes, processes_per_node: ppn });
            }
            (None, Some(_)) => {
                return Err(HpcError::Configuration(
                    "qsub_number_of_processes_per_node requires qsub_number_of_nodes".to_string(),
                ));
            }
            (None, None) => debug!("No node request for experiment {}", experiment.name),
        }
        if let Some(vsub_args) = params.vsub_args {
            descriptor = descriptor.with_vm_args(&vsub_args);
        }
        if let Some(hpc_config) = params.hpc_config {
            descriptor = descriptor.with_backend_config(unify_path(base_dir, &hpc_config));
        }

        info!("Experiment '{}' is a {} job", descriptor.name, descriptor.kind);
        Ok(descriptor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn job_script(&self) -> &Path {
        &self.job_script
    }

    /// File name of the job script, which is how it is known on the remote host
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn input_data(&self) -> Option<&Path> {
        self.input_data.as_deref()
    }

    pub fn scheduler_args(&self) -> Option<&str> {
        self.scheduler_args.as_deref()
    }

    pub fn node_request(&self) -> Option<NodeRequest> {
        self.node_request
    }

    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    pub fn is_vm(&self) -> bool {
        matches!(self.kind, JobKind::Vm { .. })
    }

    pub fn backend_config(&self) -> Option<&Path> {
        self.backend_config.as_deref()
    }

    /// Backend configuration path: explicit override, then the experiment's own, then the default
    pub fn resolve_backend_config(&self, cli_override: Option<&Path>, base_dir: &Path) -> PathBuf {
        cli_override
            .or(self.backend_config())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| base_dir.join(DEFAULT_BACKEND_CONFIG))
    }
}

fn unify_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
