use std::env;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::load::ConfigFile;
use crate::config::schema::backend_schema;
use crate::error::{HpcError, Result};
use crate::job::dashboard::dashboard_base;

/// Keys that may appear as `__key__` placeholders in a backend configuration file
///
/// CI deployments keep the file in version control with placeholders and inject the real values
/// through environment variables of the same name.
pub const PLACEHOLDER_KEYS: [&str; 15] = [
    "domain",
    "host",
    "user_name",
    "ssh_port",
    "ssh_key",
    "grafana",
    "grafana_dashboard_name",
    "grafana_dashboard_url",
    "grafana_host",
    "path_qstat",
    "path_qsub",
    "path_vsub",
    "path_vtorque_log",
    "execution_dir",
    "poll_time_qstat",
];

/// Connection and path facts for one remote HPC system
///
/// Every key is required, there are no silent defaults once a deployment is configured.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Submission front end, the ssh target
    pub host: String,
    /// Suffix that identifies the job id line in qsub output
    pub domain: String,
    pub user_name: String,
    pub ssh_port: u16,
    pub ssh_key: String,
    pub path_qsub: String,
    /// VM-aware submission wrapper
    pub path_vsub: String,
    pub path_qstat: String,
    /// Directory holding one debug log directory per VM job
    pub path_vtorque_log: String,
    /// Remote directory that input data and job scripts are staged into
    pub execution_dir: String,
    /// Seconds between two status queries
    pub poll_time_qstat: u64,
    pub grafana: bool,
    pub grafana_host: String,
    pub grafana_dashboard_name: String,
    /// TinyTemplate with `{grafana_host}` and `{grafana_dashboard_name}`
    pub grafana_dashboard_url: String,
}

impl BackendConfig {
    /// Load a backend configuration, resolving placeholders from the process environment
    pub fn load(path: &Path) -> Result<BackendConfig> {
        Self::load_with(path, |key| env::var(key).ok())
    }

    pub fn load_with<F>(path: &Path, lookup: F) -> Result<BackendConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let schema = backend_schema()?;
        let file = ConfigFile { path: path.to_path_buf(), compiled_schema: &schema };
        let raw = file.read_file()?;
        let text = substitute_placeholders(&raw, lookup)?;
        let config: BackendConfig = file.read_str(&text)?;
        if config.grafana {
            dashboard_base(&config)?;
        }
        info!(
            "HPC backend {}@{}:{} (domain {})",
            config.user_name, config.host, config.ssh_port, config.domain
        );
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_time_qstat)
    }
}

/// Replace every `__key__` placeholder with the value returned by `lookup`
///
/// A placeholder that can't be resolved is an error rather than being passed on to the remote host.
pub fn substitute_placeholders<F>(text: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut content = text.to_string();
    for key in PLACEHOLDER_KEYS {
        let placeholder = format!("__{key}__");
        if !content.contains(&placeholder) {
            continue;
        }
        match lookup(key) {
            Some(value) => {
                debug!("Substituting placeholder {placeholder}");
                content = content.replace(&placeholder, &value);
            }
            None => {
                return Err(HpcError::Configuration(format!(
                    "placeholder {placeholder} is set but environment variable {key} is not"
                )));
            }
        }
    }
    Ok(content)
}
