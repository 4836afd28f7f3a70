use std::fmt;

use clap::ValueEnum;

use crate::runner::RunReport;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl OutputFormat {
    /// Render a run report for the calling pipeline
    pub fn render(&self, report: &RunReport) -> serde_json::Result<String> {
        match self {
            OutputFormat::Json => serde_json::to_string_pretty(report),
            OutputFormat::Text => {
                let mut lines = vec![
                    format!("job id:      {}", report.job_id),
                    format!("host:        {}", report.endpoint.host),
                    format!("stdout:      {}", report.data.stdout),
                    format!("stderr:      {}", report.data.stderr),
                ];
                if let Some(vtorque_log) = &report.data.vtorque_log {
                    lines.push(format!("vtorque log: {vtorque_log}"));
                }
                Ok(lines.join("\n"))
            }
        }
    }
}
