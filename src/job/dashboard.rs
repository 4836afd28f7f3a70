use serde::Serialize;
use tinytemplate::TinyTemplate;
use url::Url;

use crate::config::BackendConfig;
use crate::error::{HpcError, Result};

/// Query string selecting one job's performance data, appended to the dashboard base
static LINK: &str = "{base}var-JobId=snapTask-{user_name}-{job_id}&from={start_time}&to=now";

/// Rendering context for the configured dashboard url template
#[derive(Serialize)]
struct DashboardContext<'a> {
    grafana_host: &'a str,
    grafana_dashboard_name: &'a str,
}

/// Rendering context for the job link
#[derive(Serialize)]
struct LinkContext<'a> {
    base: &'a str,
    user_name: &'a str,
    job_id: &'a str,
    start_time: i64,
}

/// Render `grafana_dashboard_url` with the configured host and dashboard name
pub fn dashboard_base(config: &BackendConfig) -> Result<String> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("dashboard", &config.grafana_dashboard_url)
        .map_err(|err| HpcError::Configuration(format!("grafana_dashboard_url is not a valid template: {err}")))?;

    let context = DashboardContext {
        grafana_host: &config.grafana_host,
        grafana_dashboard_name: &config.grafana_dashboard_name,
    };
    tt.render("dashboard", &context)
        .map_err(|err| HpcError::Configuration(format!("can't render grafana_dashboard_url: {err}")))
}

/// Link to the job's performance data, or `None` when Grafana is disabled
pub fn dashboard_link(config: &BackendConfig, job_id: &str, start_time: i64) -> Result<Option<Url>> {
    if !config.grafana {
        return Ok(None);
    }

    let base = dashboard_base(config)?;
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("link", LINK)
        .map_err(|err| HpcError::Configuration(format!("dashboard link template: {err}")))?;

    let context = LinkContext { base: &base, user_name: &config.user_name, job_id: job_id.trim_end(), start_time };
    let link = tt
        .render("link", &context)
        .map_err(|err| HpcError::Configuration(format!("can't render dashboard link: {err}")))?;

    Url::parse(&link)
        .map(Some)
        .map_err(|err| HpcError::Configuration(format!("dashboard link '{link}' is not a valid url: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::backend::tests::backend;

    #[test]
    fn disabled_grafana_has_no_link() {
        assert_eq!(dashboard_link(&backend(), "1234.cluster", 0).unwrap(), None);
    }

    #[test]
    fn link_selects_job_and_start_time() {
        let mut config = backend();
        config.grafana = true;

        let link = dashboard_link(&config, "1234.cluster.example.org\n", 1_500_000_000_000).unwrap().unwrap();
        assert_eq!(link.host_str(), Some("grafana.example.org"));
        assert_eq!(link.path(), "/d/playground");
        assert_eq!(
            link.query(),
            Some("var-JobId=snapTask-ci-1234.cluster.example.org&from=1500000000000&to=now")
        );
    }

    #[test]
    fn relative_base_is_rejected() {
        let mut config = backend();
        config.grafana = true;
        config.grafana_dashboard_url = "{grafana_host}/d/{grafana_dashboard_name}?".to_string();
        assert!(matches!(dashboard_link(&config, "1234", 0), Err(HpcError::Configuration(_))));
    }
}
