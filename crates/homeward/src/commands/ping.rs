//! `homeward ping`: round-trip latency.

use homeward_core::{Hub, HubConfig};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(serde::Serialize)]
struct PingReport {
    url: String,
    latency_ms: f64,
}

pub async fn handle(config: &HubConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let latency = Hub::oneshot(config, |hub| async move { hub.ping().await }).await?;

    let report = PingReport {
        url: config.url.to_string(),
        latency_ms: latency.as_secs_f64() * 1000.0,
    };
    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            format!("pong from {} in {}", report.url, humantime::format_duration(latency))
        }
        _ => output::render_single(&global.output, &report, |_| String::new(), |_| String::new()),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
