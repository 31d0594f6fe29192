//! `pulse check` — one cycle, one report, exit code from the fleet.

use tokio_util::sync::CancellationToken;

use pulse_core::{OutputFormat, Params, Service};
use pulsefleet_export::{render_json, render_ndjson};
use pulsefleet_probe::Supervisor;

pub async fn run(services: Vec<Service>, params: Params) -> anyhow::Result<i32> {
    let output = params.output;
    let supervisor = Supervisor::new(services, params)?;
    let result = supervisor.run_cycle(&CancellationToken::new()).await;

    let rendered = match output {
        OutputFormat::Json => render_json(&result)?,
        OutputFormat::Ndjson => render_ndjson(&result)?,
    };
    print!("{rendered}");

    Ok(result.status.exit_code())
}
