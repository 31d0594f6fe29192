//! `pulse export` — one cycle, Prometheus textfile on stdout.
//!
//! Textfile collectors redirect this into their scrape directory:
//! `pulse export --config fleet.yaml > /var/lib/node_exporter/health.prom`

use tokio_util::sync::CancellationToken;

use pulse_core::{Params, Service};
use pulsefleet_export::render_prometheus;
use pulsefleet_probe::Supervisor;

pub async fn run(services: Vec<Service>, params: Params) -> anyhow::Result<i32> {
    let supervisor = Supervisor::new(services, params)?;
    let result = supervisor.run_cycle(&CancellationToken::new()).await;

    print!("{}", render_prometheus(&result));

    Ok(result.status.exit_code())
}
