//! `pulse run` — supervisor loop plus terminal dashboard.

use tokio_util::sync::CancellationToken;
use tracing::info;

use pulse_core::{Params, Service, EXIT_OK};
use pulsefleet_probe::Supervisor;

use crate::dashboard;

pub async fn run(services: Vec<Service>, params: Params) -> anyhow::Result<i32> {
    let supervisor = Supervisor::new(services, params)?;
    let cancel = CancellationToken::new();
    let mut updates = supervisor.subscribe();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_cancel.cancel();
    });

    let runner = tokio::spawn(supervisor.clone().run(cancel.clone()));

    let mut last_status = None;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(result) = updates.borrow_and_update().clone() else {
                    continue;
                };
                last_status = Some(result.status);
                dashboard::draw(&result);
            }
        }
    }

    let _ = runner.await;
    Ok(last_status.map(|s| s.exit_code()).unwrap_or(EXIT_OK))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
