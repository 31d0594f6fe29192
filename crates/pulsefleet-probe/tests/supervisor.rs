//! End-to-end probe cycles against throwaway local servers.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use pulse_core::{MissingStatusPolicy, Params, Service, Status};
use pulsefleet_probe::Supervisor;

fn http_response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Serve every connection with the same canned raw response.
async fn serve_raw(response: String) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

async fn serve_json(body: &str) -> SocketAddr {
    serve_raw(http_response("200 OK", body)).await
}

fn service(name: &str, addr: SocketAddr) -> Service {
    Service {
        name: name.to_string(),
        url: format!("http://{addr}/health"),
        expect_status: None,
        tags: BTreeSet::new(),
        headers: BTreeMap::new(),
        proxy: None,
        timeout: None,
    }
}

fn fast_params() -> Params {
    // Ambient proxy settings would reroute the stub-server probes.
    std::env::remove_var("HTTP_PROXY");
    std::env::remove_var("HTTPS_PROXY");
    Params {
        timeout: Duration::from_millis(2_000),
        retries: 0,
        ..Params::default()
    }
}

#[tokio::test]
async fn healthy_single_service() {
    let addr =
        serve_json(r#"{"status":"ok","timings":{"total_ms":12},"version":"1.0.0"}"#).await;
    let supervisor = Supervisor::new(vec![service("api", addr)], fast_params()).unwrap();

    let result = supervisor.run_cycle(&CancellationToken::new()).await;

    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.results.len(), 1);
    let snapshot = &result.results[0];
    assert_eq!(snapshot.name, "api");
    assert_eq!(snapshot.latency_ms, Some(12.0));
    assert_eq!(snapshot.version.as_deref(), Some("1.0.0"));
    assert_eq!(snapshot.http_status, Some(200));
    assert!(snapshot.error.is_none());
    assert_eq!(result.latency.unwrap().p50, 12.0);
}

#[tokio::test]
async fn missing_status_field_uses_the_policy() {
    let addr = serve_json(r#"{"version":"2.0.0"}"#).await;
    let params = Params {
        missing_status: MissingStatusPolicy::Degraded,
        ..fast_params()
    };
    let supervisor = Supervisor::new(vec![service("api", addr)], params).unwrap();

    let result = supervisor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(result.status, Status::Degraded);
    assert_eq!(result.results[0].version.as_deref(), Some("2.0.0"));
}

#[tokio::test]
async fn half_written_payload_is_down_with_the_error_captured() {
    // Valid HTTP framing, truncated JSON body.
    let addr = serve_raw(http_response("200 OK", r#"{"status":"ok"#)).await;
    let supervisor = Supervisor::new(vec![service("api", addr)], fast_params()).unwrap();

    let result = supervisor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(result.status, Status::Down);
    let snapshot = &result.results[0];
    assert_eq!(snapshot.http_status, Some(200));
    let error = snapshot.error.as_deref().unwrap();
    assert!(error.contains("invalid JSON payload"), "{error}");
    assert!(error.contains("service=api"), "{error}");
}

#[tokio::test]
async fn mixed_fleet_aggregates_to_the_worst() {
    let ok = serve_json(r#"{"status":"ok","timings":{"total_ms":5}}"#).await;
    let degraded = serve_json(r#"{"status":"degraded","timings":{"total_ms":50}}"#).await;
    let services = vec![
        service("api", ok),
        service("auth", degraded),
        Service {
            // Nothing listens on port 1.
            url: "http://127.0.0.1:1/health".to_string(),
            ..service("search", ok)
        },
    ];
    let supervisor = Supervisor::new(services, fast_params()).unwrap();

    let result = supervisor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(result.status, Status::Down);
    assert_eq!(result.results.len(), 3);

    let by_name: BTreeMap<&str, Status> = result
        .results
        .iter()
        .map(|r| (r.name.as_str(), r.status))
        .collect();
    assert_eq!(by_name["api"], Status::Ok);
    assert_eq!(by_name["auth"], Status::Degraded);
    assert_eq!(by_name["search"], Status::Down);

    // Latency summary covers only the services that reported one.
    let summary = result.latency.unwrap();
    assert!(summary.p50 >= 5.0 && summary.p99 <= 50.0);
}

#[tokio::test]
async fn expectation_mismatch_is_recorded_as_down() {
    let addr = serve_json(r#"{"status":"ok"}"#).await;
    let mut svc = service("api", addr);
    svc.expect_status = Some(Status::Degraded);
    let supervisor = Supervisor::new(vec![svc], fast_params()).unwrap();

    let result = supervisor.run_cycle(&CancellationToken::new()).await;
    assert_eq!(result.status, Status::Down);
    let error = result.results[0].error.as_deref().unwrap();
    assert!(error.contains("Expected degraded, received ok"), "{error}");
}

#[tokio::test]
async fn retries_pace_out_before_surfacing_the_last_error() {
    // Connection refused on every attempt; retries=1 adds one backoff
    // sleep (default initial 200ms) before the final failure.
    let mut params = fast_params();
    params.retries = 1;
    let supervisor = Supervisor::new(
        vec![Service {
            url: "http://127.0.0.1:1/health".to_string(),
            ..service("api", "127.0.0.1:1".parse().unwrap())
        }],
        params,
    )
    .unwrap();

    let started = Instant::now();
    let result = supervisor.run_cycle(&CancellationToken::new()).await;
    let elapsed = started.elapsed();

    assert_eq!(result.status, Status::Down);
    assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
    let error = result.results[0].error.as_deref().unwrap();
    assert!(error.contains("attempt=2"), "{error}");
}

#[tokio::test]
async fn down_service_is_skipped_on_widened_cycles() {
    let supervisor = Supervisor::new(
        vec![Service {
            url: "http://127.0.0.1:1/health".to_string(),
            ..service("api", "127.0.0.1:1".parse().unwrap())
        }],
        fast_params(),
    )
    .unwrap();
    let cancel = CancellationToken::new();

    // Cycle 1: probed, fails, multiplier 1 → countdown 1.
    supervisor.run_cycle(&cancel).await;
    assert_eq!(supervisor.store().history("api").await.len(), 1);
    assert_eq!(supervisor.multiplier("api"), 1);

    // Cycle 2: countdown hits 0, probed again, multiplier climbs to 2.
    supervisor.run_cycle(&cancel).await;
    assert_eq!(supervisor.store().history("api").await.len(), 2);
    assert_eq!(supervisor.multiplier("api"), 2);

    // Cycle 3: countdown 2 → 1, skipped.
    supervisor.run_cycle(&cancel).await;
    assert_eq!(supervisor.store().history("api").await.len(), 2);

    // Cycle 4: countdown 1 → 0, probed, multiplier caps upward.
    supervisor.run_cycle(&cancel).await;
    assert_eq!(supervisor.store().history("api").await.len(), 3);
    assert_eq!(supervisor.multiplier("api"), 4);
}

#[tokio::test]
async fn recovery_resets_the_multiplier() {
    let ok = serve_json(r#"{"status":"ok"}"#).await;
    let supervisor = Supervisor::new(vec![service("api", ok)], fast_params()).unwrap();
    let cancel = CancellationToken::new();

    supervisor.run_cycle(&cancel).await;
    assert_eq!(supervisor.multiplier("api"), 1);

    let result = supervisor.run_cycle(&cancel).await;
    assert_eq!(result.status, Status::Ok);
    assert_eq!(supervisor.multiplier("api"), 1);
}

#[tokio::test]
async fn run_emits_aggregates_until_cancelled() {
    let addr = serve_json(r#"{"status":"ok"}"#).await;
    let mut params = fast_params();
    params.interval = Duration::from_millis(50);
    let supervisor = Supervisor::new(vec![service("api", addr)], params).unwrap();

    let mut updates = supervisor.subscribe();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(supervisor.clone().run(cancel.clone()));

    // Initial cycle plus at least one tick-driven cycle.
    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .expect("first aggregate")
        .unwrap();
    let first = updates.borrow_and_update().clone().unwrap();
    assert_eq!(first.status, Status::Ok);

    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .expect("second aggregate")
        .unwrap();

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("supervisor stops")
        .unwrap();
}

#[tokio::test]
async fn sibling_services_are_isolated_from_failures() {
    let ok = serve_json(r#"{"status":"ok","timings":{"total_ms":3}}"#).await;
    let services = vec![
        service("healthy", ok),
        Service {
            url: "http://127.0.0.1:1/health".to_string(),
            ..service("broken", ok)
        },
    ];
    let supervisor = Supervisor::new(services, fast_params()).unwrap();

    let result = supervisor.run_cycle(&CancellationToken::new()).await;
    let healthy = result.results.iter().find(|r| r.name == "healthy").unwrap();
    assert_eq!(healthy.status, Status::Ok);
    assert!(healthy.error.is_none());
}
