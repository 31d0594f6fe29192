//! pulse — parallel health-probe supervisor for HTTP service fleets.
//!
//! Three surfaces over the same probe pipeline:
//!
//! ```text
//! pulse check  --config fleet.yaml             one cycle, JSON/NDJSON on stdout
//! pulse run    --config fleet.yaml             terminal dashboard until SIGINT
//! pulse export --config fleet.yaml             one cycle, Prometheus textfile
//! ```
//!
//! Exit codes: 0 ok, 1 degraded, 2 down, 3 usage error, 4 internal.

mod commands;
mod dashboard;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};

use pulse_core::{
    load_config, parse_duration, MissingStatusPolicy, OutputFormat, Overrides, UsageError,
    EXIT_INTERNAL, EXIT_USAGE,
};

#[derive(Parser)]
#[command(
    name = "pulse",
    about = "Parallel health-probe supervisor for HTTP service fleets",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Fleet config file (YAML or JSON).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Probe cycle interval, e.g. 15s or 500ms.
    #[arg(long, global = true, value_parser = parse_duration_flag, value_name = "DURATION")]
    interval: Option<Duration>,

    /// Per-request timeout, e.g. 3s.
    #[arg(long, global = true, value_parser = parse_duration_flag, value_name = "DURATION")]
    timeout: Option<Duration>,

    /// Retries per probe after the first attempt.
    #[arg(long, global = true, value_name = "N")]
    retries: Option<u32>,

    /// In-flight probe cap; 0 means unlimited.
    #[arg(long, global = true, value_name = "N")]
    concurrency: Option<u32>,

    /// Proxy for all probes (services may override).
    #[arg(long, global = true, value_name = "URL")]
    proxy: Option<String>,

    /// Extra header for every probe, "Name: Value". Repeatable.
    #[arg(long = "headers", global = true, value_parser = parse_header_flag, value_name = "HEADER")]
    headers: Vec<(String, String)>,

    /// Status for 2xx responses without a status field.
    #[arg(long = "missing-status", global = true, value_parser = parse_policy_flag, value_name = "POLICY")]
    missing_status: Option<MissingStatusPolicy>,

    /// Output format for check: json or ndjson.
    #[arg(long = "out", global = true, value_parser = parse_format_flag, value_name = "FORMAT")]
    out: Option<OutputFormat>,

    /// Skip TLS verification on outbound HTTPS.
    #[arg(long, global = true)]
    insecure: bool,

    /// Emit a structured debug record per completed request.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe continuously and render a terminal dashboard.
    Run,
    /// Probe once and print the aggregate report.
    Check,
    /// Probe once and print the Prometheus textfile exposition.
    Export,
}

fn parse_duration_flag(raw: &str) -> Result<Duration, String> {
    parse_duration(raw).map_err(|e| e.to_string())
}

fn parse_header_flag(raw: &str) -> Result<(String, String), String> {
    let Some((name, value)) = raw.split_once(':') else {
        return Err(UsageError::InvalidHeader(raw.to_string()).to_string());
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(UsageError::InvalidHeader(raw.to_string()).to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_policy_flag(raw: &str) -> Result<MissingStatusPolicy, String> {
    raw.parse().map_err(|e: UsageError| e.to_string())
}

fn parse_format_flag(raw: &str) -> Result<OutputFormat, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(OutputFormat::Json),
        "ndjson" => Ok(OutputFormat::Ndjson),
        _ => Err(UsageError::UnknownFormat(raw.to_string()).to_string()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE as u8),
            };
        }
    };

    init_tracing(cli.debug);

    match execute(cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(error) => {
            if let Some(usage) = error.downcast_ref::<UsageError>() {
                eprintln!("pulse: {usage}");
                ExitCode::from(EXIT_USAGE as u8)
            } else {
                eprintln!("pulse: internal error: {error:#}");
                ExitCode::from(EXIT_INTERNAL as u8)
            }
        }
    }
}

/// Logs go to stderr; stdout is reserved for reports.
fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "info,pulse=debug,pulsefleet=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.parse().expect("static filter parses")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn execute(cli: Cli) -> anyhow::Result<i32> {
    let overrides = Overrides {
        interval: cli.interval,
        timeout: cli.timeout,
        retries: cli.retries,
        concurrency: cli.concurrency,
        proxy: cli.proxy,
        headers: cli.headers,
        insecure: cli.insecure,
        debug: cli.debug,
        missing_status: cli.missing_status,
        output: cli.out,
    };
    let config_path = cli.config.ok_or(UsageError::MissingConfig)?;
    let (services, params) = load_config(&config_path, &overrides)?;

    if params.debug {
        // Parameter snapshot for diagnostics; header values and proxy
        // credentials are masked.
        tracing::debug!(
            services = services.len(),
            interval_ms = params.interval.as_millis() as u64,
            timeout_ms = params.timeout.as_millis() as u64,
            retries = params.retries,
            concurrency = params.concurrency,
            headers = ?pulse_core::redact_values(&params.headers),
            proxy = params
                .proxy
                .as_deref()
                .map(pulse_core::redact_url_credentials),
            insecure = params.insecure,
            "resolved parameters"
        );
    }

    match cli.command {
        Commands::Check => commands::check::run(services, params).await,
        Commands::Export => commands::export::run(services, params).await,
        Commands::Run => commands::run::run(services, params).await,
    }
}
