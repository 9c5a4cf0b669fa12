//! vitalsync CLI - Command-line interface for the vitalsync engine
//!
//! Commands:
//! - summary: Print the on-screen health summary for a record snapshot
//! - payload: Print the sync payload that would be sent
//! - sync: Build the payload and deliver it to the sync endpoint
//! - doctor: Diagnose input and sync configuration

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use vitalsync::config::{ENV_ENDPOINT, ENV_TOKEN};
use vitalsync::logging;
use vitalsync::{
    ConfigError, HealthSync, HttpSyncTransport, InMemoryRecordStore, RecordStore, StoreError,
    SyncConfig, SyncError, VERSION,
};

/// vitalsync - Health data aggregation and sync engine
#[derive(Parser)]
#[command(name = "vitalsync")]
#[command(author = "Synheart AI Inc")]
#[command(version = VERSION)]
#[command(about = "Summarize and sync wearable health records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the health summary for a record snapshot
    Summary {
        /// Record snapshot path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Reference instant (RFC 3339), defaults to the current time
        #[arg(long)]
        now: Option<String>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the sync payload without sending it
    Payload {
        /// Record snapshot path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Reference instant (RFC 3339), defaults to the current time
        #[arg(long)]
        now: Option<String>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Build the sync payload and deliver it
    Sync {
        /// Record snapshot path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Reference instant (RFC 3339), defaults to the current time
        #[arg(long)]
        now: Option<String>,

        /// Sync endpoint, overrides VITALSYNC_ENDPOINT
        #[arg(long)]
        endpoint: Option<String>,

        /// Bearer credential, overrides VITALSYNC_TOKEN
        #[arg(long)]
        token: Option<String>,
    },

    /// Diagnose input and sync configuration
    Doctor {
        /// Record snapshot to check
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init_from_env() {
        eprintln!("failed to initialize logging: {e}");
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), VitalsyncCliError> {
    match cli.command {
        Commands::Summary { input, now, pretty } => {
            cmd_summary(&input, now.as_deref(), pretty).await
        }
        Commands::Payload { input, now, pretty } => {
            cmd_payload(&input, now.as_deref(), pretty).await
        }
        Commands::Sync {
            input,
            now,
            endpoint,
            token,
        } => cmd_sync(&input, now.as_deref(), endpoint, token).await,
        Commands::Doctor { input, json } => cmd_doctor(input.as_deref(), json).await,
    }
}

async fn cmd_summary(
    input: &Path,
    now: Option<&str>,
    pretty: bool,
) -> Result<(), VitalsyncCliError> {
    let engine = HealthSync::new(Arc::new(load_store(input)?));
    let summary = engine.summary(parse_now(now)?).await?;
    print_json(&summary, pretty)
}

async fn cmd_payload(
    input: &Path,
    now: Option<&str>,
    pretty: bool,
) -> Result<(), VitalsyncCliError> {
    let engine = HealthSync::new(Arc::new(load_store(input)?));
    let payload = engine.build_payload(parse_now(now)?).await?;
    print_json(&payload, pretty)
}

async fn cmd_sync(
    input: &Path,
    now: Option<&str>,
    endpoint: Option<String>,
    token: Option<String>,
) -> Result<(), VitalsyncCliError> {
    let now = parse_now(now)?;
    let config = SyncConfig::from_lookup(|key| match key {
        ENV_ENDPOINT => endpoint.clone().or_else(|| env::var(key).ok()),
        ENV_TOKEN => token.clone().or_else(|| env::var(key).ok()),
        _ => env::var(key).ok(),
    })?;
    let transport = HttpSyncTransport::new(&config)?;

    let engine = HealthSync::new(Arc::new(load_store(input)?));
    let report = engine.sync(&transport, now).await?;
    print_json(&report, true)
}

async fn cmd_doctor(input: Option<&Path>, json: bool) -> Result<(), VitalsyncCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("vitalsync version {}", VERSION),
    });

    if let Some(path) = input {
        match load_store(path) {
            Ok(store) => {
                let mut per_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
                for record in store.records() {
                    *per_kind.entry(record.kind().as_str()).or_default() += 1;
                }
                let breakdown = per_kind
                    .iter()
                    .map(|(kind, count)| format!("{kind}={count}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                checks.push(DoctorCheck {
                    name: "snapshot".to_string(),
                    status: if store.records().is_empty() {
                        CheckStatus::Warning
                    } else {
                        CheckStatus::Ok
                    },
                    message: format!("{} records ({})", store.records().len(), breakdown),
                });

                let availability = store.availability().await;
                checks.push(DoctorCheck {
                    name: "store".to_string(),
                    status: if availability.is_available() {
                        CheckStatus::Ok
                    } else {
                        CheckStatus::Error
                    },
                    message: format!("{:?}", availability),
                });
            }
            Err(e) => checks.push(DoctorCheck {
                name: "snapshot".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            }),
        }
    }

    // Never echo the credential, only whether it is usable
    checks.push(match SyncConfig::from_env() {
        Ok(config) => DoctorCheck {
            name: "sync_config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "endpoint {} (timeout {}s, connect timeout {}s)",
                config.endpoint,
                config.request_timeout.as_secs(),
                config.connect_timeout.as_secs()
            ),
        },
        Err(e) => DoctorCheck {
            name: "sync_config".to_string(),
            status: CheckStatus::Warning,
            message: format!("{} (required for 'vitalsync sync')", e),
        },
    });

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("vitalsync Doctor Report");
        println!("=======================");
        println!("Version: {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(VitalsyncCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn load_store(input: &Path) -> Result<InMemoryRecordStore, VitalsyncCliError> {
    let raw = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };
    Ok(InMemoryRecordStore::from_json(&raw)?)
}

fn parse_now(raw: Option<&str>) -> Result<DateTime<Utc>, VitalsyncCliError> {
    match raw {
        None => Ok(Utc::now()),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|instant| instant.with_timezone(&Utc))
            .map_err(|e| VitalsyncCliError::InvalidTime(format!("{raw}: {e}"))),
    }
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), VitalsyncCliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}

// Error types

#[derive(Debug)]
enum VitalsyncCliError {
    Io(io::Error),
    Store(StoreError),
    Sync(SyncError),
    Config(ConfigError),
    Json(serde_json::Error),
    InvalidTime(String),
    DoctorFailed,
}

impl From<io::Error> for VitalsyncCliError {
    fn from(e: io::Error) -> Self {
        VitalsyncCliError::Io(e)
    }
}

impl From<StoreError> for VitalsyncCliError {
    fn from(e: StoreError) -> Self {
        VitalsyncCliError::Store(e)
    }
}

impl From<SyncError> for VitalsyncCliError {
    fn from(e: SyncError) -> Self {
        VitalsyncCliError::Sync(e)
    }
}

impl From<ConfigError> for VitalsyncCliError {
    fn from(e: ConfigError) -> Self {
        VitalsyncCliError::Config(e)
    }
}

impl From<serde_json::Error> for VitalsyncCliError {
    fn from(e: serde_json::Error) -> Self {
        VitalsyncCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<VitalsyncCliError> for CliError {
    fn from(e: VitalsyncCliError) -> Self {
        match e {
            VitalsyncCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            VitalsyncCliError::Store(e) => CliError {
                code: "INPUT_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Input must be a JSON object with a \"records\" array".to_string()),
            },
            VitalsyncCliError::Sync(SyncError::Unsupported(reason)) => CliError {
                code: "UNSUPPORTED".to_string(),
                message: format!("Health data platform unavailable: {}", reason),
                hint: None,
            },
            VitalsyncCliError::Sync(SyncError::Rejected { status, body }) => CliError {
                code: "REJECTED".to_string(),
                message: format!("Endpoint answered {}: {}", status, body),
                hint: Some("Check the credential and endpoint path".to_string()),
            },
            VitalsyncCliError::Sync(SyncError::Transport(reason)) => CliError {
                code: "TRANSPORT_ERROR".to_string(),
                message: reason,
                hint: Some("Check network connectivity and the endpoint host".to_string()),
            },
            VitalsyncCliError::Sync(SyncError::Encoding(e)) => CliError {
                code: "ENCODING_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            VitalsyncCliError::Config(e) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(
                    "Set VITALSYNC_ENDPOINT and VITALSYNC_TOKEN or pass --endpoint/--token"
                        .to_string(),
                ),
            },
            VitalsyncCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            VitalsyncCliError::InvalidTime(msg) => CliError {
                code: "INVALID_TIME".to_string(),
                message: msg,
                hint: Some("Use RFC 3339, e.g. 2024-01-31T12:00:00Z".to_string()),
            },
            VitalsyncCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
