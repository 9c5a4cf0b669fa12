//! Logging setup
//!
//! Installs a global `tracing` subscriber. Output goes to stderr so that
//! command output on stdout stays machine-readable.

use std::env;
use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use tracing_subscriber::util::TryInitError;

/// Environment variable selecting the output format
pub const ENV_LOG_FORMAT: &str = "VITALSYNC_LOG_FORMAT";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable output
    #[default]
    Pretty,
    /// Single-line output
    Compact,
    /// Newline-delimited JSON
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `info` or `vitalsync=debug`
    pub level: String,
    pub format: LogFormat,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
            ansi: atty::is(atty::Stream::Stderr),
        }
    }
}

impl LoggingConfig {
    /// Read `RUST_LOG` and `VITALSYNC_LOG_FORMAT`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unknown formats fall back to pretty
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            level: lookup("RUST_LOG")
                .filter(|level| !level.trim().is_empty())
                .unwrap_or(defaults.level),
            format: lookup(ENV_LOG_FORMAT)
                .as_deref()
                .and_then(LogFormat::parse)
                .unwrap_or(defaults.format),
            ansi: defaults.ansi,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level)
            .unwrap_or_else(|_| EnvFilter::new("info"))
            .add_directive(
                "hyper=warn"
                    .parse()
                    .unwrap_or_else(|_| tracing::Level::WARN.into()),
            )
            .add_directive(
                "reqwest=warn"
                    .parse()
                    .unwrap_or_else(|_| tracing::Level::WARN.into()),
            )
    }

    /// Install the global subscriber
    ///
    /// Fails if a global subscriber is already set.
    pub fn init(&self) -> Result<(), TryInitError> {
        let registry = tracing_subscriber::registry().with(self.filter());
        let layer = fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(self.ansi)
            .with_target(true);

        match self.format {
            LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
            LogFormat::Compact => registry.with(layer.compact()).try_init(),
            LogFormat::Json => registry.with(layer.json().with_ansi(false)).try_init(),
        }
    }
}

/// Initialize logging from the environment
pub fn init_from_env() -> Result<(), TryInitError> {
    LoggingConfig::from_env().init()
}
