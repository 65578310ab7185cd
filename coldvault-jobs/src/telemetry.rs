//! Tracing subscriber setup for the `coldvault` binary.
//!
//! Filtering follows `RUST_LOG` when set. Output is plain text or one JSON
//! object per line, chosen with `COLDVAULT_LOG_FORMAT`.

use std::str::FromStr;

use coldvault_core::{ColdVaultResult, ConfigError};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "coldvault=info,warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" | "text" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidValue {
                field: "COLDVAULT_LOG_FORMAT".to_string(),
                value: other.to_string(),
                reason: "expected plain or json".to_string(),
            }),
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    /// Directives used when `RUST_LOG` is unset or unparseable
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            default_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// # Environment Variables
    /// - `COLDVAULT_LOG_FORMAT`: `plain` or `json` (default: plain)
    pub fn from_env() -> ColdVaultResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ColdVaultResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match lookup("COLDVAULT_LOG_FORMAT").filter(|v| !v.trim().is_empty()) {
            Some(value) => value.parse()?,
            None => LogFormat::default(),
        };
        Ok(Self {
            format,
            ..Self::default()
        })
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let (json, plain) = match config.format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Plain => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(plain)
        .try_init()?;

    tracing::debug!(format = ?config.format, "Telemetry initialized");
    Ok(())
}
