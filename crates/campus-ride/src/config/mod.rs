use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::workflows::credentials::{PasswordPolicy, DEFAULT_SPECIAL_CHARACTERS};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/";

/// Distinguishes runtime behavior for different stages of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the rider client.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub api: ApiConfig,
    pub workflow: WorkflowConfig,
    pub password: PasswordConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let raw_base =
            env::var("RIDE_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&raw_base)?;

        let workflow = WorkflowConfig {
            request_timeout: duration_var("RIDE_REQUEST_TIMEOUT_MS", 10_000)?,
            suggestion_timeout: duration_var("RIDE_SUGGEST_TIMEOUT_MS", 3_000)?,
            suggestion_debounce: duration_var("RIDE_SUGGEST_DEBOUNCE_MS", 250)?,
            status_poll_interval: duration_var("RIDE_STATUS_POLL_INTERVAL_MS", 5_000)?,
            ..WorkflowConfig::default()
        };

        let special_characters = env::var("PASSWORD_SPECIAL_CHARS")
            .unwrap_or_else(|_| DEFAULT_SPECIAL_CHARACTERS.to_string());
        if special_characters.trim().is_empty() {
            return Err(ConfigError::EmptySpecialCharacters);
        }

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            api: ApiConfig { base_url },
            workflow,
            password: PasswordConfig { special_characters },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Location of the remote ride, geocoding, and status collaborators.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
}

/// Timing knobs for every suspension point in the ride workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub request_timeout: Duration,
    pub suggestion_timeout: Duration,
    pub suggestion_debounce: Duration,
    pub status_poll_interval: Duration,
    /// Queries shorter than this never leave the device.
    pub min_query_chars: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            suggestion_timeout: Duration::from_secs(3),
            suggestion_debounce: Duration::from_millis(250),
            status_poll_interval: Duration::from_secs(5),
            min_query_chars: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub special_characters: String,
}

impl PasswordConfig {
    pub fn policy(&self) -> PasswordPolicy {
        PasswordPolicy::with_special_characters(&self.special_characters)
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    // Url::join drops the last path segment unless the base ends with a slash.
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&normalized).map_err(|source| ConfigError::InvalidBaseUrl {
        value: raw.to_string(),
        source,
    })
}

fn duration_var(key: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidDuration { key }),
        Err(_) => Ok(Duration::from_millis(default_ms)),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidBaseUrl {
        value: String,
        source: url::ParseError,
    },
    InvalidDuration {
        key: &'static str,
    },
    EmptySpecialCharacters,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBaseUrl { value, .. } => {
                write!(f, "RIDE_API_BASE_URL '{value}' must be an absolute URL")
            }
            ConfigError::InvalidDuration { key } => {
                write!(f, "{key} must be a whole number of milliseconds")
            }
            ConfigError::EmptySpecialCharacters => {
                write!(f, "PASSWORD_SPECIAL_CHARS must list at least one character")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidBaseUrl { source, .. } => Some(source),
            ConfigError::InvalidDuration { .. } | ConfigError::EmptySpecialCharacters => None,
        }
    }
}
