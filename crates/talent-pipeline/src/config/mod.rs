use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::workflows::hiring::{DeclinePolicy, RetryPolicy, ServiceSettings};

/// Distinguishes runtime behavior for different stages of the service.
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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(value) => LogFormat::parse(&value).ok_or(ConfigError::InvalidLogFormat { value })?,
            Err(_) => LogFormat::Compact,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            pipeline: PipelineConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Hiring pipeline settings: persistence, directory data, and concurrency behavior.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// JSON snapshot backing the entity store; in-memory only when unset.
    pub data_path: Option<PathBuf>,
    /// JSON file listing known departments, positions, and principals.
    pub directory_path: Option<PathBuf>,
    pub decline_policy: DeclinePolicy,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let data_path = non_empty_var("HIRING_DATA_PATH").map(PathBuf::from);
        let directory_path = non_empty_var("HIRING_DIRECTORY_PATH").map(PathBuf::from);

        let decline_policy = match non_empty_var("HIRING_DECLINE_POLICY") {
            Some(value) => DeclinePolicy::parse(&value)
                .ok_or(ConfigError::InvalidDeclinePolicy { value })?,
            None => DeclinePolicy::default(),
        };

        let defaults = RetryPolicy::default();
        let max_attempts = match non_empty_var("HIRING_RETRY_ATTEMPTS") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(attempts) if attempts > 0 => attempts,
                _ => return Err(ConfigError::InvalidRetryAttempts { value }),
            },
            None => defaults.max_attempts,
        };
        let base_delay = match non_empty_var("HIRING_RETRY_BACKOFF_MS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidRetryBackoff { value })?,
            None => defaults.base_delay,
        };

        Ok(Self {
            data_path,
            directory_path,
            decline_policy,
            retry: RetryPolicy::new(max_attempts, base_delay),
        })
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            retry: self.retry,
            decline_policy: self.decline_policy,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat { value: String },
    InvalidDeclinePolicy { value: String },
    InvalidRetryAttempts { value: String },
    InvalidRetryBackoff { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat { value } => write!(
                f,
                "APP_LOG_FORMAT '{value}' must be one of compact, pretty, json"
            ),
            ConfigError::InvalidDeclinePolicy { value } => write!(
                f,
                "HIRING_DECLINE_POLICY '{value}' must be 'retain' or 'reject'"
            ),
            ConfigError::InvalidRetryAttempts { value } => write!(
                f,
                "HIRING_RETRY_ATTEMPTS '{value}' must be a positive integer"
            ),
            ConfigError::InvalidRetryBackoff { value } => write!(
                f,
                "HIRING_RETRY_BACKOFF_MS '{value}' must be a whole number of milliseconds"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLogFormat { .. }
            | ConfigError::InvalidDeclinePolicy { .. }
            | ConfigError::InvalidRetryAttempts { .. }
            | ConfigError::InvalidRetryBackoff { .. } => None,
        }
    }
}
