use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

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
    pub wizard: WizardConfig,
    pub leads: LeadChannelsConfig,
    pub report: ReportConfig,
    pub census: CensusConfig,
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

        let wizard = WizardConfig {
            resume_window: Duration::from_secs(hours_var("CASAREADY_RESUME_WINDOW_HOURS", 72)?),
            autosave_debounce: Duration::from_millis(numeric_var(
                "CASAREADY_AUTOSAVE_DEBOUNCE_MS",
                1_500,
            )?),
            storage_dir: optional_var("CASAREADY_STORAGE_DIR").map(PathBuf::from),
        };

        let primary_override = optional_var("CASAREADY_PRIMARY_LEAD_URL");
        let leads = LeadChannelsConfig {
            primary_is_local: primary_override.is_none(),
            primary_url: primary_override
                .unwrap_or_else(|| format!("http://127.0.0.1:{port}/api/v1/leads")),
            fallback_url: optional_var("CASAREADY_FALLBACK_WEBHOOK_URL"),
            fallback_name: env::var("CASAREADY_FALLBACK_NAME")
                .unwrap_or_else(|_| "zapier".to_string()),
            timeout: Duration::from_millis(numeric_var("CASAREADY_LEAD_TIMEOUT_MS", 8_000)?),
        };

        let report = ReportConfig {
            endpoint: optional_var("CASAREADY_REPORT_URL"),
            timeout: Duration::from_millis(numeric_var("CASAREADY_REPORT_TIMEOUT_MS", 20_000)?),
        };

        let census = CensusConfig {
            endpoint: optional_var("CASAREADY_CENSUS_URL"),
            timeout: Duration::from_millis(numeric_var("CASAREADY_CENSUS_TIMEOUT_MS", 5_000)?),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets: environment != AppEnvironment::Production,
            },
            wizard,
            leads,
            report,
            census,
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn numeric_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match optional_var(name) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { variable: name }),
        None => Ok(default),
    }
}

/// Hours read from `name`, converted to seconds.
fn hours_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    numeric_var(name, default)?
        .checked_mul(60 * 60)
        .ok_or(ConfigError::InvalidNumber { variable: name })
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub include_targets: bool,
}

/// Session resume and autosave tuning.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    pub resume_window: Duration,
    pub autosave_debounce: Duration,
    /// Directory for file-backed snapshots; `None` keeps snapshots in memory.
    pub storage_dir: Option<PathBuf>,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            resume_window: Duration::from_secs(72 * 60 * 60),
            autosave_debounce: Duration::from_millis(1_500),
            storage_dir: None,
        }
    }
}

/// Primary and fallback lead delivery destinations.
#[derive(Debug, Clone)]
pub struct LeadChannelsConfig {
    pub primary_url: String,
    /// True when no primary URL was configured and the service's own intake receives leads.
    pub primary_is_local: bool,
    pub fallback_url: Option<String>,
    pub fallback_name: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CensusConfig {
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a non-negative integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
