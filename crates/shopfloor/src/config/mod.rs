use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::production::auth::ADMIN_SUBJECT;
use crate::production::domain::ProductivityTarget;

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
    pub production: ProductionConfig,
    pub auth: AuthConfig,
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

        let daily_target = match env::var("APP_DAILY_TARGET") {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite() && *value > 0.0)
                .ok_or(ConfigError::InvalidTarget)?,
            Err(_) => ProductivityTarget::DEFAULT_POINTS,
        };

        let rule_cache_ttl = match env::var("APP_RULE_CACHE_TTL_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidCacheTtl)?,
            ),
            Err(_) => ProductionConfig::default().rule_cache_ttl,
        };

        let recalc_batch_size = match env::var("APP_RECALC_BATCH_SIZE") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::InvalidBatchSize)?,
            Err(_) => ProductionConfig::default().recalc_batch_size,
        };

        let admin_secret = env::var("APP_ADMIN_SECRET")
            .ok()
            .filter(|value| !value.is_empty());
        let operator_pins = match env::var("APP_OPERATOR_PINS") {
            Ok(raw) => parse_operator_pins(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            production: ProductionConfig {
                daily_target,
                rule_cache_ttl,
                recalc_batch_size,
            },
            auth: AuthConfig {
                admin_secret,
                operator_pins,
            },
        })
    }
}

/// Parses `name:pin` pairs separated by commas. The administrator subject is
/// reserved for `APP_ADMIN_SECRET`.
fn parse_operator_pins(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once(':') {
            Some((name, pin))
                if !name.trim().is_empty()
                    && !pin.trim().is_empty()
                    && name.trim() != ADMIN_SUBJECT =>
            {
                Ok((name.trim().to_string(), pin.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidOperatorPins),
        })
        .collect()
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Pricing and reporting knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionConfig {
    /// Target used until an administrator stores one.
    pub daily_target: f64,
    pub rule_cache_ttl: Duration,
    pub recalc_batch_size: usize,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            daily_target: ProductivityTarget::DEFAULT_POINTS,
            rule_cache_ttl: crate::production::cache::DEFAULT_RULE_CACHE_TTL,
            recalc_batch_size: crate::production::recalc::DEFAULT_RECALC_BATCH_SIZE,
        }
    }
}

/// Secrets handed to the credential verifier at startup.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub admin_secret: Option<String>,
    pub operator_pins: Vec<(String, String)>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("admin_secret", &self.admin_secret.as_ref().map(|_| "<redacted>"))
            .field("operator_pins", &self.operator_pins.len())
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTarget,
    InvalidCacheTtl,
    InvalidBatchSize,
    InvalidOperatorPins,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTarget => {
                write!(f, "APP_DAILY_TARGET must be a positive number")
            }
            ConfigError::InvalidCacheTtl => {
                write!(f, "APP_RULE_CACHE_TTL_SECS must be a whole number of seconds")
            }
            ConfigError::InvalidBatchSize => {
                write!(f, "APP_RECALC_BATCH_SIZE must be a positive integer")
            }
            ConfigError::InvalidOperatorPins => {
                write!(
                    f,
                    "APP_OPERATOR_PINS must be a comma separated list of name:pin and may not name '{ADMIN_SUBJECT}'"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
