use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::Duration;

const DEVELOPMENT_JWT_SECRET: &str = "roomshare-development-secret";

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
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        let allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://roomshare.db".to_string());
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "8".to_string())
            .parse::<u32>()
            .ok()
            .filter(|count| *count > 0)
            .ok_or(ConfigError::InvalidPoolSize)?;

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingJwtSecret)
            }
            _ => DEVELOPMENT_JWT_SECRET.to_string(),
        };
        let raw_ttl = env::var("JWT_EXPIRE").unwrap_or_else(|_| "30d".to_string());
        let token_ttl =
            parse_token_ttl(&raw_ttl).ok_or(ConfigError::InvalidTokenTtl { value: raw_ttl })?;

        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        let max_images_per_upload = env::var("MAX_IMAGES_PER_UPLOAD")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .ok()
            .filter(|count| *count > 0)
            .ok_or(ConfigError::InvalidImageLimit)?;

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                allowed_origins,
            },
            telemetry: TelemetryConfig { log_level },
            database: DatabaseConfig {
                url,
                max_connections,
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl,
            },
            media: MediaConfig {
                upload_dir: PathBuf::from(upload_dir),
                max_images_per_upload,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty means any origin may call the API.
    pub allowed_origins: Vec<String>,
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
}

/// Location and sizing of the relational store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Bearer token signing parameters.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

/// Image upload storage.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub upload_dir: PathBuf,
    pub max_images_per_upload: usize,
}

/// Accepts `30d`, `12h`, `45m`, `90s` or a bare number of seconds.
pub fn parse_token_ttl(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (digits, unit) = match raw.char_indices().last() {
        Some((index, suffix)) if suffix.is_ascii_alphabetic() => (&raw[..index], Some(suffix)),
        _ => (raw, None),
    };
    let amount = digits.trim().parse::<i64>().ok().filter(|value| *value > 0)?;

    match unit.map(|unit| unit.to_ascii_lowercase()) {
        None | Some('s') => Duration::try_seconds(amount),
        Some('m') => Duration::try_minutes(amount),
        Some('h') => Duration::try_hours(amount),
        Some('d') => Duration::try_days(amount),
        Some(_) => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPoolSize,
    MissingJwtSecret,
    InvalidTokenTtl { value: String },
    InvalidImageLimit,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPoolSize => {
                write!(f, "DATABASE_MAX_CONNECTIONS must be a positive integer")
            }
            ConfigError::MissingJwtSecret => {
                write!(f, "JWT_SECRET must be set when APP_ENV is production")
            }
            ConfigError::InvalidTokenTtl { value } => write!(
                f,
                "JWT_EXPIRE '{value}' must look like 30d, 12h, 45m or a number of seconds"
            ),
            ConfigError::InvalidImageLimit => {
                write!(f, "MAX_IMAGES_PER_UPLOAD must be a positive integer")
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
