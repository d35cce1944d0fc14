//! Application configuration

use std::env;
use std::str::FromStr;

use url::Url;

/// Ten years
pub const MAX_SESSION_DURATION_HOURS: i64 = 87_600;
pub const MAX_INVITE_DURATION_DAYS: i64 = 365;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub public_url: Url,
    pub environment: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Authentication
    pub secure_cookies: bool,
    pub session_duration_hours: i64,
    pub invite_duration_days: i64,
    pub login_rate_limit_per_minute: u32,

    // Maintenance
    pub maintenance_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            public_url: {
                let raw = env::var("PUBLIC_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string());
                let url = Url::parse(&raw).map_err(|_| {
                    ConfigError::Invalid("PUBLIC_URL", "must be an absolute URL".into())
                })?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ConfigError::Invalid(
                        "PUBLIC_URL",
                        "scheme must be http or https".into(),
                    ));
                }
                url
            },
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: positive("DATABASE_MAX_CONNECTIONS", 10)?,

            // Authentication
            secure_cookies: parse_or("SECURE_COOKIES", false)?,
            session_duration_hours: bounded(
                "SESSION_DURATION_HOURS",
                168,
                MAX_SESSION_DURATION_HOURS,
            )?,
            invite_duration_days: bounded("INVITE_DURATION_DAYS", 7, MAX_INVITE_DURATION_DAYS)?,
            login_rate_limit_per_minute: positive("LOGIN_RATE_LIMIT_PER_MINUTE", 5)?,

            // Maintenance
            maintenance_interval_secs: positive("MAINTENANCE_INTERVAL_SECS", 60)?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn session_duration(&self) -> time::Duration {
        time::Duration::hours(self.session_duration_hours)
    }

    pub fn invite_duration(&self) -> time::Duration {
        time::Duration::days(self.invite_duration_days)
    }

    /// Cookie `Max-Age` for a fresh session
    pub fn session_max_age_secs(&self) -> i64 {
        self.session_duration().whole_seconds()
    }
}

/// Read `name`, falling back to `default` when unset
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, format!("cannot parse {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn positive<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let value = parse_or(name, default)?;
    if value <= T::default() {
        return Err(ConfigError::Invalid(name, "must be greater than zero".into()));
    }
    Ok(value)
}

fn bounded<T>(name: &'static str, default: T, max: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default + std::fmt::Display,
{
    let value = positive(name, default)?;
    if value > max {
        return Err(ConfigError::Invalid(name, format!("must be at most {max}")));
    }
    Ok(value)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
