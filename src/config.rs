use anyhow::Context;
use std::str::FromStr;

const DEFAULT_DATABASE_URL: &str = "sqlite://bookshelf.db";
const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_LOG_FILTER: &str = "info";

/// Process configuration, read once at startup and handed to the components
/// that need it.
#[derive(Debug, Clone)]
pub struct Config {
    database_url: String,
    server_port: u16,
    log_filter: String,
}

impl Config {
    /// Loads `.env` when present, then reads the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(err).context("Failed to load .env file");
            }
        }

        let database_url = load_env_or("DATABASE_URL", DEFAULT_DATABASE_URL.to_string())?;
        let server_port = load_env_or("SERVER_PORT", DEFAULT_SERVER_PORT)?;
        let log_filter = load_env_or("RUST_LOG", DEFAULT_LOG_FILTER.to_string())?;
        Ok(Self {
            database_url,
            server_port,
            log_filter,
        })
    }

    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    #[must_use]
    pub const fn server_port(&self) -> u16 {
        self.server_port
    }

    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }
}

fn load_env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(val) => parse_env(key, &val),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(err) => {
            Err(err).with_context(|| format!("Failed to load environment variable {key}"))
        }
    }
}

fn parse_env<T>(key: &str, val: &str) -> anyhow::Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
{
    val.parse::<T>()
        .with_context(|| format!("Failed to parse environment variable {key}"))
}
