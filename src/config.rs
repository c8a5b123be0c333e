use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing secret. Token operations fail while this is unset.
    pub secret: Option<String>,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => database_url_from_parts(|key| std::env::var(key).ok())
                .context("DATABASE_URL or DB_USER/DB_PASSWORD/DB_PORT/DB_NAME must be set")?,
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            ttl_hours: token_ttl_hours(parse_var("JWT_TTL_HOURS"))?,
        };
        Ok(Self {
            database_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS").unwrap_or(10),
            jwt,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("APP_PORT").unwrap_or(8080),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES").unwrap_or(10 * 1024 * 1024),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS").unwrap_or(30),
        })
    }
}

/// Longest accepted token lifetime: one year.
const MAX_TTL_HOURS: i64 = 24 * 365;

fn token_ttl_hours(raw: Option<i64>) -> anyhow::Result<i64> {
    let hours = raw.unwrap_or(24);
    if !(1..=MAX_TTL_HOURS).contains(&hours) {
        bail!("JWT_TTL_HOURS must be between 1 and {MAX_TTL_HOURS}, got {hours}");
    }
    Ok(hours)
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// Builds a postgres URL from the discrete `DB_*` variables.
fn database_url_from_parts(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    let user = lookup("DB_USER")?;
    let password = lookup("DB_PASSWORD")?;
    let port = lookup("DB_PORT")?;
    let name = lookup("DB_NAME")?;
    let host = lookup("DB_HOST").unwrap_or_else(|| "localhost".into());
    Some(format!("postgres://{user}:{password}@{host}:{port}/{name}"))
}
