use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use tracing::warn;

use crate::upstream::{RequestLimits, DEFAULT_BASE_URL};

const API_KEY_SECRET: &str = "/run/secrets/api_football_key";
const PG_PASSWORD_SECRET: &str = "/run/secrets/pg_password";

/// Configuration
#[derive(Clone)]
pub struct Config {
    api_key: Option<String>,
    pub api_base_url: String,
    pub database_url: String,
    pub http_port: u16,
    pub max_in_flight: usize,
    pub min_spacing: Duration,
    pub call_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("http_port", &self.http_port)
            .field("max_in_flight", &self.max_in_flight)
            .field("min_spacing", &self.min_spacing)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok(), read_secret_file)
    }

    /// `var` reads a variable; `secret` reads a Docker secret file and returns
    /// `None` when the file is absent.
    pub fn from_lookup<V, S>(var: V, secret: S) -> Result<Self>
    where
        V: Fn(&str) -> Option<String>,
        S: Fn(&str) -> Option<String>,
    {
        // API key: only needed by commands that talk to the provider.
        let api_key = match var("API_FOOTBALL_KEY") {
            Some(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
            Some(_) => return Err(anyhow!("API_FOOTBALL_KEY is set but empty")),
            None => secret(API_KEY_SECRET),
        };
        if let Some(key) = &api_key {
            reject_placeholder(key)?;
        }

        let database_url = match var("DATABASE_URL") {
            Some(v) if !v.trim().is_empty() => v,
            Some(_) => return Err(anyhow!("DATABASE_URL is set but empty")),
            None => {
                let host = var("PG_HOST").unwrap_or_else(|| "localhost".to_string());
                let port = var("PG_PORT").unwrap_or_else(|| "5432".to_string());
                let user = var("PG_USER").unwrap_or_else(|| "postgres".to_string());
                let password = var("PG_PASSWORD")
                    .or_else(|| secret(PG_PASSWORD_SECRET))
                    .context("PG_PASSWORD is not set and no pg_password secret is mounted")?;
                let database = var("PG_DATABASE").unwrap_or_else(|| {
                    if var("APP_ENV").as_deref() == Some("test") {
                        "FantasyPL_Test".to_string()
                    } else {
                        "FantasyPL".to_string()
                    }
                });
                database_url_from_parts(&host, &port, &user, &password, &database)?
            }
        };

        let defaults = RequestLimits::default();
        Ok(Self {
            api_key,
            api_base_url: var("API_FOOTBALL_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            database_url,
            http_port: parse_or(&var, "HTTP_PORT", 3001),
            max_in_flight: parse_positive_or(&var, "UPSTREAM_MAX_IN_FLIGHT", defaults.max_in_flight),
            min_spacing: Duration::from_millis(parse_or(
                &var,
                "UPSTREAM_MIN_SPACING_MS",
                defaults.min_spacing.as_millis() as u64,
            )),
            call_timeout: Duration::from_secs(parse_positive_or(
                &var,
                "CALL_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
        })
    }

    pub fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            anyhow!("API_FOOTBALL_KEY is not set and no api_football_key secret is mounted")
        })
    }

    pub fn request_limits(&self) -> RequestLimits {
        RequestLimits {
            max_in_flight: self.max_in_flight,
            min_spacing: self.min_spacing,
            timeout: self.call_timeout,
        }
    }
}

fn parse_or<V, T>(var: &V, name: &str, default: T) -> T
where
    V: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match var(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{}={:?} is not valid; using {}", name, raw, default);
            default
        }),
    }
}

/// Like [`parse_or`], but zero also falls back to the default.
fn parse_positive_or<V, T>(var: &V, name: &str, default: T) -> T
where
    V: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display + PartialOrd + Default,
{
    let value = parse_or(var, name, default);
    if value > T::default() {
        value
    } else {
        warn!("{}={} must be greater than zero; using {}", name, value, default);
        default
    }
}

/// User and password are percent-encoded so any character is allowed.
fn database_url_from_parts(
    host: &str,
    port: &str,
    user: &str,
    password: &str,
    database: &str,
) -> Result<String> {
    let mut url = Url::parse(&format!("postgresql://{}:{}/{}", host, port, database))
        .with_context(|| format!("invalid database location {}:{}/{}", host, port, database))?;
    url.set_username(user)
        .map_err(|_| anyhow!("PG_USER cannot be used in a database url"))?;
    url.set_password(Some(password))
        .map_err(|_| anyhow!("PG_PASSWORD cannot be used in a database url"))?;
    Ok(url.to_string())
}

/// Prevent accidental use of sample/placeholder keys
fn reject_placeholder(key: &str) -> Result<()> {
    let lower = key.to_lowercase();
    if lower.contains("change_me") || lower.contains("your_") || lower.starts_with("sample") {
        return Err(anyhow!(
            "API_FOOTBALL_KEY appears to be a placeholder value; replace with your real key"
        ));
    }
    Ok(())
}

fn read_secret_file(path: &str) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
