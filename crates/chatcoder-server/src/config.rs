use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

use chatcoder_api::DEFAULT_ACCESS_TOKEN;
use chatcoder_db::{DEFAULT_RETENTION, StoreBackend, StoreConfig};

/// Secrets that ship in sample `.env` files and must never sign real tokens.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` means a random secret is generated per process.
    pub jwt_secret: Option<String>,
    pub token_ttl: chrono::Duration,
    pub access_token: String,
    pub store: StoreConfig,
    pub history_limit: usize,
    /// When false, `GET /api/messages` also requires a bearer token.
    pub public_read: bool,
    pub admin_token: Option<String>,
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("CHATCODER_JWT_SECRET");
        if let Some(secret) = &jwt_secret {
            if PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
                bail!("CHATCODER_JWT_SECRET is still a placeholder; set a random value or unset it");
            }
        }

        let data_dir = PathBuf::from(var("CHATCODER_DATA_DIR").unwrap_or_else(|| "./data".into()));
        let db_path = PathBuf::from(var("CHATCODER_DB_PATH").unwrap_or_else(|| "chatcoder.db".into()));
        let backend = match var("CHATCODER_STORE").as_deref().unwrap_or("json") {
            "memory" => StoreBackend::Memory,
            "json" => StoreBackend::Json { dir: data_dir },
            "sqlite" => StoreBackend::Sqlite { path: db_path },
            other => bail!("CHATCODER_STORE must be memory, json or sqlite (got {:?})", other),
        };

        let ttl_hours: i64 = parse(&var, "CHATCODER_TOKEN_TTL_HOURS", 24)?;
        if ttl_hours <= 0 {
            bail!("CHATCODER_TOKEN_TTL_HOURS must be positive");
        }
        let token_ttl = chrono::Duration::try_hours(ttl_hours)
            .context("CHATCODER_TOKEN_TTL_HOURS is out of range")?;

        Ok(Self {
            host: var("CHATCODER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(&var, "CHATCODER_PORT", 3000)?,
            jwt_secret,
            token_ttl,
            access_token: var("CHATCODER_ACCESS_TOKEN").unwrap_or_else(|| DEFAULT_ACCESS_TOKEN.into()),
            store: StoreConfig {
                backend,
                retention: parse(&var, "CHATCODER_MESSAGE_RETENTION", DEFAULT_RETENTION)?,
            },
            history_limit: parse(&var, "CHATCODER_HISTORY_LIMIT", 50)?,
            public_read: parse_bool(&var, "CHATCODER_PUBLIC_READ", true)?,
            admin_token: var("CHATCODER_ADMIN_TOKEN"),
            static_dir: var("CHATCODER_STATIC_DIR").map(PathBuf::from),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} has invalid value {:?}", key, raw)),
        None => Ok(default),
    }
}

fn parse_bool(var: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    match var(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("{} has invalid boolean {:?}", key, other),
    }
}
