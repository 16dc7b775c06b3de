//! Server configuration loaded from environment variables (and `.env`).
//!
//! Every setting has a default so the server starts with zero configuration
//! for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

use whisper_thread::DEFAULT_MAX_NESTING_LEVEL;

#[derive(Debug, Clone)]
pub struct Config {
    /// Env: `WHISPER_HOST`, default `0.0.0.0`
    pub host: String,

    /// Env: `WHISPER_PORT`, default `3000`
    pub port: u16,

    /// Env: `WHISPER_DB_PATH`, default `whisper.db`
    pub db_path: PathBuf,

    /// HS256 secret shared with the identity provider that mints tokens.
    /// Env: `WHISPER_JWT_SECRET`
    pub jwt_secret: String,

    /// Deepest indent level replies are rendered at.
    /// Env: `WHISPER_MAX_NESTING_LEVEL`, default 3
    pub max_nesting_level: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            db_path: PathBuf::from("whisper.db"),
            jwt_secret: "dev-secret-change-me".to_string(),
            max_nesting_level: DEFAULT_MAX_NESTING_LEVEL,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("WHISPER_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("invalid WHISPER_PORT '{}'", raw))?,
            None => defaults.port,
        };
        let max_nesting_level = match lookup("WHISPER_MAX_NESTING_LEVEL") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid WHISPER_MAX_NESTING_LEVEL '{}'", raw))?,
            None => defaults.max_nesting_level,
        };

        Ok(Self {
            host: lookup("WHISPER_HOST").unwrap_or(defaults.host),
            port,
            db_path: lookup("WHISPER_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            jwt_secret: lookup("WHISPER_JWT_SECRET").unwrap_or(defaults.jwt_secret),
            max_nesting_level,
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
