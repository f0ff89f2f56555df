use std::str::FromStr;

use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local, lost on exit.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StorageBackend::Postgres),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            other => bail!("unknown STORAGE_BACKEND '{other}' (expected postgres or memory)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let storage = match var("STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StorageBackend::Postgres,
        };
        let database_url = var("DATABASE_URL").filter(|v| !v.trim().is_empty());
        if storage == StorageBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORAGE_BACKEND is postgres");
        }

        let db_max_connections = match var("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("DB_MAX_CONNECTIONS '{raw}' is not a number"))?,
            None => 10,
        };
        let port = match var("APP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("APP_PORT '{raw}' is not a port"))?,
            None => 8080,
        };

        Ok(Self {
            storage,
            database_url,
            db_max_connections,
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
