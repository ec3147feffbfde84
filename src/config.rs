use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    /// Accepted `aud` values (web, iOS and Android client ids).
    pub client_ids: Vec<String>,
    pub tokeninfo_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub jwt: JwtConfig,
    pub google: GoogleConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("APP_STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            _ => StoreBackend::Postgres {
                database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            },
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "healzy".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "healzy-users".into()),
        };
        let google = GoogleConfig {
            client_ids: split_list(&std::env::var("GOOGLE_CLIENT_IDS").unwrap_or_default()),
            tokeninfo_url: std::env::var("GOOGLE_TOKENINFO_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/tokeninfo".into()),
            timeout_secs: env_u64("HTTP_TIMEOUT_SECS").unwrap_or(15),
        };
        Ok(Self { store, jwt, google })
    }
}

/// Settings for the API client and the on-device stores.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeout_secs: u64,
    pub data_dir: PathBuf,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let data_dir = match std::env::var("HEALZY_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => directories::ProjectDirs::from("com", "healzy", "healzy")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .context("could not determine a data directory; set HEALZY_DATA_DIR")?,
        };
        Ok(Self {
            api_url: std::env::var("HEALZY_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            timeout_secs: env_u64("HEALZY_HTTP_TIMEOUT_SECS").unwrap_or(15),
            data_dir,
        })
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse::<u64>().ok())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
