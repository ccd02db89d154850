use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use modgate_application::MAX_AUDIT_PAGE_SIZE;
use modgate_core::{AppError, AppResult};
use tracing_subscriber::EnvFilter;

const DEFAULT_CACHE_KEY_PREFIX: &str = "modgate:effective";
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
const DEFAULT_AUDIT_PAGE_SIZE: usize = 100;

/// Where roles, plans, and the module catalog live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres { database_url: String },
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

/// Effective permission cache in front of the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    None,
    Memory,
    Redis {
        redis_url: String,
        key_prefix: String,
    },
}

impl CacheBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Memory => "memory",
            Self::Redis { .. } => "redis",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_host: String,
    pub api_port: u16,
    pub storage_backend: StorageBackend,
    pub seed_file: Option<PathBuf>,
    pub cache_backend: CacheBackend,
    pub cache_ttl_seconds: u64,
    pub audit_page_size: usize,
    pub cors_allowed_origin: Option<String>,
}

impl ApiConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from a variable lookup; blank values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let lookup = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let api_host = lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = parsed("API_PORT", lookup("API_PORT"), 3001_u16)?;

        let storage_backend = match lookup("STORAGE_BACKEND").as_deref().unwrap_or("memory") {
            "memory" => StorageBackend::Memory,
            "postgres" => StorageBackend::Postgres {
                database_url: required("DATABASE_URL", lookup("DATABASE_URL"))?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "STORAGE_BACKEND must be either 'memory' or 'postgres', got '{other}'"
                )));
            }
        };

        let cache_backend = match lookup("CACHE_BACKEND").as_deref().unwrap_or("none") {
            "none" => CacheBackend::None,
            "memory" => CacheBackend::Memory,
            "redis" => CacheBackend::Redis {
                redis_url: required("REDIS_URL", lookup("REDIS_URL"))?,
                key_prefix: lookup("CACHE_KEY_PREFIX")
                    .unwrap_or_else(|| DEFAULT_CACHE_KEY_PREFIX.to_owned()),
            },
            other => {
                return Err(AppError::Validation(format!(
                    "CACHE_BACKEND must be one of 'none', 'memory', or 'redis', got '{other}'"
                )));
            }
        };

        let cache_ttl_seconds = parsed(
            "CACHE_TTL_SECONDS",
            lookup("CACHE_TTL_SECONDS"),
            DEFAULT_CACHE_TTL_SECONDS,
        )?;

        let audit_page_size = parsed(
            "AUDIT_PAGE_SIZE",
            lookup("AUDIT_PAGE_SIZE"),
            DEFAULT_AUDIT_PAGE_SIZE,
        )?;
        if !(1..=MAX_AUDIT_PAGE_SIZE).contains(&audit_page_size) {
            return Err(AppError::Validation(format!(
                "AUDIT_PAGE_SIZE must be between 1 and {MAX_AUDIT_PAGE_SIZE}"
            )));
        }

        Ok(Self {
            api_host,
            api_port,
            storage_backend,
            seed_file: lookup("SEED_FILE").map(PathBuf::from),
            cache_backend,
            cache_ttl_seconds,
            audit_page_size,
            cors_allowed_origin: lookup("CORS_ALLOWED_ORIGIN"),
        })
    }

    pub fn socket_address(&self) -> AppResult<SocketAddr> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Validation(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required(name: &str, value: Option<String>) -> AppResult<String> {
    value.ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parsed<T>(name: &str, value: Option<String>, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => value
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name} '{value}': {error}"))),
        None => Ok(default),
    }
}
