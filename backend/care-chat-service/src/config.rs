use crate::error::AppError;
use crate::models::{UserIdentity, UserRole};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where conversations and messages are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(AppError::Config(format!("unknown STORE_BACKEND '{other}'"))),
        }
    }
}

/// Postgres pool settings.
#[derive(Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Timeout for the start-up `SELECT 1` check
    pub connect_timeout_secs: u64,
    /// Timeout for checking a connection out of the pool
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }
}

impl DbConfig {
    pub fn from_env(database_url: String) -> Self {
        let defaults = Self::default();
        Self {
            database_url,
            max_connections: env_or("DB_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: env_or("DB_MIN_CONNECTIONS", defaults.min_connections),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs),
            acquire_timeout_secs: env_or("DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout_secs),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", defaults.max_lifetime_secs),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub store_backend: StoreBackend,
    /// Present when `store_backend` is `Postgres`
    pub database: Option<DbConfig>,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    /// Users upserted into the active store at start-up
    pub seed_users: Vec<UserIdentity>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("store_backend", &self.store_backend)
            .field("database", &self.database)
            .field("jwt_secret", &"[REDACTED]")
            .field("upload_dir", &self.upload_dir)
            .field("public_base_url", &self.public_base_url)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("seed_users", &self.seed_users.len())
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StoreBackend::Postgres,
        };

        let database = match store_backend {
            StoreBackend::Postgres => {
                let url = env::var("DATABASE_URL")
                    .map_err(|_| AppError::Config("DATABASE_URL missing".into()))?;
                Some(DbConfig::from_env(url))
            }
            StoreBackend::Memory => None,
        };

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::Config("JWT_SECRET missing".into()))?;
        if jwt_secret.trim().is_empty() {
            return Err(AppError::Config("JWT_SECRET must not be empty".into()));
        }

        let port = env_or("PORT", 8000u16);
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let seed_users = match env::var("DEV_SEED_USERS") {
            Ok(value) => parse_seed_users(&value)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            port,
            store_backend,
            database,
            jwt_secret,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            public_base_url,
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            seed_users,
        })
    }

    /// In-memory configuration for tests and local tooling.
    pub fn test_defaults() -> Self {
        Self {
            port: 0,
            store_backend: StoreBackend::Memory,
            database: None,
            jwt_secret: "test-secret".into(),
            upload_dir: env::temp_dir().join("care-chat-uploads"),
            public_base_url: "http://localhost:8000".into(),
            max_upload_bytes: 1024 * 1024,
            seed_users: Vec::new(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses `"1:patient,2:physician"`; a missing role means `patient`.
pub fn parse_seed_users(value: &str) -> Result<Vec<UserIdentity>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<UserIdentity, AppError> {
            let (id, role) = entry.split_once(':').unwrap_or((entry, "patient"));
            let id = id
                .trim()
                .parse::<i64>()
                .map_err(|_| AppError::Config(format!("invalid DEV_SEED_USERS entry '{entry}'")))?;
            Ok(UserIdentity::new(id, UserRole::from_tag(role)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_users() {
        let users = parse_seed_users("1:patient, 2:physician,3:pharmacy,4").unwrap();
        assert_eq!(users.len(), 4);
        assert_eq!(users[1].role, UserRole::Physician);
        assert_eq!(users[2].role, UserRole::Pharmacy);
        assert_eq!(users[3].role, UserRole::Patient);
    }

    #[test]
    fn test_parse_seed_users_rejects_bad_id() {
        assert!(matches!(
            parse_seed_users("abc:patient"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("pg".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut cfg = Config::test_defaults();
        cfg.database = Some(DbConfig {
            database_url: "postgres://user:pw@localhost/chat".into(),
            ..DbConfig::default()
        });
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("test-secret"));
        assert!(!rendered.contains("pw@localhost"));
    }
}
