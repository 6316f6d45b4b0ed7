use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub jwt_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
    pub bcrypt_cost: u32,
    /// Allowed CORS origin.
    pub frontend_origin: String,
    /// Base of the link mailed for password resets, with trailing slash.
    pub frontend_url: String,
    pub host: String,
    pub port: u16,
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let store = match env::var("STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("mongo") | Err(_) => StoreBackend::Mongo,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORE",
                    value: other.to_string(),
                })
            }
        };
        let mongo_uri = match (env::var("MONGO_URI"), store) {
            (Ok(uri), _) => uri,
            (Err(_), StoreBackend::Memory) => String::new(),
            (Err(_), StoreBackend::Mongo) => return Err(ConfigError::Missing("MONGO_URI")),
        };

        Ok(Self {
            store,
            mongo_uri,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "tasklist".to_string()),
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            jwt_ttl_minutes: parsed("JWT_TTL_MINUTES", 60)?,
            reset_ttl_minutes: parsed("RESET_TTL_MINUTES", 60)?,
            bcrypt_cost: parsed("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173/".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed("PORT", 5000)?,
        })
    }

    /// In-memory settings with a fixed secret, for tests and local runs.
    pub fn local(jwt_secret: &str) -> Self {
        Self {
            store: StoreBackend::Memory,
            mongo_uri: String::new(),
            database_name: "tasklist".to_string(),
            jwt_secret: jwt_secret.to_string(),
            jwt_ttl_minutes: 60,
            reset_ttl_minutes: 60,
            // Cheapest cost bcrypt accepts.
            bcrypt_cost: 4,
            frontend_origin: "http://localhost:5173".to_string(),
            frontend_url: "http://localhost:5173/".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}
