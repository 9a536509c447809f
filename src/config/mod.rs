use crate::decorators::{self, Decorated};
use crate::di::{Injectable, Injector};
use crate::error::{RapidError, Result};
use crate::metadata::MetadataRegistry;
use dashmap::DashMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Configuration service
///
/// A key/value snapshot of the process environment. Injectable, so
/// providers and controllers can take an `Arc<ConfigService>` field.
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// Parses `key`; a present but malformed value is an error.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| RapidError::Config {
                    key: key.to_string(),
                    message: format!("`{raw}`: {e}"),
                })
            })
            .transpose()
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.get_parsed(key)?.unwrap_or(default))
    }
}

impl Decorated for ConfigService {
    fn decorate(registry: &MetadataRegistry) {
        decorators::injectable::<Self>(registry);
    }
}

impl Injectable for ConfigService {
    fn inject(_: &Injector) -> Result<Self> {
        Ok(Self::new())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

/// Settings read at bootstrap.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub log_level: String,
    /// Maximum accepted request body, in bytes.
    pub body_limit: usize,
    /// Mounts the built-in [`Cors`](crate::middleware::Cors) middleware.
    pub cors: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: Environment::Development,
            log_level: "info".to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
            cors: true,
        }
    }
}

impl AppConfig {
    /// Reads `HOST`, `PORT`, `APP_ENV`, `LOG_LEVEL`, `BODY_LIMIT` and `CORS`.
    pub fn from_service(config: &ConfigService) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: config.get("HOST").unwrap_or(defaults.host),
            port: config.get_or("PORT", defaults.port)?,
            environment: config.get_or("APP_ENV", defaults.environment)?,
            log_level: config.get("LOG_LEVEL").unwrap_or(defaults.log_level),
            body_limit: config.get_or("BODY_LIMIT", defaults.body_limit)?,
            cors: config.get_or("CORS", defaults.cors)?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_service(&ConfigService::new())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
