use crate::config::ConfigService;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Supported database backends.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DatabaseType {
    #[strum(to_string = "mongodb", serialize = "mongo")]
    MongoDb,
    MySql,
    #[strum(to_string = "postgres", serialize = "postgresql")]
    Postgres,
    Sqlite,
}

impl DatabaseType {
    pub fn default_port(self) -> Option<u16> {
        match self {
            Self::MongoDb => Some(27017),
            Self::MySql => Some(3306),
            Self::Postgres => Some(5432),
            Self::Sqlite => None,
        }
    }

    pub fn is_relational(self) -> bool {
        self != Self::MongoDb
    }
}

/// Connection settings for one database.
///
/// For SQLite `database` is a file path, or `:memory:` for a private
/// in-memory database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub kind: DatabaseType,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Extra driver options, appended to the connection URL as query parameters.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl DatabaseConfig {
    pub fn new(kind: DatabaseType, database: impl Into<String>) -> Self {
        Self {
            kind,
            host: None,
            port: None,
            database: database.into(),
            username: None,
            password: None,
            options: BTreeMap::new(),
        }
    }

    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::new(DatabaseType::Sqlite, path)
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Driver URL for this configuration.
    pub fn url(&self) -> String {
        if self.kind == DatabaseType::Sqlite {
            return self.sqlite_url();
        }

        let scheme = match self.kind {
            DatabaseType::MongoDb => "mongodb",
            DatabaseType::MySql => "mysql",
            _ => "postgres",
        };
        let host = self.host.as_deref().unwrap_or("localhost");
        let port = self.port.or(self.kind.default_port()).unwrap_or_default();
        let auth = match (&self.username, &self.password) {
            (Some(user), Some(password)) => format!(
                "{}:{}@",
                urlencoding::encode(user),
                urlencoding::encode(password)
            ),
            (Some(user), None) => format!("{}@", urlencoding::encode(user)),
            _ => String::new(),
        };
        format!(
            "{scheme}://{auth}{host}:{port}/{}{}",
            self.database,
            self.query_string()
        )
    }

    fn sqlite_url(&self) -> String {
        if self.database == ":memory:" {
            return "sqlite::memory:".to_string();
        }
        if self.database.starts_with("sqlite:") {
            return self.database.clone();
        }
        let mut options = self.options.clone();
        options.entry("mode".to_string()).or_insert_with(|| "rwc".to_string());
        format!("sqlite://{}?{}", self.database, encode_pairs(&options))
    }

    fn query_string(&self) -> String {
        if self.options.is_empty() {
            String::new()
        } else {
            format!("?{}", encode_pairs(&self.options))
        }
    }

    /// Reads `DB_TYPE`, `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER` and `DB_PASSWORD`.
    ///
    /// Defaults to a SQLite file named `database.sqlite`.
    pub fn from_config(config: &ConfigService) -> Result<Self> {
        let kind = config.get_or("DB_TYPE", DatabaseType::Sqlite)?;
        Ok(Self {
            kind,
            host: config.get("DB_HOST"),
            port: config.get_parsed("DB_PORT")?,
            database: config
                .get("DB_NAME")
                .unwrap_or_else(|| "database.sqlite".to_string()),
            username: config.get("DB_USER"),
            password: config.get("DB_PASSWORD"),
            options: BTreeMap::new(),
        })
    }
}

fn encode_pairs(options: &BTreeMap<String, String>) -> String {
    options
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
