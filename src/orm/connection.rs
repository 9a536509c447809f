//! Database connections and their lifecycle.

use crate::orm::{DatabaseConfig, DatabaseType, OrmError, OrmResult};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Error(String),
}

/// The live driver handle of a connected [`Connection`], one variant per backend.
#[derive(Debug, Clone)]
pub enum Client {
    MongoDb {
        client: mongodb::Client,
        database: mongodb::Database,
    },
    MySql(DatabaseConnection),
    Postgres(DatabaseConnection),
    Sqlite(DatabaseConnection),
}

impl Client {
    pub fn kind(&self) -> DatabaseType {
        match self {
            Self::MongoDb { .. } => DatabaseType::MongoDb,
            Self::MySql(_) => DatabaseType::MySql,
            Self::Postgres(_) => DatabaseType::Postgres,
            Self::Sqlite(_) => DatabaseType::Sqlite,
        }
    }

    /// The sea-orm connection of a relational backend.
    pub fn relational(&self) -> Option<&DatabaseConnection> {
        match self {
            Self::MySql(db) | Self::Postgres(db) | Self::Sqlite(db) => Some(db),
            Self::MongoDb { .. } => None,
        }
    }
}

/// A connection to one database.
///
/// `Disconnected -> Connecting -> Connected -> Disconnected`. Lifecycle
/// changes are published to receivers from [`subscribe`](Self::subscribe).
pub struct Connection {
    config: DatabaseConfig,
    state: RwLock<ConnectionState>,
    client: RwLock<Option<Client>>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl Connection {
    pub fn new(config: DatabaseConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            client: RwLock::new(None),
            events,
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn kind(&self) -> DatabaseType {
        self.config.kind
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Opens the backend connection. Failures are published as an
    /// [`ConnectionEvent::Error`] and returned.
    pub async fn connect(&self) -> OrmResult<()> {
        if self.is_connected() {
            tracing::debug!("Connection to {} already open", self.config.database);
            return Ok(());
        }
        self.set_state(ConnectionState::Connecting);

        let result = match self.config.kind {
            DatabaseType::MongoDb => self.connect_document().await,
            kind => self.connect_relational(kind).await,
        };
        match result {
            Ok(client) => {
                *self.client.write().unwrap_or_else(PoisonError::into_inner) = Some(client);
                self.set_state(ConnectionState::Connected);
                tracing::info!("Database connected: {} ({})", self.config.database, self.config.kind);
                self.emit(ConnectionEvent::Connected);
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                tracing::error!("Database connection failed: {}", e);
                self.emit(ConnectionEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn connect_document(&self) -> OrmResult<Client> {
        let client = mongodb::Client::with_uri_str(self.config.url()).await?;
        let database = client.database(&self.config.database);
        database.run_command(mongodb::bson::doc! { "ping": 1 }).await?;
        Ok(Client::MongoDb { client, database })
    }

    async fn connect_relational(&self, kind: DatabaseType) -> OrmResult<Client> {
        let db = Database::connect(pool_options(&self.config, kind)).await.map_err(|e| OrmError::Connect {
            backend: kind,
            message: e.to_string(),
        })?;
        Ok(match kind {
            DatabaseType::MySql => Client::MySql(db),
            DatabaseType::Postgres => Client::Postgres(db),
            _ => Client::Sqlite(db),
        })
    }

    /// The driver handle; fails while disconnected.
    pub fn client(&self) -> OrmResult<Client> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(OrmError::NotConnected)
    }

    /// Runs raw SQL (DDL, seeds) on a relational backend.
    pub async fn execute_unprepared(&self, sql: &str) -> OrmResult<u64> {
        let client = self.client()?;
        let Some(db) = client.relational() else {
            return Err(OrmError::Unsupported {
                operation: "execute_unprepared",
                backend: client.kind(),
            });
        };
        Ok(db.execute_unprepared(sql).await?.rows_affected())
    }

    /// Closes the backend connection and returns to `Disconnected`.
    pub async fn close(&self) -> OrmResult<()> {
        let client = self.client.write().unwrap_or_else(PoisonError::into_inner).take();
        let Some(client) = client else {
            return Ok(());
        };

        let result = match client {
            Client::MongoDb { client, .. } => {
                client.shutdown().await;
                Ok(())
            }
            Client::MySql(db) | Client::Postgres(db) | Client::Sqlite(db) => db.close().await.map_err(OrmError::from),
        };
        self.set_state(ConnectionState::Disconnected);
        tracing::info!("Database disconnected: {}", self.config.database);
        self.emit(ConnectionEvent::Disconnected);
        result
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("kind", &self.config.kind)
            .field("database", &self.config.database)
            .field("state", &self.state())
            .finish()
    }
}

/// An in-memory SQLite database lives exactly as long as its one pooled
/// connection, so that connection is never reaped.
fn pool_options(config: &DatabaseConfig, kind: DatabaseType) -> ConnectOptions {
    const FOREVER: Duration = Duration::from_secs(u32::MAX as u64);

    let mut options = ConnectOptions::new(config.url());
    options.sqlx_logging(false);
    if kind == DatabaseType::Sqlite {
        options.max_connections(1).min_connections(1);
        if config.database == ":memory:" {
            options.idle_timeout(FOREVER).max_lifetime(FOREVER);
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_lifecycle_emits_events() {
        let connection = Connection::new(DatabaseConfig::sqlite(":memory:"));
        let mut events = connection.subscribe();
        assert!(matches!(connection.client(), Err(OrmError::NotConnected)));

        connection.connect().await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Connected);
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);
        assert_eq!(connection.client().unwrap().kind(), DatabaseType::Sqlite);

        connection.execute_unprepared("CREATE TABLE t (id INTEGER PRIMARY KEY)").await.unwrap();

        connection.close().await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Disconnected);
        assert!(matches!(connection.client(), Err(OrmError::NotConnected)));
    }

    #[tokio::test]
    async fn failed_connects_emit_error_and_reset_state() {
        let connection = Connection::new(DatabaseConfig::sqlite("/nonexistent-dir/sub/db.sqlite"));
        let mut events = connection.subscribe();

        let err = connection.connect().await.unwrap_err();
        assert!(matches!(err, OrmError::Connect { backend: DatabaseType::Sqlite, .. }));
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(matches!(events.recv().await.unwrap(), ConnectionEvent::Error(_)));
    }

    #[test]
    fn memory_pools_keep_their_only_connection() {
        let options = pool_options(&DatabaseConfig::sqlite(":memory:"), DatabaseType::Sqlite);
        assert_eq!(options.get_max_connections(), Some(1));
        assert!(options.get_idle_timeout().is_some_and(|t| t >= Duration::from_secs(365 * 24 * 3600)));
        assert!(options.get_max_lifetime().is_some_and(|t| t >= Duration::from_secs(365 * 24 * 3600)));

        let file = pool_options(&DatabaseConfig::sqlite("app.db"), DatabaseType::Sqlite);
        assert_eq!(file.get_max_connections(), Some(1));
        assert_eq!(file.get_idle_timeout(), None);
    }

    #[tokio::test]
    async fn closing_an_unopened_connection_is_a_no_op() {
        let connection = Connection::new(DatabaseConfig::sqlite(":memory:"));
        connection.close().await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }
}
