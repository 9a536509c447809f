use crate::decorators::{self, Decorated};
use crate::di::{Injectable, Injector};
use crate::metadata::MetadataRegistry;
use crate::orm::{Connection, DatabaseConfig, Model, ModelOptions, OrmError, OrmResult, Schema};
use dashmap::DashMap;
use std::sync::Arc;

/// Named connections and the models defined on them.
///
/// Injectable: services take an `Arc<Orm>` field and share the
/// application's instance.
#[derive(Default)]
pub struct Orm {
    connections: DashMap<String, Arc<Connection>>,
    models: DashMap<String, Arc<Model>>,
}

impl Orm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a connection registered under its database name.
    pub async fn create_connection(&self, config: DatabaseConfig) -> OrmResult<Arc<Connection>> {
        let name = config.database.clone();
        self.create_named_connection(name, config).await
    }

    pub async fn create_named_connection(
        &self,
        name: impl Into<String>,
        config: DatabaseConfig,
    ) -> OrmResult<Arc<Connection>> {
        let connection = Arc::new(Connection::new(config));
        connection.connect().await?;
        self.connections.insert(name.into(), Arc::clone(&connection));
        Ok(connection)
    }

    /// The connection called `name`, or the only open one when `name` is `None`.
    pub fn connection(&self, name: Option<&str>) -> OrmResult<Arc<Connection>> {
        match name {
            Some(name) => self
                .connections
                .get(name)
                .map(|entry| Arc::clone(entry.value()))
                .ok_or_else(|| OrmError::UnknownConnection(name.to_string())),
            None if self.connections.len() == 1 => self
                .connections
                .iter()
                .next()
                .map(|entry| Arc::clone(entry.value()))
                .ok_or(OrmError::NotConnected),
            None if self.connections.is_empty() => Err(OrmError::NotConnected),
            None => Err(OrmError::Config(
                "several connections are open; name the one to use".to_string(),
            )),
        }
    }

    /// Defines a model on `options.connection`, replacing a previous one with the same name.
    pub fn define_model(&self, name: &str, schema: Schema, options: ModelOptions) -> OrmResult<Arc<Model>> {
        let connection = self.connection(options.connection.as_deref())?;
        let model = Model::new(name, schema, connection, options);
        self.models.insert(name.to_string(), Arc::clone(&model));
        tracing::debug!("Model defined: {} ({})", name, model.collection());
        Ok(model)
    }

    pub fn model(&self, name: &str) -> OrmResult<Arc<Model>> {
        self.models
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| OrmError::UnknownModel(name.to_string()))
    }

    /// Closes every connection; the first failure is returned after all were tried.
    pub async fn close_connections(&self) -> OrmResult<()> {
        let connections: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.connections.clear();

        let mut first_error = None;
        for connection in connections {
            if let Err(e) = connection.close().await {
                tracing::error!("Failed to close connection {}: {}", connection.config().database, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Decorated for Orm {
    fn decorate(registry: &MetadataRegistry) {
        decorators::injectable::<Self>(registry);
    }
}

impl Injectable for Orm {
    fn inject(_: &Injector) -> crate::Result<Self> {
        Ok(Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_connection_is_the_default() {
        let orm = Orm::new();
        assert!(matches!(orm.connection(None), Err(OrmError::NotConnected)));

        orm.create_connection(DatabaseConfig::sqlite(":memory:")).await.unwrap();
        assert!(orm.connection(None).is_ok());
        assert!(orm.connection(Some(":memory:")).is_ok());
        assert!(matches!(orm.connection(Some("other")), Err(OrmError::UnknownConnection(_))));

        let model = orm.define_model("Post", Schema::new(), ModelOptions::new()).unwrap();
        assert_eq!(model.collection(), "post");
        assert!(orm.model("Post").is_ok());
        assert!(matches!(orm.model("Nope"), Err(OrmError::UnknownModel(_))));
    }

    #[tokio::test]
    async fn several_connections_need_a_name() {
        let orm = Orm::new();
        orm.create_named_connection("a", DatabaseConfig::sqlite(":memory:")).await.unwrap();
        orm.create_named_connection("b", DatabaseConfig::sqlite(":memory:")).await.unwrap();
        assert!(matches!(orm.connection(None), Err(OrmError::Config(_))));

        let model = orm
            .define_model("Post", Schema::new(), ModelOptions::new().connection("b").table_name("posts"))
            .unwrap();
        assert_eq!(model.collection(), "posts");
    }

    #[tokio::test]
    async fn close_connections_disconnects_all() {
        let orm = Orm::new();
        let connection = orm.create_connection(DatabaseConfig::sqlite(":memory:")).await.unwrap();
        orm.close_connections().await.unwrap();
        assert!(!connection.is_connected());
        assert!(matches!(orm.connection(None), Err(OrmError::NotConnected)));
    }
}
