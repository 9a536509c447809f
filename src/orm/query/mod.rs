//! CRUD translation per backend.
//!
//! [`Query`] picks one [`Translator`] for the connection's [`Client`]
//! variant. Conditions are equality filters over columns (`null` matches
//! missing values); they are not a query language.

mod document;
mod sql;

pub use document::DocumentTranslator;
pub use sql::{Dialect, MySql, Postgres, SqlStatement, SqlTranslator, Sqlite};

use crate::orm::{Client, ColumnTypes, Connection, OrmError, OrmResult, Row};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

#[async_trait]
pub trait Translator: Send + Sync {
    async fn find(&self, collection: &str, conditions: &Row) -> OrmResult<Vec<Row>>;

    async fn find_one(&self, collection: &str, conditions: &Row) -> OrmResult<Option<Row>>;

    /// Inserts `data` and returns the id of the new record.
    async fn insert(&self, collection: &str, data: &Row) -> OrmResult<Value>;

    /// Updates at most one matching record; `true` when one changed.
    async fn update_one(&self, collection: &str, conditions: &Row, data: &Row) -> OrmResult<bool>;

    /// Deletes at most one matching record; `true` when one was removed.
    async fn delete_one(&self, collection: &str, conditions: &Row) -> OrmResult<bool>;
}

/// Operations on one collection (table) of a connection.
#[derive(Debug, Clone)]
pub struct Query {
    collection: String,
    connection: Arc<Connection>,
    types: Arc<ColumnTypes>,
}

impl Query {
    pub fn new(collection: impl Into<String>, connection: Arc<Connection>) -> Self {
        Self {
            collection: collection.into(),
            connection,
            types: Arc::default(),
        }
    }

    /// Binds values of the listed columns with their declared type.
    pub fn with_types(mut self, types: Arc<ColumnTypes>) -> Self {
        self.types = types;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn translator(&self) -> OrmResult<Box<dyn Translator>> {
        let translator: Box<dyn Translator> = match self.connection.client()? {
            Client::MongoDb { database, .. } => Box::new(DocumentTranslator::new(database)),
            Client::MySql(db) => Box::new(SqlTranslator::<MySql>::new(db, Arc::clone(&self.types))),
            Client::Postgres(db) => Box::new(SqlTranslator::<Postgres>::new(db, Arc::clone(&self.types))),
            Client::Sqlite(db) => Box::new(SqlTranslator::<Sqlite>::new(db, Arc::clone(&self.types))),
        };
        Ok(translator)
    }

    pub async fn find(&self, conditions: &Value) -> OrmResult<Vec<Row>> {
        let conditions = conditions_of(conditions)?;
        self.translator()?.find(&self.collection, &conditions).await
    }

    pub async fn find_one(&self, conditions: &Value) -> OrmResult<Option<Row>> {
        let conditions = conditions_of(conditions)?;
        self.translator()?.find_one(&self.collection, &conditions).await
    }

    pub async fn find_by_id(&self, id: impl Into<Value>) -> OrmResult<Option<Row>> {
        self.find_one(&json!({ "id": id.into() })).await
    }

    pub async fn insert(&self, data: &Row) -> OrmResult<Value> {
        self.translator()?.insert(&self.collection, data).await
    }

    pub async fn update_one(&self, conditions: &Value, data: &Row) -> OrmResult<bool> {
        let conditions = conditions_of(conditions)?;
        self.translator()?
            .update_one(&self.collection, &conditions, data)
            .await
    }

    pub async fn update_by_id(&self, id: impl Into<Value>, data: &Row) -> OrmResult<bool> {
        self.update_one(&json!({ "id": id.into() }), data).await
    }

    pub async fn delete_one(&self, conditions: &Value) -> OrmResult<bool> {
        let conditions = conditions_of(conditions)?;
        self.translator()?.delete_one(&self.collection, &conditions).await
    }

    pub async fn delete_by_id(&self, id: impl Into<Value>) -> OrmResult<bool> {
        self.delete_one(&json!({ "id": id.into() })).await
    }
}

fn conditions_of(conditions: &Value) -> OrmResult<Row> {
    match conditions {
        Value::Null => Ok(Row::new()),
        Value::Object(map) => Ok(map.clone()),
        other => Err(OrmError::InvalidConditions(format!(
            "expected an object, got `{other}`"
        ))),
    }
}
