//! Schema-bound records persisted through a [`Query`].

use crate::http::{Outcome, Responder};
use crate::orm::schema::{format_date, parse_date};
use crate::orm::{ColumnTypes, Connection, OrmError, OrmResult, Query, Row, Schema};
use chrono::Utc;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub const ID: &str = "id";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Named connection; the only open one when unset.
    pub connection: Option<String>,
    /// Collection or table; defaults to the lower-cased model name.
    pub table_name: Option<String>,
    /// Stamp `createdAt` and `updatedAt` on save.
    pub timestamps: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            connection: None,
            table_name: None,
            timestamps: true,
        }
    }
}

impl ModelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(mut self, name: impl Into<String>) -> Self {
        self.connection = Some(name.into());
        self
    }

    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }
}

/// A model class: name, schema and the connection its records live on.
pub struct Model {
    name: String,
    collection: String,
    schema: Schema,
    types: Arc<ColumnTypes>,
    connection: Arc<Connection>,
    timestamps: bool,
}

impl Model {
    pub fn new(
        name: impl Into<String>,
        schema: Schema,
        connection: Arc<Connection>,
        options: ModelOptions,
    ) -> Arc<Self> {
        let name = name.into();
        let collection = options.table_name.unwrap_or_else(|| name.to_lowercase());
        Arc::new(Self {
            name,
            collection,
            types: Arc::new(schema.column_types()),
            schema,
            connection,
            timestamps: options.timestamps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// A fresh query over this model's collection.
    pub fn query(&self) -> Query {
        Query::new(self.collection.clone(), Arc::clone(&self.connection)).with_types(Arc::clone(&self.types))
    }

    /// An unsaved record holding `data`.
    pub fn build(self: &Arc<Self>, data: Value) -> OrmResult<Record> {
        Ok(Record::new(Arc::clone(self), object(data)?))
    }

    pub async fn find(self: &Arc<Self>, conditions: Value) -> OrmResult<Vec<Record>> {
        let rows = self.query().find(&conditions).await?;
        Ok(rows.into_iter().map(|row| self.hydrate(row)).collect())
    }

    pub async fn find_one(self: &Arc<Self>, conditions: Value) -> OrmResult<Option<Record>> {
        let row = self.query().find_one(&conditions).await?;
        Ok(row.map(|row| self.hydrate(row)))
    }

    pub async fn find_by_id(self: &Arc<Self>, id: impl Into<Value>) -> OrmResult<Option<Record>> {
        let row = self.query().find_by_id(id).await?;
        Ok(row.map(|row| self.hydrate(row)))
    }

    /// Validates and saves a new record.
    pub async fn create(self: &Arc<Self>, data: Value) -> OrmResult<Record> {
        let mut record = self.build(data)?;
        record.validate().await?;
        record.save().await?;
        Ok(record)
    }

    pub async fn update_one(&self, conditions: Value, data: Value) -> OrmResult<bool> {
        self.query().update_one(&conditions, &object(data)?).await
    }

    pub async fn update_by_id(&self, id: impl Into<Value>, data: Value) -> OrmResult<bool> {
        self.query().update_by_id(id, &object(data)?).await
    }

    pub async fn delete_one(&self, conditions: Value) -> OrmResult<bool> {
        self.query().delete_one(&conditions).await
    }

    pub async fn delete_by_id(&self, id: impl Into<Value>) -> OrmResult<bool> {
        self.query().delete_by_id(id).await
    }

    fn hydrate(self: &Arc<Self>, row: Row) -> Record {
        Record::new(Arc::clone(self), self.schema.coerce(row))
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("timestamps", &self.timestamps)
            .finish()
    }
}

fn object(data: Value) -> OrmResult<Row> {
    match data {
        Value::Object(map) => Ok(map),
        other => Err(OrmError::InvalidConditions(format!(
            "record data must be an object, got `{other}`"
        ))),
    }
}

fn timestamp(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(parse_date(&s).map(format_date).unwrap_or(s)),
        _ => None,
    }
}

/// One instance of a [`Model`].
#[derive(Clone)]
pub struct Record {
    model: Arc<Model>,
    id: Option<Value>,
    created_at: Option<String>,
    updated_at: Option<String>,
    fields: Row,
}

impl Record {
    fn new(model: Arc<Model>, mut data: Row) -> Self {
        let id = data.remove(ID).filter(|id| !id.is_null());
        let created_at = timestamp(data.remove(CREATED_AT));
        let updated_at = timestamp(data.remove(UPDATED_AT));
        Self {
            model,
            id,
            created_at,
            updated_at,
            fields: data,
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    pub fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }

    pub fn updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn fields(&self) -> &Row {
        &self.fields
    }

    pub async fn validate(&self) -> OrmResult<()> {
        Ok(self.model.schema.validate(&self.fields).await?)
    }

    /// Validates and transforms the fields, then inserts the record when it
    /// has no id or updates it by id. Transformed values are merged back.
    ///
    /// Updating a record whose row is gone fails with [`OrmError::NotFound`].
    pub async fn save(&mut self) -> OrmResult<()> {
        self.validate().await?;
        let mut data = self.model.schema.transform(&self.fields);
        let now = format_date(Utc::now());
        let stamped = self.model.timestamps;
        if stamped {
            data.insert(UPDATED_AT.to_string(), Value::String(now.clone()));
        }

        let query = self.model.query();
        match self.id.clone() {
            Some(id) => {
                if !data.is_empty() && !query.update_by_id(id.clone(), &data).await? {
                    return Err(OrmError::NotFound {
                        model: self.model.name.clone(),
                        id: match id {
                            Value::String(id) => id,
                            other => other.to_string(),
                        },
                    });
                }
            }
            None => {
                if stamped {
                    data.insert(CREATED_AT.to_string(), Value::String(now.clone()));
                }
                let id = query.insert(&data).await?;
                self.id = Some(id).filter(|id| !id.is_null());
                if stamped {
                    self.created_at = Some(now.clone());
                }
            }
        }
        if stamped {
            self.updated_at = Some(now);
        }

        data.remove(CREATED_AT);
        data.remove(UPDATED_AT);
        self.fields.extend(data);
        Ok(())
    }

    pub async fn delete(&self) -> OrmResult<bool> {
        let Some(id) = self.id.clone() else {
            return Err(OrmError::MissingId {
                model: self.model.name.clone(),
                operation: "delete",
            });
        };
        self.model.query().delete_by_id(id).await
    }

    /// Id, timestamps and the transformed schema fields.
    pub fn to_json(&self) -> Value {
        let mut json = Row::new();
        if let Some(id) = &self.id {
            json.insert(ID.to_string(), id.clone());
        }
        json.extend(self.model.schema.transform(&self.fields));
        if let Some(created_at) = &self.created_at {
            json.insert(CREATED_AT.to_string(), Value::String(created_at.clone()));
        }
        if let Some(updated_at) = &self.updated_at {
            json.insert(UPDATED_AT.to_string(), Value::String(updated_at.clone()));
        }
        Value::Object(json)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model.name)
            .field("id", &self.id)
            .field("fields", &self.fields)
            .finish()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl Responder for Record {
    fn into_outcome(self) -> Outcome {
        Outcome::Body(self.to_json())
    }
}

impl Responder for Vec<Record> {
    fn into_outcome(self) -> Outcome {
        Outcome::Body(Value::Array(self.iter().map(Record::to_json).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{DatabaseConfig, FieldType, SchemaError, SchemaField};
    use serde_json::json;
    use std::time::Duration;

    async fn users() -> Arc<Model> {
        let connection = Arc::new(Connection::new(DatabaseConfig::sqlite(":memory:")));
        connection.connect().await.unwrap();
        connection
            .execute_unprepared(
                r#"CREATE TABLE "user" (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    email TEXT,
                    active INTEGER,
                    tags TEXT,
                    "createdAt" TEXT,
                    "updatedAt" TEXT
                )"#,
            )
            .await
            .unwrap();
        let schema = Schema::new()
            .field(SchemaField::new("name", FieldType::String).required())
            .field(
                SchemaField::new("email", FieldType::String)
                    .email()
                    .transform(|v| json!(v.as_str().unwrap_or_default().to_lowercase())),
            )
            .field(SchemaField::new("active", FieldType::Boolean).default(true))
            .field(SchemaField::new("tags", FieldType::Array).default_with(|| json!([])));
        Model::new("User", schema, connection, ModelOptions::default())
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let users = users().await;
        assert_eq!(users.collection(), "user");

        let ada = users.create(json!({ "name": "Ada", "email": "ADA@X.IO" })).await.unwrap();
        assert_eq!(ada.id(), Some(&json!(1)));
        assert!(ada.created_at().is_some());
        assert_eq!(ada.created_at(), ada.updated_at());
        assert_eq!(ada.get("email"), Some(&json!("ada@x.io")));
        assert_eq!(ada.get("active"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn saving_again_refreshes_only_updated_at() {
        let users = users().await;
        let mut ada = users.create(json!({ "name": "Ada" })).await.unwrap();
        let created = ada.created_at().map(str::to_owned);
        let first_update = ada.updated_at().map(str::to_owned);

        tokio::time::sleep(Duration::from_millis(5)).await;
        ada.set("name", "Ada Lovelace");
        ada.save().await.unwrap();

        assert_eq!(ada.created_at().map(str::to_owned), created);
        assert_ne!(ada.updated_at().map(str::to_owned), first_update);

        let stored = users.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(stored.get("name"), Some(&json!("Ada Lovelace")));
        assert_eq!(stored.created_at().map(str::to_owned), created);
        assert_eq!(stored.get("active"), Some(&json!(true)));
        assert_eq!(stored.get("tags"), Some(&json!([])));
    }

    #[tokio::test]
    async fn invalid_records_are_not_saved() {
        let users = users().await;
        let err = users.create(json!({ "email": "x@y" })).await.unwrap_err();
        assert!(matches!(err, OrmError::Schema(SchemaError::Required { .. })));

        let err = users.create(json!({ "name": "Ada", "email": "ada@home" })).await.unwrap_err();
        assert!(matches!(err, OrmError::Schema(SchemaError::RuleViolation { rule: "email", .. })));
        assert!(users.find(Value::Null).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_requires_an_id() {
        let users = users().await;
        let unsaved = users.build(json!({ "name": "ghost" })).unwrap();
        assert!(matches!(
            unsaved.delete().await.unwrap_err(),
            OrmError::MissingId { operation: "delete", .. }
        ));

        let saved = users.create(json!({ "name": "real" })).await.unwrap();
        assert!(saved.delete().await.unwrap());
        assert!(users.find_by_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saving_a_deleted_record_reports_not_found() {
        let users = users().await;
        let mut ada = users.create(json!({ "name": "Ada" })).await.unwrap();
        assert!(users.delete_by_id(1).await.unwrap());

        ada.set("name", "Gone");
        let err = ada.save().await.unwrap_err();
        assert!(matches!(err, OrmError::NotFound { ref id, .. } if id == "1"));
        assert!(users.find(Value::Null).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn text_conditions_follow_column_types() {
        let users = users().await;
        users.create(json!({ "name": "Ada" })).await.unwrap();
        users.create(json!({ "name": "Off", "active": false })).await.unwrap();

        let by_text_id = users.find_by_id("1").await.unwrap().unwrap();
        assert_eq!(by_text_id.get("name"), Some(&json!("Ada")));

        let active = users.find(json!({ "active": "true" })).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].get("name"), Some(&json!("Ada")));
    }

    #[tokio::test]
    async fn static_helpers_delegate_to_queries() {
        let users = users().await;
        users.create(json!({ "name": "a" })).await.unwrap();
        users.create(json!({ "name": "b" })).await.unwrap();

        assert!(users.update_one(json!({ "name": "a" }), json!({ "email": "a@x" })).await.unwrap());
        let a = users.find_one(json!({ "name": "a" })).await.unwrap().unwrap();
        assert_eq!(a.get("email"), Some(&json!("a@x")));

        assert!(users.delete_one(json!({ "name": "b" })).await.unwrap());
        assert_eq!(users.find(json!({})).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn records_serialize_with_id_and_timestamps() {
        let users = users().await;
        let ada = users.create(json!({ "name": "Ada" })).await.unwrap();
        let json = serde_json::to_value(&ada).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["name"], "Ada");
        assert!(json["createdAt"].is_string());

        match vec![ada].into_outcome() {
            Outcome::Body(Value::Array(items)) => assert_eq!(items.len(), 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
