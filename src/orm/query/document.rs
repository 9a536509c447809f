//! Filter documents for the document backend.
//!
//! Records expose their primary key as `id`; the store keeps it in `_id`.
//! Ids that parse as an `ObjectId` are stored as one and read back as hex
//! strings.

use crate::orm::query::Translator;
use crate::orm::{OrmError, OrmResult, Row};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Collection;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document, doc};
use serde_json::Value;

const ID: &str = "id";
const DOCUMENT_ID: &str = "_id";

pub struct DocumentTranslator {
    database: mongodb::Database,
}

impl DocumentTranslator {
    pub fn new(database: mongodb::Database) -> Self {
        Self { database }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }

    /// Converts a record (or conditions) to a document, renaming `id` to `_id`.
    pub fn document(data: &Row) -> OrmResult<Document> {
        let mut document = Document::new();
        for (key, value) in data {
            if key == ID {
                document.insert(DOCUMENT_ID, id_to_bson(value)?);
            } else {
                document.insert(key.clone(), to_bson(value)?);
            }
        }
        Ok(document)
    }

    /// A `$set` update over every field but the id.
    pub fn set_update(data: &Row) -> OrmResult<Document> {
        let mut fields = data.clone();
        fields.remove(ID);
        Ok(doc! { "$set": Self::document(&fields)? })
    }

    /// Converts a stored document back to a record.
    pub fn row(document: Document) -> Row {
        document
            .into_iter()
            .map(|(key, value)| {
                let key = if key == DOCUMENT_ID { ID.to_string() } else { key };
                (key, from_bson(value))
            })
            .collect()
    }
}

fn to_bson(value: &Value) -> OrmResult<Bson> {
    Bson::try_from(value.clone()).map_err(|e| OrmError::Bson(e.to_string()))
}

fn id_to_bson(value: &Value) -> OrmResult<Bson> {
    match value.as_str().map(ObjectId::parse_str) {
        Some(Ok(oid)) => Ok(Bson::ObjectId(oid)),
        _ => to_bson(value),
    }
}

fn from_bson(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        other => other.into_relaxed_extjson(),
    }
}

#[async_trait]
impl Translator for DocumentTranslator {
    async fn find(&self, collection: &str, conditions: &Row) -> OrmResult<Vec<Row>> {
        let cursor = self.collection(collection).find(Self::document(conditions)?).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(Self::row).collect())
    }

    async fn find_one(&self, collection: &str, conditions: &Row) -> OrmResult<Option<Row>> {
        let found = self
            .collection(collection)
            .find_one(Self::document(conditions)?)
            .await?;
        Ok(found.map(Self::row))
    }

    async fn insert(&self, collection: &str, data: &Row) -> OrmResult<Value> {
        let result = self.collection(collection).insert_one(Self::document(data)?).await?;
        Ok(from_bson(result.inserted_id))
    }

    async fn update_one(&self, collection: &str, conditions: &Row, data: &Row) -> OrmResult<bool> {
        let result = self
            .collection(collection)
            .update_one(Self::document(conditions)?, Self::set_update(data)?)
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn delete_one(&self, collection: &str, conditions: &Row) -> OrmResult<bool> {
        let result = self
            .collection(collection)
            .delete_one(Self::document(conditions)?)
            .await?;
        Ok(result.deleted_count > 0)
    }
}
