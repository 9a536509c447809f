use crate::orm::{DatabaseType, SchemaError};
use thiserror::Error;

pub type OrmResult<T> = std::result::Result<T, OrmError>;

#[derive(Debug, Error)]
pub enum OrmError {
    #[error("no database connection established")]
    NotConnected,

    #[error("failed to connect to {backend}: {message}")]
    Connect {
        backend: DatabaseType,
        message: String,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("database error: {0}")]
    Relational(#[from] sea_orm::DbErr),

    #[error("document store error: {0}")]
    Document(#[from] mongodb::error::Error),

    #[error("invalid document: {0}")]
    Bson(String),

    #[error("invalid conditions: {0}")]
    InvalidConditions(String),

    #[error("cannot {operation} a {model} record without an id")]
    MissingId {
        model: String,
        operation: &'static str,
    },

    #[error("{model} record `{id}` no longer exists")]
    NotFound { model: String, id: String },

    #[error("{operation} is not supported on {backend}")]
    Unsupported {
        operation: &'static str,
        backend: DatabaseType,
    },

    #[error("connection `{0}` is not registered")]
    UnknownConnection(String),

    #[error("model `{0}` is not defined")]
    UnknownModel(String),

    #[error("invalid database configuration: {0}")]
    Config(String),
}
