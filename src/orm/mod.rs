//! A small ORM over MongoDB, MySQL, PostgreSQL and SQLite.
//!
//! Relational backends go through sea-orm's sqlx drivers, the document
//! backend through the `mongodb` driver. Records are JSON objects shaped by a
//! [`Schema`].
//!
//! ```rust,ignore
//! let orm = Orm::new();
//! orm.create_connection(DatabaseConfig::sqlite("app.db")).await?;
//! let users = orm.define_model(
//!     "User",
//!     Schema::new().field(SchemaField::new("name", FieldType::String).required()),
//!     ModelOptions::default(),
//! )?;
//! let ada = users.create(json!({ "name": "Ada" })).await?;
//! ```

mod config;
mod connection;
mod error;
mod model;
pub mod query;
mod registry;
mod rules;
mod schema;

pub use config::{DatabaseConfig, DatabaseType};
pub use connection::{Client, Connection, ConnectionEvent, ConnectionState};
pub use error::{OrmError, OrmResult};
pub use model::{CREATED_AT, ID, Model, ModelOptions, Record, UPDATED_AT};
pub use query::Query;
pub use registry::Orm;
pub use regex::Regex;
pub use rules::Rule;
pub use schema::{ColumnTypes, FieldDefault, FieldErrors, FieldType, Row, Schema, SchemaError, SchemaField};
