//! Parameterized SQL for the relational backends.

use crate::orm::{ColumnTypes, FieldType, OrmError, OrmResult, Row};
use crate::orm::query::Translator;
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, FromQueryResult, JsonValue, Statement};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

const ID: &str = "id";

/// SQL flavour of a relational backend.
pub trait Dialect: Send + Sync + 'static {
    const BACKEND: DbBackend;
    /// `UPDATE`/`DELETE` accept `LIMIT`.
    const LIMITED_WRITES: bool;
    /// `INSERT` reports the new id through `RETURNING`.
    const RETURNING: bool;

    /// Placeholder for the `index`th bound value, counting from 1.
    fn placeholder(index: usize) -> String;

    fn quote(ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn empty_insert(table: &str) -> String {
        format!("INSERT INTO {} DEFAULT VALUES", Self::quote(table))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl Dialect for MySql {
    const BACKEND: DbBackend = DbBackend::MySql;
    const LIMITED_WRITES: bool = true;
    const RETURNING: bool = false;

    fn placeholder(_: usize) -> String {
        "?".to_string()
    }

    fn quote(ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn empty_insert(table: &str) -> String {
        format!("INSERT INTO {} () VALUES ()", Self::quote(table))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl Dialect for Postgres {
    const BACKEND: DbBackend = DbBackend::Postgres;
    const LIMITED_WRITES: bool = false;
    const RETURNING: bool = true;

    fn placeholder(index: usize) -> String {
        format!("${index}")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl Dialect for Sqlite {
    const BACKEND: DbBackend = DbBackend::Sqlite;
    const LIMITED_WRITES: bool = false;
    const RETURNING: bool = false;

    fn placeholder(_: usize) -> String {
        "?".to_string()
    }
}

/// SQL text plus its bound values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub values: Vec<sea_orm::Value>,
}

impl SqlStatement {
    fn into_statement(self, backend: DbBackend) -> Statement {
        Statement::from_sql_and_values(backend, self.sql, self.values)
    }
}

struct Builder<'a, D> {
    types: &'a ColumnTypes,
    values: Vec<sea_orm::Value>,
    dialect: PhantomData<fn() -> D>,
}

impl<'a, D: Dialect> Builder<'a, D> {
    fn new(types: &'a ColumnTypes) -> Self {
        Self {
            types,
            values: Vec::new(),
            dialect: PhantomData,
        }
    }

    /// Undeclared `id` columns are taken to be integers.
    fn column_type(&self, column: &str) -> Option<FieldType> {
        match self.types.get(column) {
            Some(&kind) => Some(kind),
            None if column == ID => Some(FieldType::Number),
            None => None,
        }
    }

    fn bind(&mut self, column: &str, value: &Value) -> String {
        self.values.push(typed_sql_value(value, self.column_type(column)));
        D::placeholder(self.values.len())
    }

    /// `" WHERE a = ? AND b IS NULL"`, or nothing without conditions.
    fn filter(&mut self, conditions: &Row) -> OrmResult<String> {
        let mut clauses = Vec::with_capacity(conditions.len());
        for (column, value) in conditions {
            let column_sql = D::quote(column);
            let clause = match value {
                Value::Null => format!("{column_sql} IS NULL"),
                Value::Array(items) if items.is_empty() => "1 = 0".to_string(),
                Value::Array(items) => {
                    let placeholders: Vec<String> = items.iter().map(|item| self.bind(column, item)).collect();
                    format!("{column_sql} IN ({})", placeholders.join(", "))
                }
                Value::Object(_) => {
                    return Err(OrmError::InvalidConditions(format!(
                        "operator objects are not supported for `{column}`"
                    )));
                }
                scalar => format!("{column_sql} = {}", self.bind(column, scalar)),
            };
            clauses.push(clause);
        }
        if clauses.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" WHERE {}", clauses.join(" AND ")))
        }
    }

    /// Restricts an `UPDATE`/`DELETE` to the first matching row.
    fn single_row(&mut self, table: &str, conditions: &Row) -> OrmResult<String> {
        let filter = self.filter(conditions)?;
        if D::LIMITED_WRITES {
            Ok(format!("{filter} LIMIT 1"))
        } else {
            let id = D::quote(ID);
            Ok(format!(
                " WHERE {id} IN (SELECT {id} FROM {}{filter} LIMIT 1)",
                D::quote(table)
            ))
        }
    }

    fn finish(self, sql: String) -> SqlStatement {
        SqlStatement {
            sql,
            values: self.values,
        }
    }
}

/// Converts `value` for a column of type `kind`.
///
/// Nulls carry the column's SQL type, and numeric or boolean text bound to a
/// number or boolean column is converted, so strict backends accept route
/// parameters such as `"7"`.
fn typed_sql_value(value: &Value, kind: Option<FieldType>) -> sea_orm::Value {
    match (value, kind) {
        (Value::Null, Some(FieldType::Number)) => sea_orm::Value::BigInt(None),
        (Value::Null, Some(FieldType::Boolean)) => sea_orm::Value::Bool(None),
        (Value::String(text), Some(FieldType::Number)) => {
            let text = text.trim();
            if let Ok(i) = text.parse::<i64>() {
                sea_orm::Value::from(i)
            } else if let Ok(f) = text.parse::<f64>() {
                sea_orm::Value::from(f)
            } else {
                to_sql_value(value)
            }
        }
        (Value::String(text), Some(FieldType::Boolean)) if text.eq_ignore_ascii_case("true") => {
            sea_orm::Value::from(true)
        }
        (Value::String(text), Some(FieldType::Boolean)) if text.eq_ignore_ascii_case("false") => {
            sea_orm::Value::from(false)
        }
        _ => to_sql_value(value),
    }
}

fn to_sql_value(value: &Value) -> sea_orm::Value {
    match value {
        Value::Null => sea_orm::Value::String(None),
        Value::Bool(b) => sea_orm::Value::from(*b),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => sea_orm::Value::from(i),
            (None, Some(u)) => sea_orm::Value::from(u),
            _ => sea_orm::Value::from(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => sea_orm::Value::from(s.clone()),
        Value::Array(_) | Value::Object(_) => sea_orm::Value::from(value.to_string()),
    }
}

/// Translator for one SQL dialect over a sea-orm connection.
pub struct SqlTranslator<D> {
    db: DatabaseConnection,
    types: Arc<ColumnTypes>,
    dialect: PhantomData<fn() -> D>,
}

impl<D: Dialect> SqlTranslator<D> {
    pub fn new(db: DatabaseConnection, types: Arc<ColumnTypes>) -> Self {
        Self {
            db,
            types,
            dialect: PhantomData,
        }
    }

    pub fn select(types: &ColumnTypes, table: &str, conditions: &Row, limit: Option<u64>) -> OrmResult<SqlStatement> {
        let mut builder = Builder::<D>::new(types);
        let mut sql = format!("SELECT * FROM {}{}", D::quote(table), builder.filter(conditions)?);
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(builder.finish(sql))
    }

    pub fn insert_statement(types: &ColumnTypes, table: &str, data: &Row) -> OrmResult<SqlStatement> {
        let mut builder = Builder::<D>::new(types);
        let mut sql = if data.is_empty() {
            D::empty_insert(table)
        } else {
            let columns: Vec<String> = data.keys().map(|column| D::quote(column)).collect();
            let placeholders: Vec<String> = data.iter().map(|(column, value)| builder.bind(column, value)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                D::quote(table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        if D::RETURNING {
            sql.push_str(&format!(" RETURNING {}", D::quote(ID)));
        }
        Ok(builder.finish(sql))
    }

    pub fn update_statement(
        types: &ColumnTypes,
        table: &str,
        conditions: &Row,
        data: &Row,
    ) -> OrmResult<SqlStatement> {
        if data.is_empty() {
            return Err(OrmError::InvalidConditions(
                "an update needs at least one field".to_string(),
            ));
        }
        let mut builder = Builder::<D>::new(types);
        let assignments: Vec<String> = data
            .iter()
            .map(|(column, value)| format!("{} = {}", D::quote(column), builder.bind(column, value)))
            .collect();
        let filter = builder.single_row(table, conditions)?;
        let sql = format!("UPDATE {} SET {}{filter}", D::quote(table), assignments.join(", "));
        Ok(builder.finish(sql))
    }

    pub fn delete_statement(types: &ColumnTypes, table: &str, conditions: &Row) -> OrmResult<SqlStatement> {
        let mut builder = Builder::<D>::new(types);
        let filter = builder.single_row(table, conditions)?;
        let sql = format!("DELETE FROM {}{filter}", D::quote(table));
        Ok(builder.finish(sql))
    }

    async fn fetch(&self, statement: SqlStatement) -> OrmResult<Vec<Row>> {
        tracing::debug!("SQL: {}", statement.sql);
        let rows = JsonValue::find_by_statement(statement.into_statement(D::BACKEND))
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    async fn execute(&self, statement: SqlStatement) -> OrmResult<sea_orm::ExecResult> {
        tracing::debug!("SQL: {}", statement.sql);
        Ok(self.db.execute(statement.into_statement(D::BACKEND)).await?)
    }
}

#[async_trait]
impl<D: Dialect> Translator for SqlTranslator<D> {
    async fn find(&self, table: &str, conditions: &Row) -> OrmResult<Vec<Row>> {
        self.fetch(Self::select(&self.types, table, conditions, None)?).await
    }

    async fn find_one(&self, table: &str, conditions: &Row) -> OrmResult<Option<Row>> {
        let rows = self.fetch(Self::select(&self.types, table, conditions, Some(1))?).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, table: &str, data: &Row) -> OrmResult<Value> {
        let statement = Self::insert_statement(&self.types, table, data)?;
        let provided = data.get(ID).filter(|id| !id.is_null()).cloned();
        if D::RETURNING {
            let returned = self
                .fetch(statement)
                .await?
                .into_iter()
                .next()
                .and_then(|mut row| row.remove(ID));
            return Ok(provided.or(returned).unwrap_or(Value::Null));
        }
        let result = self.execute(statement).await?;
        Ok(provided.unwrap_or_else(|| Value::from(result.last_insert_id())))
    }

    async fn update_one(&self, table: &str, conditions: &Row, data: &Row) -> OrmResult<bool> {
        let result = self.execute(Self::update_statement(&self.types, table, conditions, data)?).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_one(&self, table: &str, conditions: &Row) -> OrmResult<bool> {
        let result = self.execute(Self::delete_statement(&self.types, table, conditions)?).await?;
        Ok(result.rows_affected() > 0)
    }
}
