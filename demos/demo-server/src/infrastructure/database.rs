use rapidfast::prelude::*;

const CREATE_USERS: &str = r#"CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    "createdAt" TEXT,
    "updatedAt" TEXT
)"#;

pub fn user_schema() -> Schema {
    Schema::new()
        .field(SchemaField::new("name", FieldType::String).required().min_length(2))
        .field(
            SchemaField::new("email", FieldType::String)
                .required()
                .unique()
                .email()
                .transform(|email| json!(email.as_str().unwrap_or_default().to_lowercase())),
        )
}

/// Opens the configured database (SQLite `database.sqlite` by default) and
/// defines the `User` model on it.
pub async fn connect(app: &Application, config: &ConfigService) -> rapidfast::Result<Arc<Model>> {
    let database = DatabaseConfig::from_config(config)?;
    let orm = app.orm()?;
    let connection = orm.create_connection(database).await?;
    if connection.kind() == DatabaseType::Sqlite {
        connection.execute_unprepared(CREATE_USERS).await?;
    }
    Ok(orm.define_model("User", user_schema(), ModelOptions::new().table_name("users"))?)
}
