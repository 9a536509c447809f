use rapidfast::orm::{CREATED_AT, UPDATED_AT};
use rapidfast::prelude::*;
use std::time::Duration;

const CREATE_POSTS: &str = r#"CREATE TABLE posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    views INTEGER,
    published INTEGER,
    "createdAt" TEXT,
    "updatedAt" TEXT
)"#;

fn post_schema() -> Schema {
    Schema::new()
        .field(SchemaField::new("title", FieldType::String).required())
        .field(SchemaField::new("views", FieldType::Number).default(0))
        .field(SchemaField::new("published", FieldType::Boolean).default(false))
}

async fn setup(app: &Application) -> Arc<Model> {
    let orm = app.orm().unwrap();
    let connection = orm.create_connection(DatabaseConfig::sqlite(":memory:")).await.unwrap();
    connection.execute_unprepared(CREATE_POSTS).await.unwrap();
    orm.define_model("Post", post_schema(), ModelOptions::new().table_name("posts"))
        .unwrap()
}

#[tokio::test]
async fn model_lifecycle_on_sqlite() {
    let app = Application::new(AppConfig::default());
    let posts = setup(&app).await;

    let mut post = posts
        .create(json!({ "title": "Hello", "views": 3, "draft": true }))
        .await
        .unwrap();
    assert!(post.id().is_some());
    let created_at = post.created_at().unwrap().to_owned();
    assert_eq!(post.get("views"), Some(&json!(3)));

    tokio::time::sleep(Duration::from_millis(5)).await;
    post.set("title", "Hello again");
    post.save().await.unwrap();
    assert_eq!(post.created_at(), Some(created_at.as_str()));
    assert_ne!(post.updated_at(), Some(created_at.as_str()));

    let stored = posts.find_by_id(post.id().cloned().unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.get("title"), Some(&json!("Hello again")));
    assert_eq!(stored.get("published"), Some(&json!(false)));
    assert_eq!(stored.created_at(), Some(created_at.as_str()));

    let json = stored.to_json();
    assert!(json.get("draft").is_none());
    assert!(json[CREATED_AT].is_string());
    assert!(json[UPDATED_AT].is_string());

    assert!(stored.delete().await.unwrap());
    assert!(posts.find(json!({})).await.unwrap().is_empty());
}

#[tokio::test]
async fn orm_is_shared_through_the_injector_and_closed_on_stop() {
    let mut app = Application::new(AppConfig::default());
    let posts = setup(&app).await;
    let orm = app.injector().get::<Orm>().unwrap();
    assert!(Arc::ptr_eq(&orm, &app.orm().unwrap()));
    assert!(orm.model("Post").is_ok());

    app.start(0).await.unwrap();
    app.stop().await.unwrap();
    assert!(!posts.connection().is_connected());
}
