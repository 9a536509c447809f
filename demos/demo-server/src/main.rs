use rapidfast::prelude::*;

mod app_module;
mod infrastructure;
mod modules;

use app_module::AppModule;

#[tokio::main]
async fn main() -> rapidfast::Result<()> {
    let mut app = Application::from_env()?;
    rapidfast::logging::init(app.config());

    tracing::info!("Starting demo server...");

    // Values injected by token must exist before the module graph is registered.
    let config = app.injector().get::<ConfigService>()?;
    let users = infrastructure::database::connect(&app, &config).await?;
    app.injector().provide_value("users", users);
    app.injector()
        .provide_value("api_key", config.get("API_KEY").unwrap_or_else(|| "demo-key".to_string()));

    app.register_module::<AppModule>()?;
    app.run().await
}
