//! # RapidFast
//!
//! A decorator-driven web framework with modules, dependency injection and a
//! lightweight ORM, built on axum and tokio.
//!
//! Classes are annotated with attribute macros that record metadata into a
//! per-application [`MetadataRegistry`]. At bootstrap the [`Application`]
//! walks the module graph, registers providers with the [`Injector`], turns
//! controllers into routes and mounts middlewares in front of them.
//!
//! ## Features
//!
//! - **Modules**: group controllers, providers, middlewares and imports with `#[module]`
//! - **Dependency Injection**: singleton providers resolved from struct fields
//! - **Express-style handlers**: `(req, res, next)` chains with `#[req]`, `#[res]` and `#[next]` bindings
//! - **Middleware**: global, controller-scoped and route-scoped
//! - **ORM**: schema-validated models over MongoDB, MySQL, PostgreSQL and SQLite
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rapidfast::prelude::*;
//!
//! #[derive(Injectable)]
//! pub struct GreetingService;
//!
//! impl GreetingService {
//!     pub fn greet(&self, name: &str) -> String {
//!         format!("Hello, {name}!")
//!     }
//! }
//!
//! #[controller("/greetings")]
//! pub struct GreetingController {
//!     service: Arc<GreetingService>,
//! }
//!
//! #[routes]
//! impl GreetingController {
//!     #[get("/:name")]
//!     async fn greet(&self, #[req] req: Request) -> Value {
//!         json!({ "message": self.service.greet(req.param("name").unwrap_or("world")) })
//!     }
//! }
//!
//! #[module(controllers = [GreetingController], providers = [GreetingService])]
//! pub struct AppModule;
//!
//! #[tokio::main]
//! async fn main() -> rapidfast::Result<()> {
//!     let mut app = Application::from_env()?;
//!     rapidfast::logging::init(app.config());
//!     app.register_module::<AppModule>()?;
//!     app.run().await
//! }
//! ```

extern crate self as rapidfast;

pub mod application;
pub mod config;
pub mod decorators;
pub mod di;
pub mod error;
pub mod exception;
pub mod http;
pub mod logging;
pub mod metadata;
pub mod middleware;
pub mod orm;
pub mod router;

// Re-export core types
pub use application::{Application, ApplicationState, Dispatcher};
pub use config::{AppConfig, ConfigService, Environment};
pub use decorators::{Decorated, Module};
pub use di::{Injectable, Injector};
pub use error::{RapidError, Result};
pub use exception::{ExceptionFilter, HttpExceptionFilter};
pub use http::{HttpError, Next, Request, Response};
pub use metadata::MetadataRegistry;
pub use middleware::Middleware;
pub use router::Controller;

// Re-export macros
pub use rapidfast_macro::{
    Injectable as DeriveInjectable, all, controller, delete, get, middleware, module, next, options,
    patch, post, put, req, res, routes, use_middlewares,
};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use rapidfast::prelude::*;
/// ```
pub mod prelude {
    pub use crate::application::{Application, shutdown_signal};
    pub use crate::config::{AppConfig, ConfigService};
    pub use crate::decorators::{Decorated, MiddlewareClass};
    pub use crate::di::{Injectable, Injector};
    pub use crate::error::{RapidError, Result};
    pub use crate::exception::{ExceptionFilter, HttpExceptionFilter};
    pub use crate::http::{HandlerResult, HttpError, Next, Request, Response};
    pub use crate::middleware::{Cors, Middleware, RequestLogger};
    pub use crate::orm::{
        DatabaseConfig, DatabaseType, FieldType, Model, ModelOptions, Orm, OrmError, Record, Rule,
        Schema, SchemaField,
    };
    pub use crate::{
        DeriveInjectable as Injectable, all, controller, delete, get, middleware, module, next,
        options, patch, post, put, req, res, routes, use_middlewares,
    };
    pub use async_trait::async_trait;
    pub use axum::{Json, http::StatusCode};
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
}
