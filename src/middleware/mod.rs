//! Middleware classes and their compilation into request handlers.

mod cors;
mod logging;

pub use cors::Cors;
pub use logging::RequestLogger;

use crate::decorators::MiddlewareClass;
use crate::di::{Injectable, Injector};
use crate::error::{RapidError, Result};
use crate::http::{BoxFuture, HandlerResult, Next, Request, RequestHandler, Response};
use crate::metadata::{MetadataRegistry, keys};
use async_trait::async_trait;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;

/// A hook inserted into the request chain.
///
/// Call `next.run(request)` to continue, write to `response` and return
/// `Ok(())` to answer early, or return `Err` to hand the request to the
/// error handlers.
///
/// # Example
/// ```rust,ignore
/// #[middleware]
/// pub struct RequireApiKey;
///
/// #[async_trait]
/// impl Middleware for RequireApiKey {
///     async fn handle(&self, request: Request, response: Response, next: Next) -> HandlerResult {
///         match request.header("x-api-key") {
///             Some(_) => next.run(request).await,
///             None => Err(HttpError::unauthorized("missing api key")),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, request: Request, response: Response, next: Next) -> HandlerResult;
}

/// Compiles middleware classes into handlers, one shared instance per class.
pub struct MiddlewareManager {
    registry: Arc<MetadataRegistry>,
    injector: Arc<Injector>,
    compiled: DashMap<TypeId, RequestHandler>,
    global: Vec<RequestHandler>,
}

impl MiddlewareManager {
    pub fn new(injector: Arc<Injector>) -> Self {
        Self {
            registry: Arc::clone(injector.registry()),
            injector,
            compiled: DashMap::new(),
            global: Vec::new(),
        }
    }

    /// Returns the handler for `class`, building its instance on first use.
    ///
    /// Fails with [`RapidError::InvalidMiddleware`] when the class lacks the
    /// middleware marker.
    pub fn register(&self, class: &MiddlewareClass) -> Result<RequestHandler> {
        let target = class.target();
        if let Some(handler) = self
            .compiled
            .get(&target.id())
            .map(|entry| Arc::clone(entry.value()))
        {
            return Ok(handler);
        }

        class.decorate(&self.registry);
        if !self.registry.has(keys::MIDDLEWARE, target, None) {
            return Err(RapidError::InvalidMiddleware { name: target.name() });
        }

        let handler = class.compile(self)?;
        let handler = Arc::clone(self.compiled.entry(target.id()).or_insert(handler).value());
        tracing::debug!("Middleware compiled: {}", target);
        Ok(handler)
    }

    pub(crate) fn adapt<M: Middleware + Injectable>(&self) -> Result<RequestHandler> {
        Ok(middleware_handler(self.injector.instantiate::<M>()?))
    }

    /// Registers `classes` and mounts them, in order, in front of every request.
    pub fn apply_global_middlewares(&mut self, classes: &[MiddlewareClass]) -> Result<()> {
        for class in classes {
            let handler = self.register(class)?;
            self.global.push(handler);
            tracing::info!("Global middleware registered: {}", class.target());
        }
        Ok(())
    }

    /// Handlers for route-scoped use, not mounted globally.
    pub fn get_middleware_handlers(&self, classes: &[MiddlewareClass]) -> Result<Vec<RequestHandler>> {
        classes.iter().map(|class| self.register(class)).collect()
    }

    pub fn global_handlers(&self) -> &[RequestHandler] {
        &self.global
    }
}

/// Wraps a middleware instance as a request handler.
pub fn middleware_handler<M: Middleware>(middleware: M) -> RequestHandler {
    let instance = Arc::new(middleware);
    Arc::new(
        move |request: Request, response: Response, next: Next| -> BoxFuture<HandlerResult> {
            let instance = Arc::clone(&instance);
            Box::pin(async move { instance.handle(request, response, next).await })
        },
    )
}
