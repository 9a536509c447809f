//! Turns controller classes into live routes.

use crate::decorators::{self, ParamBinding, ParamKind};
use crate::di::{Injectable, Injector};
use crate::error::{RapidError, Result};
use crate::http::{
    Arguments, BoxFuture, HandlerResult, HttpError, HttpMethod, Next, Outcome, Request, RequestHandler,
    Response, Router,
};
use crate::metadata::{MetadataRegistry, TargetKey, keys};
use crate::middleware::MiddlewareManager;
use futures::FutureExt;
use serde_json::{Value, json};
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Result of invoking a controller method.
#[derive(Debug)]
pub enum Invocation {
    /// Returned by a synchronous method.
    Ready(Outcome),
    /// Produced by an `async` method once its future completed.
    Deferred(Outcome),
}

pub type MethodFuture = BoxFuture<Invocation>;

/// A class whose methods handle routes.
///
/// Generated by `#[routes]` on the controller's impl block.
pub trait Controller: Injectable {
    /// Own method names in declaration order.
    fn methods() -> &'static [&'static str];

    /// Calls `method` with positional `args`, or returns `None` for an unknown name.
    fn invoke(self: Arc<Self>, method: &str, args: Arguments) -> Option<MethodFuture>;

    /// Records route and parameter metadata for the methods.
    fn decorate_methods(_registry: &MetadataRegistry) {}
}

pub struct RouterManager {
    registry: Arc<MetadataRegistry>,
    injector: Arc<Injector>,
    router: Router,
    production: bool,
    bound: HashSet<TypeId>,
}

impl RouterManager {
    pub fn new(injector: Arc<Injector>, production: bool) -> Self {
        Self {
            registry: Arc::clone(injector.registry()),
            injector,
            router: Router::new(),
            production,
            bound: HashSet::new(),
        }
    }

    /// Mounts every routed method of `C`, returning how many routes were added.
    ///
    /// Types without controller metadata produce no routes. A controller is
    /// bound at most once; later calls return `Ok(0)`.
    pub fn register_controller<C: Controller>(&mut self, middleware: &MiddlewareManager) -> Result<usize> {
        let target = TargetKey::of::<C>();
        decorators::ensure::<C>(&self.registry);
        if !self.registry.has(keys::CONTROLLER, target, None) {
            tracing::warn!("{} has no controller metadata; no routes registered", target);
            return Ok(0);
        }
        if !self.bound.insert(target.id()) {
            tracing::debug!("Controller already bound: {}", target);
            return Ok(0);
        }

        let controller = Arc::new(self.injector.instantiate::<C>()?);
        let prefix: String = self.registry.get(keys::PREFIX, target, None).unwrap_or_default();
        let class_chain = middleware.get_middleware_handlers(&decorators::middlewares_of(&self.registry, target, None))?;

        let mut registered = 0;
        for &member in C::methods() {
            let Some(method) = self.registry.get::<HttpMethod>(keys::METHOD, target, Some(member)) else {
                continue;
            };
            let path: String = self.registry.get(keys::PATH, target, Some(member)).unwrap_or_default();
            let full_path = format!("{prefix}{path}");

            let method_chain =
                middleware.get_middleware_handlers(&decorators::middlewares_of(&self.registry, target, Some(member)))?;
            let bindings = decorators::param_bindings(&self.registry, target, member);

            let mut handlers = Vec::with_capacity(class_chain.len() + method_chain.len() + 1);
            handlers.extend(class_chain.iter().cloned());
            handlers.extend(method_chain);
            handlers.push(method_handler(Arc::clone(&controller), member, bindings, self.production));

            if let Err(e) = self.router.route(method, &full_path, handlers) {
                tracing::error!("Route rejected on {}::{}: {}", target, member, e);
                return Err(e);
            }
            registered += 1;
            tracing::info!("Route registered: [{}] {}", method, full_path);
        }
        Ok(registered)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }
}

fn method_handler<C: Controller>(
    controller: Arc<C>,
    member: &'static str,
    bindings: Vec<ParamBinding>,
    production: bool,
) -> RequestHandler {
    let bindings: Arc<[ParamBinding]> = bindings.into();
    Arc::new(move |request: Request, response: Response, next: Next| -> BoxFuture<HandlerResult> {
        let controller = Arc::clone(&controller);
        let bindings = Arc::clone(&bindings);
        Box::pin(async move {
            let response_bound = bindings.iter().any(|b| b.kind == ParamKind::Response);
            let args = if bindings.is_empty() {
                Arguments::positional(request, response.clone(), next)
            } else {
                Arguments::bound(&bindings, request, response.clone(), next)
            };
            let future = controller
                .invoke(member, args)
                .ok_or_else(|| HttpError::internal(format!("controller has no method `{member}`")))?;
            let invocation = AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .map_err(|panic| panic_error(&*panic))?;
            settle(invocation, &response, response_bound, production)
        })
    })
}

/// Emits a handler's outcome unless the handler answered on its own.
fn settle(invocation: Invocation, response: &Response, response_bound: bool, production: bool) -> HandlerResult {
    match invocation {
        Invocation::Ready(Outcome::Failed(error)) => Err(error),
        Invocation::Deferred(Outcome::Failed(error)) => {
            tracing::error!("Controller error: {}", error);
            if !response_bound && !response.headers_sent() {
                let status = error.status();
                let message = if production && status.is_server_error() {
                    Value::Null
                } else {
                    Value::String(error.message().to_owned())
                };
                response.status(status).json(&json!({
                    "error": status.canonical_reason().unwrap_or("Error"),
                    "message": message,
                }));
            }
            Err(error)
        }
        Invocation::Ready(Outcome::Body(body)) | Invocation::Deferred(Outcome::Body(body)) => {
            if !response_bound && !response.headers_sent() {
                response.json(&body);
            }
            Ok(())
        }
        Invocation::Ready(Outcome::Empty) | Invocation::Deferred(Outcome::Empty) => Ok(()),
    }
}

pub(crate) fn panic_error(panic: &(dyn Any + Send)) -> HttpError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_owned());
    HttpError::internal(message)
}
