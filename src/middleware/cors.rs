use crate::decorators::{self, Decorated};
use crate::di::{Injectable, Injector};
use crate::error::Result;
use crate::http::{HandlerResult, Next, Request, Response};
use crate::metadata::MetadataRegistry;
use crate::middleware::Middleware;
use async_trait::async_trait;
use axum::http::{Method, StatusCode};

/// Adds the `Access-Control-Allow-*` headers to every response and answers
/// `OPTIONS` preflights with an empty 200.
///
/// Mounted ahead of the global middlewares when `AppConfig::cors` is set.
#[derive(Debug, Clone)]
pub struct Cors {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
}

impl Default for Cors {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, OPTIONS".to_string(),
            allow_headers: "Origin, X-Requested-With, Content-Type, Accept, Authorization".to_string(),
        }
    }
}

impl Cors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    pub fn allow_methods(mut self, methods: impl Into<String>) -> Self {
        self.allow_methods = methods.into();
        self
    }

    pub fn allow_headers(mut self, headers: impl Into<String>) -> Self {
        self.allow_headers = headers.into();
        self
    }
}

impl Decorated for Cors {
    fn decorate(registry: &MetadataRegistry) {
        decorators::middleware::<Self>(registry);
    }
}

impl Injectable for Cors {
    fn inject(_: &Injector) -> Result<Self> {
        Ok(Self::default())
    }
}

#[async_trait]
impl Middleware for Cors {
    async fn handle(&self, request: Request, response: Response, next: Next) -> HandlerResult {
        response
            .header("access-control-allow-origin", &self.allow_origin)
            .header("access-control-allow-methods", &self.allow_methods)
            .header("access-control-allow-headers", &self.allow_headers);
        if *request.method() == Method::OPTIONS {
            response.status(StatusCode::OK).end();
            return Ok(());
        }
        next.run(request).await
    }
}
