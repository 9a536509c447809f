use crate::decorators::{self, Decorated};
use crate::di::{Injectable, Injector};
use crate::error::Result;
use crate::http::{HandlerResult, Next, Request, Response};
use crate::metadata::MetadataRegistry;
use crate::middleware::Middleware;
use async_trait::async_trait;
use std::time::Instant;

/// A middleware that logs request timing and status
#[derive(Clone, Default)]
pub struct RequestLogger;

impl Decorated for RequestLogger {
    fn decorate(registry: &MetadataRegistry) {
        decorators::middleware::<Self>(registry);
    }
}

impl Injectable for RequestLogger {
    fn inject(_: &Injector) -> Result<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl Middleware for RequestLogger {
    async fn handle(&self, request: Request, response: Response, next: Next) -> HandlerResult {
        let method = request.method().clone();
        let url = request.original_url().to_owned();
        let start = Instant::now();

        tracing::info!("--> {} {}", method, url);

        let result = next.run(request).await;
        let duration = start.elapsed();
        match &result {
            Ok(()) => tracing::info!(
                "<-- {} {} {} {:?}",
                method,
                url,
                response.status_code().as_u16(),
                duration
            ),
            Err(e) => tracing::warn!("<-- {} {} ERROR: {} {:?}", method, url, e, duration),
        }
        result
    }
}
