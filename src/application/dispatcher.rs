use crate::exception::ExceptionFilter;
use crate::http::{BoxFuture, HttpError, Next, Request, RequestHandler, Response, compose};
use crate::router::panic_error;
use axum::body::Bytes;
use axum::http::StatusCode;
use futures::FutureExt;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};

struct Inner {
    global: Vec<RequestHandler>,
    router: RequestHandler,
    routes: Vec<String>,
    filter: Arc<dyn ExceptionFilter>,
    body_limit: usize,
}

/// The application's request pipeline: global middlewares, then the routes,
/// then the 404 handler, with errors handed to the exception filter.
///
/// Implements [`tower::Service`], so it can be mounted on an axum router or
/// called directly in tests.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub(crate) fn new(
        global: Vec<RequestHandler>,
        router: RequestHandler,
        routes: Vec<String>,
        filter: Arc<dyn ExceptionFilter>,
        body_limit: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                global,
                router,
                routes,
                filter,
                body_limit,
            }),
        }
    }

    pub async fn dispatch(&self, request: axum::extract::Request) -> axum::response::Response {
        let (parts, body) = request.into_parts();
        let response = Response::new();

        let body = match axum::body::to_bytes(body, self.inner.body_limit).await {
            Ok(body) => body,
            Err(e) => {
                let request = Request::from_parts(parts, Bytes::new());
                let error = HttpError::new(StatusCode::PAYLOAD_TOO_LARGE, e.to_string());
                self.inner.filter.catch(&error, &request, &response);
                return response.to_http();
            }
        };
        let request = Request::from_parts(parts, body);
        let original = request.clone();

        let inner = Arc::clone(&self.inner);
        let fallback = response.clone();
        let not_found = Next::new(move |request| -> BoxFuture<_> {
            Box::pin(async move {
                inner.filter.not_found(&request, &fallback, &inner.routes);
                Ok(())
            })
        });

        let mut chain = self.inner.global.clone();
        chain.push(Arc::clone(&self.inner.router));
        let result = AssertUnwindSafe(compose(&chain, &response, not_found).run(request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panic_error(&*panic)));

        if let Err(error) = result {
            self.inner.filter.catch(&error, &original, &response);
        }
        response.to_http()
    }

    /// Distinct registered paths, in registration order.
    pub fn routes(&self) -> &[String] {
        &self.inner.routes
    }
}

impl tower::Service<axum::extract::Request> for Dispatcher {
    type Response = axum::response::Response;
    type Error = Infallible;
    type Future = BoxFuture<Result<Self::Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: axum::extract::Request) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { Ok(dispatcher.dispatch(request).await) })
    }
}
