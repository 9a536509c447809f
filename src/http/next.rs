use super::{HttpError, Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Outcome of a handler in the chain. `Err` hands the error to the error handlers.
pub type HandlerResult = Result<(), HttpError>;

/// A type-erased `(req, res, next)` handler.
pub type RequestHandler = Arc<dyn Fn(Request, Response, Next) -> BoxFuture<HandlerResult> + Send + Sync>;

/// Represents the next handler in the chain
pub struct Next {
    run: Box<dyn FnOnce(Request) -> BoxFuture<HandlerResult> + Send>,
}

impl Next {
    /// Create a new Next handler
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Request) -> BoxFuture<HandlerResult> + Send + 'static,
    {
        Self { run: Box::new(f) }
    }

    /// A continuation that does nothing.
    pub fn end() -> Self {
        Self::new(|_| Box::pin(async { Ok(()) }))
    }

    /// Execute the next handler
    pub async fn run(self, request: Request) -> HandlerResult {
        (self.run)(request).await
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Next")
    }
}

/// Wraps an async closure as a [`RequestHandler`].
pub fn handler_fn<F, Fut>(f: F) -> RequestHandler
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |request: Request, response: Response, next: Next| -> BoxFuture<HandlerResult> {
        Box::pin(f(request, response, next))
    })
}

/// Chains `handlers` in order in front of `tail`.
///
/// Each handler receives a `Next` that runs the following handler, and the
/// last one's `Next` runs `tail`.
pub fn compose(handlers: &[RequestHandler], response: &Response, tail: Next) -> Next {
    handlers.iter().rev().fold(tail, |next, handler| {
        let handler = Arc::clone(handler);
        let response = response.clone();
        Next::new(move |request| handler(request, response, next))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method};
    use std::sync::Mutex;

    fn request() -> Request {
        Request::new(Method::GET, "/".parse().unwrap(), HeaderMap::new(), "")
    }

    fn recording(trace: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> RequestHandler {
        let trace = Arc::clone(trace);
        handler_fn(move |req, _res, next| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().unwrap().push(label);
                next.run(req).await
            }
        })
    }

    #[tokio::test]
    async fn compose_runs_handlers_in_order_then_tail() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let handlers = vec![recording(&trace, "a"), recording(&trace, "b")];
        let tail_trace = Arc::clone(&trace);
        let tail = Next::new(move |_| {
            Box::pin(async move {
                tail_trace.lock().unwrap().push("tail");
                Ok(())
            })
        });

        compose(&handlers, &Response::new(), tail)
            .run(request())
            .await
            .unwrap();

        assert_eq!(*trace.lock().unwrap(), vec!["a", "b", "tail"]);
    }

    #[tokio::test]
    async fn a_handler_that_does_not_call_next_stops_the_chain() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let stop = handler_fn(|_req, res, _next| async move {
            res.send("stopped");
            Ok(())
        });
        let handlers = vec![stop, recording(&trace, "unreachable")];

        let response = Response::new();
        compose(&handlers, &response, Next::end())
            .run(request())
            .await
            .unwrap();

        assert!(trace.lock().unwrap().is_empty());
        assert!(response.headers_sent());
    }

    #[tokio::test]
    async fn errors_propagate_to_the_caller() {
        let failing = handler_fn(|_req, _res, _next| async { Err(HttpError::forbidden("nope")) });
        let result = compose(&[failing], &Response::new(), Next::end())
            .run(request())
            .await;
        assert_eq!(result.unwrap_err().message(), "nope");
    }
}
