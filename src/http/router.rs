//! Path router with first-match semantics.
//!
//! Route paths use `:name` parameters and `*` wildcards. Entries are tried in
//! registration order across all patterns; a request runs the first entry
//! whose verb and pattern match, and that entry's `next` falls through to the
//! following matches before leaving the router.
//!
//! Patterns are grouped by shape, with parameters numbered by position, so
//! `/items/:id` and `/items/:slug` share one matcher and each entry renames
//! the captures to its own parameter names.

use super::{BoxFuture, HandlerResult, HttpMethod, Next, Request, RequestHandler, Response, compose};
use crate::error::{RapidError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A registered `(method, path, handlers)` entry.
#[derive(Clone)]
pub struct RouteEntry {
    method: HttpMethod,
    path: String,
    shape: usize,
    names: Arc<[String]>,
    handlers: Arc<[RequestHandler]>,
}

impl RouteEntry {
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parameter names in path order.
    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    /// Number of handlers in the chain, route middleware included.
    pub fn chain_len(&self) -> usize {
        self.handlers.len()
    }
}

/// One path shape and its single-route matcher.
#[derive(Clone)]
struct Shape {
    matcher: Arc<matchit::Router<()>>,
    arity: usize,
}

impl Shape {
    fn new(pattern: String, arity: usize) -> std::result::Result<Self, matchit::InsertError> {
        let mut matcher = matchit::Router::new();
        matcher.insert(pattern, ())?;
        Ok(Self {
            matcher: Arc::new(matcher),
            arity,
        })
    }

    /// Positional captures for `path`, retrying without a trailing slash.
    fn capture(&self, path: &str) -> Option<Vec<String>> {
        let matched = self.matcher.at(path).ok().or_else(|| {
            let trimmed = path.strip_suffix('/').filter(|p| !p.is_empty())?;
            self.matcher.at(trimmed).ok()
        })?;
        let values = (0..self.arity)
            .map(|position| {
                let value = matched.params.get(positional(position)).unwrap_or_default();
                urlencoding::decode(value)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| value.to_owned())
            })
            .collect();
        Some(values)
    }
}

#[derive(Clone, Default)]
pub struct Router {
    shapes: Vec<Shape>,
    by_pattern: HashMap<String, usize>,
    entries: Vec<RouteEntry>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, path: &str, handlers: Vec<RequestHandler>) -> Result<()> {
        self.route(HttpMethod::Get, path, handlers)
    }

    pub fn post(&mut self, path: &str, handlers: Vec<RequestHandler>) -> Result<()> {
        self.route(HttpMethod::Post, path, handlers)
    }

    pub fn put(&mut self, path: &str, handlers: Vec<RequestHandler>) -> Result<()> {
        self.route(HttpMethod::Put, path, handlers)
    }

    pub fn delete(&mut self, path: &str, handlers: Vec<RequestHandler>) -> Result<()> {
        self.route(HttpMethod::Delete, path, handlers)
    }

    pub fn patch(&mut self, path: &str, handlers: Vec<RequestHandler>) -> Result<()> {
        self.route(HttpMethod::Patch, path, handlers)
    }

    pub fn options(&mut self, path: &str, handlers: Vec<RequestHandler>) -> Result<()> {
        self.route(HttpMethod::Options, path, handlers)
    }

    pub fn all(&mut self, path: &str, handlers: Vec<RequestHandler>) -> Result<()> {
        self.route(HttpMethod::All, path, handlers)
    }

    /// Registers `handlers` as one chain for `method` on `path`.
    ///
    /// Fails when the path cannot be compiled, for example a `*` wildcard
    /// that is not the last segment.
    pub fn route(&mut self, method: HttpMethod, path: &str, handlers: Vec<RequestHandler>) -> Result<()> {
        let (pattern, names) = translate(path);
        let shape = match self.by_pattern.get(&pattern) {
            Some(&shape) => shape,
            None => {
                let compiled = Shape::new(pattern.clone(), names.len()).map_err(|e| RapidError::RouteConflict {
                    method: method.to_string(),
                    path: path.to_string(),
                    reason: e.to_string(),
                })?;
                self.shapes.push(compiled);
                self.by_pattern.insert(pattern, self.shapes.len() - 1);
                self.shapes.len() - 1
            }
        };
        self.entries.push(RouteEntry {
            method,
            path: path.to_owned(),
            shape,
            names: names.into(),
            handlers: handlers.into(),
        });
        Ok(())
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &RouteEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the matching route chains, or `next` when nothing matches.
    pub async fn dispatch(self: Arc<Self>, request: Request, response: Response, next: Next) -> HandlerResult {
        let mut captures: Vec<Option<Option<Vec<String>>>> = vec![None; self.shapes.len()];
        let mut matched = Vec::new();
        for entry in self.entries.iter().filter(|entry| entry.method.matches(request.method())) {
            let values = captures[entry.shape].get_or_insert_with(|| self.shapes[entry.shape].capture(request.path()));
            if let Some(values) = values {
                let params: HashMap<String, String> = entry.names.iter().cloned().zip(values.iter().cloned()).collect();
                matched.push((Arc::clone(&entry.handlers), params));
            }
        }
        if matched.is_empty() {
            return next.run(request).await;
        }

        let original = request.params().clone();
        let tail = Next::new(move |mut request: Request| {
            request.set_params(original);
            Box::pin(next.run(request))
        });
        let chain = matched.into_iter().rev().fold(tail, |tail, (handlers, params)| {
            let chain = compose(&handlers, &response, tail);
            Next::new(move |mut request: Request| {
                request.set_params(params);
                Box::pin(chain.run(request))
            })
        });
        chain.run(request).await
    }

    pub fn into_handler(self) -> RequestHandler {
        let router = Arc::new(self);
        Arc::new(move |request: Request, response: Response, next: Next| -> BoxFuture<HandlerResult> {
            Box::pin(Arc::clone(&router).dispatch(request, response, next))
        })
    }
}

fn positional(position: usize) -> String {
    format!("p{position}")
}

/// `/users/:id/*` becomes `/users/{p0}/{*p1}` with names `["id", "wildcard"]`.
fn translate(path: &str) -> (String, Vec<String>) {
    if path.is_empty() {
        return ("/".to_string(), Vec::new());
    }
    let mut names = Vec::new();
    let pattern = path
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                let slot = format!("{{{}}}", positional(names.len()));
                names.push(name.to_owned());
                slot
            } else if segment == "*" {
                let slot = format!("{{*{}}}", positional(names.len()));
                names.push("wildcard".to_owned());
                slot
            } else {
                segment.replace('{', "{{").replace('}', "}}")
            }
        })
        .collect::<Vec<_>>()
        .join("/");
    (pattern, names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpError, handler_fn};
    use axum::http::{HeaderMap, Method};
    use std::sync::Mutex;

    fn request(method: Method, path: &str) -> Request {
        Request::new(method, path.parse().unwrap(), HeaderMap::new(), "")
    }

    fn reply(label: &'static str) -> RequestHandler {
        handler_fn(move |req, res, _next| async move {
            let id = req.param("id").unwrap_or("-").to_string();
            res.send(format!("{label}:{id}"));
            Ok(())
        })
    }

    async fn run(router: &Arc<Router>, method: Method, path: &str) -> (Response, bool) {
        let reached_tail = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&reached_tail);
        let tail = Next::new(move |_| {
            Box::pin(async move {
                *flag.lock().unwrap() = true;
                Ok(())
            })
        });
        let response = Response::new();
        Arc::clone(router)
            .dispatch(request(method, path), response.clone(), tail)
            .await
            .unwrap();
        let reached = *reached_tail.lock().unwrap();
        (response, reached)
    }

    fn body(response: &Response) -> String {
        let http = response.to_http();
        let bytes = futures::executor::block_on(axum::body::to_bytes(http.into_body(), usize::MAX)).unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn translates_express_paths() {
        assert_eq!(translate("/users/:id"), ("/users/{p0}".to_string(), vec!["id".to_string()]));
        assert_eq!(
            translate("/files/:dir/*"),
            ("/files/{p0}/{*p1}".to_string(), vec!["dir".to_string(), "wildcard".to_string()])
        );
        assert_eq!(translate(""), ("/".to_string(), Vec::new()));
        assert_eq!(translate("/a/{b}").0, "/a/{{b}}");
    }

    #[tokio::test]
    async fn matches_verb_and_extracts_params() {
        let mut router = Router::new();
        router.get("/users/:id", vec![reply("get")]).unwrap();
        router.delete("/users/:id", vec![reply("delete")]).unwrap();
        let router = Arc::new(router);

        let (res, tail) = run(&router, Method::GET, "/users/42").await;
        assert!(!tail);
        assert_eq!(body(&res), "get:42");

        let (res, _) = run(&router, Method::DELETE, "/users/a%20b").await;
        assert_eq!(body(&res), "delete:a b");

        let (res, tail) = run(&router, Method::POST, "/users/42").await;
        assert!(tail);
        assert!(!res.headers_sent());
    }

    #[tokio::test]
    async fn first_registered_wins_and_next_falls_through() {
        let mut router = Router::new();
        let pass = handler_fn(|req, _res, next| async move { next.run(req).await });
        router.get("/items", vec![pass]).unwrap();
        router.get("/items", vec![reply("second")]).unwrap();
        router.get("/items", vec![reply("third")]).unwrap();
        let router = Arc::new(router);

        let (res, tail) = run(&router, Method::GET, "/items").await;
        assert!(!tail);
        assert_eq!(body(&res), "second:-");
        assert_eq!(router.len(), 3);
    }

    #[tokio::test]
    async fn static_route_on_another_verb_does_not_hide_a_param_route() {
        let mut router = Router::new();
        router.get("/users/:id", vec![reply("get")]).unwrap();
        router.post("/users/boom", vec![reply("boom")]).unwrap();
        let router = Arc::new(router);

        let (res, tail) = run(&router, Method::GET, "/users/boom").await;
        assert!(!tail);
        assert_eq!(body(&res), "get:boom");

        let (res, _) = run(&router, Method::POST, "/users/boom").await;
        assert_eq!(body(&res), "boom:-");
    }

    #[tokio::test]
    async fn earlier_param_route_beats_later_static_route() {
        let mut router = Router::new();
        router.get("/users/:id", vec![reply("param")]).unwrap();
        router.get("/users/me", vec![reply("static")]).unwrap();
        let router = Arc::new(router);

        let (res, _) = run(&router, Method::GET, "/users/me").await;
        assert_eq!(body(&res), "param:me");
    }

    #[tokio::test]
    async fn fall_through_crosses_patterns_and_renames_params() {
        let mut router = Router::new();
        let pass = handler_fn(|req, _res, next| async move { next.run(req).await });
        router.get("/files/:name", vec![pass]).unwrap();
        router.get("/files/:id", vec![reply("second")]).unwrap();
        let router = Arc::new(router);

        let (res, _) = run(&router, Method::GET, "/files/7").await;
        assert_eq!(body(&res), "second:7");
    }

    #[tokio::test]
    async fn same_shape_with_other_param_names_coexists() {
        let slug = handler_fn(|req, res, _next| async move {
            res.send(format!("slug:{}", req.param("slug").unwrap_or("-")));
            Ok(())
        });
        let mut router = Router::new();
        router.get("/items/:id", vec![reply("get")]).unwrap();
        router.post("/items/:slug", vec![slug]).unwrap();
        let router = Arc::new(router);

        let (res, _) = run(&router, Method::GET, "/items/3").await;
        assert_eq!(body(&res), "get:3");
        let (res, _) = run(&router, Method::POST, "/items/red-shoe").await;
        assert_eq!(body(&res), "slug:red-shoe");
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn get_routes_answer_head_and_trailing_slash() {
        let mut router = Router::new();
        router.get("/health", vec![reply("ok")]).unwrap();
        let router = Arc::new(router);

        let (res, _) = run(&router, Method::HEAD, "/health").await;
        assert!(res.headers_sent());
        let (res, _) = run(&router, Method::GET, "/health/").await;
        assert!(res.headers_sent());
    }

    #[tokio::test]
    async fn handler_errors_are_returned() {
        let mut router = Router::new();
        let failing = handler_fn(|_req, _res, _next| async { Err(HttpError::internal("boom")) });
        router.all("/fail", vec![failing]).unwrap();
        let router = Arc::new(router);

        let result = Arc::clone(&router)
            .dispatch(request(Method::PUT, "/fail"), Response::new(), Next::end())
            .await;
        assert_eq!(result.unwrap_err().message(), "boom");
    }

    #[test]
    fn wildcards_must_end_the_path() {
        let mut router = Router::new();
        let err = router.get("/files/*/meta", vec![reply("a")]).unwrap_err();
        assert!(matches!(err, RapidError::RouteConflict { .. }));
        assert!(router.is_empty());
    }

    #[tokio::test]
    async fn clones_keep_routes() {
        let mut router = Router::new();
        router.get("/users/:id", vec![reply("get")]).unwrap();
        let copy = Arc::new(router.clone());

        let (res, _) = run(&copy, Method::GET, "/users/7").await;
        assert_eq!(body(&res), "get:7");
        let paths: Vec<_> = copy.routes().map(|r| r.path().to_string()).collect();
        assert_eq!(paths, vec!["/users/:id"]);
    }
}
