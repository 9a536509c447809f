use crate::http::{HttpError, Request, Response};
use serde::Serialize;

pub mod http;

pub use http::HttpExceptionFilter;

/// Structured JSON body of the built-in error responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
    pub message: String,
    pub timestamp: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_routes: Option<Vec<String>>,
}

/// The ExceptionFilter trait
///
/// Filters run last in the chain. They receive every error a handler or
/// middleware returned and every request no route answered.
pub trait ExceptionFilter: Send + Sync + 'static {
    /// Handle an error raised while processing `request`.
    fn catch(&self, error: &HttpError, request: &Request, response: &Response);

    /// Answer a request that matched no route. `routes` are the registered paths.
    fn not_found(&self, request: &Request, response: &Response, routes: &[String]) {
        http::write_not_found(request, response, routes);
    }
}

/// Registered paths ordered by how many leading segments they share with
/// `path`, never empty.
pub fn suggest_routes(path: &str, routes: &[String]) -> Vec<String> {
    const LIMIT: usize = 5;

    let wanted: Vec<&str> = segments(path).collect();
    let mut ranked: Vec<(usize, usize, &String)> = routes
        .iter()
        .enumerate()
        .map(|(order, route)| {
            let shared = segments(route)
                .zip(&wanted)
                .take_while(|(a, b)| a == *b || a.starts_with(':') || a.starts_with('*'))
                .count();
            (shared, order, route)
        })
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut suggestions: Vec<String> = Vec::with_capacity(LIMIT);
    for (_, _, route) in ranked {
        if suggestions.len() == LIMIT {
            break;
        }
        if !suggestions.contains(route) {
            suggestions.push(route.clone());
        }
    }
    if suggestions.is_empty() {
        suggestions.push("/".to_owned());
    }
    suggestions
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn closest_routes_come_first() {
        let registered = routes(&["/", "/health", "/users", "/users/:id", "/users/:id/posts"]);
        let suggestions = suggest_routes("/users/7/comments", &registered);
        assert_eq!(suggestions[..3], ["/users/:id", "/users/:id/posts", "/users"]);
        assert_eq!(suggestions.len(), 5);
    }

    #[test]
    fn duplicates_are_listed_once() {
        let registered = routes(&["/items", "/items", "/other"]);
        assert_eq!(suggest_routes("/items/x", &registered), ["/items", "/other"]);
    }

    #[test]
    fn falls_back_to_root() {
        assert_eq!(suggest_routes("/anything", &[]), ["/"]);
    }
}
