use crate::exception::{ErrorBody, ExceptionFilter, suggest_routes};
use crate::http::{HttpError, Request, Response};
use axum::http::StatusCode;

/// A default exception filter that handles common errors
#[derive(Debug, Default)]
pub struct HttpExceptionFilter {
    production: bool,
}

impl HttpExceptionFilter {
    /// In production the message of server errors is replaced by a generic one.
    pub fn new(production: bool) -> Self {
        Self { production }
    }
}

impl ExceptionFilter for HttpExceptionFilter {
    fn catch(&self, error: &HttpError, request: &Request, response: &Response) {
        tracing::error!(
            "Exception intercepted on {} {}: {}",
            request.method(),
            request.original_url(),
            error
        );
        if response.headers_sent() {
            return;
        }

        let status = if error.status() != StatusCode::INTERNAL_SERVER_ERROR {
            error.status()
        } else if response.status_code() != StatusCode::OK {
            response.status_code()
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let message = if self.production && status.is_server_error() {
            "An internal server error occurred".to_owned()
        } else {
            error.message().to_owned()
        };

        response.status(status).json(&ErrorBody {
            status: status.as_u16(),
            error: error.name().to_owned(),
            message,
            timestamp: timestamp(),
            path: request.original_url().to_owned(),
            suggested_routes: None,
        });
    }
}

pub(crate) fn write_not_found(request: &Request, response: &Response, routes: &[String]) {
    if response.headers_sent() {
        return;
    }
    response.status(StatusCode::NOT_FOUND).json(&ErrorBody {
        status: StatusCode::NOT_FOUND.as_u16(),
        error: "Not Found".to_owned(),
        message: format!("Route not found: {} {}", request.method(), request.original_url()),
        timestamp: timestamp(),
        path: request.original_url().to_owned(),
        suggested_routes: Some(suggest_routes(request.path(), routes)),
    });
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method};
    use serde_json::Value;

    fn request(path: &str) -> Request {
        Request::new(Method::GET, path.parse().unwrap(), HeaderMap::new(), "")
    }

    async fn body(response: &Response) -> Value {
        let bytes = axum::body::to_bytes(response.to_http().into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn errors_render_structured_json() {
        let response = Response::new();
        HttpExceptionFilter::default().catch(&HttpError::internal("boom"), &request("/x?y=1"), &response);

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body(&response).await;
        assert_eq!(body["status"], 500);
        assert_eq!(body["message"], "boom");
        assert_eq!(body["path"], "/x?y=1");
        assert!(body["timestamp"].is_string());
        assert!(body.get("suggestedRoutes").is_none());
    }

    #[tokio::test]
    async fn preset_status_is_kept_for_generic_errors() {
        let response = Response::new();
        response.status(StatusCode::BAD_GATEWAY);
        HttpExceptionFilter::new(true).catch(&HttpError::internal("upstream"), &request("/"), &response);

        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(body(&response).await["message"], "An internal server error occurred");
    }

    #[tokio::test]
    async fn sent_responses_are_left_alone() {
        let response = Response::new();
        response.status(StatusCode::CREATED).send("done");
        HttpExceptionFilter::default().catch(&HttpError::bad_request("late"), &request("/"), &response);
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn not_found_lists_suggestions() {
        let response = Response::new();
        let routes = vec!["/users".to_owned()];
        HttpExceptionFilter::default().not_found(&request("/users/1/x"), &response, &routes);

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        let body = body(&response).await;
        assert_eq!(body["status"], 404);
        assert_eq!(body["suggestedRoutes"], serde_json::json!(["/users"]));
    }
}
