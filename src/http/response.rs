//! Outgoing response handle shared along a handler chain.

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    headers_sent: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            headers_sent: false,
        }
    }
}

/// A response under construction.
///
/// Every middleware and the route handler of one request hold clones of the
/// same handle. Once a body is written with [`json`](Self::json),
/// [`send`](Self::send) or [`end`](Self::end) the response counts as sent and
/// further writes are ignored.
#[derive(Clone, Debug, Default)]
pub struct Response {
    state: Arc<Mutex<ResponseState>>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ResponseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self, status: StatusCode) -> &Self {
        let mut state = self.state();
        if state.headers_sent {
            tracing::warn!("Cannot set status {} after the response was sent", status);
        } else {
            state.status = status;
        }
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.state().status
    }

    pub fn header(&self, name: &str, value: &str) -> &Self {
        let parsed = HeaderName::try_from(name)
            .ok()
            .zip(HeaderValue::from_str(value).ok());
        let Some((name, value)) = parsed else {
            tracing::warn!("Ignoring invalid response header {}", name);
            return self;
        };
        let mut state = self.state();
        if state.headers_sent {
            tracing::warn!("Cannot set header {} after the response was sent", name);
        } else {
            state.headers.insert(name, value);
        }
        self
    }

    pub fn get_header(&self, name: &str) -> Option<String> {
        self.state()
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    }

    /// Serializes `body` as JSON and marks the response sent.
    pub fn json<T: Serialize + ?Sized>(&self, body: &T) -> &Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => self.write(bytes.into(), "application/json"),
            Err(e) => {
                tracing::error!("Failed to serialize response body: {}", e);
                self.status(StatusCode::INTERNAL_SERVER_ERROR);
                self.write(Bytes::new(), "application/json")
            }
        }
    }

    /// Writes a plain text body and marks the response sent.
    pub fn send(&self, body: impl Into<Bytes>) -> &Self {
        self.write(body.into(), "text/plain; charset=utf-8")
    }

    /// Marks the response sent without a body.
    pub fn end(&self) {
        self.write(Bytes::new(), "");
    }

    pub fn headers_sent(&self) -> bool {
        self.state().headers_sent
    }

    fn write(&self, body: Bytes, content_type: &'static str) -> &Self {
        let mut state = self.state();
        if state.headers_sent {
            tracing::warn!("Cannot write a body after the response was sent");
            return self;
        }
        if !content_type.is_empty() && !state.headers.contains_key(header::CONTENT_TYPE) {
            state
                .headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        state.body = body;
        state.headers_sent = true;
        self
    }

    /// Converts the accumulated state into an axum response.
    pub(crate) fn to_http(&self) -> axum::response::Response {
        let mut state = self.state();
        let mut response = axum::response::Response::new(Body::from(std::mem::take(&mut state.body)));
        *response.status_mut() = state.status;
        *response.headers_mut() = std::mem::take(&mut state.headers);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let res = Response::new();
        let clone = res.clone();
        clone.status(StatusCode::CREATED).json(&serde_json::json!({ "ok": true }));

        assert!(res.headers_sent());
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.get_header("content-type").as_deref(), Some("application/json"));
    }

    #[test]
    fn writes_after_send_are_ignored() {
        let res = Response::new();
        res.send("first");
        res.status(StatusCode::NOT_FOUND).send("second");

        let http = res.to_http();
        assert_eq!(http.status(), StatusCode::OK);
    }

    #[test]
    fn explicit_content_type_is_kept() {
        let res = Response::new();
        res.header("content-type", "text/html").send("<p>hi</p>");
        assert_eq!(res.get_header("content-type").as_deref(), Some("text/html"));
    }
}
