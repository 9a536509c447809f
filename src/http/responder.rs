//! Normalization of handler return values.

use super::HttpError;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// What a handler's return value asks the router manager to do.
#[derive(Debug)]
pub enum Outcome {
    /// Nothing to send; the handler either wrote the response itself or stayed silent.
    Empty,
    /// Send this value as a JSON body.
    Body(Value),
    /// The handler failed.
    Failed(HttpError),
}

/// Values a controller method may return.
pub trait Responder {
    fn into_outcome(self) -> Outcome;
}

impl Responder for () {
    fn into_outcome(self) -> Outcome {
        Outcome::Empty
    }
}

impl Responder for Value {
    fn into_outcome(self) -> Outcome {
        Outcome::Body(self)
    }
}

impl<T: Serialize> Responder for Json<T> {
    fn into_outcome(self) -> Outcome {
        match serde_json::to_value(self.0) {
            Ok(value) => Outcome::Body(value),
            Err(e) => Outcome::Failed(HttpError::internal(format!(
                "failed to serialize response: {e}"
            ))),
        }
    }
}

impl Responder for String {
    fn into_outcome(self) -> Outcome {
        Outcome::Body(Value::String(self))
    }
}

impl Responder for &'static str {
    fn into_outcome(self) -> Outcome {
        Outcome::Body(Value::String(self.to_owned()))
    }
}

impl Responder for HttpError {
    fn into_outcome(self) -> Outcome {
        Outcome::Failed(self)
    }
}

impl<T: Responder> Responder for Option<T> {
    fn into_outcome(self) -> Outcome {
        match self {
            Some(value) => value.into_outcome(),
            None => Outcome::Empty,
        }
    }
}

impl<T, E> Responder for Result<T, E>
where
    T: Responder,
    E: Into<anyhow::Error>,
{
    fn into_outcome(self) -> Outcome {
        match self {
            Ok(value) => value.into_outcome(),
            Err(error) => Outcome::Failed(HttpError::from(error.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn values_become_bodies() {
        assert!(matches!(().into_outcome(), Outcome::Empty));
        assert!(matches!(None::<Value>.into_outcome(), Outcome::Empty));
        match Json(json!({ "id": 1 })).into_outcome() {
            Outcome::Body(body) => assert_eq!(body["id"], 1),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn errors_keep_their_status() {
        let result: Result<Value, HttpError> = Err(HttpError::not_found("gone"));
        match result.into_outcome() {
            Outcome::Failed(error) => assert_eq!(error.status(), StatusCode::NOT_FOUND),
            other => panic!("unexpected outcome {other:?}"),
        }

        let result: anyhow::Result<Value> = Err(anyhow::anyhow!("boom"));
        match result.into_outcome() {
            Outcome::Failed(error) => {
                assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(error.message(), "boom");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
