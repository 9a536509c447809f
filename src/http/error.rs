use crate::error::RapidError;
use crate::orm::{OrmError, SchemaError};
use axum::http::StatusCode;
use thiserror::Error;

/// An error raised while handling a request.
///
/// Carries the status the error handlers should answer with, a short name
/// (`"Not Found"`, `"Bad Request"`, ...) and a human readable message.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    name: String,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            name: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Overrides the short error name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<anyhow::Error> for HttpError {
    fn from(error: anyhow::Error) -> Self {
        let error = match error.downcast::<HttpError>() {
            Ok(http) => return http,
            Err(error) => error,
        };
        let error = match error.downcast::<OrmError>() {
            Ok(orm) => return orm.into(),
            Err(error) => error,
        };
        let error = match error.downcast::<SchemaError>() {
            Ok(schema) => return OrmError::Schema(schema).into(),
            Err(error) => error,
        };
        match error.downcast::<RapidError>() {
            Ok(rapid) => rapid.into(),
            Err(error) => Self::internal(format!("{error:#}")).with_name("Error"),
        }
    }
}

impl From<OrmError> for HttpError {
    fn from(error: OrmError) -> Self {
        let status = match &error {
            OrmError::Schema(_) | OrmError::MissingId { .. } | OrmError::InvalidConditions(_) => {
                StatusCode::BAD_REQUEST
            }
            OrmError::NotFound { .. } => StatusCode::NOT_FOUND,
            OrmError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<RapidError> for HttpError {
    fn from(error: RapidError) -> Self {
        match error {
            RapidError::Orm(orm) => orm.into(),
            other => Self::internal(other.to_string()),
        }
    }
}
