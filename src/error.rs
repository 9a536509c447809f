use crate::orm::OrmError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RapidError>;

#[derive(Debug, Error)]
pub enum RapidError {
    #[error("{name} is not an injectable provider; derive Injectable or call decorators::injectable")]
    InvalidProvider { name: &'static str },

    #[error(
        "cannot resolve parameter {index} (`{field}`: {type_name}) of {class}; \
         annotate it with #[inject(\"token\")] to supply an explicit injection token"
    )]
    UnresolvableDependency {
        class: &'static str,
        index: usize,
        field: &'static str,
        type_name: &'static str,
    },

    #[error("Dependency not found: {type_name}")]
    DependencyNotFound { type_name: String },

    #[error("no value provided for injection token `{token}`")]
    UnknownToken { token: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("{name} is not a middleware; annotate it with #[middleware]")]
    InvalidMiddleware { name: &'static str },

    #[error("{name} is not a module; annotate it with #[module]")]
    NotAModule { name: &'static str },

    #[error("route [{method}] {path} rejected: {reason}")]
    RouteConflict {
        method: String,
        path: String,
        reason: String,
    },

    #[error("cannot {action} while the application is {state}")]
    InvalidState {
        action: &'static str,
        state: String,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("invalid configuration value for {key}: {message}")]
    Config { key: String, message: String },

    #[error(transparent)]
    Orm(#[from] OrmError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RapidError {
    /// Configuration errors abort bootstrap; everything else is a runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidProvider { .. }
                | Self::UnresolvableDependency { .. }
                | Self::DependencyNotFound { .. }
                | Self::UnknownToken { .. }
                | Self::CircularDependency { .. }
                | Self::InvalidMiddleware { .. }
                | Self::NotAModule { .. }
                | Self::RouteConflict { .. }
                | Self::Config { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolvable_dependency_mentions_injection_token() {
        let error = RapidError::UnresolvableDependency {
            class: "UserService",
            index: 1,
            field: "port",
            type_name: "u16",
        };
        let message = error.to_string();
        assert!(message.contains("UserService"));
        assert!(message.contains("#[inject(\"token\")]"));
        assert!(error.is_configuration());
    }

    #[test]
    fn bind_errors_are_not_configuration_errors() {
        let error = RapidError::Bind {
            address: "127.0.0.1:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(!error.is_configuration());
    }
}
