//! HTTP verbs a route can be registered for.

use axum::http::Method;

/// A route verb. `All` matches every request method.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    All,
}

impl HttpMethod {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Whether a request with `method` is served by a route of this verb.
    ///
    /// GET routes also answer HEAD requests.
    pub fn matches(self, method: &Method) -> bool {
        match self {
            Self::All => true,
            Self::Get => *method == Method::GET || *method == Method::HEAD,
            Self::Post => *method == Method::POST,
            Self::Put => *method == Method::PUT,
            Self::Delete => *method == Method::DELETE,
            Self::Patch => *method == Method::PATCH,
            Self::Options => *method == Method::OPTIONS,
        }
    }
}
