//! Express-style request handling primitives on top of axum's `http` types.
//!
//! A handler receives an owned [`Request`], a shared [`Response`] handle and
//! the [`Next`] continuation. Middleware, routes and the fallback handlers
//! all share that shape.

mod arguments;
mod error;
mod method;
mod next;
mod request;
mod responder;
mod response;
mod router;

pub use arguments::{Argument, Arguments, FromArgument};
pub use error::HttpError;
pub use method::HttpMethod;
pub use next::{BoxFuture, HandlerResult, Next, RequestHandler, compose, handler_fn};
pub use request::Request;
pub use responder::{Outcome, Responder};
pub use response::Response;
pub use router::{RouteEntry, Router};
