use proc_macro::TokenStream;

mod controller;
mod http_methods;
mod injectable;
mod middleware;
mod module;

/// Derive macro for making a struct injectable
///
/// Each field is resolved from the injector: `#[inject("token")]` fields
/// read a provided value, `Arc<dyn Trait>` fields the provider bound to the
/// trait, and `Arc<T>` fields the singleton `T`.
///
/// # Example
/// ```ignore
/// use rapidfast::prelude::*;
///
/// #[derive(Injectable)]
/// pub struct UserService {
///     repository: Arc<dyn UserRepository>,
///     #[inject("page_size")]
///     page_size: usize,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}

/// Attribute macro for defining a controller
///
/// Accepts `#[controller]`, `#[controller("/users")]`,
/// `#[controller(prefix = "/users")]` or `#[controller(path = "/users")]`.
/// Controller-wide middlewares go in a `#[use_middlewares(..)]` attribute
/// below this one. The routes themselves come from a `#[routes]` impl block.
///
/// # Example
/// ```ignore
/// #[controller("/users")]
/// #[use_middlewares(RequestLogger)]
/// pub struct UserController {
///     user_service: Arc<UserService>,
/// }
/// ```
#[proc_macro_attribute]
pub fn controller(attr: TokenStream, item: TokenStream) -> TokenStream {
    controller::controller_attribute(attr, item)
}

/// Attribute macro for defining routes in an impl block
///
/// Methods carrying a verb attribute become routes, in declaration order.
/// Parameters marked `#[req]`, `#[res]` or `#[next]` receive the request,
/// the response handle or the continuation; without markers a method takes
/// `(req, res, next)` positionally.
///
/// # Example
/// ```ignore
/// #[routes]
/// impl UserController {
///     #[get("/:id")]
///     async fn find(&self, #[req] req: Request) -> Result<Record, OrmError> {
///         // ...
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn routes(attr: TokenStream, item: TokenStream) -> TokenStream {
    controller::routes_attribute(attr, item)
}

/// Attribute macro for defining a module
///
/// # Example
/// ```ignore
/// #[module(
///     imports = [DatabaseModule],
///     controllers = [UserController],
///     providers = [UserService],
///     middlewares = [RequestLogger],
///     bindings = [(dyn UserRepository => SqlUserRepository)],
/// )]
/// pub struct AppModule;
/// ```
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    module::module_attribute(attr, item)
}

/// Attribute macro for defining a middleware class
///
/// The struct still needs a `Middleware` impl; fields are injected like
/// those of a provider.
///
/// # Example
/// ```ignore
/// #[middleware]
/// pub struct RequireApiKey {
///     #[inject("api_key")]
///     key: String,
/// }
/// ```
#[proc_macro_attribute]
pub fn middleware(attr: TokenStream, item: TokenStream) -> TokenStream {
    middleware::middleware_attribute(attr, item)
}

/// Route-scoped (inside `#[routes]`) or controller-scoped (below
/// `#[controller]`) middlewares
#[proc_macro_attribute]
pub fn use_middlewares(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::passthrough(attr, item)
}

/// HTTP GET method attribute for controller methods
#[proc_macro_attribute]
pub fn get(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::passthrough(attr, item)
}

/// HTTP POST method attribute for controller methods
#[proc_macro_attribute]
pub fn post(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::passthrough(attr, item)
}

/// HTTP PUT method attribute for controller methods
#[proc_macro_attribute]
pub fn put(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::passthrough(attr, item)
}

/// HTTP DELETE method attribute for controller methods
#[proc_macro_attribute]
pub fn delete(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::passthrough(attr, item)
}

/// HTTP PATCH method attribute for controller methods
#[proc_macro_attribute]
pub fn patch(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::passthrough(attr, item)
}

/// HTTP OPTIONS method attribute for controller methods
#[proc_macro_attribute]
pub fn options(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::passthrough(attr, item)
}

/// Attribute for controller methods answering every HTTP method
#[proc_macro_attribute]
pub fn all(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::passthrough(attr, item)
}

/// Parameter attribute binding the request
/// Pass-through, actual handling is done by #[routes] macro
#[proc_macro_attribute]
pub fn req(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::passthrough(attr, item)
}

/// Parameter attribute binding the response handle
#[proc_macro_attribute]
pub fn res(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::passthrough(attr, item)
}

/// Parameter attribute binding the continuation
#[proc_macro_attribute]
pub fn next(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::passthrough(attr, item)
}
