//! Builder-style decorators.
//!
//! The attribute macros expand into calls to these functions inside a
//! generated [`Decorated::decorate`]; they can also be called by hand for
//! types that implement the traits manually.
//!
//! ```rust,ignore
//! impl Decorated for UserController {
//!     fn decorate(registry: &MetadataRegistry) {
//!         decorators::controller::<Self>(registry, "/users");
//!         decorators::get::<Self>(registry, "find_one", "/:id");
//!         decorators::req::<Self>(registry, "find_one", 0);
//!     }
//! }
//! ```

mod class;

pub use class::{
    Binding, ControllerClass, Decorated, MiddlewareClass, Module, ModuleClass, ProviderClass,
};

use crate::http::HttpMethod;
use crate::metadata::{MetadataRegistry, TargetKey, keys};

/// What a decorated handler parameter receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ParamKind {
    Request,
    Response,
    Next,
}

/// A `{index, type}` parameter binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamBinding {
    pub index: usize,
    pub kind: ParamKind,
}

/// Everything a module declares.
#[derive(Clone, Debug, Default)]
pub struct ModuleOptions {
    pub controllers: Vec<ControllerClass>,
    pub providers: Vec<ProviderClass>,
    pub imports: Vec<ModuleClass>,
    pub middlewares: Vec<MiddlewareClass>,
    pub bindings: Vec<Binding>,
}

/// Runs `T`'s decorations against `registry` if they have not run yet.
pub fn ensure<T: Decorated>(registry: &MetadataRegistry) {
    registry.decorate_once(TargetKey::of::<T>(), T::decorate);
}

/// Marks `C` as a controller mounted under `prefix`.
///
/// Method paths are appended verbatim, so `prefix` should not end with `/`.
pub fn controller<C: 'static>(registry: &MetadataRegistry, prefix: &str) {
    let target = TargetKey::of::<C>();
    registry.define(keys::PREFIX, prefix.to_string(), target, None);
    registry.define(keys::CONTROLLER, true, target, None);
}

pub fn route<C: 'static>(registry: &MetadataRegistry, member: &str, method: HttpMethod, path: &str) {
    let target = TargetKey::of::<C>();
    registry.define(keys::PATH, path.to_string(), target, Some(member));
    registry.define(keys::METHOD, method, target, Some(member));
}

pub fn get<C: 'static>(registry: &MetadataRegistry, member: &str, path: &str) {
    route::<C>(registry, member, HttpMethod::Get, path);
}

pub fn post<C: 'static>(registry: &MetadataRegistry, member: &str, path: &str) {
    route::<C>(registry, member, HttpMethod::Post, path);
}

pub fn put<C: 'static>(registry: &MetadataRegistry, member: &str, path: &str) {
    route::<C>(registry, member, HttpMethod::Put, path);
}

pub fn delete<C: 'static>(registry: &MetadataRegistry, member: &str, path: &str) {
    route::<C>(registry, member, HttpMethod::Delete, path);
}

pub fn patch<C: 'static>(registry: &MetadataRegistry, member: &str, path: &str) {
    route::<C>(registry, member, HttpMethod::Patch, path);
}

pub fn options<C: 'static>(registry: &MetadataRegistry, member: &str, path: &str) {
    route::<C>(registry, member, HttpMethod::Options, path);
}

pub fn all<C: 'static>(registry: &MetadataRegistry, member: &str, path: &str) {
    route::<C>(registry, member, HttpMethod::All, path);
}

pub fn req<C: 'static>(registry: &MetadataRegistry, member: &str, index: usize) {
    param::<C>(registry, member, ParamBinding { index, kind: ParamKind::Request });
}

pub fn res<C: 'static>(registry: &MetadataRegistry, member: &str, index: usize) {
    param::<C>(registry, member, ParamBinding { index, kind: ParamKind::Response });
}

pub fn next<C: 'static>(registry: &MetadataRegistry, member: &str, index: usize) {
    param::<C>(registry, member, ParamBinding { index, kind: ParamKind::Next });
}

/// Records a parameter binding. A later binding for the same index replaces the earlier one.
pub fn param<C: 'static>(registry: &MetadataRegistry, member: &str, binding: ParamBinding) {
    registry.update::<Vec<ParamBinding>, _>(keys::PARAMS, TargetKey::of::<C>(), Some(member), |params| {
        params.retain(|existing| existing.index != binding.index);
        params.push(binding);
    });
}

/// Parameter bindings of `member`, ordered by index.
pub fn param_bindings(registry: &MetadataRegistry, target: TargetKey, member: &str) -> Vec<ParamBinding> {
    let mut params: Vec<ParamBinding> = registry
        .get(keys::PARAMS, target, Some(member))
        .unwrap_or_default();
    params.sort_by_key(|binding| binding.index);
    params
}

pub fn module<M: 'static>(registry: &MetadataRegistry, options: ModuleOptions) {
    registry.define(keys::MODULE, options, TargetKey::of::<M>(), None);
}

pub fn injectable<T: 'static>(registry: &MetadataRegistry) {
    registry.define(keys::INJECTABLE, true, TargetKey::of::<T>(), None);
}

pub fn middleware<T: 'static>(registry: &MetadataRegistry) {
    registry.define(keys::MIDDLEWARE, true, TargetKey::of::<T>(), None);
}

/// Appends middleware classes to the class-level (`member == None`) or
/// method-level list, keeping whatever was declared before.
pub fn use_middlewares<T: 'static>(
    registry: &MetadataRegistry,
    member: Option<&str>,
    classes: Vec<MiddlewareClass>,
) {
    registry.update::<Vec<MiddlewareClass>, _>(keys::MIDDLEWARES, TargetKey::of::<T>(), member, |list| {
        list.extend(classes);
    });
}

/// Middleware classes declared for `target` (and `member`, if given).
pub fn middlewares_of(registry: &MetadataRegistry, target: TargetKey, member: Option<&str>) -> Vec<MiddlewareClass> {
    registry
        .get(keys::MIDDLEWARES, target, member)
        .unwrap_or_default()
}
