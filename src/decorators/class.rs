//! Tagged descriptors for annotated types.
//!
//! Module options refer to classes through these descriptors. Each one is
//! built with `::of::<T>()` and carries the capability functions for `T`, so
//! bootstrap can act on a class without knowing its concrete type.

use crate::di::{Injectable, Injector};
use crate::error::Result;
use crate::http::RequestHandler;
use crate::metadata::{MetadataRegistry, TargetKey};
use crate::middleware::{Middleware, MiddlewareManager};
use crate::router::{Controller, RouterManager};
use std::fmt;
use std::sync::Arc;

/// A type that records its annotations into a [`MetadataRegistry`].
///
/// Implemented by the attribute macros; `decorate` runs once per registry the
/// first time the framework sees the type.
pub trait Decorated: 'static {
    fn decorate(registry: &MetadataRegistry);
}

/// Marker for `#[module]` types.
pub trait Module: Decorated {}

/// An injectable provider class.
#[derive(Clone, Copy)]
pub struct ProviderClass {
    target: TargetKey,
    register: fn(&Injector) -> Result<()>,
}

impl ProviderClass {
    pub fn of<T: Injectable>() -> Self {
        Self {
            target: TargetKey::of::<T>(),
            register: |injector| injector.register_provider::<T>(),
        }
    }

    pub fn target(&self) -> TargetKey {
        self.target
    }

    pub(crate) fn register(&self, injector: &Injector) -> Result<()> {
        (self.register)(injector)
    }
}

/// A controller class.
#[derive(Clone, Copy)]
pub struct ControllerClass {
    target: TargetKey,
    bind: fn(&mut RouterManager, &MiddlewareManager) -> Result<usize>,
}

impl ControllerClass {
    pub fn of<C: Controller>() -> Self {
        Self {
            target: TargetKey::of::<C>(),
            bind: |router, middleware| router.register_controller::<C>(middleware),
        }
    }

    pub fn target(&self) -> TargetKey {
        self.target
    }

    pub(crate) fn bind(&self, router: &mut RouterManager, middleware: &MiddlewareManager) -> Result<usize> {
        (self.bind)(router, middleware)
    }
}

/// A middleware class.
#[derive(Clone, Copy)]
pub struct MiddlewareClass {
    target: TargetKey,
    decorate: fn(&MetadataRegistry),
    compile: fn(&MiddlewareManager) -> Result<RequestHandler>,
}

impl MiddlewareClass {
    pub fn of<M: Middleware + Injectable>() -> Self {
        Self {
            target: TargetKey::of::<M>(),
            decorate: M::decorate,
            compile: |manager| manager.adapt::<M>(),
        }
    }

    pub fn target(&self) -> TargetKey {
        self.target
    }

    pub(crate) fn decorate(&self, registry: &MetadataRegistry) {
        registry.decorate_once(self.target, self.decorate);
    }

    pub(crate) fn compile(&self, manager: &MiddlewareManager) -> Result<RequestHandler> {
        (self.compile)(manager)
    }
}

/// A module class.
#[derive(Clone, Copy)]
pub struct ModuleClass {
    target: TargetKey,
    decorate: fn(&MetadataRegistry),
}

impl ModuleClass {
    pub fn of<M: Module>() -> Self {
        Self {
            target: TargetKey::of::<M>(),
            decorate: M::decorate,
        }
    }

    pub fn target(&self) -> TargetKey {
        self.target
    }

    pub(crate) fn decorate(&self, registry: &MetadataRegistry) {
        registry.decorate_once(self.target, self.decorate);
    }
}

type BindFn = Arc<dyn Fn(&Injector) + Send + Sync>;

/// Binds a trait object type to the provider implementing it.
///
/// ```rust,ignore
/// Binding::of::<dyn UserRepository, SqlUserRepository>(|repo| repo as Arc<dyn UserRepository>)
/// ```
#[derive(Clone)]
pub struct Binding {
    target: TargetKey,
    implementation: TargetKey,
    register: BindFn,
}

impl Binding {
    pub fn of<Trait, Impl>(caster: fn(Arc<Impl>) -> Arc<Trait>) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Injectable,
    {
        Self {
            target: TargetKey::of::<Trait>(),
            implementation: TargetKey::of::<Impl>(),
            register: Arc::new(move |injector: &Injector| injector.bind::<Trait, Impl>(caster)),
        }
    }

    pub fn target(&self) -> TargetKey {
        self.target
    }

    pub fn implementation(&self) -> TargetKey {
        self.implementation
    }

    pub(crate) fn register(&self, injector: &Injector) {
        (self.register)(injector)
    }
}

macro_rules! impl_class_traits {
    ($($class:ident),*) => {
        $(
            impl PartialEq for $class {
                fn eq(&self, other: &Self) -> bool {
                    self.target == other.target
                }
            }

            impl Eq for $class {}

            impl fmt::Debug for $class {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}({})", stringify!($class), self.target)
                }
            }
        )*
    };
}

impl_class_traits!(ProviderClass, ControllerClass, MiddlewareClass, ModuleClass, Binding);
