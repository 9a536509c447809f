use crate::decorators;
use crate::di::Injectable;
use crate::error::{RapidError, Result};
use crate::metadata::{MetadataRegistry, TargetKey, keys};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::sync::Arc;

type Instance = Arc<dyn Any + Send + Sync>;

/// Resolves a bound trait object; the returned `Any` holds an `Arc<dyn Trait>`.
type ResolveFn = Arc<dyn Fn(&Injector) -> Result<Instance> + Send + Sync>;

#[derive(Clone)]
struct BindingEntry {
    implementation: TargetKey,
    resolve: ResolveFn,
}

thread_local! {
    static RESOLVING: RefCell<Vec<TargetKey>> = const { RefCell::new(Vec::new()) };
}

/// Keeps a type on the resolution path while its constructor runs.
struct ResolutionGuard;

impl ResolutionGuard {
    fn enter(target: TargetKey) -> Result<Self> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(start) = stack.iter().position(|t| *t == target) {
                let cycle = stack[start..]
                    .iter()
                    .chain(std::iter::once(&target))
                    .map(|t| t.short_name())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(RapidError::CircularDependency { cycle });
            }
            stack.push(target);
            Ok(ResolutionGuard)
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Thread-safe dependency injection container.
///
/// Holds at most one instance per provider type. Bootstrap registers
/// providers; afterwards lookups are read-mostly.
pub struct Injector {
    registry: Arc<MetadataRegistry>,
    providers: DashMap<TypeId, Instance>,
    bindings: DashMap<TypeId, BindingEntry>,
    tokens: DashMap<String, Instance>,
}

impl Injector {
    pub fn new(registry: Arc<MetadataRegistry>) -> Self {
        Self {
            registry,
            providers: DashMap::new(),
            bindings: DashMap::new(),
            tokens: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    /// Registers `T` as a singleton provider.
    ///
    /// Fails with [`RapidError::InvalidProvider`] before constructing anything
    /// when `T` is not marked injectable. Registering twice is a no-op.
    pub fn register_provider<T: Injectable>(&self) -> Result<()> {
        let target = TargetKey::of::<T>();
        decorators::ensure::<T>(&self.registry);
        if !self.registry.has(keys::INJECTABLE, target, None) {
            return Err(RapidError::InvalidProvider { name: target.name() });
        }
        if self.providers.contains_key(&target.id()) {
            tracing::debug!("Provider already registered: {}", target);
            return Ok(());
        }

        let instance: Instance = Arc::new(self.instantiate::<T>()?);
        self.providers.entry(target.id()).or_insert(instance);
        tracing::info!("Provider registered: {}", target);
        Ok(())
    }

    /// Returns the singleton `T`, registering it on first access.
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        if let Some(instance) = self.lookup::<T>()? {
            return Ok(instance);
        }
        self.register_provider::<T>()?;
        self.lookup::<T>()?.ok_or_else(|| RapidError::DependencyNotFound {
            type_name: std::any::type_name::<T>().to_string(),
        })
    }

    /// Returns an already registered singleton without registering it.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.lookup::<T>()?.ok_or_else(|| RapidError::DependencyNotFound {
            type_name: std::any::type_name::<T>().to_string(),
        })
    }

    /// Builds a fresh `T` with its dependencies resolved, without caching it.
    ///
    /// Controllers and middleware are built this way. A type that is already
    /// being constructed further up the call stack is reported as a
    /// [`RapidError::CircularDependency`].
    pub fn instantiate<T: Injectable>(&self) -> Result<T> {
        let target = TargetKey::of::<T>();
        decorators::ensure::<T>(&self.registry);
        let _guard = ResolutionGuard::enter(target)?;
        T::inject(self)
    }

    /// Seeds a ready-made singleton, replacing any previous instance of `T`.
    pub fn provide<T: Send + Sync + 'static>(&self, instance: T) -> Arc<T> {
        let instance = Arc::new(instance);
        self.providers
            .insert(TypeId::of::<T>(), Arc::clone(&instance) as Instance);
        instance
    }

    /// Provides `value` under an explicit injection token.
    pub fn provide_value<V: Clone + Send + Sync + 'static>(&self, token: impl Into<String>, value: V) {
        let token = token.into();
        tracing::debug!("Injection token provided: {}", token);
        self.tokens.insert(token, Arc::new(value));
    }

    pub fn get_token<V: Clone + Send + Sync + 'static>(&self, token: &str) -> Result<V> {
        let value = self
            .tokens
            .get(token)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RapidError::UnknownToken {
                token: token.to_string(),
            })?;
        value
            .downcast_ref::<V>()
            .cloned()
            .ok_or_else(|| RapidError::DowncastFailed {
                type_name: format!("token `{}` as {}", token, std::any::type_name::<V>()),
            })
    }

    /// Binds the trait object type `Trait` to the provider `Impl`.
    pub fn bind<Trait, Impl>(&self, caster: fn(Arc<Impl>) -> Arc<Trait>)
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Injectable,
    {
        let resolve: ResolveFn = Arc::new(move |injector: &Injector| {
            let concrete = injector.get::<Impl>()?;
            let object: Arc<Trait> = caster(concrete);
            Ok(Arc::new(object) as Instance)
        });
        let implementation = TargetKey::of::<Impl>();
        tracing::debug!(
            "Binding registered: {} => {}",
            std::any::type_name::<Trait>(),
            implementation
        );
        self.bindings.insert(
            TypeId::of::<Trait>(),
            BindingEntry {
                implementation,
                resolve,
            },
        );
    }

    /// Resolves the provider bound to `Trait`.
    pub fn get_bound<Trait: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<Trait>> {
        let entry = self
            .bindings
            .get(&TypeId::of::<Trait>())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RapidError::DependencyNotFound {
                type_name: format!(
                    "No implementation bound for trait '{}'",
                    std::any::type_name::<Trait>()
                ),
            })?;

        // The resolver returns an Arc<dyn Any> holding an Arc<Trait>.
        let wrapper = (entry.resolve)(self)?
            .downcast::<Arc<Trait>>()
            .map_err(|_| RapidError::DowncastFailed {
                type_name: format!(
                    "{} as {}",
                    entry.implementation,
                    std::any::type_name::<Trait>()
                ),
            })?;
        Ok(wrapper.as_ref().clone())
    }

    /// The error reported for a constructor field no strategy can resolve.
    pub fn unresolvable<T>(&self, class: &'static str, index: usize, field: &'static str) -> Result<T> {
        Err(RapidError::UnresolvableDependency {
            class,
            index,
            field,
            type_name: std::any::type_name::<T>(),
        })
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        self.providers.contains_key(&type_id) || self.bindings.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn lookup<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        let Some(instance) = self
            .providers
            .get(&TypeId::of::<T>())
            .map(|entry| Arc::clone(entry.value()))
        else {
            return Ok(None);
        };
        instance
            .downcast::<T>()
            .map(Some)
            .map_err(|_| RapidError::DowncastFailed {
                type_name: std::any::type_name::<T>().to_string(),
            })
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new(Arc::new(MetadataRegistry::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorators::Decorated;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Config {
        name: &'static str,
    }

    impl Decorated for Config {
        fn decorate(registry: &MetadataRegistry) {
            decorators::injectable::<Self>(registry);
        }
    }

    impl Injectable for Config {
        fn inject(_: &Injector) -> Result<Self> {
            Ok(Self { name: "app" })
        }
    }

    struct UserService {
        config: Arc<Config>,
        port: u16,
    }

    impl Decorated for UserService {
        fn decorate(registry: &MetadataRegistry) {
            decorators::injectable::<Self>(registry);
        }
    }

    impl Injectable for UserService {
        fn inject(injector: &Injector) -> Result<Self> {
            Ok(Self {
                config: injector.get::<Config>()?,
                port: injector.get_token::<u16>("PORT")?,
            })
        }
    }

    static UNMARKED_BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Unmarked;

    impl Decorated for Unmarked {
        fn decorate(_: &MetadataRegistry) {}
    }

    impl Injectable for Unmarked {
        fn inject(_: &Injector) -> Result<Self> {
            UNMARKED_BUILT.fetch_add(1, Ordering::SeqCst);
            Ok(Self)
        }
    }

    struct NeedsPrimitive;

    impl Decorated for NeedsPrimitive {
        fn decorate(registry: &MetadataRegistry) {
            decorators::injectable::<Self>(registry);
        }
    }

    impl Injectable for NeedsPrimitive {
        fn inject(injector: &Injector) -> Result<Self> {
            let _: String = injector.unresolvable("NeedsPrimitive", 0, "name")?;
            Ok(Self)
        }
    }

    struct Left {
        _right: Arc<Right>,
    }

    struct Right {
        _left: Arc<Left>,
    }

    impl Decorated for Left {
        fn decorate(registry: &MetadataRegistry) {
            decorators::injectable::<Self>(registry);
        }
    }

    impl Decorated for Right {
        fn decorate(registry: &MetadataRegistry) {
            decorators::injectable::<Self>(registry);
        }
    }

    impl Injectable for Left {
        fn inject(injector: &Injector) -> Result<Self> {
            Ok(Self { _right: injector.get()? })
        }
    }

    impl Injectable for Right {
        fn inject(injector: &Injector) -> Result<Self> {
            Ok(Self { _left: injector.get()? })
        }
    }

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    impl Greeter for Config {
        fn greet(&self) -> String {
            format!("hello from {}", self.name)
        }
    }

    #[test]
    fn get_returns_the_same_instance() {
        let injector = Injector::default();
        injector.provide_value("PORT", 8080u16);

        let first = injector.get::<UserService>().unwrap();
        let second = injector.get::<UserService>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first.config, &injector.get::<Config>().unwrap()));
        assert_eq!(first.port, 8080);
        assert_eq!(injector.len(), 2);
    }

    #[test]
    fn register_provider_rejects_unmarked_types_before_construction() {
        let injector = Injector::default();
        let err = injector.register_provider::<Unmarked>().unwrap_err();

        assert!(matches!(err, RapidError::InvalidProvider { .. }));
        assert_eq!(UNMARKED_BUILT.load(Ordering::SeqCst), 0);
        assert!(!injector.contains::<Unmarked>());
    }

    #[test]
    fn registering_twice_is_a_no_op() {
        let injector = Injector::default();
        injector.register_provider::<Config>().unwrap();
        let first = injector.resolve::<Config>().unwrap();
        injector.register_provider::<Config>().unwrap();
        assert!(Arc::ptr_eq(&first, &injector.resolve::<Config>().unwrap()));
    }

    #[test]
    fn missing_token_is_reported() {
        let injector = Injector::default();
        let err = injector.get::<UserService>().err().unwrap();
        assert!(matches!(err, RapidError::UnknownToken { ref token } if token == "PORT"));
    }

    #[test]
    fn unresolvable_fields_ask_for_a_token() {
        let injector = Injector::default();
        let err = injector.get::<NeedsPrimitive>().err().unwrap();
        assert!(err.to_string().contains("injection token"));
    }

    #[test]
    fn cycles_are_detected() {
        let injector = Injector::default();
        let err = injector.get::<Left>().err().unwrap();
        match err {
            RapidError::CircularDependency { cycle } => assert_eq!(cycle, "Left -> Right -> Left"),
            other => panic!("unexpected error: {other}"),
        }
        // the resolution path is unwound after a failure
        assert!(injector.get::<Config>().is_ok());
    }

    #[test]
    fn trait_bindings_resolve_to_the_singleton() {
        let injector = Injector::default();
        injector.bind::<dyn Greeter, Config>(|config| config as Arc<dyn Greeter>);

        let greeter = injector.get_bound::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "hello from app");
        assert!(injector.contains::<dyn Greeter>());
        assert!(injector.get_bound::<dyn Fn() + Send + Sync>().is_err());
    }

    #[test]
    fn provided_instances_override_construction() {
        let injector = Injector::default();
        let provided = injector.provide(Config { name: "mock" });
        let resolved = injector.get::<Config>().unwrap();
        assert!(Arc::ptr_eq(&provided, &resolved));
        assert_eq!(resolved.name, "mock");
    }
}
