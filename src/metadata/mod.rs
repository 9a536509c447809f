//! Side-table of annotations attached to types and their methods.
//!
//! Decorators write structured values here at bootstrap; the injector, the
//! middleware manager and the router manager read them back. Class-level and
//! member-level entries live in separate namespaces keyed by
//! `(target, member, key)`.

use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Well-known metadata keys.
pub mod keys {
    pub const PREFIX: &str = "prefix";
    pub const PATH: &str = "path";
    pub const METHOD: &str = "method";
    pub const PARAMS: &str = "params";
    pub const MODULE: &str = "module";
    pub const INJECTABLE: &str = "injectable";
    pub const MIDDLEWARE: &str = "middleware";
    pub const MIDDLEWARES: &str = "middlewares";
    pub const CONTROLLER: &str = "controller";
    pub const DECORATED: &str = "decorated";
}

/// Identity of an annotated type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetKey {
    id: TypeId,
    name: &'static str,
}

impl TargetKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path, e.g. `UserController`.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl fmt::Debug for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

type Slot = (TargetKey, Option<String>, &'static str);

/// Registry of metadata values.
///
/// Values are stored type-erased and read back by type. Defining a key again
/// overwrites the previous value; there is no removal.
#[derive(Default)]
pub struct MetadataRegistry {
    entries: DashMap<Slot, Arc<dyn Any + Send + Sync>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define<V>(&self, key: &'static str, value: V, target: TargetKey, member: Option<&str>)
    where
        V: Any + Send + Sync,
    {
        self.entries
            .insert(slot(key, target, member), Arc::new(value));
    }

    /// Returns a copy of the value stored under `key`, if one of type `V` exists.
    pub fn get<V>(&self, key: &'static str, target: TargetKey, member: Option<&str>) -> Option<V>
    where
        V: Any + Send + Sync + Clone,
    {
        let value = self
            .entries
            .get(&slot(key, target, member))
            .map(|entry| Arc::clone(entry.value()))?;
        value.downcast_ref::<V>().cloned()
    }

    pub fn has(&self, key: &'static str, target: TargetKey, member: Option<&str>) -> bool {
        self.entries.contains_key(&slot(key, target, member))
    }

    /// Read-modify-write for list-valued keys. Missing entries start from `V::default()`.
    pub fn update<V, F>(&self, key: &'static str, target: TargetKey, member: Option<&str>, f: F)
    where
        V: Any + Send + Sync + Clone + Default,
        F: FnOnce(&mut V),
    {
        let mut value = self.get::<V>(key, target, member).unwrap_or_default();
        f(&mut value);
        self.define(key, value, target, member);
    }

    /// Runs `decorate` for `target` unless it already ran against this registry.
    ///
    /// The marker is recorded before `decorate` runs so a type referring to
    /// itself cannot re-enter.
    pub fn decorate_once(&self, target: TargetKey, decorate: fn(&MetadataRegistry)) {
        if self.has(keys::DECORATED, target, None) {
            return;
        }
        self.define(keys::DECORATED, true, target, None);
        decorate(self);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn slot(key: &'static str, target: TargetKey, member: Option<&str>) -> Slot {
    (target, member.map(str::to_owned), key)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UserController;
    struct Other;

    #[test]
    fn class_and_member_namespaces_are_independent() {
        let registry = MetadataRegistry::new();
        let target = TargetKey::of::<UserController>();

        registry.define(keys::PATH, "/class".to_string(), target, None);
        registry.define(keys::PATH, "/member".to_string(), target, Some("find"));

        assert_eq!(
            registry.get::<String>(keys::PATH, target, None).as_deref(),
            Some("/class")
        );
        assert_eq!(
            registry.get::<String>(keys::PATH, target, Some("find")).as_deref(),
            Some("/member")
        );
        assert!(!registry.has(keys::PATH, TargetKey::of::<Other>(), None));
    }

    #[test]
    fn get_with_wrong_type_returns_none() {
        let registry = MetadataRegistry::new();
        let target = TargetKey::of::<UserController>();
        registry.define(keys::PREFIX, "/users".to_string(), target, None);

        assert!(registry.get::<u32>(keys::PREFIX, target, None).is_none());
        assert!(registry.has(keys::PREFIX, target, None));
    }

    #[test]
    fn update_accumulates_lists() {
        let registry = MetadataRegistry::new();
        let target = TargetKey::of::<UserController>();

        registry.update::<Vec<u8>, _>(keys::PARAMS, target, Some("find"), |list| list.push(1));
        registry.update::<Vec<u8>, _>(keys::PARAMS, target, Some("find"), |list| list.push(0));

        assert_eq!(
            registry.get::<Vec<u8>>(keys::PARAMS, target, Some("find")),
            Some(vec![1, 0])
        );
    }

    #[test]
    fn decorate_once_runs_a_single_time() {
        fn count(registry: &MetadataRegistry) {
            registry.update::<u32, _>("count", TargetKey::of::<Other>(), None, |n| *n += 1);
        }

        let registry = MetadataRegistry::new();
        let target = TargetKey::of::<UserController>();
        registry.decorate_once(target, count);
        registry.decorate_once(target, count);

        assert_eq!(registry.get::<u32>("count", TargetKey::of::<Other>(), None), Some(1));
    }

    #[test]
    fn short_name_strips_module_path() {
        assert_eq!(TargetKey::of::<UserController>().short_name(), "UserController");
        assert_eq!(TargetKey::of::<Vec<String>>().short_name(), "Vec");
    }
}
