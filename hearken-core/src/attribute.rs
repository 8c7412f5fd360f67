//! Scoped, typed attributes carried by processing contexts.
//!
//! Attributes hold cross-cutting data such as "the current application" or
//! values an interceptor wants to hand to listeners. Two scopes exist:
//!
//! - [`Scope::Global`] - owned by the manager, shared by every push, written
//!   at startup and read-mostly afterwards.
//! - [`Scope::Instant`] - created for one push and dropped with it.

use parking_lot::RwLock;
use std::{
    any::Any,
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::Arc,
};

/// Attribute lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Shared by every dispatch of one manager.
    Global,
    /// Lives for one push.
    Instant,
}

/// A typed attribute name.
///
/// ```rust,ignore
/// const APP_NAME: AttributeKey<String> = AttributeKey::new("app.name");
/// ctx.attributes(Scope::Global).insert(APP_NAME, "bot".to_string());
/// ```
pub struct AttributeKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    /// Create an attribute key.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The attribute name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttributeKey<T> {}

impl<T> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeKey({})", self.name)
    }
}

type AttributeValue = Arc<dyn Any + Send + Sync>;

/// A concurrent attribute bag.
#[derive(Default, Clone)]
pub struct Attributes {
    values: Arc<RwLock<HashMap<&'static str, AttributeValue>>>,
}

impl Attributes {
    /// Create an empty attribute bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one if it had the same type.
    pub fn insert<T: Send + Sync + 'static>(&self, key: AttributeKey<T>, value: T) -> Option<Arc<T>> {
        self.values
            .write()
            .insert(key.name, Arc::new(value))
            .and_then(|old| old.downcast::<T>().ok())
    }

    /// Get a value.
    pub fn get<T: Send + Sync + 'static>(&self, key: AttributeKey<T>) -> Option<Arc<T>> {
        self.values
            .read()
            .get(key.name)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Remove a value.
    pub fn remove<T: Send + Sync + 'static>(&self, key: AttributeKey<T>) -> Option<Arc<T>> {
        self.values
            .write()
            .remove(key.name)
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Returns `true` if a value of any type is stored under the key's name.
    pub fn contains<T>(&self, key: AttributeKey<T>) -> bool {
        self.values.read().contains_key(key.name)
    }

    /// Number of stored attributes.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns `true` if no attribute is stored.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.read().keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNT: AttributeKey<u32> = AttributeKey::new("count");
    const NAME: AttributeKey<String> = AttributeKey::new("name");

    #[test]
    fn test_insert_and_get() {
        let attributes = Attributes::new();
        assert!(attributes.insert(COUNT, 1).is_none());
        assert_eq!(attributes.insert(COUNT, 2).as_deref(), Some(&1));
        assert_eq!(attributes.get(COUNT).as_deref(), Some(&2));
        assert!(attributes.get(NAME).is_none());
    }

    #[test]
    fn test_wrong_type_is_none() {
        let attributes = Attributes::new();
        attributes.insert(NAME, "bot".to_string());
        let same_name: AttributeKey<u32> = AttributeKey::new("name");
        assert!(attributes.get(same_name).is_none());
        assert!(attributes.contains(same_name));
    }

    #[test]
    fn test_clone_shares_storage() {
        let attributes = Attributes::new();
        let shared = attributes.clone();
        shared.insert(COUNT, 7);
        assert_eq!(attributes.get(COUNT).as_deref(), Some(&7));
        assert_eq!(attributes.remove(COUNT).as_deref(), Some(&7));
        assert!(shared.is_empty());
    }
}
