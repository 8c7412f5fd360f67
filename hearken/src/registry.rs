//! Registry module for listener and interceptor management.
//!
//! Every list is kept sorted by priority (lower first, ties in registration
//! order) and stored as a frozen snapshot. Mutations build a new snapshot and
//! swap it in; a dispatch clones the current snapshot once and is never
//! disturbed by later registrations or disposals.

use hearken_core::{DynListener, ListenerInterceptor, ProcessingInterceptor};
use parking_lot::RwLock;
use std::sync::{
    Arc, Weak,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

/// A handle for dynamically toggling a listener at runtime.
#[derive(Debug, Clone)]
pub struct EnabledHandle(Arc<AtomicBool>);

impl EnabledHandle {
    /// Create a new enabled handle with the given initial state.
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    /// Check if the listener is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Enable the listener.
    pub fn enable(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Disable the listener.
    pub fn disable(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Toggle the enabled state, returning the new state.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::AcqRel)
    }
}

impl Default for EnabledHandle {
    fn default() -> Self {
        Self::new(true)
    }
}

/// One registered item with its metadata.
pub struct Entry<T: ?Sized> {
    id: String,
    priority: i32,
    sequence: u64,
    value: Arc<T>,
    enabled: EnabledHandle,
}

impl<T: ?Sized> Entry<T> {
    /// The registration id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The registered item.
    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    /// Check if this entry is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.is_enabled()
    }
}

/// A frozen, priority-sorted view of a [`PriorityList`].
pub struct Snapshot<T: ?Sized> {
    entries: Vec<Arc<Entry<T>>>,
    values: Arc<[Arc<T>]>,
}

impl<T: ?Sized> Snapshot<T> {
    fn new(entries: Vec<Arc<Entry<T>>>) -> Self {
        let values = entries.iter().map(|entry| Arc::clone(&entry.value)).collect();
        Self { entries, values }
    }

    /// Entries in priority order.
    pub fn entries(&self) -> &[Arc<Entry<T>>] {
        &self.entries
    }

    /// The items in priority order, shareable as an interceptor chain.
    pub fn values(&self) -> &Arc<[Arc<T>]> {
        &self.values
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A concurrent, priority-ordered, copy-on-write list keyed by id.
pub struct PriorityList<T: ?Sized> {
    current: RwLock<Arc<Snapshot<T>>>,
    sequence: AtomicU64,
}

impl<T: ?Sized> Default for PriorityList<T> {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::new(Vec::new()))),
            sequence: AtomicU64::new(0),
        }
    }
}

impl<T: ?Sized> PriorityList<T> {
    /// Insert `value`; returns `None` if `id` is already taken.
    pub fn insert(&self, id: impl Into<String>, priority: i32, value: Arc<T>) -> Option<EnabledHandle> {
        let id = id.into();
        let mut current = self.current.write();
        if current.entries.iter().any(|entry| entry.id == id) {
            return None;
        }

        let enabled = EnabledHandle::default();
        let entry = Arc::new(Entry {
            id,
            priority,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            value,
            enabled: enabled.clone(),
        });
        let mut entries = current.entries.clone();
        entries.push(entry);
        entries.sort_by_key(|entry| (entry.priority, entry.sequence));
        *current = Arc::new(Snapshot::new(entries));
        Some(enabled)
    }

    /// Remove the entry with `id`, disabling it for in-flight snapshots.
    ///
    /// Returns `false` if nothing was removed.
    pub fn remove(&self, id: &str) -> bool {
        let mut current = self.current.write();
        let Some(position) = current.entries.iter().position(|entry| entry.id == id) else {
            return false;
        };
        let mut entries = current.entries.clone();
        let removed = entries.remove(position);
        removed.enabled.disable();
        *current = Arc::new(Snapshot::new(entries));
        true
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot<T>> {
        Arc::clone(&self.current.read())
    }

    /// Returns `true` if an entry with `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.current.read().entries.iter().any(|entry| entry.id == id)
    }

    /// Ids in priority order.
    pub fn ids(&self) -> Vec<String> {
        self.current
            .read()
            .entries
            .iter()
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.current.read().len()
    }
}

/// Registered listeners.
pub type ListenerRegistry = PriorityList<dyn DynListener>;
/// Registered processing interceptors.
pub type ProcessingInterceptors = PriorityList<dyn ProcessingInterceptor>;
/// Registered listener interceptors.
pub type ListenerInterceptors = PriorityList<dyn ListenerInterceptor>;

// ============================================================================
// Handles
// ============================================================================

/// Returned by listener registration.
///
/// Dropping the handle keeps the listener registered.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: String,
    enabled: EnabledHandle,
    registry: Weak<ListenerRegistry>,
}

impl ListenerHandle {
    pub(crate) fn new(id: String, enabled: EnabledHandle, registry: &Arc<ListenerRegistry>) -> Self {
        Self {
            id,
            enabled,
            registry: Arc::downgrade(registry),
        }
    }

    /// The listener id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Unregister the listener. Calling it again has no effect.
    ///
    /// Returns `true` if this call removed it.
    pub fn dispose(&self) -> bool {
        self.enabled.disable();
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(&self.id))
    }

    /// Resume invoking the listener.
    pub fn enable(&self) {
        self.enabled.enable();
    }

    /// Skip the listener without unregistering it.
    pub fn disable(&self) {
        self.enabled.disable();
    }

    /// The enable/disable switch.
    pub fn enabled_handle(&self) -> EnabledHandle {
        self.enabled.clone()
    }

    /// Returns `true` if the listener is registered and enabled.
    pub fn is_active(&self) -> bool {
        self.enabled.is_enabled()
            && self
                .registry
                .upgrade()
                .is_some_and(|registry| registry.contains(&self.id))
    }
}

/// Returned by interceptor registration.
pub struct InterceptorHandle {
    id: String,
    remove: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

impl InterceptorHandle {
    pub(crate) fn new<T: ?Sized + Send + Sync + 'static>(
        id: String,
        list: &Arc<PriorityList<T>>,
    ) -> Self {
        let list = Arc::downgrade(list);
        Self {
            id,
            remove: Box::new(move |id| list.upgrade().is_some_and(|list| list.remove(id))),
        }
    }

    /// The interceptor id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remove the interceptor from its chain. Calling it again has no effect.
    ///
    /// Returns `true` if this call removed it.
    pub fn dispose(&self) -> bool {
        (self.remove)(&self.id)
    }
}

impl std::fmt::Debug for InterceptorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorHandle")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> Arc<PriorityList<str>> {
        Arc::new(PriorityList::default())
    }

    #[test]
    fn test_sorted_by_priority_then_registration() {
        let list = list();
        list.insert("late", 10, Arc::from("late")).unwrap();
        list.insert("first", -5, Arc::from("first")).unwrap();
        list.insert("tie-a", 0, Arc::from("tie-a")).unwrap();
        list.insert("tie-b", 0, Arc::from("tie-b")).unwrap();

        assert_eq!(list.ids(), ["first", "tie-a", "tie-b", "late"]);
        let snapshot = list.snapshot();
        let values: Vec<&str> = snapshot.values().iter().map(|v| &**v).collect();
        assert_eq!(values, ["first", "tie-a", "tie-b", "late"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let list = list();
        assert!(list.insert("a", 0, Arc::from("one")).is_some());
        assert!(list.insert("a", 1, Arc::from("two")).is_none());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_snapshot_survives_removal() {
        let list = list();
        list.insert("a", 0, Arc::from("a")).unwrap();
        let before = list.snapshot();

        assert!(list.remove("a"));
        assert!(!list.remove("a"));
        assert_eq!(before.len(), 1);
        assert!(!before.entries()[0].is_enabled());
        assert_eq!(list.snapshot().len(), 0);
    }

    #[test]
    fn test_enabled_handle_toggle() {
        let handle = EnabledHandle::default();
        assert!(handle.is_enabled());
        assert!(!handle.toggle());
        assert!(!handle.is_enabled());
        assert!(handle.toggle());
    }

    #[test]
    fn test_interceptor_handle_dispose_is_idempotent() {
        let list = list();
        list.insert("x", 0, Arc::from("x")).unwrap();
        let handle = InterceptorHandle::new("x".to_string(), &list);
        assert!(handle.dispose());
        assert!(!handle.dispose());
        assert_eq!(list.len(), 0);
    }
}
