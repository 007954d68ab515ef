//! Thread-safe key → value store with dot-path reads and flatten-on-load.
//!
//! All reads and writes are serialized through a readers-writer lock
//! (§3 State Store invariant). Every write fires an invalidation hook if one
//! has been registered — the session loop wires this to
//! [`crate::expr::ExpressionCache::clear`] once both pieces exist, since a
//! store has no inherent notion of which cache depends on it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

type InvalidationHook = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    data: RwLock<HashMap<String, Value>>,
    on_write: RwLock<Option<InvalidationHook>>,
}

/// Shared, cloneable handle to the session's state.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Inner>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(HashMap::new()),
                on_write: RwLock::new(None),
            }),
        }
    }

    pub fn from_initial(data: HashMap<String, Value>) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(data),
                on_write: RwLock::new(None),
            }),
        }
    }

    /// Registers the hook invoked after every `set`/`batch` call. Clones of
    /// this store share the hook since they share the same `inner`.
    pub fn set_invalidation_hook(&self, hook: InvalidationHook) {
        *self.inner.on_write.write().expect("state store lock poisoned") = Some(hook);
    }

    fn fire_hook(&self) {
        if let Some(hook) = self.inner.on_write.read().expect("state store lock poisoned").as_ref() {
            hook();
        }
    }

    /// Reads a value by dot-path key. Returns `(value, found)`: a dotted
    /// key that isn't itself a stored key is resolved by walking into
    /// nested objects from the longest stored prefix.
    pub fn get(&self, key: &str) -> (Option<Value>, bool) {
        let guard = self.inner.data.read().expect("state store lock poisoned");
        if let Some(v) = guard.get(key) {
            return (Some(v.clone()), true);
        }
        match resolve_dot_path(&guard, key) {
            Some(v) => (Some(v), true),
            None => (None, false),
        }
    }

    /// Writes a single key, then fires the invalidation hook (every
    /// mutation clears the whole expression cache, per §4.B).
    pub fn set(&self, key: impl Into<String>, value: Value) {
        {
            let mut guard = self.inner.data.write().expect("state store lock poisoned");
            guard.insert(key.into(), value);
        }
        self.fire_hook();
    }

    /// Writes many keys atomically under a single exclusive lock, then fires
    /// the invalidation hook once for the whole batch.
    pub fn batch(&self, values: impl IntoIterator<Item = (String, Value)>) {
        {
            let mut guard = self.inner.data.write().expect("state store lock poisoned");
            for (key, value) in values {
                guard.insert(key, value);
            }
        }
        self.fire_hook();
    }

    /// Snapshot of the full map, used by the Action Executor to resolve
    /// `{{expr}}` args against a consistent view.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.inner.data.read().expect("state store lock poisoned").clone()
    }

    /// The whole-state binding `$` that expressions can reference.
    pub fn as_value(&self) -> Value {
        let guard = self.inner.data.read().expect("state store lock poisoned");
        Value::Object(guard.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

fn resolve_dot_path(map: &HashMap<String, Value>, key: &str) -> Option<Value> {
    let segments: Vec<&str> = key.split('.').collect();
    for split in (1..segments.len()).rev() {
        let prefix = segments[..split].join(".");
        if let Some(root) = map.get(&prefix) {
            let mut current = root;
            for segment in &segments[split..] {
                current = current.as_object()?.get(*segment)?;
            }
            return Some(current.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_set_roundtrip() {
        let store = StateStore::new();
        store.set("count", json!(0));
        let (value, found) = store.get("count");
        assert!(found);
        assert_eq!(value, Some(json!(0)));
    }

    #[test]
    fn missing_key_reports_not_found() {
        let store = StateStore::new();
        let (value, found) = store.get("nope");
        assert!(!found);
        assert_eq!(value, None);
    }

    #[test]
    fn dot_path_resolves_into_nested_object() {
        let store = StateStore::new();
        store.set("user", json!({"name": "Ada", "address": {"city": "London"}}));
        assert_eq!(store.get("user.name").0, Some(json!("Ada")));
        assert_eq!(store.get("user.address.city").0, Some(json!("London")));
    }

    #[test]
    fn batch_write_is_atomic_from_readers_perspective() {
        let store = StateStore::new();
        store.batch([("a".to_string(), json!(1)), ("b".to_string(), json!(2))]);
        assert_eq!(store.get("a").0, Some(json!(1)));
        assert_eq!(store.get("b").0, Some(json!(2)));
    }

    #[test]
    fn last_write_wins() {
        let store = StateStore::new();
        store.set("x", json!(1));
        store.set("x", json!(2));
        assert_eq!(store.get("x").0, Some(json!(2)));
    }

    #[test]
    fn invalidation_hook_fires_on_every_write() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let store = StateStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        store.set_invalidation_hook(Arc::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        }));

        store.set("a", json!(1));
        store.batch([("b".to_string(), json!(2))]);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clones_share_the_same_hook() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let store = StateStore::new();
        let clone = store.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        store.set_invalidation_hook(Arc::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        }));

        clone.set("a", json!(1));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
