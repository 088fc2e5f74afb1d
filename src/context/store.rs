//! The per-request key/value store.
//!
//! Entries are addressed by a typed [`Key`]: the key carries the stored
//! type in its type parameter, so reading a value back under the wrong
//! type is a compile-time error rather than a failed downcast at run
//! time. Two keys with the same name but different type parameters
//! address different slots.
//!
//! The store allocates nothing until the first write, and is guarded by
//! a read/write lock so the handlers of a single request may fan out
//! internal concurrency and still use the store of their shared context
//! as a rendezvous point.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use ahash::{HashMap, HashMapExt as _};
use parking_lot::RwLock;

use crate::error::MissingKey;

/// A typed token addressing one slot of a request's context store.
///
/// Construct keys as constants next to the middleware or handler that
/// owns them:
///
/// ```
/// use senda::Key;
///
/// const REQUEST_ID: Key<u64> = Key::new("request.id");
/// ```
pub struct Key<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// Create a new key with the given name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }

    /// The name of this key, used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}

type SlotId = (TypeId, &'static str);
type SlotMap = HashMap<SlotId, Arc<dyn Any + Send + Sync>>;

/// Lazily-allocated slot map, exclusive to one request at a time.
pub(crate) struct Store {
    // `None` until the first write; reset back to `None` between
    // requests so pooled contexts hold no stale references.
    slots: RwLock<Option<SlotMap>>,
}

impl Store {
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(None),
        }
    }

    pub(crate) fn insert<T: Send + Sync + 'static>(&self, key: Key<T>, value: T) -> Option<Arc<T>> {
        self.slots
            .write()
            .get_or_insert_with(HashMap::new)
            .insert((TypeId::of::<T>(), key.name), Arc::new(value))
            .and_then(|previous| previous.downcast().ok())
    }

    pub(crate) fn get<T: Send + Sync + 'static>(&self, key: Key<T>) -> Option<Arc<T>> {
        self.slots
            .read()
            .as_ref()?
            .get(&(TypeId::of::<T>(), key.name))
            .cloned()
            .and_then(|value| value.downcast().ok())
    }

    pub(crate) fn require<T: Send + Sync + 'static>(
        &self,
        key: Key<T>,
    ) -> Result<Arc<T>, MissingKey> {
        self.get(key).ok_or(MissingKey::new(key.name))
    }

    /// Drop the slot map entirely, releasing all held values.
    pub(crate) fn reset(&self) {
        *self.slots.write() = None;
    }

    #[cfg(test)]
    pub(crate) fn is_allocated(&self) -> bool {
        self.slots.read().is_some()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.slots.read().as_ref().map_or(0, HashMap::len);
        f.debug_struct("Store").field("len", &len).finish()
    }
}
