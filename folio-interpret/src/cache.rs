use folio_syntax::object::{ObjRef, StreamId};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

/// The key of a cached object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A stream, such as an image or an ICC profile.
    Stream(StreamId),
    /// An indirect object.
    Object(ObjRef),
}

impl From<StreamId> for CacheKey {
    fn from(id: StreamId) -> Self {
        Self::Stream(id)
    }
}

impl From<ObjRef> for CacheKey {
    fn from(obj_ref: ObjRef) -> Self {
        Self::Object(obj_ref)
    }
}

type Entries = FxHashMap<CacheKey, Option<Box<dyn Any + Send + Sync>>>;

/// A cache for objects that are expensive to construct, like decoded images.
///
/// Cloning the cache is cheap and all clones share the same entries. Failures are cached
/// as well, so broken objects are only processed once.
#[derive(Clone, Default)]
pub struct Cache(Arc<Mutex<Entries>>);

impl Cache {
    /// Create a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for the key, or create and insert it.
    ///
    /// The lock is held while `f` runs, so `f` must not access the cache itself.
    pub fn get_or_insert_with<T: Clone + Send + Sync + 'static>(
        &self,
        key: CacheKey,
        f: impl FnOnce() -> Option<T>,
    ) -> Option<T> {
        let mut entries = self.0.lock().unwrap_or_else(PoisonError::into_inner);

        entries
            .entry(key)
            .or_insert_with(|| f().map(|val| Box::new(val) as Box<dyn Any + Send + Sync>))
            .as_ref()
            .and_then(|val| val.downcast_ref::<T>().cloned())
    }

    /// Return the number of cached entries.
    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn populates_once() {
        let cache = Cache::new();
        let calls = Cell::new(0);
        let key = CacheKey::Object(ObjRef::new(1, 0));

        for _ in 0..3 {
            let val = cache.get_or_insert_with(key, || {
                calls.set(calls.get() + 1);
                Some(7_u32)
            });
            assert_eq!(val, Some(7));
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn caches_failures() {
        let cache = Cache::new();
        let key = CacheKey::Object(ObjRef::new(2, 0));

        assert_eq!(cache.get_or_insert_with::<u32>(key, || None), None);
        assert_eq!(cache.get_or_insert_with(key, || Some(1_u32)), None);
    }
}
