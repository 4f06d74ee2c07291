//! Persistent key→value map with structural sharing.
//!
//! Slice reducers replace whole maps on every update, so the map must be
//! cheap to "copy" and cheap to compare. Both come from the same place: the
//! entries live behind an [`Arc`], `None` is the one canonical empty map, and
//! every operation returns a pointer-identical map whenever its result would
//! have the same content as its input. Downstream change detection is then a
//! single [`PersistentMap::ptr_eq`] call.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// An immutable map from string keys to values of type `V`.
///
/// All mutating operations take `&self` and return a new map, sharing the
/// underlying storage when nothing changed. An absent value (`None` passed to
/// [`PersistentMap::set`]) removes the key; no key is ever bound to an absent
/// value, and the reported [`PersistentMap::len`] always equals the number of
/// stored entries.
#[derive(Debug)]
pub struct PersistentMap<V> {
    inner: Option<Arc<HashMap<String, V>>>,
}

impl<V> Clone for PersistentMap<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> Default for PersistentMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PersistentMap<V> {
    /// Returns the canonical empty map. All empty maps share one identity.
    #[must_use]
    pub const fn new() -> Self {
        Self { inner: None }
    }

    /// Builds a map from key/value pairs. Later pairs win on duplicate keys.
    #[must_use]
    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map: HashMap<String, V> = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::from_hash_map(map)
    }

    fn from_hash_map(map: HashMap<String, V>) -> Self {
        if map.is_empty() {
            Self::new()
        } else {
            Self {
                inner: Some(Arc::new(map)),
            }
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |m| m.len())
    }

    /// Whether the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.as_ref().is_some_and(|m| m.contains_key(key))
    }

    /// Returns the value bound to `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.inner.as_ref().and_then(|m| m.get(key))
    }

    /// Iterates over all entries. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.inner
            .as_deref()
            .into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Iterates over all keys. Order is unspecified.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(k, _)| k)
    }

    /// Identity comparison: true iff both maps share the same storage.
    ///
    /// Because every operation returns a pointer-identical map when content
    /// is unchanged, this is a sound (and cheap) "did anything change" test.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<V: Clone + PartialEq> PersistentMap<V> {
    /// Binds `key` to `value`, or removes `key` when `value` is `None`.
    ///
    /// Returns a pointer-identical map when the content would not change:
    /// removing an absent key, or writing a value equal to the current one.
    #[must_use]
    pub fn set(&self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => {
                if self.get(key) == Some(&value) {
                    return self.clone();
                }
                let mut map = self.copied_entries();
                map.insert(key.to_owned(), value);
                Self::from_hash_map(map)
            }
            None => {
                if !self.contains(key) {
                    return self.clone();
                }
                let mut map = self.copied_entries();
                map.remove(key);
                Self::from_hash_map(map)
            }
        }
    }

    /// Binds `key` to `value`. Shorthand for [`PersistentMap::set`] with
    /// `Some`.
    #[must_use]
    pub fn insert(&self, key: &str, value: V) -> Self {
        self.set(key, Some(value))
    }

    /// Applies a batch of bindings and removals in one allocation.
    ///
    /// `None` values remove their key. Returns a pointer-identical map when
    /// the aggregate result equals the input.
    #[must_use]
    pub fn set_many<K, I>(&self, entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Option<V>)>,
    {
        let mut map = self.copied_entries();
        let mut changed = false;
        for (key, value) in entries {
            let key = key.into();
            match value {
                Some(value) => {
                    if map.get(&key) != Some(&value) {
                        map.insert(key, value);
                        changed = true;
                    }
                }
                None => {
                    if map.remove(&key).is_some() {
                        changed = true;
                    }
                }
            }
        }
        if changed {
            Self::from_hash_map(map)
        } else {
            self.clone()
        }
    }

    /// Removes every key in `keys`. Returns a pointer-identical map when
    /// none of them were present.
    #[must_use]
    pub fn remove<'a, I>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: Vec<&str> = keys.into_iter().filter(|k| self.contains(k)).collect();
        if present.is_empty() {
            return self.clone();
        }
        let mut map = self.copied_entries();
        for key in present {
            map.remove(key);
        }
        Self::from_hash_map(map)
    }

    /// Replaces the value at `key` through `f`, which receives the current
    /// value (if any); returning `None` removes the key.
    #[must_use]
    pub fn replace(&self, key: &str, f: impl FnOnce(Option<&V>) -> Option<V>) -> Self {
        let next = f(self.get(key));
        self.set(key, next)
    }

    fn copied_entries(&self) -> HashMap<String, V> {
        self.inner.as_deref().cloned().unwrap_or_default()
    }
}

impl<V: PartialEq> PartialEq for PersistentMap<V> {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<V: Eq> Eq for PersistentMap<V> {}

impl<K: Into<String>, V> FromIterator<(K, V)> for PersistentMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}

impl<V: Serialize> Serialize for PersistentMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for PersistentMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = HashMap::<String, V>::deserialize(deserializer)?;
        Ok(Self::from_hash_map(map))
    }
}
