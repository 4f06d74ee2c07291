//! Persistent membership set with structural sharing.
//!
//! Same discipline as [`crate::map::PersistentMap`]: entries behind an
//! [`Arc`], `None` as the canonical empty set, and pointer-identical results
//! whenever an operation would not change content. Set algebra iterates the
//! smaller operand against membership in the larger.

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// An immutable set of string values.
#[derive(Debug, Clone, Default)]
pub struct PersistentSet {
    inner: Option<Arc<HashSet<String>>>,
}

impl PersistentSet {
    /// Returns the canonical empty set. All empty sets share one identity.
    #[must_use]
    pub const fn new() -> Self {
        Self { inner: None }
    }

    /// Builds a set from values, deduplicating as it goes.
    #[must_use]
    pub fn from_values<T, I>(values: I) -> Self
    where
        T: Into<String>,
        I: IntoIterator<Item = T>,
    {
        let set: HashSet<String> = values.into_iter().map(Into::into).collect();
        Self::from_hash_set(set)
    }

    fn from_hash_set(set: HashSet<String>) -> Self {
        if set.is_empty() {
            Self::new()
        } else {
            Self {
                inner: Some(Arc::new(set)),
            }
        }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |s| s.len())
    }

    /// Whether the set holds no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether `value` is a member.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.inner.as_ref().is_some_and(|s| s.contains(value))
    }

    /// Iterates over all members. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.inner
            .as_deref()
            .into_iter()
            .flat_map(|s| s.iter().map(String::as_str))
    }

    /// Identity comparison: true iff both sets share the same storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Adds every value in `values`. Returns a pointer-identical set when all
    /// of them were already members.
    #[must_use]
    pub fn add<T, I>(&self, values: I) -> Self
    where
        T: Into<String>,
        I: IntoIterator<Item = T>,
    {
        let missing: Vec<String> = values
            .into_iter()
            .map(Into::into)
            .filter(|v| !self.contains(v))
            .collect();
        if missing.is_empty() {
            return self.clone();
        }
        let mut set = self.copied_members();
        set.extend(missing);
        Self::from_hash_set(set)
    }

    /// Removes every value in `values`. Returns a pointer-identical set when
    /// none of them were members.
    #[must_use]
    pub fn remove<'a, I>(&self, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: Vec<&str> = values.into_iter().filter(|v| self.contains(v)).collect();
        if present.is_empty() {
            return self.clone();
        }
        let mut set = self.copied_members();
        for value in present {
            set.remove(value);
        }
        Self::from_hash_set(set)
    }

    /// All members of `self` plus all members of `other`. Returns a
    /// pointer-identical set when `other` adds nothing.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.add(other.iter())
    }

    /// All members of `self` that are not members of `other`. Returns a
    /// pointer-identical set when the operands are disjoint.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        self.remove(other.iter())
    }

    /// All values that are members of both sets.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let (smaller, larger) = if self.len() < other.len() {
            (self, other)
        } else {
            (other, self)
        };
        Self::from_values(smaller.iter().filter(|v| larger.contains(v)))
    }

    /// Whether the sets share at least one member. Short-circuits on the
    /// first hit, iterating the smaller operand.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let (smaller, larger) = if self.len() < other.len() {
            (self, other)
        } else {
            (other, self)
        };
        smaller.iter().any(|v| larger.contains(v))
    }

    fn copied_members(&self) -> HashSet<String> {
        self.inner.as_deref().cloned().unwrap_or_default()
    }
}

impl PartialEq for PersistentSet {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl Eq for PersistentSet {}

impl<T: Into<String>> FromIterator<T> for PersistentSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

impl Serialize for PersistentSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for PersistentSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<String>::deserialize(deserializer)?;
        Ok(Self::from_values(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> PersistentSet {
        PersistentSet::from_values(["foo", "bar", "baz"])
    }

    #[test]
    fn test_new_is_empty_and_shares_identity() {
        let a = PersistentSet::new();
        let b = PersistentSet::new();
        assert!(a.is_empty());
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_from_values_deduplicates() {
        let set = PersistentSet::from_values(["foo", "foo", "bar"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_add_then_remove_round_trips_content() {
        let set = example();
        let round_tripped = set.add(["quux"]).remove(["quux"]);
        assert_eq!(round_tripped, set);
    }

    #[test]
    fn test_add_of_existing_members_returns_identical_set() {
        let set = example();
        let next = set.add(["foo", "bar"]);
        assert!(set.ptr_eq(&next));
    }

    #[test]
    fn test_remove_of_present_member_decrements_len_by_one() {
        let set = example();
        assert_eq!(set.remove(["foo"]).len(), set.len() - 1);
    }

    #[test]
    fn test_remove_of_absent_members_returns_identical_set() {
        let set = example();
        let next = set.remove(["quux"]);
        assert!(set.ptr_eq(&next));
        assert_eq!(next.len(), set.len());
    }

    #[test]
    fn test_union_merges_members() {
        let union = example().union(&PersistentSet::from_values(["baz", "quux"]));
        assert_eq!(union.len(), 4);
        assert!(union.contains("quux"));
    }

    #[test]
    fn test_union_with_subset_returns_identical_set() {
        let set = example();
        let union = set.union(&PersistentSet::from_values(["foo"]));
        assert!(set.ptr_eq(&union));
    }

    #[test]
    fn test_difference_removes_shared_members() {
        let diff = example().difference(&PersistentSet::from_values(["foo", "quux"]));
        assert_eq!(diff, PersistentSet::from_values(["bar", "baz"]));
    }

    #[test]
    fn test_intersection_keeps_only_shared_members() {
        let shared = example().intersection(&PersistentSet::from_values(["bar", "baz", "quux"]));
        assert_eq!(shared, PersistentSet::from_values(["bar", "baz"]));
    }

    #[test]
    fn test_intersection_of_disjoint_sets_is_canonical_empty() {
        let shared = example().intersection(&PersistentSet::from_values(["quux"]));
        assert!(shared.ptr_eq(&PersistentSet::new()));
    }

    #[test]
    fn test_overlaps_detects_any_shared_member() {
        let set = example();
        assert!(set.overlaps(&PersistentSet::from_values(["zot", "baz"])));
        assert!(!set.overlaps(&PersistentSet::from_values(["zot"])));
        assert!(!set.overlaps(&PersistentSet::new()));
    }

    #[test]
    fn test_serializes_as_plain_json_array() {
        let set = PersistentSet::from_values(["foo"]);
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json, serde_json::json!(["foo"]));

        let back: PersistentSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
    }
}
