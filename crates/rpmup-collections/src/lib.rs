//! An insertion-ordered sequence with an O(1) hash index by a caller-chosen
//! key, modeled on `ZifArray`: a `GPtrArray` paired with a `GHashTable` of
//! keys to indices.

use std::collections::HashMap;
use std::hash::Hash;

/// Ordered collection of `T`, indexed by a key extracted from each element
/// at construction time. The key function is fixed for the lifetime of the
/// collection, so there is no way to mutate it after insertion has begun.
pub struct KeyedVec<T, K, F>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    items: Vec<T>,
    index: HashMap<K, usize>,
    key_fn: F,
}

impl<T, K, F> KeyedVec<T, K, F>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    pub fn new(key_fn: F) -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
            key_fn,
        }
    }

    /// Insert `item`, preserving insertion order. Returns `false` without
    /// modifying the collection if the key already exists.
    pub fn add(&mut self, item: T) -> bool {
        let key = (self.key_fn)(&item);
        if self.index.contains_key(&key) {
            return false;
        }
        let position = self.items.len();
        self.items.push(item);
        self.index.insert(key, position);
        true
    }

    pub fn lookup_by_key(&self, key: &K) -> Option<&T> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    /// Remove the element keyed by `key`, if present, preserving the
    /// relative order of the remaining elements.
    pub fn remove_by_key(&mut self, key: &K) -> Option<T> {
        let position = self.index.remove(key)?;
        let item = self.items.remove(position);
        for idx in self.index.values_mut() {
            if *idx > position {
                *idx -= 1;
            }
        }
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<'a, T, K, F> IntoIterator for &'a KeyedVec<T, K, F>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Entry {
        id: String,
        value: u32,
    }

    fn keyed() -> KeyedVec<Entry, String, impl Fn(&Entry) -> String> {
        KeyedVec::new(|e: &Entry| e.id.clone())
    }

    #[test]
    fn add_then_lookup_by_key() {
        let mut arr = keyed();
        assert!(arr.add(Entry { id: "a".into(), value: 1 }));
        assert_eq!(arr.lookup_by_key(&"a".to_string()).unwrap().value, 1);
    }

    #[test]
    fn add_fails_on_duplicate_key() {
        let mut arr = keyed();
        assert!(arr.add(Entry { id: "a".into(), value: 1 }));
        assert!(!arr.add(Entry { id: "a".into(), value: 2 }));
        assert_eq!(arr.len(), 1);
        assert_eq!(arr.lookup_by_key(&"a".to_string()).unwrap().value, 1);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut arr = keyed();
        arr.add(Entry { id: "b".into(), value: 2 });
        arr.add(Entry { id: "a".into(), value: 1 });
        let ids: Vec<&str> = arr.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn remove_by_key_shifts_index() {
        let mut arr = keyed();
        arr.add(Entry { id: "a".into(), value: 1 });
        arr.add(Entry { id: "b".into(), value: 2 });
        arr.add(Entry { id: "c".into(), value: 3 });
        let removed = arr.remove_by_key(&"b".to_string()).unwrap();
        assert_eq!(removed.value, 2);
        assert_eq!(arr.len(), 2);
        assert_eq!(arr.lookup_by_key(&"c".to_string()).unwrap().value, 3);
    }
}
