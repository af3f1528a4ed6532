//! A map keyed by sets, with subset and superset queries.
//!
//! Keys are sorted, duplicate-free slices. They are stored in a trie where
//! each edge is one element, so every stored set is a root-to-node path in
//! increasing order.

use std::collections::BTreeMap;

#[derive(Debug)]
struct Node<K, V> {
    value: Option<V>,
    children: BTreeMap<K, Node<K, V>>,
}

impl<K, V> Default for Node<K, V> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

impl<K: Ord, V> Node<K, V> {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    fn find_superset(&self, key: &[K], pred: &mut dyn FnMut(&V) -> bool) -> Option<&V> {
        match key.split_first() {
            None => {
                if let Some(v) = &self.value {
                    if pred(v) {
                        return Some(v);
                    }
                }
                self.children
                    .values()
                    .find_map(|child| child.find_superset(key, pred))
            }
            Some((first, rest)) => {
                // Elements below `first` are extra and may be skipped.
                for (k, child) in self.children.range(..=first) {
                    let found = if k == first {
                        child.find_superset(rest, pred)
                    } else {
                        child.find_superset(key, pred)
                    };
                    if found.is_some() {
                        return found;
                    }
                }
                None
            }
        }
    }

    fn find_subset(&self, key: &[K], pred: &mut dyn FnMut(&V) -> bool) -> Option<&V> {
        if let Some(v) = &self.value {
            if pred(v) {
                return Some(v);
            }
        }
        for (i, k) in key.iter().enumerate() {
            if let Some(child) = self.children.get(k) {
                if let Some(v) = child.find_subset(&key[i + 1..], pred) {
                    return Some(v);
                }
            }
        }
        None
    }

    fn retain(&mut self, pred: &mut dyn FnMut(&V) -> bool) -> usize {
        let mut removed = 0;
        if let Some(v) = &self.value {
            if !pred(v) {
                self.value = None;
                removed += 1;
            }
        }
        self.children.retain(|_, child| {
            removed += child.retain(pred);
            !child.is_empty()
        });
        removed
    }
}

#[derive(Debug)]
pub struct MapOfSets<K, V> {
    root: Node<K, V>,
    len: usize,
}

impl<K: Ord, V> Default for MapOfSets<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> MapOfSets<K, V> {
    pub fn new() -> Self {
        Self {
            root: Node::default(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.root = Node::default();
        self.len = 0;
    }

    fn check_key(key: &[K]) {
        debug_assert!(
            key.windows(2).all(|w| w[0] < w[1]),
            "Set keys should be sorted and free of duplicates"
        );
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn insert(&mut self, key: &[K], value: V) -> Option<V>
    where
        K: Clone,
    {
        Self::check_key(key);
        let mut node = &mut self.root;
        for k in key {
            node = node.children.entry(k.clone()).or_default();
        }
        let old = node.value.replace(value);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    pub fn lookup(&self, key: &[K]) -> Option<&V> {
        Self::check_key(key);
        let mut node = &self.root;
        for k in key {
            node = node.children.get(k)?;
        }
        node.value.as_ref()
    }

    /// A value stored under some superset of `key` satisfying `pred`.
    pub fn find_superset(&self, key: &[K], mut pred: impl FnMut(&V) -> bool) -> Option<&V> {
        Self::check_key(key);
        self.root.find_superset(key, &mut pred)
    }

    /// A value stored under some subset of `key` satisfying `pred`.
    pub fn find_subset(&self, key: &[K], mut pred: impl FnMut(&V) -> bool) -> Option<&V> {
        Self::check_key(key);
        self.root.find_subset(key, &mut pred)
    }

    /// Keep only the values satisfying `pred`. Returns the number removed.
    pub fn retain(&mut self, mut pred: impl FnMut(&V) -> bool) -> usize {
        let removed = self.root.retain(&mut pred);
        self.len -= removed;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn sample() -> MapOfSets<u32, &'static str> {
        let mut m = MapOfSets::new();
        m.insert(&[1, 3], "13");
        m.insert(&[1, 2, 3], "123");
        m.insert(&[2], "2");
        m.insert(&[], "empty");
        m
    }

    #[test]
    fn test_insert_lookup() {
        let mut m = sample();
        assert_eq!(m.len(), 4);
        assert_eq!(m.lookup(&[1, 3]), Some(&"13"));
        assert_eq!(m.lookup(&[1]), None);
        assert_eq!(m.lookup(&[]), Some(&"empty"));
        assert_eq!(m.insert(&[2], "two"), Some("2"));
        assert_eq!(m.len(), 4);
    }

    #[test]
    fn test_find_superset() {
        let m = sample();
        assert_eq!(m.find_superset(&[2, 3], |_| true), Some(&"123"));
        assert_eq!(m.find_superset(&[3], |v| *v != "13"), Some(&"123"));
        assert_eq!(m.find_superset(&[4], |_| true), None);
        assert_eq!(m.find_superset(&[1, 3], |v| v.len() == 3), Some(&"123"));
    }

    #[test]
    fn test_find_subset() {
        let m = sample();
        assert_eq!(m.find_subset(&[1, 3, 5], |v| !v.is_empty() && *v != "empty"), Some(&"13"));
        assert_eq!(m.find_subset(&[2, 7], |v| *v != "empty"), Some(&"2"));
        assert_eq!(m.find_subset(&[3], |v| *v != "empty"), None);
        assert_eq!(m.find_subset(&[3], |_| true), Some(&"empty"));
    }

    #[test]
    fn test_retain() {
        let mut m = sample();
        assert_eq!(m.retain(|v| v.len() != 2), 1);
        assert_eq!(m.len(), 3);
        assert_eq!(m.lookup(&[1, 3]), None);
        assert_eq!(m.lookup(&[1, 2, 3]), Some(&"123"));
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.lookup(&[]), None);
    }

    #[test]
    #[should_panic(expected = "sorted")]
    fn test_unsorted_key() {
        let mut m = MapOfSets::new();
        m.insert(&[3, 1], ());
    }
}
