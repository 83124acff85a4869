//! Recency List Module
//!
//! Implements Least Recently Used tracking for per-shard eviction.

use std::collections::HashMap;
use std::hash::Hash;

/// Neighbours of a key in the recency order.
#[derive(Debug, Clone)]
struct Links<K> {
    prev: Option<K>,
    next: Option<K>,
}

// == Recency List ==
/// Tracks access order for LRU eviction.
///
/// Keys are linked to their neighbours through an index, so every operation
/// is O(1):
/// - Head = Least recently used
/// - Tail = Most recently used
///
/// Each key appears at most once.
#[derive(Debug)]
pub struct RecencyList<K> {
    links: HashMap<K, Links<K>>,
    head: Option<K>,
    tail: Option<K>,
}

impl<K> Default for RecencyList<K> {
    fn default() -> Self {
        Self {
            links: HashMap::new(),
            head: None,
            tail: None,
        }
    }
}

impl<K: Eq + Hash + Clone> RecencyList<K> {
    // == Constructor ==
    /// Creates a new empty recency list.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as recently used (moves it to the tail).
    ///
    /// An existing occurrence is unlinked first, so the key stays unique.
    pub fn touch(&mut self, key: &K) {
        if self.tail.as_ref() == Some(key) {
            return;
        }
        self.unlink(key);

        let prev = self.tail.replace(key.clone());
        match &prev {
            Some(p) => {
                if let Some(links) = self.links.get_mut(p) {
                    links.next = Some(key.clone());
                }
            }
            None => self.head = Some(key.clone()),
        }
        self.links.insert(key.clone(), Links { prev, next: None });
    }

    // == Remove ==
    /// Removes a key from the list.
    ///
    /// Removing an absent key, or removing from an empty list, is a no-op.
    pub fn remove(&mut self, key: &K) {
        self.unlink(key);
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if the list is empty.
    pub fn evict_oldest(&mut self) -> Option<K> {
        let oldest = self.head.clone()?;
        self.unlink(&oldest);
        Some(oldest)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.head.as_ref()
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    // == Contains ==
    /// Checks if a key is being tracked.
    pub fn contains(&self, key: &K) -> bool {
        self.links.contains_key(key)
    }

    // == Iter ==
    /// Iterates keys from least to most recently used.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            list: self,
            cursor: self.head.as_ref(),
        }
    }

    /// Detaches `key` and patches its neighbours, head and tail.
    fn unlink(&mut self, key: &K) {
        let Some(Links { prev, next }) = self.links.remove(key) else {
            return;
        };

        match &prev {
            Some(p) => {
                if let Some(links) = self.links.get_mut(p) {
                    links.next = next.clone();
                }
            }
            None => self.head = next.clone(),
        }
        match &next {
            Some(n) => {
                if let Some(links) = self.links.get_mut(n) {
                    links.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }
}

/// Iterator over a [`RecencyList`], oldest first.
pub struct Iter<'a, K> {
    list: &'a RecencyList<K>,
    cursor: Option<&'a K>,
}

impl<'a, K: Eq + Hash> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        self.cursor = self
            .list
            .links
            .get(current)
            .and_then(|links| links.next.as_ref());
        Some(current)
    }
}
