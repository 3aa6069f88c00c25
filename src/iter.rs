use std::cmp::Ordering;

use crate::comparator::Comparator;
use crate::node::{self, NULL};
use crate::skiplist::Skiplist;

/// A cursor over a [`Skiplist`]'s entries.
///
/// Iterators are cheap value objects: creating one costs only the initial load of the
/// skiplist's observed height, and every operation is read-only with respect to the
/// skiplist. An iterator never re-reads from a node once it has moved past it; it only
/// moves forward or restarts a seek from the head.
pub struct Iter<'a, Cmp> {
    list:    &'a Skiplist<Cmp>,
    current: u32,
}

impl<Cmp> std::fmt::Debug for Iter<'_, Cmp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Iter")
            .field("list", self.list)
            .field("current", &self.current)
            .finish()
    }
}

impl<'a, Cmp: Comparator<[u8]>> Iter<'a, Cmp> {
    pub(crate) fn new(list: &'a Skiplist<Cmp>) -> Self {
        Self { list, current: NULL }
    }

    /// Positions at the first node, or leaves the iterator invalid if the list is empty.
    pub fn first(&mut self) {
        self.current = self.list.first_node();
    }

    /// Positions at the rightmost node, or leaves the iterator invalid if the list is
    /// empty.
    pub fn last(&mut self) {
        self.current = self.list.last_node();
    }

    /// Advances along the level-0 forward link. Becomes invalid at the end of the list.
    /// A no-op if the iterator is already invalid.
    pub fn next(&mut self) {
        if self.current != NULL {
            self.current = node::load_next(self.list.arena(), self.current, 0);
        }
    }

    /// Positions at the greatest node whose key is strictly less than the current key.
    /// Becomes invalid if there is no such node. A no-op if the iterator is already
    /// invalid.
    pub fn prev(&mut self) {
        if self.current == NULL {
            return;
        }
        let key = node::key(self.list.arena(), self.current);
        self.current = self.list.seek_lt_node(key);
    }

    /// Positions at the least node whose key is `>= key`. Returns `true` iff that
    /// node's key equals `key`. Invalid iff no such node exists.
    pub fn seek_ge(&mut self, key: &[u8]) -> bool {
        let candidate = self.list.seek_ge_node(key);
        self.current = candidate;
        self.is_exact(candidate, key)
    }

    /// Positions at the greatest node whose key is `<= key`. Returns `true` iff that
    /// node's key equals `key`. Invalid iff no such node exists (every key is strictly
    /// greater than `key`).
    pub fn seek_le(&mut self, key: &[u8]) -> bool {
        let ge = self.list.seek_ge_node(key);
        if self.is_exact(ge, key) {
            self.current = ge;
            return true;
        }
        self.current = self.list.seek_lt_node(key);
        false
    }

    /// Whether the cursor is positioned at a real node.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.current != NULL
    }

    /// The key at the current position.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not [`valid`](Self::valid).
    #[must_use]
    pub fn key(&self) -> &'a [u8] {
        assert!(self.valid(), "key() called on an invalid iterator");
        node::key(self.list.arena(), self.current)
    }

    /// The value at the current position.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not [`valid`](Self::valid).
    #[must_use]
    pub fn value(&self) -> &'a [u8] {
        assert!(self.valid(), "value() called on an invalid iterator");
        node::value(self.list.arena(), self.current)
    }

    fn is_exact(&self, node: u32, key: &[u8]) -> bool {
        node != NULL
            && self.list.cmp(crate::node::key(self.list.arena(), node), key) == Ordering::Equal
    }
}
