use std::cmp::Ordering;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::arena::Arena;
use crate::comparator::Comparator;
use crate::error::AddError;
use crate::height::{random_node_height, MAX_HEIGHT};
use crate::iter::Iter;
use crate::node::{self, NULL};

/// Seed used by [`Skiplist::new`] when the caller has no need for a reproducible
/// level-selection sequence.
const DEFAULT_SEED: u64 = 0x5bd1_e995;

/// A hook, compiled to nothing outside test configurations, that yields between an
/// inserter deciding its splice target and attempting the CAS. Widens the race window
/// for tests that want to provoke concurrent splices at the same `(prev, next)` pair.
#[cfg(test)]
#[inline]
fn yield_for_testing() {
    std::thread::yield_now();
}

#[cfg(not(test))]
#[inline(always)]
fn yield_for_testing() {}

struct Inner<Cmp> {
    arena:  Arena,
    head:   u32,
    height: AtomicU32,
    cmp:    Cmp,
    seed:   u64,
}

/// A concurrent, append-only ordered map of byte keys to byte values, backed by a
/// fixed-capacity [`Arena`] and spliced together with lock-free compare-and-swap.
///
/// Cloning a `Skiplist` is cheap: clones share the same underlying arena and nodes via
/// an internal [`Arc`], so inserts made through one clone are immediately visible
/// through all others.
pub struct Skiplist<Cmp> {
    inner: Arc<Inner<Cmp>>,
}

impl<Cmp> Clone for Skiplist<Cmp> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<Cmp> std::fmt::Debug for Skiplist<Cmp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skiplist")
            .field("height", &self.inner.height.load(AtomicOrdering::Relaxed))
            .field("arena", &self.inner.arena)
            .finish_non_exhaustive()
    }
}

impl<Cmp: Comparator<[u8]>> Skiplist<Cmp> {
    /// Creates a new, empty skiplist over `arena`, ordered by `cmp`.
    ///
    /// Uses a fixed default seed for level selection; see [`Skiplist::with_seed`] for
    /// reproducible behavior in tests.
    ///
    /// # Panics
    ///
    /// Panics if `arena` is too small to hold even the head sentinel node
    /// (`arena.capacity() < Node::MAX_SIZE`, roughly).
    #[must_use]
    pub fn new(arena: Arena, cmp: Cmp) -> Self {
        Self::with_seed(arena, cmp, DEFAULT_SEED)
    }

    /// As [`Skiplist::new`], but with an explicit seed for the level-selection source.
    ///
    /// # Panics
    ///
    /// Panics if `arena` is too small to hold even the head sentinel node.
    #[must_use]
    pub fn with_seed(arena: Arena, cmp: Cmp, seed: u64) -> Self {
        #[expect(
            clippy::expect_used,
            reason = "documented panic condition: an arena too small for even the head \
                      sentinel cannot hold any entries, so failing fast here is preferable \
                      to surfacing `ArenaFull` from the first call to `add`",
        )]
        let head = node::alloc(&arena, MAX_HEIGHT, &[], &[])
            .expect("arena must have room for the head sentinel node");

        Self {
            inner: Arc::new(Inner {
                arena,
                head,
                height: AtomicU32::new(1),
                cmp,
                seed,
            }),
        }
    }

    /// Inserts `key` mapping to `value`.
    ///
    /// Returns [`AddError::RecordExists`] if an entry with an equal key is already
    /// visible, or [`AddError::ArenaFull`] if the arena cannot host the new node plus
    /// its key and value bytes. An empty key or value is a valid entry.
    pub fn add(&self, key: &[u8], value: &[u8]) -> Result<(), AddError> {
        let arena = self.arena();

        let (mut prev, mut next, search_top) = self.find_splice(key);
        if self.is_equal(next[0], key) {
            tracing::debug!("rejecting duplicate key during add");
            return Err(AddError::RecordExists);
        }

        let height = random_node_height(self.inner.seed);
        if height > search_top {
            self.raise_height(height);
        }

        let new_node = node::alloc(arena, height, key, value)?;
        for level in 0..height {
            node::store_next(arena, new_node, level, next[level]);
        }

        for level in 0..height {
            loop {
                yield_for_testing();
                match node::cas_next(arena, prev[level], level, next[level], new_node) {
                    Ok(_) => break,
                    Err(_) => {
                        let (new_prev, new_next) = self.advance_at_level(prev[level], level, key);

                        if level == 0 && new_next != NULL && self.is_equal(new_next, key) {
                            tracing::debug!(
                                "lost the race to insert a duplicate key during the level-0 CAS",
                            );
                            return Err(AddError::RecordExists);
                        }

                        prev[level] = new_prev;
                        next[level] = new_next;
                        node::store_next(arena, new_node, level, next[level]);
                    },
                }
            }
        }

        Ok(())
    }

    /// The current observed maximum height among all nodes (monotonically non-decreasing).
    #[must_use]
    pub fn height(&self) -> u32 {
        self.inner.height.load(AtomicOrdering::Acquire)
    }

    /// The arena's current allocation cursor. Not a count of entries; exposed so callers
    /// can decide when to flush or rotate a memtable.
    #[must_use]
    pub fn len_estimate(&self) -> u32 {
        self.arena().len()
    }

    /// Creates a cursor over this skiplist's entries.
    #[must_use]
    pub fn new_iterator(&self) -> Iter<'_, Cmp> {
        Iter::new(self)
    }

    pub(crate) fn arena(&self) -> &Arena {
        &self.inner.arena
    }

    pub(crate) fn head(&self) -> u32 {
        self.inner.head
    }

    pub(crate) fn cmp(&self, lhs: &[u8], rhs: &[u8]) -> Ordering {
        self.inner.cmp.cmp(lhs, rhs)
    }

    fn is_equal(&self, node: u32, key: &[u8]) -> bool {
        node != NULL && self.cmp(crate::node::key(self.arena(), node), key) == Ordering::Equal
    }

    /// Walks forward from `start` at `level`, stopping at the last node with key
    /// strictly less than `key`. Returns `(prev, next)`.
    pub(crate) fn advance_at_level(&self, start: u32, level: usize, key: &[u8]) -> (u32, u32) {
        let arena = self.arena();
        let mut x = start;
        loop {
            let next = node::load_next(arena, x, level);
            if next == NULL {
                return (x, NULL);
            }
            if self.cmp(node::key(arena, next), key) == Ordering::Less {
                x = next;
            } else {
                return (x, next);
            }
        }
    }

    /// Descends from the head at the current observed height, recording, for every
    /// searched level, the predecessor and successor of `key`. Levels above the
    /// searched height keep their default `(head, NULL)` entries.
    fn find_splice(&self, key: &[u8]) -> ([u32; MAX_HEIGHT], [u32; MAX_HEIGHT], usize) {
        let search_top = self.height() as usize;
        let mut prev = [self.head(); MAX_HEIGHT];
        let mut next = [NULL; MAX_HEIGHT];

        let mut x = self.head();
        for level in (0..search_top).rev() {
            let (p, n) = self.advance_at_level(x, level, key);
            prev[level] = p;
            next[level] = n;
            x = p;
        }

        (prev, next, search_top)
    }

    /// The first node in the list (the level-0 successor of the head), or `NULL` if
    /// the list is empty.
    pub(crate) fn first_node(&self) -> u32 {
        node::load_next(self.arena(), self.head(), 0)
    }

    /// The rightmost node in the list, or `NULL` if the list is empty.
    pub(crate) fn last_node(&self) -> u32 {
        let arena = self.arena();
        let mut x = self.head();
        for level in (0..self.height() as usize).rev() {
            loop {
                let next = node::load_next(arena, x, level);
                if next == NULL {
                    break;
                }
                x = next;
            }
        }
        if x == self.head() { NULL } else { x }
    }

    /// The least node whose key is `>= key`, or `NULL` if none exists.
    pub(crate) fn seek_ge_node(&self, key: &[u8]) -> u32 {
        let mut x = self.head();
        for level in (0..self.height() as usize).rev() {
            let (p, _next) = self.advance_at_level(x, level, key);
            x = p;
        }
        node::load_next(self.arena(), x, 0)
    }

    /// The greatest node whose key is `< key`, or `NULL` if none exists.
    pub(crate) fn seek_lt_node(&self, key: &[u8]) -> u32 {
        let mut x = self.head();
        for level in (0..self.height() as usize).rev() {
            let (p, _next) = self.advance_at_level(x, level, key);
            x = p;
        }
        if x == self.head() { NULL } else { x }
    }

    /// Raises the observed maximum height to `desired` via compare-and-swap, if it
    /// is not already at least that high.
    fn raise_height(&self, desired: usize) {
        let desired = desired as u32;
        let mut current = self.inner.height.load(AtomicOrdering::Acquire);
        while desired > current {
            match self.inner.height.compare_exchange_weak(
                current,
                desired,
                AtomicOrdering::Release,
                AtomicOrdering::Acquire,
            ) {
                Ok(_) => {
                    tracing::debug!(new_height = desired, "raised observed skiplist height");
                    return;
                },
                Err(observed) => current = observed,
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::DefaultComparator;

    fn new_list(capacity: u32) -> Skiplist<DefaultComparator> {
        Skiplist::with_seed(Arena::new(capacity), DefaultComparator, 1)
    }

    #[test]
    fn insert_and_reject_duplicate() {
        let list = new_list(1 << 16);
        assert!(list.add(b"key1", b"v00001").is_ok());
        assert!(list.add(b"key3", b"v00003").is_ok());
        assert!(list.add(b"key2", b"v00002").is_ok());
        assert_eq!(list.add(b"key2", b"other").unwrap_err(), AddError::RecordExists);
    }

    #[test]
    fn empty_key_and_value_are_valid() {
        let list = new_list(1 << 16);
        assert!(list.add(&[], &[]).is_ok());
        let mut iter = list.new_iterator();
        assert!(iter.seek_ge(&[]));
        assert_eq!(iter.key(), b"" as &[u8]);
    }

    #[test]
    fn arena_full_is_reported_and_sticky() {
        let list = new_list(1000);
        let mut saw_full = false;
        for i in 0..100u32 {
            let key = format!("{i:05}");
            let value = format!("v{i:05}");
            if list.add(key.as_bytes(), value.as_bytes()).is_err() {
                saw_full = true;
                break;
            }
        }
        assert!(saw_full);
        assert_eq!(list.add(b"someval", &[]).unwrap_err(), AddError::ArenaFull(crate::error::ArenaFull));
    }

    #[test]
    fn height_is_monotonic_and_bounded() {
        let list = new_list(1 << 16);
        let mut last = list.height();
        for i in 0..500u32 {
            let key = format!("{i:05}");
            list.add(key.as_bytes(), b"v").unwrap();
            let now = list.height();
            assert!(now >= last);
            assert!(now as usize <= MAX_HEIGHT);
            last = now;
        }
    }
}
