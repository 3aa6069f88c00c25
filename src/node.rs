use std::sync::atomic::{AtomicU32, Ordering};

use crate::arena::Arena;
use crate::error::ArenaFull;
use crate::height::MAX_HEIGHT;

/// Bytes used by the fixed part of a node record: `key_offset`, `key_size`,
/// `value_offset`, `value_size`, `height`, each a `u32`.
const HEADER_SIZE: u32 = 20;
const SLOT_SIZE: u32 = 4;

/// The arena offset used as a "no link" / "no node" sentinel.
pub(crate) const NULL: u32 = 0;

/// Size-related constants and accessors for the node record laid out in the arena as:
/// `[header (20 bytes)][tower (height * 4 bytes)]`, with key and value bytes allocated
/// separately (and, absent concurrent allocations racing in between, immediately
/// following the node record in the arena, since both are bump-allocated back to back).
#[derive(Debug)]
pub struct Node;

impl Node {
    /// The largest a single node record (header plus a full-height tower) can be.
    pub const MAX_SIZE: u32 = HEADER_SIZE + MAX_HEIGHT as u32 * SLOT_SIZE;
}

/// Allocates a node record (header + tower) of the given height, plus separate
/// allocations for the key and value bytes, and writes everything but the tower links
/// (which the caller splices in separately, per level).
pub(crate) fn alloc(
    arena: &Arena,
    height: usize,
    key: &[u8],
    value: &[u8],
) -> Result<u32, ArenaFull> {
    debug_assert!((1..=MAX_HEIGHT).contains(&height));

    let key_len = key.len() as u32;
    let value_len = value.len() as u32;

    let key_offset = if key.is_empty() {
        NULL
    } else {
        let offset = arena.alloc(key_len, 1)?;
        // SAFETY: just allocated, not yet published.
        unsafe { arena.get_bytes_mut(offset, key_len) }.copy_from_slice(key);
        offset
    };
    let value_offset = if value.is_empty() {
        NULL
    } else {
        let offset = arena.alloc(value_len, 1)?;
        // SAFETY: just allocated, not yet published.
        unsafe { arena.get_bytes_mut(offset, value_len) }.copy_from_slice(value);
        offset
    };

    let record_len = HEADER_SIZE + height as u32 * SLOT_SIZE;
    let node = arena.alloc(record_len, 4)?;

    // SAFETY: `node` was just allocated and is not yet published.
    let header = unsafe { arena.get_bytes_mut(node, record_len) };
    header[0..4].copy_from_slice(&key_offset.to_le_bytes());
    header[4..8].copy_from_slice(&key_len.to_le_bytes());
    header[8..12].copy_from_slice(&value_offset.to_le_bytes());
    header[12..16].copy_from_slice(&value_len.to_le_bytes());
    header[16..20].copy_from_slice(&(height as u32).to_le_bytes());
    header[20..].fill(0);

    Ok(node)
}

fn field(arena: &Arena, node: u32, byte_offset: u32) -> u32 {
    let bytes = arena.get_bytes(node + byte_offset, 4);
    debug_assert_eq!(bytes.len(), 4, "get_bytes(.., 4) always returns exactly 4 bytes");
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub(crate) fn key_len(arena: &Arena, node: u32) -> u32 {
    field(arena, node, 4)
}

pub(crate) fn value_len(arena: &Arena, node: u32) -> u32 {
    field(arena, node, 12)
}

pub(crate) fn height(arena: &Arena, node: u32) -> usize {
    field(arena, node, 16) as usize
}

pub(crate) fn key<'a>(arena: &'a Arena, node: u32) -> &'a [u8] {
    let offset = field(arena, node, 0);
    arena.get_bytes(offset, key_len(arena, node))
}

pub(crate) fn value<'a>(arena: &'a Arena, node: u32) -> &'a [u8] {
    let offset = field(arena, node, 8);
    arena.get_bytes(offset, value_len(arena, node))
}

/// Returns the atomic tower slot for `node` at `level`.
///
/// # Safety
///
/// `level` must be strictly less than the node's own `height`.
pub(crate) unsafe fn tower_slot<'a>(arena: &'a Arena, node: u32, level: usize) -> &'a AtomicU32 {
    let byte_offset = node + HEADER_SIZE + level as u32 * SLOT_SIZE;
    // SAFETY: forwarded to the caller.
    unsafe { arena.atomic_u32(byte_offset) }
}

/// Acquire-loads the forward link at `level` for `node`.
pub(crate) fn load_next(arena: &Arena, node: u32, level: usize) -> u32 {
    // SAFETY: callers only pass levels within the node's own height (checked by the
    // skiplist search/insert logic against the node's observed height).
    unsafe { tower_slot(arena, node, level) }.load(Ordering::Acquire)
}

/// Plain-stores the forward link at `level` for `node`.
///
/// Used only before `node` has been published at level 0, when no other thread can
/// observe this slot.
pub(crate) fn store_next(arena: &Arena, node: u32, level: usize, next: u32) {
    // SAFETY: see `load_next`.
    unsafe { tower_slot(arena, node, level) }.store(next, Ordering::Release);
}

/// Attempts to CAS the forward link at `level` for `node` from `expected` to `new`.
pub(crate) fn cas_next(
    arena: &Arena,
    node: u32,
    level: usize,
    expected: u32,
    new: u32,
) -> Result<u32, u32> {
    // SAFETY: see `load_next`.
    unsafe { tower_slot(arena, node, level) }.compare_exchange(
        expected,
        new,
        Ordering::Release,
        Ordering::Acquire,
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_key_and_value() {
        let arena = Arena::new(4096);
        let node = alloc(&arena, 3, b"hello", b"world").unwrap();
        assert_eq!(key(&arena, node), b"hello");
        assert_eq!(value(&arena, node), b"world");
        assert_eq!(height(&arena, node), 3);
    }

    #[test]
    fn empty_key_and_value_round_trip() {
        let arena = Arena::new(4096);
        let node = alloc(&arena, 1, &[], &[]).unwrap();
        assert_eq!(key(&arena, node), b"" as &[u8]);
        assert_eq!(value(&arena, node), b"" as &[u8]);
    }

    #[test]
    fn tower_links_start_at_null() {
        let arena = Arena::new(4096);
        let node = alloc(&arena, 4, b"k", b"v").unwrap();
        for level in 0..4 {
            assert_eq!(load_next(&arena, node, level), NULL);
        }
    }

    #[test]
    fn cas_next_succeeds_from_expected() {
        let arena = Arena::new(4096);
        let node = alloc(&arena, 2, b"k", b"v").unwrap();
        assert!(cas_next(&arena, node, 0, NULL, 77).is_ok());
        assert_eq!(load_next(&arena, node, 0), 77);
        assert!(cas_next(&arena, node, 0, NULL, 99).is_err());
    }
}
