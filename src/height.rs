use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread::{self, ThreadId};

use oorandom::Rand32;


/// The maximum height (number of tower levels) any node may carry.
///
/// With `p = 1/2`, this supports on the order of `2^MAX_HEIGHT` entries before the
/// expected seek cost grows past what the fixed height accounts for.
pub const MAX_HEIGHT: usize = 20;

thread_local! {
    static HEIGHT_PRNG: RefCell<Option<Rand32>> = const { RefCell::new(None) };
}

/// Draws a random height in `1..=MAX_HEIGHT`, geometrically distributed with `p = 1/2`.
///
/// The source is a `oorandom::Rand32` seeded once per thread, the first time this
/// function is called on that thread, from `seed` mixed with the calling thread's id.
/// Because the generator lives in thread-local storage, level selection never contends
/// across threads and never sits on the CAS-retry path of [`Skiplist::add`](crate::Skiplist::add).
pub(crate) fn random_node_height(seed: u64) -> usize {
    HEIGHT_PRNG.with(|cell| {
        let mut slot = cell.borrow_mut();
        let prng = slot.get_or_insert_with(|| Rand32::new(mix_seed(seed, thread::current().id())));

        let mut height = 1;
        while height < MAX_HEIGHT && prng.rand_u32() % 2 == 0 {
            height += 1;
        }
        height
    })
}

fn mix_seed(seed: u64, id: ThreadId) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    id.hash(&mut hasher);
    hasher.finish()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_is_within_bounds() {
        for _ in 0..10_000 {
            let h = random_node_height(42);
            assert!((1..=MAX_HEIGHT).contains(&h));
        }
    }

    #[test]
    fn same_seed_same_thread_is_deterministic() {
        // The thread-local generator is seeded once per thread; a fresh process-level
        // call sequence from the same seed on the same thread is therefore reproducible
        // only for the first draw in a given thread's lifetime, so we just check bounds
        // here rather than exact sequences (the generator is shared across calls below).
        let heights: Vec<_> = (0..100).map(|_| random_node_height(7)).collect();
        assert!(heights.iter().all(|&h| (1..=MAX_HEIGHT).contains(&h)));
    }
}
