//! Fixed-capacity object pool (arena + index), single-threaded.
//!
//! Ported from a pointer-arithmetic placement-new pool (one thread owns the
//! whole pool) into the arena-plus-index shape the design notes recommend:
//! callers hold a `PoolIndex`, never a reference, so there is no lifetime to
//! manage and no aliasing hazard across the intrusive lists built on top.

use crate::types::{PoolIndex, POOL_INDEX_INVALID};

pub struct Pool<T> {
    slots: Vec<Option<T>>,
    cursor: usize,
    len: usize,
}

impl<T> Pool<T> {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Pool {
            slots,
            cursor: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Constructs `value` into the next free slot, found by a linear scan
    /// from the cursor that wraps once. Fatal if the pool is exhausted: the
    /// caller is expected to have sized capacity for worst-case demand.
    pub fn allocate(&mut self, value: T) -> PoolIndex {
        assert!(
            self.len < self.slots.len(),
            "object pool exhausted: capacity {} used up",
            self.slots.len()
        );
        let capacity = self.slots.len();
        for step in 0..capacity {
            let idx = (self.cursor + step) % capacity;
            if self.slots[idx].is_none() {
                self.slots[idx] = Some(value);
                self.cursor = (idx + 1) % capacity;
                self.len += 1;
                return idx as PoolIndex;
            }
        }
        unreachable!("pool reported free capacity but no free slot was found");
    }

    /// Returns the slot at `index` to the pool. Asserts the index is
    /// in-range and currently occupied; both are invariant violations if
    /// they fail (fatal, per the error-handling design).
    pub fn deallocate(&mut self, index: PoolIndex) -> T {
        let idx = index as usize;
        assert!(idx < self.slots.len(), "pool index {idx} out of range");
        let value = self.slots[idx]
            .take()
            .unwrap_or_else(|| panic!("pool index {idx} was already free"));
        self.len -= 1;
        value
    }

    pub fn get(&self, index: PoolIndex) -> &T {
        let idx = index as usize;
        self.slots[idx]
            .as_ref()
            .unwrap_or_else(|| panic!("pool index {idx} is not in use"))
    }

    pub fn get_mut(&mut self, index: PoolIndex) -> &mut T {
        let idx = index as usize;
        self.slots[idx]
            .as_mut()
            .unwrap_or_else(|| panic!("pool index {idx} is not in use"))
    }

    pub fn is_valid(&self, index: PoolIndex) -> bool {
        index != POOL_INDEX_INVALID
            && (index as usize) < self.slots.len()
            && self.slots[index as usize].is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_deallocate_reuses_slots() {
        let mut pool: Pool<u32> = Pool::new(2);
        let a = pool.allocate(1);
        let b = pool.allocate(2);
        assert_eq!(pool.len(), 2);
        pool.deallocate(a);
        let c = pool.allocate(3);
        assert_eq!(c, a);
        assert_eq!(*pool.get(b), 2);
        assert_eq!(*pool.get(c), 3);
    }

    #[test]
    #[should_panic(expected = "object pool exhausted")]
    fn exhaustion_is_fatal() {
        let mut pool: Pool<u32> = Pool::new(1);
        pool.allocate(1);
        pool.allocate(2);
    }

    #[test]
    #[should_panic(expected = "was already free")]
    fn double_free_is_fatal() {
        let mut pool: Pool<u32> = Pool::new(1);
        let a = pool.allocate(1);
        pool.deallocate(a);
        pool.deallocate(a);
    }
}
