//! User IDs are handed out smallest-first so reconnecting players get the
//! short, stable ids they are used to.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Mutex;

#[derive(Debug)]
pub struct UidAllocator {
    free: Mutex<BinaryHeap<Reverse<i32>>>,
}

impl UidAllocator {
    /// Seed the allocator with ids `0..n`.
    pub fn new(n: usize) -> Self {
        let free = (0..n as i32).map(Reverse).collect();
        Self {
            free: Mutex::new(free),
        }
    }

    /// Take the smallest free id, or `None` when every seat is in use.
    pub fn acquire(&self) -> Option<i32> {
        self.free.lock().expect("uid heap poisoned").pop().map(|r| r.0)
    }

    pub fn release(&self, uid: i32) {
        self.free.lock().expect("uid heap poisoned").push(Reverse(uid));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_out_smallest_free_id() {
        let uids = UidAllocator::new(100);
        assert_eq!(uids.acquire(), Some(0));
        assert_eq!(uids.acquire(), Some(1));
        uids.release(0);
        assert_eq!(uids.acquire(), Some(0));
        assert_eq!(uids.acquire(), Some(2));
    }

    #[test]
    fn exhausts_and_recovers() {
        let uids = UidAllocator::new(2);
        assert_eq!(uids.acquire(), Some(0));
        assert_eq!(uids.acquire(), Some(1));
        assert_eq!(uids.acquire(), None);
        uids.release(1);
        assert_eq!(uids.acquire(), Some(1));
    }

    #[test]
    fn acquire_always_returns_minimum_of_free_set() {
        let uids = UidAllocator::new(10);
        for _ in 0..10 {
            uids.acquire();
        }
        for id in [7, 3, 9, 0] {
            uids.release(id);
        }
        assert_eq!(uids.acquire(), Some(0));
        assert_eq!(uids.acquire(), Some(3));
        assert_eq!(uids.acquire(), Some(7));
        assert_eq!(uids.acquire(), Some(9));
        assert_eq!(uids.acquire(), None);
    }

    #[test]
    fn concurrent_acquire_release_stays_consistent() {
        use std::sync::Arc;

        let uids = Arc::new(UidAllocator::new(64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let uids = uids.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    if let Some(id) = uids.acquire() {
                        uids.release(id);
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // Every id must be back and unique.
        let mut seen = Vec::new();
        while let Some(id) = uids.acquire() {
            seen.push(id);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..64).collect::<Vec<_>>());
    }
}
