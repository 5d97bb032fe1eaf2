use crate::hashing::HashMap;
use std::hash::Hash;

const NIL: u32 = u32::MAX;

struct Slot<K, V> {
    previous: u32,
    next: u32,
    entry: Option<(K, V)>,
}

/// Fixed-capacity map that forgets its least recently used entry when full.
///
/// Entries live in a preallocated slab and are linked by index (NIL for "none") instead of by
/// pointer. The head is the most recently used entry.
pub struct LruCache<K, V> {
    slots: Vec<Slot<K, V>>,
    free: Vec<u32>,
    head: u32,
    tail: u32,
    lookup: HashMap<K, u32>,
}

impl<K: Clone + Eq + Hash, V> LruCache<K, V> {
    pub fn new(capacity: u32) -> LruCache<K, V> {
        assert!(capacity > 2);
        let mut slots = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            slots.push(Slot {
                previous: NIL,
                next: NIL,
                entry: None,
            });
        }

        // Pop from the back so slot 0 is handed out first
        let free = (0..capacity).rev().collect();

        LruCache {
            slots,
            free,
            head: NIL,
            tail: NIL,
            lookup: HashMap::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    pub fn contains(
        &self,
        k: &K,
    ) -> bool {
        self.lookup.contains_key(k)
    }

    pub fn get(
        &mut self,
        k: &K,
        mark_as_recently_used: bool,
    ) -> Option<&V> {
        let index = *self.lookup.get(k)?;
        if mark_as_recently_used {
            self.unlink(index);
            self.push_front(index);
        }

        self.slots[index as usize].entry.as_ref().map(|(_, v)| v)
    }

    /// Inserts or replaces `k`, making it the most recently used entry. If the cache was full, the
    /// least recently used entry is evicted and returned.
    pub fn insert(
        &mut self,
        k: K,
        v: V,
    ) -> Option<(K, V)> {
        if let Some(&index) = self.lookup.get(&k) {
            self.unlink(index);
            self.push_front(index);
            self.slots[index as usize].entry = Some((k, v));
            return None;
        }

        let mut evicted = None;
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = self.tail;
                self.unlink(index);
                evicted = self.slots[index as usize].entry.take();
                if let Some((evicted_key, _)) = &evicted {
                    self.lookup.remove(evicted_key);
                }
                index
            }
        };

        self.lookup.insert(k.clone(), index);
        self.slots[index as usize].entry = Some((k, v));
        self.push_front(index);
        evicted
    }

    pub fn remove(
        &mut self,
        k: &K,
    ) -> Option<V> {
        let index = self.lookup.remove(k)?;
        self.unlink(index);
        self.free.push(index);
        self.slots[index as usize].entry.take().map(|(_, v)| v)
    }

    pub fn clear(&mut self) {
        while self.head != NIL {
            let index = self.head;
            self.unlink(index);
            self.slots[index as usize].entry = None;
            self.free.push(index);
        }
        self.lookup.clear();
    }

    fn unlink(
        &mut self,
        index: u32,
    ) {
        let previous = self.slots[index as usize].previous;
        let next = self.slots[index as usize].next;

        if previous == NIL {
            self.head = next;
        } else {
            self.slots[previous as usize].next = next;
        }

        if next == NIL {
            self.tail = previous;
        } else {
            self.slots[next as usize].previous = previous;
        }

        self.slots[index as usize].previous = NIL;
        self.slots[index as usize].next = NIL;
    }

    fn push_front(
        &mut self,
        index: u32,
    ) {
        self.slots[index as usize].next = self.head;
        if self.head != NIL {
            self.slots[self.head as usize].previous = index;
        }
        self.head = index;
        if self.tail == NIL {
            self.tail = index;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::RequestId;

    #[test]
    fn check_lru_gets_full() {
        let mut lru_cache = LruCache::new(3);
        assert!(lru_cache.insert(RequestId(1), ()).is_none());
        assert!(lru_cache.insert(RequestId(2), ()).is_none());
        assert!(lru_cache.insert(RequestId(3), ()).is_none());
        assert_eq!(lru_cache.len(), 3);

        // The oldest one is bumped
        let evicted = lru_cache.insert(RequestId(4), ());
        assert_eq!(evicted.map(|(k, _)| k), Some(RequestId(1)));
        assert!(!lru_cache.contains(&RequestId(1)));
        assert!(lru_cache.contains(&RequestId(2)));
        assert!(lru_cache.contains(&RequestId(3)));
        assert!(lru_cache.contains(&RequestId(4)));
        assert_eq!(lru_cache.len(), 3);
    }

    #[test]
    fn check_lru_deletes_least_recently_used() {
        let mut lru_cache = LruCache::new(3);
        lru_cache.insert(0, "a");
        lru_cache.insert(1, "b");
        lru_cache.insert(2, "c");

        // Touch the oldest, preventing it from being removed
        assert_eq!(lru_cache.get(&0, true), Some(&"a"));

        lru_cache.insert(3, "d");
        assert!(lru_cache.get(&0, false).is_some());
        assert!(lru_cache.get(&1, false).is_none());
        assert!(lru_cache.get(&2, false).is_some());
        assert!(lru_cache.get(&3, false).is_some());
    }

    #[test]
    fn check_peek_does_not_refresh() {
        let mut lru_cache = LruCache::new(3);
        lru_cache.insert(0, 0);
        lru_cache.insert(1, 1);
        lru_cache.insert(2, 2);

        assert!(lru_cache.get(&0, false).is_some());
        lru_cache.insert(3, 3);
        assert!(!lru_cache.contains(&0));
    }

    #[test]
    fn check_remove() {
        let mut lru_cache = LruCache::new(3);
        lru_cache.insert(0, 0);
        lru_cache.insert(1, 1);
        lru_cache.insert(2, 2);

        assert_eq!(lru_cache.remove(&0), Some(0));
        assert_eq!(lru_cache.remove(&2), Some(2));
        assert_eq!(lru_cache.remove(&1), Some(1));
        assert_eq!(lru_cache.remove(&1), None);
        assert!(lru_cache.is_empty());

        // Freed slots are reused without evicting anything
        assert!(lru_cache.insert(3, 3).is_none());
        assert!(lru_cache.insert(4, 4).is_none());
        assert!(lru_cache.insert(5, 5).is_none());
        assert!(lru_cache.get(&0, true).is_none());
        assert!(lru_cache.get(&3, true).is_some());
        assert_eq!(lru_cache.len(), 3);
    }

    #[test]
    fn check_reinsert_replaces_value() {
        let mut lru_cache = LruCache::new(3);
        lru_cache.insert(0, 0);
        lru_cache.insert(1, 1);
        lru_cache.insert(0, 10);
        assert_eq!(lru_cache.len(), 2);
        assert_eq!(lru_cache.get(&0, false), Some(&10));

        lru_cache.clear();
        assert!(lru_cache.is_empty());
        lru_cache.insert(7, 7);
        assert_eq!(lru_cache.get(&7, false), Some(&7));
    }
}
