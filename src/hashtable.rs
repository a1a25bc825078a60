//! Hash table of stored objects with O(1) removal by cached position,
//! grounded on `tchecker::collision_table_t`/`tchecker::hashtable_t`.
//!
//! The C++ original stores, inside each object, its own `(bucket, index)`
//! position so that removing an object never needs to scan its bucket.
//! [`HashtableEntry`] is the Rust equivalent of that embedded position: any
//! type stored in a [`CollisionTable`] implements it to cache where it last
//! landed. Removal still runs in O(1): a bucket removal is a `swap_remove`,
//! and the element swapped into the vacated slot has its cached position
//! corrected in the same call.

/// Implemented by values stored in a [`CollisionTable`] so the table can
/// stamp (and later read back) their bucket/index position.
pub trait HashtableEntry {
    fn cached_position(&self) -> Option<(usize, usize)>;
    fn set_cached_position(&mut self, position: Option<(usize, usize)>);
}

/// A bucketed collision table: objects with the same hash share a bucket
/// (a `Vec<T>`, the "collision list"), with no notion of equality of its
/// own — callers needing `find`/`contains` build that layer on top
/// (see [`crate::cover_graph`]).
pub struct CollisionTable<T: HashtableEntry> {
    buckets: Vec<Vec<T>>,
    size: usize,
}

impl<T: HashtableEntry> CollisionTable<T> {
    pub fn new(table_size: usize) -> Self {
        assert!(table_size >= 1, "collision table size must be at least 1");
        let mut buckets = Vec::with_capacity(table_size);
        buckets.resize_with(table_size, Vec::new);
        CollisionTable { buckets, size: 0 }
    }

    pub fn len(&self) -> usize {
        self.size
    }
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
    pub fn table_size(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) % self.buckets.len()
    }

    /// Stores `value` in the bucket for `hash`, stamping its cached
    /// position so it can be removed in O(1) later.
    pub fn insert(&mut self, hash: u64, mut value: T) {
        let bucket = self.bucket_of(hash);
        let list = &mut self.buckets[bucket];
        let index = list.len();
        value.set_cached_position(Some((bucket, index)));
        list.push(value);
        self.size += 1;
    }

    pub fn bucket(&self, hash: u64) -> &[T] {
        &self.buckets[self.bucket_of(hash)]
    }

    /// Removes the element at `value`'s cached position via `swap_remove`,
    /// fixing up the position of whichever element was moved into the
    /// vacated slot. Panics if `value` is not currently stored.
    pub fn remove(&mut self, value: &T) -> T {
        let (bucket, index) = value.cached_position().expect("value is not stored in this table");
        let list = &mut self.buckets[bucket];
        let removed = list.swap_remove(index);
        if let Some(moved) = list.get_mut(index) {
            moved.set_cached_position(Some((bucket, index)));
        }
        self.size -= 1;
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buckets.iter().flat_map(|b| b.iter())
    }
}

/// A [`CollisionTable`] plus an equality predicate, giving `find`/`contains`
/// — `tchecker::hashtable_t` layered on `collision_table_t`.
pub struct Hashtable<T: HashtableEntry> {
    table: CollisionTable<T>,
}

impl<T: HashtableEntry> Hashtable<T> {
    pub fn new(table_size: usize) -> Self {
        Hashtable { table: CollisionTable::new(table_size) }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn insert(&mut self, hash: u64, value: T) {
        self.table.insert(hash, value)
    }

    pub fn remove(&mut self, value: &T) -> T {
        self.table.remove(value)
    }

    pub fn find_by<F: Fn(&T) -> bool>(&self, hash: u64, eq: F) -> Option<&T> {
        self.table.bucket(hash).iter().find(|v| eq(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.table.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Entry {
        key: u32,
        position: Option<(usize, usize)>,
    }

    impl HashtableEntry for Entry {
        fn cached_position(&self) -> Option<(usize, usize)> {
            self.position
        }
        fn set_cached_position(&mut self, position: Option<(usize, usize)>) {
            self.position = position;
        }
    }

    fn hash_of(k: u32) -> u64 {
        k as u64
    }

    #[test]
    fn insert_then_find() {
        let mut t: Hashtable<Entry> = Hashtable::new(4);
        t.insert(hash_of(10), Entry { key: 10, position: None });
        t.insert(hash_of(14), Entry { key: 14, position: None }); // collides with 10 mod 4
        assert_eq!(t.len(), 2);
        let found = t.find_by(hash_of(14), |e| e.key == 14).unwrap();
        assert_eq!(found.key, 14);
    }

    #[test]
    fn remove_fixes_up_swapped_entry_position() {
        let mut t: CollisionTable<Entry> = CollisionTable::new(1);
        t.insert(0, Entry { key: 1, position: None });
        t.insert(0, Entry { key: 2, position: None });
        t.insert(0, Entry { key: 3, position: None });
        let first = t.bucket(0)[0].clone();
        t.remove(&first);
        assert_eq!(t.len(), 2);
        // key 3 (last) was swapped into position 0; its cached position
        // must now say so, or a further remove would panic/corrupt state.
        let remaining: Vec<u32> = t.iter().map(|e| e.key).collect();
        assert!(remaining.contains(&2));
        assert!(remaining.contains(&3));
        for e in t.iter() {
            let (b, i) = e.cached_position().unwrap();
            assert_eq!(&t.bucket(0)[i].key, &e.key);
            assert_eq!(b, 0);
        }
    }
}
