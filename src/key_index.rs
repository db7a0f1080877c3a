//! KeyIndex: the key→slot and slot→key mappings.
//!
//! Keys are stored once, in `by_slot`, together with their precomputed hash.
//! `by_key` is a bare `HashTable` of slot numbers that resolves key equality
//! through `by_slot`, so the two directions cannot hold diverging copies of a
//! key. Every slot in `by_key` has an entry in `by_slot` and vice versa.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_table::Entry;
use hashbrown::{HashMap, HashTable};
use std::collections::hash_map::RandomState;

#[derive(Debug, Clone)]
struct Keyed<K> {
    key: K,
    hash: u64,
}

#[derive(Clone)]
pub(crate) struct KeyIndex<K, S = RandomState> {
    hasher: S,
    by_key: HashTable<usize>,
    by_slot: HashMap<usize, Keyed<K>>,
}

impl<K, S> KeyIndex<K, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    pub(crate) fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            by_key: HashTable::with_capacity(capacity),
            by_slot: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn hasher(&self) -> &S {
        &self.hasher
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    pub(crate) fn find<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.by_key
            .find(hash, |s| {
                self.by_slot
                    .get(s)
                    .map(|e| e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .copied()
    }

    pub(crate) fn key_of(&self, slot: usize) -> Option<&K> {
        self.by_slot.get(&slot).map(|e| &e.key)
    }

    /// Binds `key` to `slot`. If the key was already bound, its previous slot
    /// loses its reverse entry and is returned; the caller decides what
    /// happens to that slot's cell.
    pub(crate) fn bind(&mut self, key: K, slot: usize) -> Option<usize> {
        let hash = self.make_hash(&key);
        match self.by_key.entry(
            hash,
            |s| {
                self.by_slot
                    .get(s)
                    .map(|e| e.key == key)
                    .unwrap_or(false)
            },
            |s| self.by_slot.get(s).map(|e| e.hash).unwrap_or(0),
        ) {
            Entry::Occupied(mut o) => {
                let prev = core::mem::replace(o.get_mut(), slot);
                // The stored key is equal to `key`; keep it and move the entry.
                let keyed = self
                    .by_slot
                    .remove(&prev)
                    .unwrap_or(Keyed { key, hash });
                self.by_slot.insert(slot, keyed);
                Some(prev)
            }
            Entry::Vacant(v) => {
                v.insert(slot);
                self.by_slot.insert(slot, Keyed { key, hash });
                None
            }
        }
    }

    /// Removes `q` from both directions, returning the key and its slot.
    pub(crate) fn unbind_key<Q>(&mut self, q: &Q) -> Option<(K, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let entry = self
            .by_key
            .find_entry(hash, |s| {
                self.by_slot
                    .get(s)
                    .map(|e| e.key.borrow() == q)
                    .unwrap_or(false)
            })
            .ok()?;
        let (slot, _) = entry.remove();
        let keyed = self.by_slot.remove(&slot)?;
        Some((keyed.key, slot))
    }

    /// Removes whatever key is bound to `slot`, if any.
    pub(crate) fn unbind_slot(&mut self, slot: usize) -> Option<K> {
        let keyed = self.by_slot.remove(&slot)?;
        if let Ok(entry) = self.by_key.find_entry(keyed.hash, |&s| s == slot) {
            entry.remove();
        }
        Some(keyed.key)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = (usize, &K)> {
        self.by_slot.iter().map(|(&slot, e)| (slot, &e.key))
    }

    pub(crate) fn key_slots(&self) -> impl Iterator<Item = (&K, usize)> {
        self.by_key
            .iter()
            .filter_map(|&slot| self.by_slot.get(&slot).map(|e| (&e.key, slot)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> KeyIndex<String> {
        KeyIndex::with_capacity_and_hasher(0, RandomState::new())
    }

    /// Both directions agree for every bound slot.
    fn assert_inverse(ix: &KeyIndex<String>) {
        assert_eq!(ix.by_key.len(), ix.by_slot.len());
        for (slot, key) in ix.keys() {
            assert_eq!(ix.find(key.as_str()), Some(slot));
        }
        assert_eq!(ix.key_slots().count(), ix.len());
        for (key, slot) in ix.key_slots() {
            assert_eq!(ix.key_of(slot), Some(key));
        }
    }

    #[test]
    fn bind_and_find_borrowed() {
        let mut ix = index();
        assert_eq!(ix.bind("a".to_string(), 0), None);
        assert_eq!(ix.bind("".to_string(), 1), None);
        assert_eq!(ix.find("a"), Some(0));
        assert_eq!(ix.find(""), Some(1));
        assert_eq!(ix.find("b"), None);
        assert_eq!(ix.key_of(1).map(String::as_str), Some(""));
        assert_inverse(&ix);
    }

    #[test]
    fn rebind_moves_reverse_entry() {
        let mut ix = index();
        ix.bind("k".to_string(), 0);
        assert_eq!(ix.bind("k".to_string(), 3), Some(0));
        assert_eq!(ix.len(), 1);
        assert_eq!(ix.find("k"), Some(3));
        assert!(ix.key_of(0).is_none());
        assert_inverse(&ix);
    }

    #[test]
    fn unbind_by_key_and_by_slot() {
        let mut ix = index();
        ix.bind("a".to_string(), 0);
        ix.bind("b".to_string(), 1);

        assert_eq!(ix.unbind_key("a"), Some(("a".to_string(), 0)));
        assert_eq!(ix.unbind_key("a"), None);
        assert_eq!(ix.unbind_slot(1), Some("b".to_string()));
        assert_eq!(ix.unbind_slot(1), None);
        assert_eq!(ix.len(), 0);
        assert_inverse(&ix);
    }

    #[test]
    fn collisions_resolve_through_reverse_map() {
        #[derive(Clone, Default)]
        struct ConstBuildHasher;
        struct ConstHasher;
        impl BuildHasher for ConstBuildHasher {
            type Hasher = ConstHasher;
            fn build_hasher(&self) -> Self::Hasher {
                ConstHasher
            }
        }
        impl core::hash::Hasher for ConstHasher {
            fn write(&mut self, _bytes: &[u8]) {}
            fn finish(&self) -> u64 {
                0
            }
        }

        let mut ix: KeyIndex<String, ConstBuildHasher> =
            KeyIndex::with_capacity_and_hasher(0, ConstBuildHasher);
        for (slot, k) in ["a", "b", "c"].iter().enumerate() {
            ix.bind((*k).to_string(), slot);
        }
        ix.unbind_slot(1);
        assert_eq!(ix.find("a"), Some(0));
        assert_eq!(ix.find("b"), None);
        assert_eq!(ix.find("c"), Some(2));
    }
}
