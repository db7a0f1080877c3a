//! XMap: an insertion-ordered map whose values live in a flat slot store.
//!
//! Iteration walks the slot store directly, so it costs no more than walking
//! a `Vec`. Deletion leaves a tombstone in place; the slot can be handed out
//! again by `add_recycled`, and `rebuild_index` drops all tombstones and
//! renumbers the survivors.

use crate::error::Result;
use crate::key_index::KeyIndex;
use crate::slot_store::SlotStore;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use std::collections::hash_map::RandomState;
use std::collections::VecDeque;
use tracing::{debug, trace};

#[derive(Clone)]
pub struct XMap<K, V, S = RandomState> {
    store: SlotStore<V>,
    index: KeyIndex<K, S>,
}

impl<K, V> XMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, Default::default())
    }
}

impl<K, V> Default for XMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the slot store in slot order. Tombstones are yielded as
/// `None`.
pub struct Iter<'a, V> {
    it: core::slice::Iter<'a, Option<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = Option<&'a V>;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(Option::as_ref)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<V> Clone for Iter<'_, V> {
    fn clone(&self) -> Self {
        Iter {
            it: self.it.clone(),
        }
    }
}

/// Mutable iterator over the raw cells in slot order.
pub struct IterMut<'a, V> {
    it: core::slice::IterMut<'a, Option<V>>,
}

impl<'a, V> Iterator for IterMut<'a, V> {
    type Item = &'a mut Option<V>;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<V> ExactSizeIterator for IterMut<'_, V> {}

impl<K, V, S> XMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            store: SlotStore::with_capacity(capacity),
            index: KeyIndex::with_capacity_and_hasher(capacity, hasher),
        }
    }

    /// Number of keys that resolve to a slot.
    pub fn count(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.len() == 0
    }

    /// Number of slots queued for reuse.
    pub fn free_space(&self) -> usize {
        self.store.free_len()
    }

    /// Length of the slot store, tombstones included.
    pub fn slot_count(&self) -> usize {
        self.store.len()
    }

    /// Appends `value` in a new slot and binds `key` to it.
    ///
    /// If `key` was already bound, its old slot is left dangling: the cell
    /// keeps its value and still shows up in `iter()`, but no key refers to
    /// it. `rebuild_index` reclaims it. Use [`XMap::set`] to free the old
    /// slot instead.
    pub fn add(&mut self, key: K, value: V) -> usize {
        let slot = self.store.push(value);
        self.index.bind(key, slot);
        slot
    }

    /// Like [`XMap::add`], but a previous slot for `key` is tombstoned and
    /// queued for reuse, and its value returned.
    pub fn set(&mut self, key: K, value: V) -> (usize, Option<V>) {
        let slot = self.store.push(value);
        let prev = match self.index.bind(key, slot) {
            Some(old) => self.store.tombstone(old).ok().flatten(),
            None => None,
        };
        (slot, prev)
    }

    /// Writes `value` into the oldest free slot, or appends when none is
    /// free. Returns the slot used.
    ///
    /// A recycled slot may still be claimed by a key whose cell was removed
    /// with [`XMap::delete_at`]; that key is unbound first.
    pub fn add_recycled(&mut self, key: K, value: V) -> usize {
        match self.store.fill_free(value) {
            Ok(slot) => {
                if self.index.unbind_slot(slot).is_some() {
                    trace!(slot, "recycled slot had a stale key");
                }
                self.index.bind(key, slot);
                trace!(slot, free = self.store.free_len(), "recycled slot");
                slot
            }
            Err(value) => self.add(key, value),
        }
    }

    /// Replaces the value in `slot`, returning the previous value and a
    /// reference to the new one.
    ///
    /// Updating a tombstoned slot returns `None` as the previous value and
    /// brings the cell back to life without any key pointing at it. The slot
    /// leaves the free queue, so a later recycle cannot overwrite it.
    pub fn update(&mut self, slot: usize, value: V) -> Result<(Option<V>, &V)> {
        let (prev, new) = self.store.replace(slot, value)?;
        Ok((prev, &*new))
    }

    /// Removes `key` and tombstones its slot. Returns `None` if the key was
    /// not bound.
    pub fn delete<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (_key, slot) = self.index.unbind_key(key)?;
        trace!(slot, "delete");
        self.store.tombstone(slot).ok().flatten()
    }

    /// Tombstones `slot` without touching the key index.
    ///
    /// A key bound to `slot` keeps resolving to it through [`XMap::find`]
    /// until the slot is recycled or the map is rebuilt.
    pub fn delete_at(&mut self, slot: usize) -> Result<Option<V>> {
        self.store.tombstone(slot)
    }

    /// Rescans the slot store and replaces the free queue with every
    /// tombstone found. Picks up cells cleared through [`XMap::iter_mut`]
    /// and drops queued slots that were revived by [`XMap::update`].
    pub fn index_free_space(&mut self) -> usize {
        let free = self.scan_free_space();
        self.install_free_space(free)
    }

    pub(crate) fn scan_free_space(&self) -> VecDeque<usize> {
        self.store.scan_tombstones()
    }

    pub(crate) fn install_free_space(&mut self, free: VecDeque<usize>) -> usize {
        debug!(
            before = self.store.free_len(),
            after = free.len(),
            "indexed free space"
        );
        self.store.replace_free(free);
        self.store.free_len()
    }

    /// Compacts the map: every live cell still bound to a key is re-added in
    /// slot order, everything else is dropped. Slot numbers held from before
    /// the call are invalid afterwards.
    pub fn rebuild_index(&mut self) {
        let hasher = self.index.hasher().clone();
        let fresh = Self::with_capacity_and_hasher(self.index.len(), hasher);
        let old = core::mem::replace(self, fresh);
        let before = old.store.len();

        let XMap { store, mut index } = old;
        for (slot, cell) in store.into_cells().into_iter().enumerate() {
            let Some(value) = cell else { continue };
            if let Some(key) = index.unbind_slot(slot) {
                self.add(key, value);
            }
        }
        debug!(
            before,
            after = self.store.len(),
            dropped_keys = index.len(),
            "rebuilt index"
        );
    }

    pub fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.find(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.index.find(key).is_some()
    }

    pub fn get_by_key<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.index.find(key)?;
        self.store.get(slot).ok().flatten()
    }

    pub fn get_by_key_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.index.find(key)?;
        self.store.get_mut(slot).ok().flatten()
    }

    /// `Ok(None)` is a tombstone; an out-of-range slot is an error.
    pub fn get_by_slot(&self, slot: usize) -> Result<Option<&V>> {
        self.store.get(slot)
    }

    pub fn get_by_slot_mut(&mut self, slot: usize) -> Result<Option<&mut V>> {
        self.store.get_mut(slot)
    }

    /// First live slot holding a value equal to `value`.
    pub fn get_slot_of(&self, value: &V) -> Option<usize>
    where
        V: PartialEq,
    {
        self.store.position(|v| v == value)
    }

    /// Key bound to `slot`, if any.
    pub fn key_of(&self, slot: usize) -> Option<&K> {
        self.index.key_of(slot)
    }

    /// `(slot, key)` pairs of the reverse index, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = (usize, &K)> {
        self.index.keys()
    }

    /// `(key, slot)` pairs of the forward index, in no particular order.
    pub fn key_slots(&self) -> impl Iterator<Item = (&K, usize)> {
        self.index.key_slots()
    }

    /// Slots queued for recycling, oldest first.
    pub fn free_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.store.free_slots()
    }

    pub fn as_slice(&self) -> &[Option<V>] {
        self.store.cells()
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            it: self.store.cells().iter(),
        }
    }

    /// Writing `None` through this iterator tombstones a cell without queuing
    /// it; run [`XMap::index_free_space`] afterwards to make it reusable.
    pub fn iter_mut(&mut self) -> IterMut<'_, V> {
        IterMut {
            it: self.store.cells_mut().iter_mut(),
        }
    }
}

impl<K, V, S> fmt::Debug for XMap<K, V, S>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher + Clone + Default,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.iter()
                    .enumerate()
                    .map(|(slot, v)| ((slot, self.key_of(slot)), v)),
            )
            .finish()
    }
}

/// Panics if `slot` is out of range. A tombstone indexes as `None`.
impl<K, V, S> Index<usize> for XMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    type Output = Option<V>;

    fn index(&self, slot: usize) -> &Option<V> {
        match self.store.cells().get(slot) {
            Some(cell) => cell,
            None => panic!(
                "slot {} out of range (slot store length {})",
                slot,
                self.store.len()
            ),
        }
    }
}

impl<K, V, S> Extend<(K, V)> for XMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.add(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for XMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut m = Self::with_capacity_and_hasher(iter.size_hint().0, S::default());
        m.extend(iter);
        m
    }
}

impl<'a, K, V, S> IntoIterator for &'a XMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    type Item = Option<&'a V>;
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
