//! SharedXMap: a cloneable, thread-safe handle around an `XMap`.
//!
//! Every structural mutation runs under the write lock, queries under the
//! read lock. The free-space scan holds an upgradable read lock while it
//! walks the store, so readers keep going but no writer can slip in between
//! the scan and the swap.

use crate::error::Result;
use crate::xmap::XMap;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard};
use std::collections::hash_map::RandomState;
use std::sync::Arc;
use std::thread::JoinHandle;

pub struct SharedXMap<K, V, S = RandomState> {
    inner: Arc<RwLock<XMap<K, V, S>>>,
}

impl<K, V, S> Clone for SharedXMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> SharedXMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::from_map(XMap::new())
    }
}

impl<K, V> Default for SharedXMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> From<XMap<K, V, S>> for SharedXMap<K, V, S> {
    fn from(map: XMap<K, V, S>) -> Self {
        Self::from_map(map)
    }
}

/// Handle to a background free-space scan.
#[must_use = "dropping the task detaches the scan"]
pub struct FreeSpaceTask {
    handle: JoinHandle<usize>,
}

impl FreeSpaceTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the scan has swapped in its result and returns the new
    /// free count.
    pub fn wait(self) -> usize {
        match self.handle.join() {
            Ok(free) => free,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

impl<K, V, S> SharedXMap<K, V, S> {
    pub fn from_map(map: XMap<K, V, S>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }
}

impl<K, V, S> SharedXMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_map(XMap::with_hasher(hasher))
    }

    /// Read access for zero-copy iteration. Writers block until the guard
    /// is dropped.
    pub fn read(&self) -> RwLockReadGuard<'_, XMap<K, V, S>> {
        self.inner.read()
    }

    pub fn add(&self, key: K, value: V) -> usize {
        self.inner.write().add(key, value)
    }

    pub fn set(&self, key: K, value: V) -> (usize, Option<V>) {
        self.inner.write().set(key, value)
    }

    pub fn add_recycled(&self, key: K, value: V) -> usize {
        self.inner.write().add_recycled(key, value)
    }

    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.write().delete(key)
    }

    pub fn delete_at(&self, slot: usize) -> Result<Option<V>> {
        self.inner.write().delete_at(slot)
    }

    pub fn rebuild_index(&self) {
        self.inner.write().rebuild_index()
    }

    /// Scans for tombstones and replaces the free queue, returning the new
    /// free count.
    pub fn index_free_space(&self) -> usize {
        let map = self.inner.upgradable_read();
        let free = map.scan_free_space();
        RwLockUpgradableReadGuard::upgrade(map).install_free_space(free)
    }

    pub fn count(&self) -> usize {
        self.inner.read().count()
    }

    pub fn free_space(&self) -> usize {
        self.inner.read().free_space()
    }

    pub fn slot_count(&self) -> usize {
        self.inner.read().slot_count()
    }

    pub fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.read().find(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.read().contains_key(key)
    }

    pub fn get_slot_of(&self, value: &V) -> Option<usize>
    where
        V: PartialEq,
    {
        self.inner.read().get_slot_of(value)
    }
}

impl<K, V, S> SharedXMap<K, V, S>
where
    K: Eq + Hash,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    pub fn get_by_key<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.read().get_by_key(key).cloned()
    }

    pub fn get_by_slot(&self, slot: usize) -> Result<Option<V>> {
        Ok(self.inner.read().get_by_slot(slot)?.cloned())
    }

    /// Returns the previous value of `slot` (`None` for a tombstone) and a
    /// copy of the value now stored.
    pub fn update(&self, slot: usize, value: V) -> Result<(Option<V>, V)> {
        let mut map = self.inner.write();
        let (prev, new) = map.update(slot, value)?;
        Ok((prev, new.clone()))
    }

    /// Copies the slot store out so it can be iterated without holding the
    /// lock.
    pub fn snapshot(&self) -> Vec<Option<V>> {
        self.inner.read().as_slice().to_vec()
    }
}

impl<K, V, S> SharedXMap<K, V, S>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: BuildHasher + Clone + Default + Send + Sync + 'static,
{
    /// Runs [`SharedXMap::index_free_space`] on a background thread.
    pub fn spawn_index_free_space(&self) -> FreeSpaceTask {
        let map = self.clone();
        FreeSpaceTask {
            handle: std::thread::spawn(move || map.index_free_space()),
        }
    }
}
