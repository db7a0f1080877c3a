//! xmap: an insertion-ordered map tuned for iteration, with O(1) lookup by
//! key and by slot number.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: iterate values as fast as a `Vec` while keeping map-style key
//!   lookup. Built once, iterated often, deleted from occasionally.
//! - Layers:
//!   - SlotStore<V>: append-only `Vec<Option<V>>`; `None` is a tombstone.
//!     Owns the FIFO queue of tombstoned slots available for reuse.
//!   - KeyIndex<K, S>: key→slot and slot→key, exact inverses. Keys are
//!     stored once, next to their precomputed hash.
//!   - XMap<K, V, S>: public map combining the two; `&mut self` serializes
//!     every mutation.
//!   - SharedXMap<K, V, S>: `Arc<RwLock<XMap>>` for sharing across threads,
//!     plus a joinable background free-space scan.
//!
//! Slots and tombstones
//! - A slot number is a position in the store. It stays valid until
//!   `rebuild_index`, which drops tombstones and renumbers survivors densely
//!   in their original relative order.
//! - `iter()` yields every cell, tombstones as `None`; filtering is up to the
//!   caller.
//!
//! Known inconsistency windows
//! - `add` on a bound key leaves the old cell populated but unreachable by
//!   key (`set` frees it instead).
//! - `delete_at` tombstones a cell without unbinding its key; the key keeps
//!   resolving to the slot until the slot is recycled or the map rebuilt.
//! - `update` on a tombstone revives the cell without a key.
//!   All three are cleaned up by `rebuild_index`.
//!
//! Notes and non-goals
//! - No persistence and no automatic compaction.
//! - Ordering is insertion order only.

mod error;
mod key_index;
mod shared;
mod slot_store;
mod xmap;
mod xmap_proptest;

// Public surface
pub use error::{Result, XMapError};
pub use shared::{FreeSpaceTask, SharedXMap};
pub use xmap::{Iter, IterMut, XMap};
