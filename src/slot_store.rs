//! SlotStore: append-only cell storage with tombstones and a FIFO free queue.
//!
//! A slot number is the position of a cell in `cells`. Cells are never
//! removed, only tombstoned (`None`); the store shrinks only when the owning
//! map is rebuilt from scratch.

use crate::error::{Result, XMapError};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub(crate) struct SlotStore<V> {
    cells: Vec<Option<V>>,
    // Tombstoned slots available for reuse, oldest first.
    free: VecDeque<usize>,
}

impl<V> SlotStore<V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
            free: VecDeque::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub(crate) fn free_len(&self) -> usize {
        self.free.len()
    }

    #[inline]
    fn check(&self, slot: usize) -> Result<()> {
        if slot < self.cells.len() {
            Ok(())
        } else {
            Err(XMapError::OutOfRange {
                slot,
                len: self.cells.len(),
            })
        }
    }

    /// Appends a live cell and returns its slot number.
    pub(crate) fn push(&mut self, value: V) -> usize {
        let slot = self.cells.len();
        self.cells.push(Some(value));
        slot
    }

    pub(crate) fn get(&self, slot: usize) -> Result<Option<&V>> {
        self.check(slot)?;
        Ok(self.cells[slot].as_ref())
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> Result<Option<&mut V>> {
        self.check(slot)?;
        Ok(self.cells[slot].as_mut())
    }

    /// Overwrites a cell, live or tombstoned. A revived tombstone leaves the
    /// free queue, so the queue only ever holds tombstones.
    pub(crate) fn replace(&mut self, slot: usize, value: V) -> Result<(Option<V>, &mut V)> {
        self.check(slot)?;
        let cell = &mut self.cells[slot];
        let prev = cell.take();
        if prev.is_none() {
            self.free.retain(|&s| s != slot);
        }
        Ok((prev, cell.insert(value)))
    }

    /// Tombstones a cell. A cell that was live is queued for reuse; a cell
    /// that was already a tombstone is left alone so it is never queued twice.
    pub(crate) fn tombstone(&mut self, slot: usize) -> Result<Option<V>> {
        self.check(slot)?;
        let prev = self.cells[slot].take();
        if prev.is_some() {
            self.free.push_back(slot);
        }
        Ok(prev)
    }

    /// Takes the oldest queued tombstone and writes `value` into it. Hands
    /// the value back when no tombstone is queued.
    pub(crate) fn fill_free(&mut self, value: V) -> core::result::Result<usize, V> {
        // Queued slots are always in range: the store only shrinks on
        // rebuild, which starts from an empty queue. Cells revived through
        // `cells_mut` while queued are skipped, never overwritten.
        while let Some(slot) = self.free.pop_front() {
            let cell = &mut self.cells[slot];
            if cell.is_none() {
                *cell = Some(value);
                return Ok(slot);
            }
        }
        Err(value)
    }

    pub(crate) fn free_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.free.iter().copied()
    }

    /// Collects every tombstoned slot in ascending order.
    pub(crate) fn scan_tombstones(&self) -> VecDeque<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(slot, cell)| cell.is_none().then_some(slot))
            .collect()
    }

    /// Replaces the free queue wholesale with the result of a scan.
    pub(crate) fn replace_free(&mut self, free: VecDeque<usize>) {
        self.free = free;
    }

    pub(crate) fn position<F>(&self, mut pred: F) -> Option<usize>
    where
        F: FnMut(&V) -> bool,
    {
        self.cells
            .iter()
            .position(|cell| cell.as_ref().map(&mut pred).unwrap_or(false))
    }

    #[inline]
    pub(crate) fn cells(&self) -> &[Option<V>] {
        &self.cells
    }

    #[inline]
    pub(crate) fn cells_mut(&mut self) -> &mut [Option<V>] {
        &mut self.cells
    }

    pub(crate) fn into_cells(self) -> Vec<Option<V>> {
        self.cells
    }
}
