#![cfg(test)]

// Property tests for XMap, run against a slow reference model of the slot
// store, both key maps and the free queue.

use crate::xmap::XMap;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Clone, Debug)]
enum Op {
    Add(usize, i32),
    Set(usize, i32),
    AddRecycled(usize, i32),
    Delete(usize),
    DeleteAt(usize),
    Update(usize, i32),
    IndexFreeSpace,
    Rebuild,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        // Slot operands may point past the end of the store.
        let slot = 0usize..24;
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Add(i, v)),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Set(i, v)),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::AddRecycled(i, v)),
            idx.clone().prop_map(Op::Delete),
            slot.clone().prop_map(Op::DeleteAt),
            (slot, any::<i32>()).prop_map(|(s, v)| Op::Update(s, v)),
            Just(Op::IndexFreeSpace),
            Just(Op::Rebuild),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Straightforward reference: cells, key→slot, slot→key and free queue, with
/// every rule spelled out the slow way.
#[derive(Default)]
struct Model {
    cells: Vec<Option<i32>>,
    by_key: HashMap<String, usize>,
    by_slot: HashMap<usize, String>,
    free: VecDeque<usize>,
}

impl Model {
    fn bind(&mut self, key: String, slot: usize) -> Option<usize> {
        let prev = self.by_key.insert(key.clone(), slot);
        if let Some(p) = prev {
            self.by_slot.remove(&p);
        }
        self.by_slot.insert(slot, key);
        prev
    }

    fn tombstone(&mut self, slot: usize) -> Option<i32> {
        let prev = self.cells[slot].take();
        if prev.is_some() {
            self.free.push_back(slot);
        }
        prev
    }

    fn add(&mut self, key: String, v: i32) -> usize {
        self.cells.push(Some(v));
        let slot = self.cells.len() - 1;
        self.bind(key, slot);
        slot
    }

    fn rebuild(&mut self) {
        let old = std::mem::take(self);
        for (slot, cell) in old.cells.into_iter().enumerate() {
            if let (Some(v), Some(k)) = (cell, old.by_slot.get(&slot)) {
                self.add(k.clone(), v);
            }
        }
    }
}

/// Keys whose slot holds a value. Keys left on tombstones by `delete_at` are
/// not counted: recycling their slot unbinds them.
fn live_keys(m: &XMap<String, i32>) -> usize {
    m.key_slots()
        .filter(|&(_, slot)| matches!(m.get_by_slot(slot), Ok(Some(_))))
        .count()
}

// Property: XMap agrees with the reference model after every operation.
// Invariants exercised across random operation sequences:
// - key→slot and slot→key are exact inverses; `count()` is the number of keys.
// - The free queue is FIFO, holds each tombstone at most once, and is
//   replaced, not merged, by a rescan.
// - `add_recycled` never hands out a slot that stays bound to another key.
// - `iter()` matches the model cell for cell, tombstones included.
// - Out-of-range slot operations fail without side effects.
// - After `rebuild_index` the queue is empty and the store holds only keyed
//   live cells, in their previous relative order.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_matches_model((pool, ops) in arb_scenario()) {
        let mut sut: XMap<String, i32> = XMap::new();
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Add(i, v) => {
                    let k = pool[i].clone();
                    prop_assert_eq!(sut.add(k.clone(), v), model.add(k, v));
                }
                Op::Set(i, v) => {
                    let k = pool[i].clone();
                    model.cells.push(Some(v));
                    let slot = model.cells.len() - 1;
                    let prev = model.bind(k.clone(), slot).and_then(|old| model.tombstone(old));
                    prop_assert_eq!(sut.set(k, v), (slot, prev));
                }
                Op::AddRecycled(i, v) => {
                    let k = pool[i].clone();
                    let expected = match model.free.pop_front() {
                        Some(slot) => {
                            model.cells[slot] = Some(v);
                            if let Some(stale) = model.by_slot.remove(&slot) {
                                model.by_key.remove(&stale);
                            }
                            model.bind(k.clone(), slot);
                            slot
                        }
                        None => model.add(k.clone(), v),
                    };
                    let before = live_keys(&sut);
                    let slot = sut.add_recycled(k.clone(), v);
                    prop_assert_eq!(slot, expected);
                    // Checked without the model: the new key owns its slot
                    // and no key with a live value was displaced.
                    prop_assert!(live_keys(&sut) >= before);
                    prop_assert_eq!(sut.key_of(slot), Some(&k));
                    prop_assert_eq!(sut.get_by_key(k.as_str()), Some(&v));
                }
                Op::Delete(i) => {
                    let k = &pool[i];
                    let expected = model.by_key.remove(k).and_then(|slot| {
                        model.by_slot.remove(&slot);
                        model.tombstone(slot)
                    });
                    prop_assert_eq!(sut.delete(k.as_str()), expected);
                }
                Op::DeleteAt(slot) => {
                    let got = sut.delete_at(slot);
                    if slot < model.cells.len() {
                        prop_assert_eq!(got, Ok(model.tombstone(slot)));
                    } else {
                        prop_assert!(got.is_err());
                    }
                }
                Op::Update(slot, v) => {
                    let got = sut.update(slot, v).map(|(prev, new)| (prev, *new));
                    if slot < model.cells.len() {
                        let prev = model.cells[slot].replace(v);
                        if prev.is_none() {
                            model.free.retain(|&s| s != slot);
                        }
                        prop_assert_eq!(got, Ok((prev, v)));
                    } else {
                        prop_assert!(got.is_err());
                    }
                }
                Op::IndexFreeSpace => {
                    model.free = model
                        .cells
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| c.is_none())
                        .map(|(s, _)| s)
                        .collect();
                    prop_assert_eq!(sut.index_free_space(), model.free.len());
                }
                Op::Rebuild => {
                    model.rebuild();
                    sut.rebuild_index();
                    prop_assert_eq!(sut.free_space(), 0);
                    prop_assert!(sut.iter().all(|c| c.is_some()));
                }
            }

            // Post-conditions after each op
            prop_assert_eq!(sut.count(), model.by_key.len());
            prop_assert_eq!(sut.free_space(), model.free.len());
            prop_assert_eq!(sut.slot_count(), model.cells.len());
            let cells: Vec<Option<i32>> = sut.iter().map(|c| c.copied()).collect();
            prop_assert_eq!(&cells, &model.cells);
            for (k, &slot) in &model.by_key {
                prop_assert_eq!(sut.find(k.as_str()), Some(slot));
                prop_assert_eq!(sut.key_of(slot), Some(k));
            }
            prop_assert_eq!(sut.keys().count(), model.by_slot.len());
            prop_assert_eq!(sut.key_slots().count(), model.by_key.len());

            // Checked without the model: the queue holds distinct tombstones.
            let mut queued = HashSet::new();
            for slot in sut.free_slots() {
                prop_assert!(queued.insert(slot), "slot {} queued twice", slot);
                prop_assert_eq!(sut.get_by_slot(slot), Ok(None));
            }
        }
    }
}
