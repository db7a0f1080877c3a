// SharedXMap tests: concurrent writers, readers during maintenance, and the
// awaitable background free-space scan.
use std::thread;
use xmap::{SharedXMap, XMap};

// Test: concurrent add from several threads.
// Verifies: every add lands in its own slot; no growth is lost.
#[test]
fn concurrent_adds_are_serialized() {
    let m: SharedXMap<String, usize> = SharedXMap::new();
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let m = m.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    m.add(format!("t{t}-{i}"), t * 1000 + i);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(m.count(), 1000);
    assert_eq!(m.slot_count(), 1000);
    assert_eq!(m.get_by_key("t3-249"), Some(3249));
}

// Test: deletes racing recycles.
// Verifies: the free queue never hands out a slot twice; every recycled key
// ends up in a distinct slot.
#[test]
fn concurrent_delete_and_recycle_keep_slots_unique() {
    let m: SharedXMap<String, usize> = (0..200)
        .map(|i| (format!("k{i}"), i))
        .collect::<XMap<_, _>>()
        .into();

    let deleter = {
        let m = m.clone();
        thread::spawn(move || {
            for i in 0..100 {
                m.delete(format!("k{i}").as_str());
            }
        })
    };
    let recycler = {
        let m = m.clone();
        thread::spawn(move || {
            (0..100)
                .map(|i| m.add_recycled(format!("r{i}"), 1000 + i))
                .collect::<Vec<_>>()
        })
    };
    deleter.join().unwrap();
    let mut slots = recycler.join().unwrap();

    slots.sort_unstable();
    slots.dedup();
    assert_eq!(slots.len(), 100);
    assert_eq!(m.count(), 200);
    // Every recycle that found the queue empty appended instead.
    assert_eq!(m.free_space(), m.slot_count() - 200);
    for i in 0..100 {
        let slot = m.find(format!("r{i}").as_str()).unwrap();
        assert_eq!(m.get_by_slot(slot), Ok(Some(1000 + i)));
    }
}

// Test: background scan ordering.
// Verifies: once `wait()` returns, the free queue reflects the scan, and a
// rebuild afterwards resets it.
#[test]
fn background_scan_then_rebuild() {
    let m: SharedXMap<String, i32> = SharedXMap::new();
    for i in 0..10 {
        m.add(format!("k{i}"), i);
    }
    m.delete_at(2).unwrap();
    m.delete_at(7).unwrap();
    m.update(2, 20).unwrap();

    let task = m.spawn_index_free_space();
    assert_eq!(task.wait(), 1);
    assert_eq!(m.free_space(), 1);
    assert_eq!(m.add_recycled("x".to_string(), 70), 7);

    m.rebuild_index();
    assert_eq!(m.free_space(), 0);
    assert_eq!(m.count(), 10);
    assert_eq!(m.slot_count(), 10);
    assert_eq!(m.get_by_key("x"), Some(70));
}

// Test: readers keep working while a scan runs.
// Verifies: snapshot and read guard see a consistent store.
#[test]
fn readers_during_scan() {
    let m: SharedXMap<String, i32> = SharedXMap::new();
    for i in 0..1000 {
        m.add(format!("k{i}"), i);
    }
    for i in (0..1000).step_by(10) {
        m.delete(format!("k{i}").as_str());
    }

    let task = m.spawn_index_free_space();
    let readers: Vec<_> = (0..2)
        .map(|_| {
            let m = m.clone();
            thread::spawn(move || {
                let snap = m.snapshot();
                assert_eq!(snap.len(), 1000);
                assert_eq!(snap.iter().flatten().count(), 900);
                m.read().iter().filter(|c| c.is_none()).count()
            })
        })
        .collect();
    for r in readers {
        assert_eq!(r.join().unwrap(), 100);
    }
    assert_eq!(task.wait(), 100);
}
