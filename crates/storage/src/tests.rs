use crate::{HeapFile, HeapTable, PAGE_SIZE};
use common::{PageId, RecordId, Tuple};
use types::Value;

fn open_heap(dir: &tempfile::TempDir) -> HeapFile {
    HeapFile::open(&dir.path().join("t.heap"), 1).unwrap()
}

fn tuple(id: i32, text: &str) -> Tuple {
    Tuple::new(vec![Value::Int(id), Value::Text(text.into())])
}

#[test]
fn insert_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = open_heap(&dir);

    let rid = heap.insert(&tuple(1, "alpha")).unwrap();
    let back = heap.get(rid).unwrap();

    assert_eq!(back.values, vec![Value::Int(1), Value::Text("alpha".into())]);
    assert_eq!(back.rid(), Some(rid));
    assert!(!back.is_cacheable(), "heap tuples are page-backed");
}

#[test]
fn get_invalid_slot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = open_heap(&dir);
    heap.insert(&tuple(1, "alpha")).unwrap();

    let bad = RecordId {
        page_id: PageId(0),
        slot: 99,
    };
    assert!(heap.get(bad).is_err());

    let bad_page = RecordId {
        page_id: PageId(9),
        slot: 0,
    };
    assert!(heap.get(bad_page).is_err());
}

#[test]
fn scan_cursor_walks_all_tuples_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = open_heap(&dir);

    for i in 0..5 {
        heap.insert(&tuple(i, "row")).unwrap();
    }

    let mut seen = Vec::new();
    let mut cursor = heap.first_tuple().unwrap();
    while let Some(t) = cursor {
        let rid = t.rid().unwrap();
        seen.push(t.values[0].clone());
        cursor = heap.next_tuple(rid).unwrap();
    }

    assert_eq!(
        seen,
        (0..5).map(Value::Int).collect::<Vec<_>>()
    );
}

#[test]
fn scan_skips_deleted_slots() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = open_heap(&dir);

    let rids: Vec<_> = (0..4).map(|i| heap.insert(&tuple(i, "r")).unwrap()).collect();
    heap.delete(rids[1]).unwrap();
    heap.delete(rids[2]).unwrap();

    let mut seen = Vec::new();
    let mut cursor = heap.first_tuple().unwrap();
    while let Some(t) = cursor {
        let rid = t.rid().unwrap();
        seen.push(t.values[0].clone());
        cursor = heap.next_tuple(rid).unwrap();
    }

    assert_eq!(seen, vec![Value::Int(0), Value::Int(3)]);
}

#[test]
fn empty_file_has_no_first_tuple() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = open_heap(&dir);
    assert!(heap.first_tuple().unwrap().is_none());
}

#[test]
fn scan_crosses_page_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = open_heap(&dir);

    // Large payloads force multiple pages.
    let filler = "x".repeat(PAGE_SIZE / 4);
    for i in 0..8 {
        heap.insert(&tuple(i, &filler)).unwrap();
    }
    assert!(heap.num_pages().unwrap() > 1);

    let mut count = 0;
    let mut cursor = heap.first_tuple().unwrap();
    while let Some(t) = cursor {
        count += 1;
        cursor = heap.next_tuple(t.rid().unwrap()).unwrap();
    }
    assert_eq!(count, 8);
}

#[test]
fn update_moves_the_tuple() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = open_heap(&dir);

    let rid = heap.insert(&tuple(1, "before")).unwrap();
    let new_rid = heap.update(rid, &tuple(1, "after")).unwrap();

    assert!(heap.get(rid).is_err(), "old slot is emptied");
    assert_eq!(
        heap.get(new_rid).unwrap().values[1],
        Value::Text("after".into())
    );
}

#[test]
fn delete_twice_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = open_heap(&dir);
    let rid = heap.insert(&tuple(1, "x")).unwrap();
    heap.delete(rid).unwrap();
    assert!(heap.delete(rid).is_err());
}

#[test]
fn stats_count_live_tuples_and_pages() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = open_heap(&dir);

    let rids: Vec<_> = (0..6).map(|i| heap.insert(&tuple(i, "row")).unwrap()).collect();
    heap.delete(rids[0]).unwrap();

    let stats = heap.stats().unwrap();
    assert_eq!(stats.num_tuples, 5);
    assert_eq!(stats.num_pages, 1);
    assert!(stats.avg_tuple_size > 0.0);
}

#[test]
fn stats_on_empty_file_are_zero() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = open_heap(&dir);
    let stats = heap.stats().unwrap();
    assert_eq!(stats.num_tuples, 0);
    assert_eq!(stats.avg_tuple_size, 0.0);
}

#[test]
fn null_values_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut heap = open_heap(&dir);

    let rid = heap
        .insert(&Tuple::new(vec![Value::Null, Value::Text("lorem".into())]))
        .unwrap();
    let back = heap.get(rid).unwrap();
    assert_eq!(back.values[0], Value::Null);
}
