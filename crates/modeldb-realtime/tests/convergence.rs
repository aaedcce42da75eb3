//! Convergence tests for the realtime model.
//!
//! Replicas edit concurrently, exchange their pending mutations, and must
//! end up with identical contents. Listeners mirroring remote events must
//! reproduce the replica's contents exactly.

use modeldb_realtime::{
    CollaborativeList, CollaborativeString, EventKind, Model, RemoteObject, RemoteValue,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone, Debug)]
enum ListOp {
    Insert(usize, i32),
    Remove(usize),
    Set(usize, i32),
    Move(usize, usize),
}

fn list_op_strategy() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        (0usize..16, 0i32..100).prop_map(|(i, v)| ListOp::Insert(i, v)),
        (0usize..16).prop_map(ListOp::Remove),
        (0usize..16, 0i32..100).prop_map(|(i, v)| ListOp::Set(i, v)),
        (0usize..16, 0usize..16).prop_map(|(a, b)| ListOp::Move(a, b)),
    ]
}

#[derive(Clone, Debug)]
enum TextOp {
    Insert(usize, String),
    Remove(usize, usize),
}

fn text_op_strategy() -> impl Strategy<Value = TextOp> {
    prop_oneof![
        (0usize..32, "[a-z]{1,4}").prop_map(|(i, s)| TextOp::Insert(i, s)),
        (0usize..32, 1usize..4).prop_map(|(i, n)| TextOp::Remove(i, n)),
    ]
}

fn apply_list_op(list: &CollaborativeList, op: &ListOp) {
    let len = list.len();
    match op {
        ListOp::Insert(i, v) => list.insert(i % (len + 1), json!(v)),
        ListOp::Remove(i) if len > 0 => {
            list.remove(i % len);
        }
        ListOp::Set(i, v) if len > 0 => {
            list.set(i % len, json!(v));
        }
        ListOp::Move(a, b) if len > 1 => list.move_to(a % len, b % (len + 1)),
        _ => {}
    }
}

fn apply_text_op(string: &CollaborativeString, op: &TextOp) {
    let len = string.len();
    match op {
        TextOp::Insert(i, s) => string.insert_string(i % (len + 1), s),
        TextOp::Remove(i, n) if len > 0 => {
            let start = i % len;
            string.remove_range(start, (start + n).min(len));
        }
        _ => {}
    }
}

/// Deliver every replica's pending mutations to every other replica.
fn exchange(models: &[Model]) {
    let batches: Vec<_> = models.iter().map(|m| m.take_pending()).collect();
    for (i, batch) in batches.iter().enumerate() {
        for (j, target) in models.iter().enumerate() {
            if i == j {
                continue;
            }
            for mutation in batch {
                target.apply_remote(mutation).unwrap();
            }
        }
    }
}

fn list_on(model: &Model, list: &CollaborativeList) -> CollaborativeList {
    match model.get_object(list.id()) {
        Some(RemoteObject::List(l)) => l,
        other => panic!("expected list, found {:?}", other),
    }
}

fn string_on(model: &Model, string: &CollaborativeString) -> CollaborativeString {
    match model.get_object(string.id()) {
        Some(RemoteObject::String(s)) => s,
        other => panic!("expected string, found {:?}", other),
    }
}

/// Keep a plain Vec in step with a list by replaying its events.
fn mirror_list(list: &CollaborativeList) -> Arc<Mutex<Vec<Value>>> {
    let mirror = Arc::new(Mutex::new(list.to_vec()));
    let m = mirror.clone();
    list.add_event_listener(move |event| {
        let mut mirror = m.lock();
        match &event.kind {
            EventKind::ValuesAdded { index, values } => {
                for (k, v) in values.iter().enumerate() {
                    mirror.insert(index + k, v.clone());
                }
            }
            EventKind::ValuesRemoved { index, values } => {
                mirror.drain(*index..index + values.len());
            }
            EventKind::ValuesSet {
                index, new_values, ..
            } => {
                for (k, v) in new_values.iter().enumerate() {
                    mirror[index + k] = v.clone();
                }
            }
            _ => {}
        }
    });
    mirror
}

fn mirror_text(string: &CollaborativeString) -> Arc<Mutex<Vec<char>>> {
    let mirror = Arc::new(Mutex::new(string.text().chars().collect::<Vec<_>>()));
    let m = mirror.clone();
    string.add_event_listener(move |event| {
        let mut mirror = m.lock();
        match &event.kind {
            EventKind::TextInserted { index, text } => {
                for (k, ch) in text.chars().enumerate() {
                    mirror.insert(index + k, ch);
                }
            }
            EventKind::TextDeleted { index, text } => {
                mirror.drain(*index..index + text.chars().count());
            }
            _ => {}
        }
    });
    mirror
}

proptest! {
    #[test]
    fn concurrent_list_edits_converge(
        ops_a in prop::collection::vec(list_op_strategy(), 0..12),
        ops_b in prop::collection::vec(list_op_strategy(), 0..12),
        ops_c in prop::collection::vec(list_op_strategy(), 0..12),
    ) {
        let models = vec![Model::new(), Model::new(), Model::new()];
        let list = models[0].create_list(vec![json!(0), json!(1), json!(2)]);
        exchange(&models);
        let lists: Vec<_> = models.iter().map(|m| list_on(m, &list)).collect();
        let mirrors: Vec<_> = lists.iter().map(mirror_list).collect();

        for op in &ops_a { apply_list_op(&lists[0], op); }
        for op in &ops_b { apply_list_op(&lists[1], op); }
        for op in &ops_c { apply_list_op(&lists[2], op); }
        exchange(&models);

        let expected = lists[0].to_vec();
        for (list, mirror) in lists.iter().zip(&mirrors) {
            prop_assert_eq!(list.to_vec(), expected.clone());
            prop_assert_eq!(mirror.lock().clone(), expected.clone());
        }
    }

    #[test]
    fn concurrent_text_edits_converge(
        ops_a in prop::collection::vec(text_op_strategy(), 0..12),
        ops_b in prop::collection::vec(text_op_strategy(), 0..12),
    ) {
        let models = vec![Model::new(), Model::new()];
        let string = models[0].create_string("seed");
        exchange(&models);
        let strings: Vec<_> = models.iter().map(|m| string_on(m, &string)).collect();
        let mirrors: Vec<_> = strings.iter().map(mirror_text).collect();

        for op in &ops_a { apply_text_op(&strings[0], op); }
        for op in &ops_b { apply_text_op(&strings[1], op); }
        exchange(&models);

        let expected = strings[0].text();
        for (string, mirror) in strings.iter().zip(&mirrors) {
            prop_assert_eq!(string.text(), expected.clone());
            prop_assert_eq!(mirror.lock().iter().collect::<String>(), expected.clone());
        }
    }

    #[test]
    fn concurrent_map_writes_converge(
        writes_a in prop::collection::vec(("[a-c]", 0i32..10), 0..10),
        writes_b in prop::collection::vec(("[a-c]", 0i32..10), 0..10),
        deletes_b in prop::collection::vec("[a-c]", 0..3),
    ) {
        let models = vec![Model::new(), Model::new()];
        for (k, v) in &writes_a {
            models[0].root().set(k, RemoteValue::Json(json!(v))).unwrap();
        }
        for (k, v) in &writes_b {
            models[1].root().set(k, RemoteValue::Json(json!(v))).unwrap();
        }
        for k in &deletes_b {
            models[1].root().delete(k);
        }
        exchange(&models);

        prop_assert_eq!(models[0].root().to_json(), models[1].root().to_json());
    }
}

#[test]
fn test_sequential_edits_after_sync_stay_ordered() {
    let models = vec![Model::new(), Model::new()];
    let string = models[0].create_string("");
    exchange(&models);
    let replica = string_on(&models[1], &string);

    replica.insert_string(0, "world");
    exchange(&models);
    string.insert_string(0, "hello ");
    exchange(&models);

    assert_eq!(string.text(), "hello world");
    assert_eq!(replica.text(), "hello world");
}
