//! Batched effect re-runs across the microtask boundary.
//!
//! Run with: cargo test --test reactive_batching

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use psyframe::runtime::{pending_microtasks, reset_runtime, run_microtasks};
use psyframe::{effect, reactive, record, Reactive, Value};

fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
    reset_runtime();
    psyframe::set_mode(psyframe::Mode::Development);
}

/// Effect reading every key in `keys`, counting its runs.
fn counting_effect(state: &Reactive, keys: Vec<String>) -> Rc<Cell<usize>> {
    let runs = Rc::new(Cell::new(0));
    let r = runs.clone();
    let s = state.clone();
    effect(move || {
        for key in &keys {
            s.get(key);
        }
        r.set(r.get() + 1);
    })
    .unwrap();
    runs
}

#[test]
fn two_writes_in_one_tick_rerun_once_with_latest_value() {
    setup();
    let state = reactive(record! { "count" => 0 });
    let runs = Rc::new(Cell::new(0));
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (s, r, v) = (state.clone(), runs.clone(), seen.clone());
    effect(move || {
        r.set(r.get() + 1);
        v.borrow_mut().push(s.get_f64("count"));
    })
    .unwrap();

    state.set("count", 1);
    state.set("count", 2);
    assert_eq!(runs.get(), 1);
    assert_eq!(pending_microtasks(), 1);

    run_microtasks();
    assert_eq!(runs.get(), 2);
    assert_eq!(seen.borrow().last().copied(), Some(Some(2.0)));
}

#[test]
fn writes_in_separate_ticks_rerun_separately() {
    setup();
    let state = reactive(record! { "x" => 0 });
    let runs = counting_effect(&state, vec!["x".into()]);

    state.set("x", 1);
    run_microtasks();
    state.set("x", 2);
    run_microtasks();
    assert_eq!(runs.get(), 3);
}

#[test]
fn untouched_keys_do_not_rerun() {
    setup();
    let state = reactive(record! { "read" => 0, "ignored" => 0 });
    let runs = counting_effect(&state, vec!["read".into()]);

    state.set("ignored", 1);
    state.set("fresh", "value");
    run_microtasks();
    assert_eq!(runs.get(), 1);
}

#[test]
fn effect_sharing_two_records_runs_once_per_batch() {
    setup();
    let a = reactive(record! { "v" => 0 });
    let b = reactive(record! { "v" => 0 });
    let runs = Rc::new(Cell::new(0));

    let (ca, cb, r) = (a.clone(), b.clone(), runs.clone());
    effect(move || {
        ca.get("v");
        cb.get("v");
        r.set(r.get() + 1);
    })
    .unwrap();

    a.set("v", 1);
    b.set("v", 1);
    run_microtasks();
    assert_eq!(runs.get(), 2);
}

fn number() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(f64::NAN),
        Just(0.0),
        Just(-0.0),
        Just(f64::INFINITY),
        -1.0e6..1.0e6f64,
    ]
}

proptest! {
    #[test]
    fn any_same_tick_writes_rerun_exactly_once(
        keys in 1usize..6,
        writes in prop::collection::vec((0usize..6, 1i32..1000), 1..40),
    ) {
        setup();
        let names: Vec<String> = (0..keys).map(|k| format!("k{k}")).collect();
        let mut initial = psyframe::Record::new();
        for name in &names {
            initial.insert(name.clone(), Value::Number(0.0));
        }
        let state = reactive(initial);
        let runs = counting_effect(&state, names.clone());

        for (key, value) in writes {
            state.set(names[key % keys].clone(), value);
        }
        run_microtasks();
        prop_assert_eq!(runs.get(), 2);

        run_microtasks();
        prop_assert_eq!(runs.get(), 2);
    }

    #[test]
    fn same_value_writes_never_trigger(value in number()) {
        setup();
        let state = reactive(record! { "v" => value });
        let runs = counting_effect(&state, vec!["v".into()]);

        let copy = if value.is_nan() { f64::NAN } else { value };
        prop_assert!(!state.set("v", copy));
        run_microtasks();
        prop_assert_eq!(runs.get(), 1);
        prop_assert_eq!(pending_microtasks(), 0);
    }
}

#[test]
fn signed_zero_is_a_change() {
    setup();
    let state = reactive(record! { "v" => 0.0 });
    let runs = counting_effect(&state, vec!["v".into()]);

    assert!(state.set("v", -0.0));
    run_microtasks();
    assert_eq!(runs.get(), 2);
}
