//! Reactive Module - Property-level dependency tracking.
//!
//! A [`Reactive`] wraps a flat [`Record`]. Reads made through it while an
//! [`effect`] runs register that effect as a dependent; writes schedule the
//! dependents for one batched re-run in the next microtask.
//!
//! Only explicit accessor calls are tracked, and only top-level keys:
//! mutating a value obtained from [`Reactive::snapshot`] is invisible.
//!
//! | Operation            | Tracks / triggers                         |
//! |----------------------|-------------------------------------------|
//! | `get(k)`             | tracks `k`                                |
//! | `has(k)`, `keys()`   | tracks the key set                        |
//! | `set(k, v)`          | triggers `k` and the key set, if changed  |
//! | `delete(k)`          | triggers `k` and the key set, if present  |
//!
//! # Example
//!
//! ```ignore
//! let state = reactive(record! { "count" => 0 });
//! let s = state.clone();
//! effect(move || println!("count = {:?}", s.get("count")))?;  // prints 0
//!
//! state.set("count", 1);
//! state.set("count", 2);
//! run_microtasks();                                           // prints 2, once
//! ```

mod effect;
mod scheduler;

pub use effect::{effect, try_effect, untracked};
pub use scheduler::{flush_effects, pending_effects, reset_pending_effects};

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::value::{Record, Value};
use effect::{active_effect, EffectRef};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TrackKey {
    Prop(String),
    /// The set of keys, read by `has`/`keys` and changed by additions and removals.
    Iterate,
}

struct ReactiveInner {
    raw: RefCell<Record>,
    deps: RefCell<HashMap<TrackKey, IndexSet<EffectRef>>>,
}

/// Shared handle to a tracked record. Clones observe the same record.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ReactiveInner>,
}

/// Wrap `record` for tracking.
pub fn reactive(record: Record) -> Reactive {
    Reactive::new(record)
}

impl Reactive {
    pub fn new(record: Record) -> Self {
        Self {
            inner: Rc::new(ReactiveInner {
                raw: RefCell::new(record),
                deps: RefCell::new(HashMap::new()),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Tracked reads
    // -------------------------------------------------------------------------

    pub fn get(&self, key: &str) -> Option<Value> {
        self.track(TrackKey::Prop(key.to_string()));
        self.inner.raw.borrow().get(key).cloned()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn has(&self, key: &str) -> bool {
        self.track(TrackKey::Iterate);
        self.inner.raw.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.track(TrackKey::Iterate);
        self.inner.raw.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.track(TrackKey::Iterate);
        self.inner.raw.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Set `key`. Returns false (and triggers nothing) when the new value is
    /// the same value as the current one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        let changed = {
            let mut raw = self.inner.raw.borrow_mut();
            match raw.get(&key) {
                Some(old) if old.same_value(&value) => false,
                _ => {
                    raw.insert(key.clone(), value);
                    true
                }
            }
        };
        if changed {
            self.trigger(&key);
        }
        changed
    }

    /// Remove `key`. Returns false (and triggers nothing) if it was absent.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.inner.raw.borrow_mut().shift_remove(key).is_some();
        if removed {
            self.trigger(key);
        }
        removed
    }

    /// `set` every entry of `record`, in order.
    pub fn assign(&self, record: Record) {
        for (key, value) in record {
            self.set(key, value);
        }
    }

    // -------------------------------------------------------------------------
    // Untracked access
    // -------------------------------------------------------------------------

    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        self.inner.raw.borrow().get(key).cloned()
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> Record {
        self.inner.raw.borrow().clone()
    }

    /// Forget every registered dependent.
    ///
    /// Effects usually capture a clone of the handle they read, which keeps
    /// both alive through the dependency map; owners call this on teardown.
    pub fn release(&self) {
        self.inner.deps.borrow_mut().clear();
    }

    /// Number of effects depending on `key`.
    pub fn dependents(&self, key: &str) -> usize {
        self.inner
            .deps
            .borrow()
            .get(&TrackKey::Prop(key.to_string()))
            .map(IndexSet::len)
            .unwrap_or(0)
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // -------------------------------------------------------------------------
    // Tracking
    // -------------------------------------------------------------------------

    fn track(&self, key: TrackKey) {
        if let Some(effect) = active_effect() {
            self.inner
                .deps
                .borrow_mut()
                .entry(key)
                .or_default()
                .insert(effect);
        }
    }

    fn trigger(&self, key: &str) {
        let effects: Vec<EffectRef> = {
            let deps = self.inner.deps.borrow();
            [TrackKey::Prop(key.to_string()), TrackKey::Iterate]
                .iter()
                .filter_map(|k| deps.get(k))
                .flatten()
                .cloned()
                .collect()
        };
        if !effects.is_empty() {
            scheduler::schedule(effects);
        }
    }
}

impl From<Record> for Reactive {
    fn from(record: Record) -> Self {
        Self::new(record)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reactive")
            .field(&*self.inner.raw.borrow())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, Mode};
    use crate::record;
    use crate::runtime::{reset_runtime, run_microtasks};
    use std::cell::Cell;

    fn setup() {
        reset_runtime();
        config::set_mode(Mode::Development);
    }

    /// Effect that counts its runs and reads `key`.
    fn counting(state: &Reactive, key: &'static str) -> Rc<Cell<u32>> {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let s = state.clone();
        effect(move || {
            s.get(key);
            r.set(r.get() + 1);
        })
        .unwrap();
        runs
    }

    #[test]
    fn test_effect_runs_immediately_and_on_change() {
        setup();
        let state = reactive(record! { "count" => 0 });
        let runs = counting(&state, "count");
        assert_eq!(runs.get(), 1);

        state.set("count", 1);
        assert_eq!(runs.get(), 1);
        run_microtasks();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_untracked_key_does_not_trigger() {
        setup();
        let state = reactive(record! { "a" => 1, "b" => 2 });
        let runs = counting(&state, "a");

        state.set("b", 3);
        run_microtasks();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_same_value_does_not_trigger() {
        setup();
        let state = reactive(record! { "x" => f64::NAN, "z" => 0.0 });
        let nan_runs = counting(&state, "x");
        let zero_runs = counting(&state, "z");

        assert!(!state.set("x", f64::NAN));
        assert!(!state.set("z", 0.0));
        run_microtasks();
        assert_eq!(nan_runs.get(), 1);
        assert_eq!(zero_runs.get(), 1);

        assert!(state.set("z", -0.0));
        run_microtasks();
        assert_eq!(zero_runs.get(), 2);
    }

    #[test]
    fn test_has_and_keys_track_key_set() {
        setup();
        let state = reactive(record! { "a" => 1 });
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let s = state.clone();
        effect(move || {
            s.has("b");
            r.set(r.get() + 1);
        })
        .unwrap();

        state.set("b", true);
        run_microtasks();
        assert_eq!(runs.get(), 2);

        assert!(state.delete("b"));
        run_microtasks();
        assert_eq!(runs.get(), 3);

        assert!(!state.delete("b"));
        run_microtasks();
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn test_delete_triggers_key_readers() {
        setup();
        let state = reactive(record! { "a" => 1 });
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = state.clone();
        let log = seen.clone();
        effect(move || log.borrow_mut().push(s.get("a"))).unwrap();

        state.delete("a");
        run_microtasks();
        assert_eq!(*seen.borrow(), vec![Some(Value::from(1)), None]);
    }

    #[test]
    fn test_nested_effect_rejected_in_development() {
        setup();
        let nested = Rc::new(Cell::new(None));
        let n = nested.clone();
        effect(move || n.set(Some(effect(|| {}).is_err()))).unwrap();
        assert_eq!(nested.get(), Some(true));
    }

    #[test]
    fn test_nested_effect_allowed_in_production() {
        setup();
        config::set_mode(Mode::Production);
        let state = reactive(record! { "a" => 1, "b" => 2 });
        let outer_runs = Rc::new(Cell::new(0));

        let s = state.clone();
        let r = outer_runs.clone();
        effect(move || {
            let inner = s.clone();
            effect(move || {
                inner.get("b");
            })
            .unwrap();
            s.get("a");
            r.set(r.get() + 1);
        })
        .unwrap();

        // The outer effect still recorded its own read after the inner one.
        state.set("a", 5);
        flush_effects();
        assert_eq!(outer_runs.get(), 2);
        config::reset_mode();
    }

    #[test]
    fn test_self_write_does_not_retrigger() {
        setup();
        let state = reactive(record! { "n" => 0 });
        let runs = Rc::new(Cell::new(0));
        let s = state.clone();
        let r = runs.clone();
        effect(move || {
            let n = s.get_f64("n").unwrap_or(0.0);
            s.set("n", n + 1.0);
            r.set(r.get() + 1);
        })
        .unwrap();

        run_microtasks();
        assert_eq!(runs.get(), 1);
        assert_eq!(state.get_untracked("n"), Some(Value::from(1.0)));
    }

    #[test]
    fn test_initial_error_is_returned() {
        setup();
        let result = try_effect(|| anyhow::bail!("boom"));
        assert!(matches!(result, Err(crate::Error::Effect(_))));
    }

    #[test]
    fn test_failing_rerun_does_not_block_others() {
        setup();
        let state = reactive(record! { "a" => 0 });
        let s = state.clone();
        try_effect(move || {
            if s.get_f64("a") == Some(1.0) {
                anyhow::bail!("bad value");
            }
            Ok(())
        })
        .unwrap();
        let s = state.clone();
        effect(move || {
            if s.get_f64("a") == Some(1.0) {
                panic!("bad value");
            }
        })
        .unwrap();
        let runs = counting(&state, "a");

        state.set("a", 1);
        assert_eq!(flush_effects(), 3);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_triggers_during_drain_are_dropped() {
        setup();
        let state = reactive(record! { "a" => 0, "b" => 0 });
        let b_runs = counting(&state, "b");
        let s = state.clone();
        effect(move || {
            let a = s.get_f64("a").unwrap_or(0.0);
            s.set("b", a);
        })
        .unwrap();
        // Registering the writer already changed nothing for "b".
        assert_eq!(pending_effects(), 0);

        state.set("a", 7);
        run_microtasks();
        assert_eq!(state.get_untracked("b"), Some(Value::from(7.0)));
        assert_eq!(b_runs.get(), 1);
        assert_eq!(pending_effects(), 0);
    }

    #[test]
    fn test_release_forgets_dependents() {
        setup();
        let state = reactive(record! { "a" => 0 });
        let runs = counting(&state, "a");
        assert_eq!(state.dependents("a"), 1);

        state.release();
        state.set("a", 1);
        run_microtasks();
        assert_eq!(runs.get(), 1);
        assert_eq!(state.dependents("a"), 0);
    }

    #[test]
    fn test_untracked_reads() {
        setup();
        let state = reactive(record! { "a" => 0 });
        let s = state.clone();
        effect(move || {
            untracked(|| s.get("a"));
        })
        .unwrap();
        assert_eq!(state.dependents("a"), 0);
    }
}
