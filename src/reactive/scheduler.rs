//! Batched effect scheduling.
//!
//! Triggered effects collect in a pending set keyed by identity. The first
//! insertion into an empty set queues one microtask that drains it. The
//! drain runs the effects that were pending when it started, then clears
//! the set; effects triggered during the drain are dropped.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use indexmap::IndexSet;

use super::effect::{active_effect, EffectRef};
use crate::runtime::queue_microtask;

thread_local! {
    static PENDING: RefCell<IndexSet<EffectRef>> = RefCell::new(IndexSet::new());
}

pub(crate) fn schedule(effects: impl IntoIterator<Item = EffectRef>) {
    let active = active_effect();
    let first = PENDING.with(|pending| {
        let mut pending = pending.borrow_mut();
        let was_empty = pending.is_empty();
        for effect in effects {
            // An effect never re-triggers itself while it runs.
            if active.as_ref() != Some(&effect) {
                pending.insert(effect);
            }
        }
        was_empty && !pending.is_empty()
    });

    if first {
        queue_microtask(|| {
            flush_effects();
        });
    }
}

/// Drain the pending set now. Returns the number of effects run.
///
/// Failures are logged per effect and never stop the rest of the drain.
pub fn flush_effects() -> usize {
    let batch: Vec<EffectRef> = PENDING.with(|p| p.borrow().iter().cloned().collect());

    for effect in &batch {
        match panic::catch_unwind(AssertUnwindSafe(|| effect.run())) {
            Ok(Some(Ok(()))) | Ok(None) => {}
            Ok(Some(Err(err))) => log::error!("effect failed: {err:#}"),
            Err(payload) => log::error!("effect panicked: {}", panic_message(&*payload)),
        }
    }

    PENDING.with(|p| p.borrow_mut().clear());
    batch.len()
}

/// Effects waiting for the next drain.
pub fn pending_effects() -> usize {
    PENDING.with(|p| p.borrow().len())
}

pub fn reset_pending_effects() {
    PENDING.with(|p| p.borrow_mut().clear());
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
