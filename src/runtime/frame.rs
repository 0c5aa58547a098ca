//! Display-refresh callbacks (`requestAnimationFrame`).
//!
//! Callbacks requested before a refresh run once, in request order, with
//! that refresh's timestamp. Callbacks requested while the batch runs wait
//! for the next refresh. Cancelling a callback that is still queued in the
//! current batch prevents it from running. Microtasks drain after each
//! callback, so a callback sees effects scheduled by the ones before it.

use std::cell::RefCell;

use indexmap::IndexMap;

use super::run_microtasks;

/// Handle for cancelling a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequestId(u64);

type FrameCallback = Box<dyn FnOnce(f64)>;

struct FrameRegistry {
    callbacks: IndexMap<u64, FrameCallback>,
    next_id: u64,
}

thread_local! {
    static FRAMES: RefCell<FrameRegistry> = RefCell::new(FrameRegistry {
        callbacks: IndexMap::new(),
        next_id: 1,
    });
}

pub fn request_animation_frame(callback: impl FnOnce(f64) + 'static) -> FrameRequestId {
    FRAMES.with(|f| {
        let mut f = f.borrow_mut();
        let id = f.next_id;
        f.next_id += 1;
        f.callbacks.insert(id, Box::new(callback));
        FrameRequestId(id)
    })
}

/// Cancel a pending request. Returns false if it already ran or was cancelled.
pub fn cancel_animation_frame(id: FrameRequestId) -> bool {
    FRAMES.with(|f| f.borrow_mut().callbacks.shift_remove(&id.0).is_some())
}

/// Run every callback requested before this call. Returns the number run.
pub fn run_frame_callbacks(timestamp: f64) -> usize {
    let batch: Vec<u64> = FRAMES.with(|f| f.borrow().callbacks.keys().copied().collect());
    let mut ran = 0;
    for id in batch {
        let callback = FRAMES.with(|f| f.borrow_mut().callbacks.shift_remove(&id));
        if let Some(callback) = callback {
            callback(timestamp);
            run_microtasks();
            ran += 1;
        }
    }
    ran
}

pub fn pending_frame_callbacks() -> usize {
    FRAMES.with(|f| f.borrow().callbacks.len())
}

pub fn reset_frame_callbacks() {
    FRAMES.with(|f| f.borrow_mut().callbacks.clear());
}
