//! Reactive environment state of an app.
//!
//! Sizes are physical pixels: CSS size from the host times the device pixel
//! ratio. A resolution media query keyed to the current ratio reports ratio
//! changes; each change re-derives the sizes and re-subscribes with a query
//! for the new ratio.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::dom::Cleanup;
use crate::reactive::Reactive;
use crate::runtime::{self, MediaQueryList};
use crate::value::Record;

pub const FRAME_MS: &str = "frame_ms";
pub const LEAVE_COUNT: &str = "leave_count";
pub const DPR: &str = "dpr";
pub const SCREEN_WIDTH: &str = "screen_width";
pub const SCREEN_HEIGHT: &str = "screen_height";
pub const WINDOW_WIDTH: &str = "window_width";
pub const WINDOW_HEIGHT: &str = "window_height";

pub(crate) fn initial_record(frame_ms: f64) -> Record {
    let mut record = Record::new();
    record.insert(FRAME_MS.into(), frame_ms.into());
    record.insert(LEAVE_COUNT.into(), 0.into());
    let env = Reactive::new(record);
    derive_sizes(&env);
    env.snapshot()
}

/// Re-derive `dpr` and the physical sizes from the host environment.
pub(crate) fn derive_sizes(env: &Reactive) {
    let host = runtime::environment();
    let dpr = host.pixel_ratio;
    env.set(DPR, dpr);
    env.set(SCREEN_WIDTH, host.screen_width * dpr);
    env.set(SCREEN_HEIGHT, host.screen_height * dpr);
    env.set(WINDOW_WIDTH, host.window_width * dpr);
    env.set(WINDOW_HEIGHT, host.window_height * dpr);
}

/// The live resolution query and its listener.
pub(crate) struct MediaWatch {
    _list: MediaQueryList,
    cleanup: Cleanup,
}

pub(crate) type PixelRatioSlot = Rc<RefCell<Option<MediaWatch>>>;

/// Subscribe to pixel-ratio changes. Dropping the slot's content, or
/// calling [`stop_pixel_ratio_watch`], ends the watch.
pub(crate) fn watch_pixel_ratio(env: &Reactive) -> PixelRatioSlot {
    let slot: PixelRatioSlot = Rc::new(RefCell::new(None));
    subscribe(env.clone(), Rc::downgrade(&slot));
    slot
}

pub(crate) fn stop_pixel_ratio_watch(slot: &PixelRatioSlot) {
    let watch = slot.borrow_mut().take();
    if let Some(watch) = watch {
        (watch.cleanup)();
    }
}

fn subscribe(env: Reactive, slot: Weak<RefCell<Option<MediaWatch>>>) {
    let Some(strong) = slot.upgrade() else {
        return;
    };
    let ratio = runtime::environment().pixel_ratio;
    let list = runtime::match_media(&format!("(resolution: {ratio}dppx)"));

    let e = env.clone();
    let s = slot.clone();
    let cleanup = list.add_event_listener("change", move |_| {
        derive_sizes(&e);
        log::debug!("pixel ratio changed to {}", runtime::environment().pixel_ratio);
        subscribe(e.clone(), s.clone());
        Ok(())
    });

    let previous = strong.borrow_mut().replace(MediaWatch {
        _list: list,
        cleanup,
    });
    if let Some(previous) = previous {
        (previous.cleanup)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Environment;
    use crate::runtime::reset_runtime;

    fn setup(pixel_ratio: f64) {
        reset_runtime();
        runtime::set_environment(Environment {
            pixel_ratio,
            ..Environment::default()
        });
    }

    #[test]
    fn test_sizes_are_physical() {
        setup(2.0);
        let env = Reactive::new(initial_record(16.0));
        assert_eq!(env.get_f64(DPR), Some(2.0));
        assert_eq!(env.get_f64(SCREEN_WIDTH), Some(3840.0));
        assert_eq!(env.get_f64(WINDOW_HEIGHT), Some(1440.0));
        assert_eq!(env.get_f64(LEAVE_COUNT), Some(0.0));
    }

    #[test]
    fn test_watch_follows_successive_ratio_changes() {
        setup(1.0);
        let env = Reactive::new(initial_record(16.0));
        let slot = watch_pixel_ratio(&env);

        for ratio in [1.5, 2.0, 1.0] {
            runtime::set_environment(Environment {
                pixel_ratio: ratio,
                ..Environment::default()
            });
            runtime::notify_pixel_ratio(ratio);
            assert_eq!(env.get_f64(DPR), Some(ratio));
        }

        stop_pixel_ratio_watch(&slot);
        runtime::set_environment(Environment {
            pixel_ratio: 3.0,
            ..Environment::default()
        });
        runtime::notify_pixel_ratio(3.0);
        assert_eq!(env.get_f64(DPR), Some(1.0));
    }
}
