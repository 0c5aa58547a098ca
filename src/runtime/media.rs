//! Media queries (`matchMedia`).
//!
//! Only resolution queries of the form `(resolution: 2dppx)` are understood;
//! anything else never matches. A list fires `change` when the pixel ratio
//! moves it between matching and not matching.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::dom::{Cleanup, DomEvent, EventTarget};

const RATIO_EPSILON: f64 = 1e-6;

struct MediaInner {
    query: String,
    resolution: Option<f64>,
    matches: Cell<bool>,
    target: EventTarget,
}

/// A live media query.
#[derive(Clone)]
pub struct MediaQueryList {
    inner: Rc<MediaInner>,
}

thread_local! {
    static LISTS: RefCell<Vec<Weak<MediaInner>>> = const { RefCell::new(Vec::new()) };
}

pub fn match_media(query: &str) -> MediaQueryList {
    let resolution = parse_resolution(query);
    let matches = evaluate(resolution, super::environment().pixel_ratio);
    let inner = Rc::new(MediaInner {
        query: query.to_string(),
        resolution,
        matches: Cell::new(matches),
        target: EventTarget::new(),
    });
    LISTS.with(|lists| lists.borrow_mut().push(Rc::downgrade(&inner)));
    MediaQueryList { inner }
}

impl MediaQueryList {
    pub fn query(&self) -> &str {
        &self.inner.query
    }

    pub fn matches(&self) -> bool {
        self.inner.matches.get()
    }

    pub fn add_event_listener<F>(&self, kind: &str, listener: F) -> Cleanup
    where
        F: Fn(&DomEvent) -> anyhow::Result<()> + 'static,
    {
        self.inner.target.add_event_listener(kind, listener)
    }
}

fn parse_resolution(query: &str) -> Option<f64> {
    let body = query.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (feature, value) = body.split_once(':')?;
    if feature.trim() != "resolution" {
        return None;
    }
    value.trim().strip_suffix("dppx")?.trim().parse().ok()
}

fn evaluate(resolution: Option<f64>, pixel_ratio: f64) -> bool {
    resolution.is_some_and(|r| (r - pixel_ratio).abs() < RATIO_EPSILON)
}

/// Re-evaluate every live list against a new pixel ratio.
pub(crate) fn notify_pixel_ratio(pixel_ratio: f64) {
    let live: Vec<Rc<MediaInner>> = LISTS.with(|lists| {
        let mut lists = lists.borrow_mut();
        lists.retain(|w| w.strong_count() > 0);
        lists.iter().filter_map(Weak::upgrade).collect()
    });

    for list in live {
        let now = evaluate(list.resolution, pixel_ratio);
        if now != list.matches.get() {
            list.matches.set(now);
            list.target.fire(&DomEvent::new("change"));
        }
    }
}

pub fn reset_media() {
    LISTS.with(|lists| lists.borrow_mut().clear());
}
