//! Scene options and per-instance overrides.

use std::fmt;
use std::rc::Rc;

use crate::value::Record;

/// Produces a fresh copy of the default props.
pub type DefaultsFn = Rc<dyn Fn() -> Record>;

/// How a scene is shown.
#[derive(Clone)]
pub struct SceneOptions {
    /// Default props, re-applied under the patch at every `show`.
    pub defaults: DefaultsFn,
    /// Frame duration (ms) for timing math; the app's measurement when unset.
    pub frame_ms: Option<f64>,
    /// Fixed on-screen duration (ms). Unset means the scene closes only on
    /// request or on a `close_on` event.
    pub duration: Option<f64>,
    /// DOM event types on the root that close the scene while shown.
    pub close_on: Vec<String>,
    /// Record the timestamp of every refresh while shown.
    pub frame_times: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            defaults: Rc::new(Record::new),
            frame_ms: None,
            duration: None,
            close_on: Vec::new(),
            frame_times: false,
        }
    }
}

impl fmt::Debug for SceneOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneOptions")
            .field("defaults", &(self.defaults)())
            .field("frame_ms", &self.frame_ms)
            .field("duration", &self.duration)
            .field("close_on", &self.close_on)
            .field("frame_times", &self.frame_times)
            .finish()
    }
}

impl SceneOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defaults(mut self, defaults: impl Fn() -> Record + 'static) -> Self {
        self.defaults = Rc::new(defaults);
        self
    }

    /// Use a fixed record as the defaults.
    pub fn with_defaults(self, defaults: Record) -> Self {
        self.defaults(move || defaults.clone())
    }

    pub fn frame_ms(mut self, frame_ms: f64) -> Self {
        self.frame_ms = Some(frame_ms);
        self
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Close on this DOM event type. May be called repeatedly.
    pub fn close_on(mut self, kind: impl Into<String>) -> Self {
        self.close_on.push(kind.into());
        self
    }

    pub fn frame_times(mut self, record: bool) -> Self {
        self.frame_times = record;
        self
    }

    pub(crate) fn apply(&mut self, patch: ScenePatch) {
        let ScenePatch {
            defaults,
            frame_ms,
            duration,
            close_on,
            frame_times,
        } = patch;
        if let Some(defaults) = defaults {
            self.defaults = defaults;
        }
        if let Some(frame_ms) = frame_ms {
            self.frame_ms = frame_ms;
        }
        if let Some(duration) = duration {
            self.duration = duration;
        }
        if let Some(close_on) = close_on {
            self.close_on = close_on;
        }
        if let Some(frame_times) = frame_times {
            self.frame_times = frame_times;
        }
    }
}

/// Shallow override for [`Scene::config`](super::Scene::config).
///
/// Unset fields keep their current value; `Some(None)` clears an optional one.
#[derive(Clone, Default)]
pub struct ScenePatch {
    pub defaults: Option<DefaultsFn>,
    pub frame_ms: Option<Option<f64>>,
    pub duration: Option<Option<f64>>,
    pub close_on: Option<Vec<String>>,
    pub frame_times: Option<bool>,
}

impl ScenePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defaults(mut self, defaults: impl Fn() -> Record + 'static) -> Self {
        self.defaults = Some(Rc::new(defaults));
        self
    }

    pub fn frame_ms(mut self, frame_ms: Option<f64>) -> Self {
        self.frame_ms = Some(frame_ms);
        self
    }

    pub fn duration(mut self, duration: Option<f64>) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn close_on<S: Into<String>>(mut self, kinds: impl IntoIterator<Item = S>) -> Self {
        self.close_on = Some(kinds.into_iter().map(Into::into).collect());
        self
    }

    pub fn frame_times(mut self, record: bool) -> Self {
        self.frame_times = Some(record);
        self
    }
}
