//! Scene Module - One timed, displayable unit of an experiment.
//!
//! A scene owns a root element (collapsed while closed), reactive props and
//! an event emitter. Setup runs once at construction and builds the DOM
//! subtree; every `show` then runs a refresh-driven frame loop until the
//! scene closes, and resolves with a [`SceneResult`].
//!
//! ```text
//!            show(patch)
//!   Closed ─────────────▶ Shown ──┐ refresh: record, test closing
//!     ▲                     │ ◀───┘
//!     └──── close() ────────┘  (explicit, close_on event, or duration)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let fixation = app.scene(
//!     |_props, _ctx| Ok(Setup::new("+")),
//!     SceneOptions::new().duration(500.0),
//! )?;
//! let result = fixation.show(None)?.await?;
//! ```

mod events;
mod options;
mod result;
pub mod timing;

pub use events::*;
pub use options::*;
pub use result::*;

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::FutureExt;
use indexmap::IndexSet;

use crate::app::App;
use crate::config;
use crate::dom::{Cleanup, Element};
use crate::emitter::{listener, Emitter, Listener};
use crate::error::{Error, Result};
use crate::reactive::{untracked, Reactive};
use crate::runtime::{cancel_animation_frame, request_animation_frame, FrameRequestId};
use crate::value::Record;

// =============================================================================
// SETUP CONTRACT
// =============================================================================

/// Reads the scene's data at close time.
pub type DataFn = Box<dyn Fn() -> Record>;

/// Node(s) returned by setup, appended to the scene root.
#[derive(Debug, Clone, Default)]
pub enum Nodes {
    #[default]
    Empty,
    One(Element),
    Many(Vec<Element>),
    Text(String),
}

impl Nodes {
    fn into_elements(self) -> Vec<Element> {
        match self {
            Nodes::Empty => Vec::new(),
            Nodes::One(el) => vec![el],
            Nodes::Many(els) => els,
            Nodes::Text(text) => vec![Element::text(text)],
        }
    }
}

impl From<Element> for Nodes {
    fn from(el: Element) -> Self {
        Nodes::One(el)
    }
}

impl From<Vec<Element>> for Nodes {
    fn from(els: Vec<Element>) -> Self {
        Nodes::Many(els)
    }
}

impl From<&str> for Nodes {
    fn from(text: &str) -> Self {
        Nodes::Text(text.to_string())
    }
}

impl From<String> for Nodes {
    fn from(text: String) -> Self {
        Nodes::Text(text)
    }
}

/// What setup returns.
pub struct Setup {
    pub node: Nodes,
    pub data: Option<DataFn>,
}

impl Setup {
    pub fn new(node: impl Into<Nodes>) -> Self {
        Self {
            node: node.into(),
            data: None,
        }
    }

    /// Data accessor, called once per showing when it closes.
    pub fn with_data(mut self, data: impl Fn() -> Record + 'static) -> Self {
        self.data = Some(Box::new(data));
        self
    }
}

// =============================================================================
// STATE
// =============================================================================

struct Showing {
    start_time: Option<f64>,
    last_frame: f64,
    frame_times: Vec<f64>,
    frame_request: Option<FrameRequestId>,
    record_frames: bool,
    duration: Option<f64>,
    frame_ms: f64,
    /// DOM types with a forwarding listener on the root.
    forwarded: IndexSet<String>,
    cleanups: Vec<Cleanup>,
    sender: Option<oneshot::Sender<Result<SceneResult>>>,
}

impl Showing {
    /// Release what the showing holds on the document and the refresh loop.
    fn teardown(&mut self) {
        if let Some(id) = self.frame_request.take() {
            cancel_animation_frame(id);
        }
        for cleanup in self.cleanups.drain(..) {
            cleanup();
        }
        self.forwarded.clear();
    }
}

enum Phase {
    Closed,
    Shown(Showing),
}

struct SceneInner {
    app: App,
    props: Reactive,
    root: Element,
    events: Emitter<SceneEvent>,
    options: RefCell<SceneOptions>,
    data: RefCell<Option<DataFn>>,
    phase: RefCell<Phase>,
}

impl SceneInner {
    fn is_shown(&self) -> bool {
        matches!(*self.phase.borrow(), Phase::Shown(_))
    }

    fn frame_ms(&self) -> f64 {
        self.options
            .borrow()
            .frame_ms
            .unwrap_or_else(|| self.app.frame_ms())
    }

    fn on(self: &Rc<Self>, name: &str, listener: Listener<SceneEvent>) {
        self.events.on(name, listener);
        self.forward(name);
    }

    fn once(self: &Rc<Self>, name: &str, listener: Listener<SceneEvent>) -> Listener<SceneEvent> {
        let wrapper = self.events.once(name, listener);
        self.forward(name);
        wrapper
    }

    fn show(self: &Rc<Self>, patch: Option<Record>) -> Result<ShowFuture> {
        if self.is_shown() {
            return Err(Error::InvalidState {
                operation: "show",
                state: "shown",
            });
        }

        let options = self.options.borrow().clone();
        let mut props = (options.defaults)();
        if let Some(patch) = patch {
            props.extend(patch);
        }
        self.props.assign(props);

        let frame_ms = options.frame_ms.unwrap_or_else(|| self.app.frame_ms());
        let (sender, receiver) = oneshot::channel();
        *self.phase.borrow_mut() = Phase::Shown(Showing {
            start_time: None,
            last_frame: 0.0,
            frame_times: Vec::new(),
            frame_request: None,
            record_frames: options.frame_times,
            duration: options.duration,
            frame_ms,
            forwarded: IndexSet::new(),
            cleanups: Vec::new(),
            sender: Some(sender),
        });

        self.root.set_collapsed(false);
        self.root.focus();

        for kind in &options.close_on {
            let scene = Rc::downgrade(self);
            let cleanup = self.root.add_event_listener(kind, move |_| {
                match scene.upgrade() {
                    Some(scene) if scene.is_shown() => Ok(scene.close()?),
                    _ => Ok(()),
                }
            });
            self.push_cleanup(cleanup);
        }
        for name in self.events.event_names() {
            self.forward(&name);
        }

        if let Some(duration) = options.duration {
            if config::is_development() {
                if let Some(diff) = timing::duration_mismatch(duration, frame_ms) {
                    log::warn!(
                        "scene duration {duration}ms is {diff:+.2}ms off a whole number of \
                         {frame_ms:.2}ms frames; it will show for {} frames",
                        timing::closing_frame(duration, frame_ms) + 1
                    );
                }
            }
        }

        self.request_frame();
        log::debug!("scene shown");
        if let Err(err) = self
            .events
            .emit(SHOWN, &SceneEvent::Shown(self.props.clone()))
        {
            self.abandon();
            return Err(err);
        }
        Ok(ShowFuture { receiver })
    }

    /// Return to Closed without producing a result.
    fn abandon(&self) {
        let phase = std::mem::replace(&mut *self.phase.borrow_mut(), Phase::Closed);
        if let Phase::Shown(mut showing) = phase {
            self.root.set_collapsed(true);
            showing.teardown();
            self.root.blur();
            log::debug!("scene show abandoned");
        }
    }

    fn close(self: &Rc<Self>) -> Result<()> {
        let phase = std::mem::replace(&mut *self.phase.borrow_mut(), Phase::Closed);
        let Phase::Shown(mut showing) = phase else {
            return Err(Error::InvalidState {
                operation: "close",
                state: "closed",
            });
        };

        self.root.set_collapsed(true);
        showing.teardown();
        self.root.blur();

        let result = SceneResult {
            start_time: showing.start_time.unwrap_or(0.0),
            frame_times: std::mem::take(&mut showing.frame_times),
            last_frame: showing.last_frame,
            data: self.collect_data(),
        };
        log::debug!(
            "scene closed after {:.2}ms",
            result.last_frame - result.start_time
        );

        let emitted = self
            .events
            .emit(CLOSED, &SceneEvent::Closed(result.clone()));
        if let Some(sender) = showing.sender.take() {
            let _ = sender.send(Ok(result));
        }
        emitted.map(|_| ())
    }

    fn collect_data(&self) -> Record {
        let data = self.data.borrow();
        match data.as_ref() {
            Some(data) => untracked(data),
            None => Record::new(),
        }
    }

    fn push_cleanup(&self, cleanup: Cleanup) {
        match &mut *self.phase.borrow_mut() {
            Phase::Shown(showing) => showing.cleanups.push(cleanup),
            Phase::Closed => cleanup(),
        }
    }

    /// Attach the DOM listener feeding `name`, once per DOM type per showing.
    fn forward(self: &Rc<Self>, name: &str) {
        let Some(kind) = events::dom_source(name) else {
            return;
        };
        {
            let mut phase = self.phase.borrow_mut();
            let Phase::Shown(showing) = &mut *phase else {
                return;
            };
            if !showing.forwarded.insert(kind.to_string()) {
                return;
            }
        }

        let emitter = self.events.clone();
        let cleanup = self.root.add_event_listener(kind, move |ev| {
            let payload = SceneEvent::Input(ev.clone());
            for name in events::forwarded_names(ev) {
                emitter.emit(&name, &payload)?;
            }
            Ok(())
        });
        self.push_cleanup(cleanup);
    }

    fn request_frame(self: &Rc<Self>) {
        let scene = Rc::downgrade(self);
        let id = request_animation_frame(move |timestamp| {
            if let Some(scene) = scene.upgrade() {
                scene.on_frame(timestamp);
            }
        });
        match &mut *self.phase.borrow_mut() {
            Phase::Shown(showing) => showing.frame_request = Some(id),
            Phase::Closed => {
                cancel_animation_frame(id);
            }
        }
    }

    fn on_frame(self: &Rc<Self>, timestamp: f64) {
        let close = {
            let mut phase = self.phase.borrow_mut();
            let Phase::Shown(showing) = &mut *phase else {
                return;
            };
            showing.frame_request = None;
            let start = match showing.start_time {
                Some(start) => start,
                None => {
                    showing.start_time = Some(timestamp);
                    showing.frame_times.clear();
                    timestamp
                }
            };
            showing.last_frame = timestamp;
            if showing.record_frames {
                showing.frame_times.push(timestamp);
            }
            showing
                .duration
                .is_some_and(|d| timing::should_close(timestamp - start, d, showing.frame_ms))
        };

        if close {
            if let Err(err) = self.close() {
                log::error!("closing scene on refresh failed: {err}");
            }
        } else {
            self.request_frame();
        }
    }

    fn dispose(&self) {
        let phase = std::mem::replace(&mut *self.phase.borrow_mut(), Phase::Closed);
        if let Phase::Shown(mut showing) = phase {
            showing.teardown();
            self.root.set_collapsed(true);
            self.root.blur();
            if let Some(sender) = showing.sender.take() {
                let _ = sender.send(Err(Error::SceneDropped));
            }
        }
        if let Err(err) = self.events.dispose() {
            log::error!("scene dispose listener failed: {err}");
        }
        self.props.release();
    }
}

// =============================================================================
// SCENE
// =============================================================================

/// Owning handle. Dropping it disposes the scene and removes its root.
pub struct Scene {
    inner: Rc<SceneInner>,
}

impl Scene {
    /// Build a scene under `app`'s root and run `setup` once.
    pub fn new<F>(app: &App, setup: F, options: SceneOptions) -> Result<Scene>
    where
        F: FnOnce(&Reactive, &SceneContext) -> anyhow::Result<Setup>,
    {
        let props = Reactive::new((options.defaults)());
        let root = Element::new("scene");
        root.set_collapsed(true);
        app.root().append_child(&root);

        let inner = Rc::new(SceneInner {
            app: app.clone(),
            props: props.clone(),
            root: root.clone(),
            events: Emitter::new(),
            options: RefCell::new(options),
            data: RefCell::new(None),
            phase: RefCell::new(Phase::Closed),
        });
        let ctx = SceneContext {
            inner: Rc::downgrade(&inner),
        };

        let setup = match untracked(|| setup(&props, &ctx)) {
            Ok(setup) => setup,
            Err(err) => {
                root.remove();
                inner.events.clear();
                inner.props.release();
                return Err(Error::Setup(err));
            }
        };
        for node in setup.node.into_elements() {
            root.append_child(&node);
        }
        *inner.data.borrow_mut() = setup.data;

        inner.events.on(
            DISPOSE,
            listener(move |_| {
                root.remove();
                Ok(())
            }),
        );

        Ok(Scene { inner })
    }

    /// Show the scene. The future resolves when this showing closes.
    ///
    /// `patch` is merged over the default props. Fails if already shown.
    pub fn show(&self, patch: Option<Record>) -> Result<ShowFuture> {
        self.inner.show(patch)
    }

    /// Close the scene now. Fails if already closed.
    pub fn close(&self) -> Result<()> {
        self.inner.close()
    }

    pub fn is_shown(&self) -> bool {
        self.inner.is_shown()
    }

    /// Override options for the following showings.
    pub fn config(&self, patch: ScenePatch) -> &Self {
        self.inner.options.borrow_mut().apply(patch);
        self
    }

    pub fn options(&self) -> SceneOptions {
        self.inner.options.borrow().clone()
    }

    pub fn props(&self) -> &Reactive {
        &self.inner.props
    }

    pub fn root(&self) -> &Element {
        &self.inner.root
    }

    /// Frame duration used for this scene's timing.
    pub fn frame_ms(&self) -> f64 {
        self.inner.frame_ms()
    }

    pub fn on(&self, name: &str, listener: Listener<SceneEvent>) -> &Self {
        self.inner.on(name, listener);
        self
    }

    pub fn once(&self, name: &str, listener: Listener<SceneEvent>) -> Listener<SceneEvent> {
        self.inner.once(name, listener)
    }

    pub fn off(&self, name: &str, listener: &Listener<SceneEvent>) -> &Self {
        self.inner.events.off(name, listener);
        self
    }

    /// Weak handle, as passed to setup.
    pub fn context(&self) -> SceneContext {
        SceneContext {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("shown", &self.is_shown())
            .field("props", &self.inner.props)
            .finish()
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Weak scene handle for setup code and listeners.
///
/// Everything is a no-op (or an error for `close`) once the scene is gone.
#[derive(Clone)]
pub struct SceneContext {
    inner: Weak<SceneInner>,
}

impl SceneContext {
    pub fn props(&self) -> Option<Reactive> {
        self.inner.upgrade().map(|s| s.props.clone())
    }

    pub fn root(&self) -> Option<Element> {
        self.inner.upgrade().map(|s| s.root.clone())
    }

    pub fn frame_ms(&self) -> Option<f64> {
        self.inner.upgrade().map(|s| s.frame_ms())
    }

    pub fn is_shown(&self) -> bool {
        self.inner.upgrade().is_some_and(|s| s.is_shown())
    }

    pub fn on(&self, name: &str, listener: Listener<SceneEvent>) -> &Self {
        if let Some(scene) = self.inner.upgrade() {
            scene.on(name, listener);
        }
        self
    }

    pub fn once(&self, name: &str, listener: Listener<SceneEvent>) -> Option<Listener<SceneEvent>> {
        self.inner.upgrade().map(|scene| scene.once(name, listener))
    }

    pub fn off(&self, name: &str, listener: &Listener<SceneEvent>) -> &Self {
        if let Some(scene) = self.inner.upgrade() {
            scene.events.off(name, listener);
        }
        self
    }

    pub fn close(&self) -> Result<()> {
        match self.inner.upgrade() {
            Some(scene) => scene.close(),
            None => Err(Error::SceneDropped),
        }
    }
}

// =============================================================================
// SHOW FUTURE
// =============================================================================

/// Resolves with the showing's result when the scene closes.
#[must_use = "the scene result is only delivered through this future"]
pub struct ShowFuture {
    receiver: oneshot::Receiver<Result<SceneResult>>,
}

impl Future for ShowFuture {
    type Output = Result<SceneResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.receiver.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(Error::SceneDropped)),
            Poll::Pending => Poll::Pending,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
