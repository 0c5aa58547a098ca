//! App Module - Experiment-wide context.
//!
//! An [`App`] owns the root element scenes are mounted under, the measured
//! frame duration, and reactive environment state (`App::env`): pixel ratio,
//! physical screen and window sizes, and how often the participant left the
//! page. It is created once per session by the async [`App::create`],
//! which measures the display before returning.
//!
//! # Example
//!
//! ```ignore
//! let mut runtime = Runtime::new(TerminalHost::new()?);
//! runtime.block_on(async {
//!     let app = App::create(AppOptions::default()).await?;
//!     println!("{:.2}ms per frame", app.frame_ms());
//!     // ... build and show scenes ...
//!     app.dispose();
//!     Ok::<_, psyframe::Error>(())
//! })??;
//! ```

mod environment;
pub mod measure;

pub use environment::{
    DPR, FRAME_MS, LEAVE_COUNT, SCREEN_HEIGHT, SCREEN_WIDTH, WINDOW_HEIGHT, WINDOW_WIDTH,
};
pub use measure::{measure_frame_duration, FrameStats, DEFAULT_SAMPLES};

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::dom::{self, Cleanup, Element};
use crate::error::{Error, Result};
use crate::reactive::Reactive;
use crate::runtime;
use crate::scene::{Scene, SceneContext, SceneOptions, Setup};
use environment::PixelRatioSlot;

// =============================================================================
// OPTIONS
// =============================================================================

#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Element scenes mount under. A fresh element on the body when unset.
    pub root: Option<Element>,
    /// Refresh intervals collected by the frame measurement.
    pub samples: usize,
    /// Known frame duration (ms). Skips the measurement.
    pub frame_ms: Option<f64>,
    /// Shown in the root when the app is disposed.
    pub closing_message: String,
    /// Ask for confirmation when the participant tries to leave.
    pub confirm_leave: bool,
    /// Alert shown when the page is hidden mid-session.
    pub leave_alert: Option<String>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            root: None,
            samples: DEFAULT_SAMPLES,
            frame_ms: None,
            closing_message: "The experiment is over. Thank you for taking part.".to_string(),
            confirm_leave: true,
            leave_alert: Some(
                "Please keep this page open and in front until the experiment is over."
                    .to_string(),
            ),
        }
    }
}

impl AppOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, root: Element) -> Self {
        self.root = Some(root);
        self
    }

    pub fn samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub fn frame_ms(mut self, frame_ms: f64) -> Self {
        self.frame_ms = Some(frame_ms);
        self
    }

    pub fn closing_message(mut self, message: impl Into<String>) -> Self {
        self.closing_message = message.into();
        self
    }

    pub fn confirm_leave(mut self, confirm: bool) -> Self {
        self.confirm_leave = confirm;
        self
    }

    pub fn leave_alert(mut self, alert: Option<String>) -> Self {
        self.leave_alert = alert;
        self
    }
}

// =============================================================================
// APP
// =============================================================================

struct AppInner {
    root: Element,
    env: Reactive,
    closing_message: String,
    cleanups: RefCell<Vec<Cleanup>>,
    pixel_ratio: PixelRatioSlot,
    overlay: RefCell<Option<Element>>,
    disposed: Cell<bool>,
}

impl AppInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        for cleanup in self.cleanups.borrow_mut().drain(..) {
            cleanup();
        }
        environment::stop_pixel_ratio_watch(&self.pixel_ratio);
        self.overlay.borrow_mut().take();

        self.root.clear_children();
        self.root
            .append_child(&Element::with_text("closing", self.closing_message.as_str()));
        self.env.release();
        log::info!("app disposed");
    }
}

impl Drop for AppInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Shared experiment context. Clones share state; the last one dropped
/// disposes it.
#[derive(Clone)]
pub struct App {
    inner: Rc<AppInner>,
}

impl App {
    /// Attach the root, measure the frame duration (unless given) and start
    /// watching the environment.
    pub async fn create(options: AppOptions) -> Result<App> {
        let root = attach_root(options.root.clone());
        let frame_ms = match options.frame_ms {
            Some(frame_ms) => frame_ms,
            None => measure_frame_duration(&root, options.samples).await?.frame_ms,
        };
        Ok(Self::assemble(root, options, frame_ms))
    }

    /// Build an app with a known frame duration, without measuring.
    pub fn with_frame_ms(options: AppOptions, frame_ms: f64) -> App {
        let root = attach_root(options.root.clone());
        Self::assemble(root, options, frame_ms)
    }

    fn assemble(root: Element, options: AppOptions, frame_ms: f64) -> App {
        let env = Reactive::new(environment::initial_record(frame_ms));
        let window = dom::window();
        let mut cleanups = Vec::new();

        let e = env.clone();
        cleanups.push(window.add_event_listener("resize", move |_| {
            environment::derive_sizes(&e);
            Ok(())
        }));

        let e = env.clone();
        let leave_alert = options.leave_alert.clone();
        cleanups.push(window.add_event_listener("visibilitychange", move |_| {
            if runtime::environment().visible {
                return Ok(());
            }
            let count = e
                .get_untracked(LEAVE_COUNT)
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            e.set(LEAVE_COUNT, count + 1.0);
            log::warn!("participant left the page ({} times)", count + 1.0);
            if let Some(message) = &leave_alert {
                runtime::alert(message.as_str());
            }
            Ok(())
        }));

        if options.confirm_leave {
            cleanups.push(window.add_event_listener("beforeunload", |ev| {
                ev.prevent_default();
                Ok(())
            }));
        }

        let pixel_ratio = environment::watch_pixel_ratio(&env);
        log::info!("app ready, {frame_ms:.3}ms per frame");

        App {
            inner: Rc::new(AppInner {
                root,
                env,
                closing_message: options.closing_message,
                cleanups: RefCell::new(cleanups),
                pixel_ratio,
                overlay: RefCell::new(None),
                disposed: Cell::new(false),
            }),
        }
    }

    pub fn root(&self) -> &Element {
        &self.inner.root
    }

    /// Reactive environment state (see the key constants in this module).
    pub fn env(&self) -> &Reactive {
        &self.inner.env
    }

    /// Frame duration (ms) used for scene timing.
    pub fn frame_ms(&self) -> f64 {
        self.inner
            .env
            .get_untracked(FRAME_MS)
            .and_then(|v| v.as_f64())
            .unwrap_or(measure::FALLBACK_FRAME_MS)
    }

    /// Times the participant hid the page since startup.
    pub fn leave_count(&self) -> u32 {
        self.inner
            .env
            .get_untracked(LEAVE_COUNT)
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0) as u32
    }

    /// Create a scene under this app's root.
    pub fn scene<F>(&self, setup: F, options: SceneOptions) -> Result<Scene>
    where
        F: FnOnce(&Reactive, &SceneContext) -> anyhow::Result<Setup>,
    {
        Scene::new(self, setup, options)
    }

    /// Log `err` and show it to the participant in place of the current overlay.
    pub fn report_error(&self, err: &Error) {
        log::error!("experiment error: {err}");
        let overlay = Element::with_text("error", format!("Something went wrong: {err}"));
        self.inner.root.append_child(&overlay);
        if let Some(previous) = self.inner.overlay.borrow_mut().replace(overlay) {
            previous.remove();
        }
    }

    /// Detach global listeners, clear the root and show the closing message.
    /// Only the first call does anything.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("env", &self.inner.env)
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

fn attach_root(root: Option<Element>) -> Element {
    let body = dom::body();
    match root {
        Some(root) => {
            if !root.is_connected() {
                log::warn!("app root is not attached to the document, appending it to the body");
                body.append_child(&root);
            }
            root
        }
        None => {
            let root = Element::new("app");
            body.append_child(&root);
            root
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
