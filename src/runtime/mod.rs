//! Runtime Module - Single-threaded, refresh-driven event loop.
//!
//! Two scheduling primitives drive everything: the display-refresh callback
//! ([`request_animation_frame`]) and the microtask queue
//! ([`queue_microtask`]). [`Runtime`] pulls refreshes from a [`Host`] and
//! runs one turn per refresh:
//!
//! ```text
//! host.next_frame() → dispatch input (microtasks after each)
//!                   → refresh callbacks(timestamp) (microtasks after each)
//!                   → host requests (alert/reload) → host.present(body)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut runtime = Runtime::new(SimulatedHost::new());
//! let result = runtime.block_on(async {
//!     let app = App::create(AppOptions::default()).await?;
//!     let scene = app.scene(setup, SceneOptions::default().duration(500.0))?;
//!     scene.show(None)?.await
//! })??;
//! ```

mod frame;
mod media;
mod microtask;

pub use frame::*;
pub use media::{match_media, reset_media, MediaQueryList};
pub(crate) use media::notify_pixel_ratio;
pub use microtask::*;

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::io;
use std::pin::pin;
use std::task::{Context, Poll};

use crate::dom::{self, DomEvent, Element, EventDetail, MouseAction, MouseButton};
use crate::error::{Error, Result};
use crate::host::{Environment, Host, HostEvent, TimedEvent};

// =============================================================================
// ENVIRONMENT & HOST REQUESTS
// =============================================================================

enum HostRequest {
    Alert(String),
    Reload,
}

thread_local! {
    static ENVIRONMENT: Cell<Environment> = Cell::new(Environment::default());
    static REQUESTS: RefCell<Vec<HostRequest>> = const { RefCell::new(Vec::new()) };
}

/// Latest environment reported by the host.
pub fn environment() -> Environment {
    ENVIRONMENT.with(Cell::get)
}

pub fn set_environment(environment: Environment) {
    ENVIRONMENT.with(|e| e.set(environment));
}

fn update_environment(update: impl FnOnce(&mut Environment)) {
    ENVIRONMENT.with(|e| {
        let mut env = e.get();
        update(&mut env);
        e.set(env);
    });
}

/// Show a blocking message to the participant at the end of this turn.
pub fn alert(message: impl Into<String>) {
    let message = message.into();
    log::warn!("alert: {message}");
    REQUESTS.with(|r| r.borrow_mut().push(HostRequest::Alert(message)));
}

/// Ask the host to restart the session at the end of this turn.
pub fn request_reload() {
    log::warn!("reload requested");
    REQUESTS.with(|r| r.borrow_mut().push(HostRequest::Reload));
}

/// Clear all thread-local runtime, reactive and document state (for testing).
pub fn reset_runtime() {
    reset_microtasks();
    reset_frame_callbacks();
    reset_media();
    REQUESTS.with(|r| r.borrow_mut().clear());
    set_environment(Environment::default());
    crate::reactive::reset_pending_effects();
    dom::reset_document();
}

// =============================================================================
// RUNTIME
// =============================================================================

/// Event loop bound to one host.
pub struct Runtime<H: Host> {
    host: H,
    frames: u64,
}

impl<H: Host> Runtime<H> {
    pub fn new(host: H) -> Self {
        set_environment(host.environment());
        Self { host, frames: 0 }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Refreshes processed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Process one display refresh. Returns its timestamp.
    pub fn step(&mut self) -> Result<f64> {
        let frame = self.host.next_frame().map_err(host_error)?;

        for event in frame.events {
            self.route(event);
            run_microtasks();
        }

        run_microtasks();
        run_frame_callbacks(frame.timestamp);
        run_microtasks();
        self.deliver_requests();

        self.host.present(&dom::body())?;
        self.frames += 1;
        Ok(frame.timestamp)
    }

    /// Process `count` refreshes.
    pub fn run_frames(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.step()?;
        }
        Ok(())
    }

    /// Drive `future` to completion, stepping refreshes while it is pending.
    pub fn block_on<F: Future>(&mut self, future: F) -> Result<F::Output> {
        let mut future = pin!(future);
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());

        loop {
            if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                run_microtasks();
                self.deliver_requests();
                return Ok(output);
            }

            // Microtasks may resolve what the future waits on.
            if run_microtasks() > 0 {
                self.deliver_requests();
                continue;
            }
            self.deliver_requests();
            self.step()?;
        }
    }

    fn route(&mut self, timed: TimedEvent) {
        let TimedEvent { timestamp, event } = timed;
        match event {
            HostEvent::Key(key) => {
                let ev = DomEvent::key(key).with_timestamp(timestamp);
                input_target().dispatch_event(&ev);
            }
            HostEvent::Mouse(mouse) => {
                let target = input_target();
                let release = mouse.action == MouseAction::Up;
                let click = if mouse.button == MouseButton::Left {
                    "click"
                } else {
                    "auxclick"
                };
                let detail = EventDetail::Mouse(mouse.clone());
                target.dispatch_event(&DomEvent::mouse(mouse).with_timestamp(timestamp));
                if release {
                    let ev = DomEvent::new(click)
                        .with_detail(detail)
                        .with_timestamp(timestamp);
                    target.dispatch_event(&ev);
                }
            }
            HostEvent::Visibility(visible) => {
                update_environment(|env| env.visible = visible);
                let ev = DomEvent::new("visibilitychange").with_timestamp(timestamp);
                dom::window().dispatch_event(&ev);
            }
            HostEvent::Resize { width, height } => {
                update_environment(|env| {
                    env.window_width = width;
                    env.window_height = height;
                });
                let ev = DomEvent::new("resize").with_timestamp(timestamp);
                dom::window().dispatch_event(&ev);
            }
            HostEvent::PixelRatio(ratio) => {
                update_environment(|env| env.pixel_ratio = ratio);
                notify_pixel_ratio(ratio);
            }
            HostEvent::BeforeUnload => {
                let ev = DomEvent::new("beforeunload").with_timestamp(timestamp);
                let proceed = dom::window().dispatch_event(&ev);
                self.host.unload(!proceed);
            }
        }
    }

    fn deliver_requests(&mut self) {
        let requests = REQUESTS.with(|r| std::mem::take(&mut *r.borrow_mut()));
        for request in requests {
            match request {
                HostRequest::Alert(message) => self.host.alert(&message),
                HostRequest::Reload => self.host.reload(),
            }
        }
    }
}

/// Keyboard and mouse input goes to the focused element, else the body.
fn input_target() -> Element {
    dom::active_element()
        .filter(Element::is_connected)
        .unwrap_or_else(dom::body)
}

fn host_error(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::Interrupted {
        Error::Aborted
    } else {
        Error::Io(err)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::KeyboardEvent;
    use crate::host::SimulatedHost;
    use std::rc::Rc;

    fn setup() {
        reset_runtime();
    }

    #[test]
    fn test_step_runs_frame_callbacks_with_host_timestamp() {
        setup();
        let mut runtime = Runtime::new(SimulatedHost::new().with_interval(10.0).with_start(100.0));
        let seen = Rc::new(Cell::new(0.0));
        let s = seen.clone();
        request_animation_frame(move |t| s.set(t));

        let t = runtime.step().unwrap();
        assert_eq!(t, 100.0);
        assert_eq!(seen.get(), 100.0);
        assert_eq!(runtime.step().unwrap(), 110.0);
        assert_eq!(runtime.frames(), 2);
    }

    #[test]
    fn test_microtasks_drain_before_frame_callbacks() {
        setup();
        let mut runtime = Runtime::new(SimulatedHost::new());
        let order = Rc::new(RefCell::new(Vec::new()));
        let o = order.clone();
        request_animation_frame(move |_| o.borrow_mut().push("frame"));
        let o = order.clone();
        queue_microtask(move || o.borrow_mut().push("micro"));

        runtime.step().unwrap();
        assert_eq!(*order.borrow(), vec!["micro", "frame"]);
    }

    #[test]
    fn test_keys_reach_focused_element() {
        setup();
        let host = SimulatedHost::new().at(0, HostEvent::Key(KeyboardEvent::new("a")));
        let mut runtime = Runtime::new(host);

        let el = Element::new("scene");
        dom::body().append_child(&el);
        el.focus();
        let got = Rc::new(RefCell::new(None));
        let g = got.clone();
        let _cleanup = el.add_event_listener("keydown", move |ev| {
            *g.borrow_mut() = ev.key_name().map(str::to_string);
            Ok(())
        });

        runtime.step().unwrap();
        assert_eq!(got.borrow().as_deref(), Some("a"));
    }

    #[test]
    fn test_alerts_reach_host() {
        setup();
        let mut runtime = Runtime::new(SimulatedHost::new());
        alert("please stay on this page");
        request_reload();
        runtime.step().unwrap();
        assert_eq!(runtime.host().alerts(), ["please stay on this page".to_string()]);
        assert_eq!(runtime.host().reloads(), 1);
    }

    #[test]
    fn test_block_on_steps_until_ready() {
        setup();
        let mut runtime = Runtime::new(SimulatedHost::new());
        let (tx, rx) = futures::channel::oneshot::channel::<f64>();
        let tx = RefCell::new(Some(tx));
        request_animation_frame(move |_| {
            request_animation_frame(move |t| {
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(t);
                }
            });
        });

        let t = runtime.block_on(rx).unwrap().unwrap();
        assert_eq!(runtime.frames(), 2);
        assert!(t > 0.0);
    }

    #[test]
    fn test_frame_limit_surfaces_as_io_error() {
        setup();
        let mut runtime = Runtime::new(SimulatedHost::new().with_frame_limit(3));
        let never = futures::future::pending::<()>();
        assert!(matches!(runtime.block_on(never), Err(Error::Io(_))));
        assert_eq!(runtime.frames(), 3);
    }
}
