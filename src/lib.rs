//! # psyframe
//!
//! Frame-accurate scenes and fine-grained reactivity for psychophysics
//! experiments.
//!
//! ## Architecture
//!
//! An experiment is a sequence of [`Scene`]s mounted under one [`App`]. Each
//! showing of a scene is timed in display refreshes rather than wall-clock
//! timers: the scene records the timestamp of its first refresh and closes
//! on the refresh whose elapsed time best approximates the requested
//! duration. Scene props and the app environment are [`Reactive`] records;
//! effects that read them re-run once per batch of writes.
//!
//! ```text
//! Host (terminal / simulated) → Runtime (refresh loop, microtasks)
//!     → DOM events → Scene frame loop → SceneResult
//!     → Reactive writes → batched effect re-runs
//! ```
//!
//! ## Modules
//!
//! - [`reactive`] - Tracked records, effects, microtask-batched scheduling
//! - [`scene`] - Scene lifecycle, refresh-driven timing, event forwarding
//! - [`app`] - Frame measurement, environment state, leave detection
//! - [`emitter`] - Named-event emitter with one-shot listeners and dispose
//! - [`runtime`] - Refresh callbacks, microtask queue, media queries
//! - [`host`] - Platform seam: crossterm terminal and simulated display
//! - [`dom`] - Minimal element tree with bubbling events and focus
//! - [`config`] - Development/production mode
//! - [`value`] - Property values and records

pub mod app;
pub mod config;
pub mod dom;
pub mod emitter;
pub mod error;
pub mod host;
pub mod reactive;
pub mod runtime;
pub mod scene;
pub mod value;

// Re-export commonly used items
pub use value::{Record, Value};

pub use error::{Error, Result};

pub use config::{is_development, mode, set_mode, Mode};

pub use reactive::{
    effect, flush_effects, pending_effects, reactive, try_effect, untracked, Reactive,
};

pub use emitter::{listener, Emitter, Listener};

pub use dom::{
    body, window, Cleanup, DomEvent, Element, KeyboardEvent, Modifiers, MouseButton, MouseEvent,
};

pub use runtime::{
    cancel_animation_frame, queue_microtask, request_animation_frame, run_microtasks, Runtime,
};

pub use host::{Environment, Host, HostEvent, SimulatedHost, TerminalHost};

pub use scene::{
    Nodes, Scene, SceneContext, SceneEvent, SceneOptions, ScenePatch, SceneResult, Setup,
    ShowFuture, CLOSED, DISPOSE, SHOWN,
};

pub use app::{measure_frame_duration, App, AppOptions, FrameStats};
