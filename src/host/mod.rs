//! Host Module - The platform seam.
//!
//! A host owns the real (or simulated) display and input devices. The
//! runtime asks it for one refresh at a time and hands it the document to
//! present. Everything above this trait is platform-independent.
//!
//! - [`SimulatedHost`] - Deterministic clock and scripted input (tests, headless runs)
//! - [`TerminalHost`] - crossterm terminal with an emulated fixed-rate refresh

mod simulated;
mod terminal;

pub use simulated::*;
pub use terminal::*;

use std::io;

use serde::Serialize;

use crate::dom::{Element, KeyboardEvent, MouseEvent};

// =============================================================================
// TYPES
// =============================================================================

/// Display and viewport facts, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Environment {
    pub pixel_ratio: f64,
    pub screen_width: f64,
    pub screen_height: f64,
    pub window_width: f64,
    pub window_height: f64,
    pub visible: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            pixel_ratio: 1.0,
            screen_width: 1920.0,
            screen_height: 1080.0,
            window_width: 1280.0,
            window_height: 720.0,
            visible: true,
        }
    }
}

/// Input and environment changes reported by a host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Key(KeyboardEvent),
    Mouse(MouseEvent),
    /// Page visibility changed (tab switch, terminal focus change).
    Visibility(bool),
    Resize { width: f64, height: f64 },
    PixelRatio(f64),
    /// The participant is trying to leave.
    BeforeUnload,
}

/// A host event with the time (ms) it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub timestamp: f64,
    pub event: HostEvent,
}

/// One display refresh: its timestamp and the input that arrived before it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub timestamp: f64,
    pub events: Vec<TimedEvent>,
}

// =============================================================================
// HOST TRAIT
// =============================================================================

pub trait Host {
    /// Block until the next display refresh.
    ///
    /// Timestamps must increase strictly. An `Interrupted` error means the
    /// participant ended the session.
    fn next_frame(&mut self) -> io::Result<Frame>;

    /// Show the current document.
    fn present(&mut self, body: &Element) -> io::Result<()>;

    /// Participant-facing blocking message.
    fn alert(&mut self, message: &str);

    /// Restart the session from scratch.
    fn reload(&mut self);

    /// Outcome of a `beforeunload` dispatch.
    fn unload(&mut self, prevented: bool) {
        let _ = prevented;
    }

    fn environment(&self) -> Environment;
}
