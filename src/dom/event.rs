//! Event types - Keyboard, mouse and generic DOM events.
//!
//! Hosts produce [`KeyboardEvent`] and [`MouseEvent`] values; the runtime
//! wraps them in a [`DomEvent`] (`keydown`, `mousedown`, `click`, ...) and
//! dispatches that to the document.

use std::cell::Cell;

// =============================================================================
// MODIFIERS
// =============================================================================

bitflags::bitflags! {
    /// Modifier keys held during a keyboard or mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const CTRL = 1 << 0;
        const ALT = 1 << 1;
        const SHIFT = 1 << 2;
        const META = 1 << 3;
    }
}

// =============================================================================
// KEYBOARD
// =============================================================================

/// Key event state (press, repeat, release)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KeyState {
    #[default]
    Press,
    Repeat,
    Release,
}

/// Keyboard event
#[derive(Clone, Debug, PartialEq)]
pub struct KeyboardEvent {
    /// The key that was pressed (e.g., "a", "Enter", "ArrowUp", " ")
    pub key: String,
    pub modifiers: Modifiers,
    pub state: KeyState,
}

impl KeyboardEvent {
    /// Create a simple key press event
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::empty(),
            state: KeyState::Press,
        }
    }

    pub fn with_modifiers(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            modifiers,
            ..Self::new(key)
        }
    }

    pub fn release(key: impl Into<String>) -> Self {
        Self {
            state: KeyState::Release,
            ..Self::new(key)
        }
    }

    /// DOM event type this key event dispatches as.
    pub fn dom_type(&self) -> &'static str {
        match self.state {
            KeyState::Press | KeyState::Repeat => "keydown",
            KeyState::Release => "keyup",
        }
    }
}

// =============================================================================
// MOUSE
// =============================================================================

/// Mouse action type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Down,
    Up,
    Move,
}

/// Mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
    /// Any further button, by DOM index (3 = back, 4 = forward, ...).
    Other(u8),
}

impl MouseButton {
    /// DOM `MouseEvent.button` index.
    pub fn index(self) -> i16 {
        match self {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
            MouseButton::Other(n) => n as i16,
        }
    }
}

/// Mouse event
#[derive(Debug, Clone, PartialEq)]
pub struct MouseEvent {
    pub action: MouseAction,
    pub button: MouseButton,
    /// X coordinate (0-indexed)
    pub x: u16,
    /// Y coordinate (0-indexed)
    pub y: u16,
    pub modifiers: Modifiers,
}

impl MouseEvent {
    pub fn new(action: MouseAction, button: MouseButton, x: u16, y: u16) -> Self {
        Self {
            action,
            button,
            x,
            y,
            modifiers: Modifiers::empty(),
        }
    }

    pub fn down(button: MouseButton) -> Self {
        Self::new(MouseAction::Down, button, 0, 0)
    }

    pub fn up(button: MouseButton) -> Self {
        Self::new(MouseAction::Up, button, 0, 0)
    }

    pub fn dom_type(&self) -> &'static str {
        match self.action {
            MouseAction::Down => "mousedown",
            MouseAction::Up => "mouseup",
            MouseAction::Move => "mousemove",
        }
    }
}

// =============================================================================
// DOM EVENT
// =============================================================================

/// Payload carried by a [`DomEvent`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EventDetail {
    #[default]
    None,
    Key(KeyboardEvent),
    Mouse(MouseEvent),
}

/// An event dispatched through the element tree.
#[derive(Debug, Clone)]
pub struct DomEvent {
    kind: String,
    detail: EventDetail,
    timestamp: f64,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl DomEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: EventDetail::None,
            timestamp: 0.0,
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    /// `keydown`/`keyup` for a keyboard event.
    pub fn key(event: KeyboardEvent) -> Self {
        Self::new(event.dom_type()).with_detail(EventDetail::Key(event))
    }

    /// `mousedown`/`mouseup`/`mousemove` for a mouse event.
    pub fn mouse(event: MouseEvent) -> Self {
        Self::new(event.dom_type()).with_detail(EventDetail::Mouse(event))
    }

    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn detail(&self) -> &EventDetail {
        &self.detail
    }

    /// Host timestamp (ms) of the input that produced this event.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// `KeyboardEvent.key`, if this is a keyboard event.
    pub fn key_name(&self) -> Option<&str> {
        match &self.detail {
            EventDetail::Key(k) => Some(&k.key),
            _ => None,
        }
    }

    /// `MouseEvent.button`, if this is a mouse event.
    pub fn button(&self) -> Option<i16> {
        match &self.detail {
            EventDetail::Mouse(m) => Some(m.button.index()),
            _ => None,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match &self.detail {
            EventDetail::Key(k) => k.modifiers,
            EventDetail::Mouse(m) => m.modifiers,
            EventDetail::None => Modifiers::empty(),
        }
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Stop the event from reaching ancestors of the current element.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_event_dom_types() {
        assert_eq!(DomEvent::key(KeyboardEvent::new("a")).kind(), "keydown");
        assert_eq!(DomEvent::key(KeyboardEvent::release("a")).kind(), "keyup");
    }

    #[test]
    fn test_mouse_button_indices() {
        assert_eq!(MouseButton::Left.index(), 0);
        assert_eq!(MouseButton::Middle.index(), 1);
        assert_eq!(MouseButton::Right.index(), 2);
        assert_eq!(MouseButton::Other(4).index(), 4);

        let ev = DomEvent::mouse(MouseEvent::down(MouseButton::Right));
        assert_eq!(ev.kind(), "mousedown");
        assert_eq!(ev.button(), Some(2));
        assert_eq!(ev.key_name(), None);
    }

    #[test]
    fn test_prevent_default_is_shared_flag() {
        let ev = DomEvent::new("beforeunload");
        assert!(!ev.default_prevented());
        ev.prevent_default();
        assert!(ev.default_prevented());
    }
}
