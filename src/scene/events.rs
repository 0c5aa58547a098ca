//! Scene event names and payloads.
//!
//! Lifecycle events come from the scene itself. Input events are forwarded
//! from DOM events on the scene root:
//!
//! | Scene event                 | DOM source                        |
//! |-----------------------------|-----------------------------------|
//! | `key:<key>`                 | `keydown` with that `key`         |
//! | `mouse:left` / `middle` / `right` / `unknown` | `mousedown` by button index |
//! | any other name              | the DOM event of the same name    |

use crate::dom::DomEvent;
use crate::reactive::Reactive;

use super::SceneResult;

pub const SHOWN: &str = "shown";
pub const CLOSED: &str = "closed";
pub use crate::emitter::DISPOSE;

const KEY_PREFIX: &str = "key:";
const MOUSE_PREFIX: &str = "mouse:";

/// Payload of every scene event.
#[derive(Debug, Clone, Default)]
pub enum SceneEvent {
    /// Dispose carries no payload.
    #[default]
    Empty,
    /// The props the scene is being shown with.
    Shown(Reactive),
    Closed(SceneResult),
    Input(DomEvent),
}

impl SceneEvent {
    pub fn dom_event(&self) -> Option<&DomEvent> {
        match self {
            SceneEvent::Input(ev) => Some(ev),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&SceneResult> {
        match self {
            SceneEvent::Closed(result) => Some(result),
            _ => None,
        }
    }
}

/// Event name for a keydown of `key`.
pub fn key_event(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

/// Class of a DOM mouse button index.
pub fn button_class(index: i16) -> &'static str {
    match index {
        0 => "left",
        1 => "middle",
        2 => "right",
        _ => "unknown",
    }
}

/// DOM event type feeding the scene event `name`. None for lifecycle events.
pub(crate) fn dom_source(name: &str) -> Option<&str> {
    if matches!(name, SHOWN | CLOSED | DISPOSE) {
        None
    } else if name.starts_with(KEY_PREFIX) {
        Some("keydown")
    } else if name.starts_with(MOUSE_PREFIX) {
        Some("mousedown")
    } else {
        Some(name)
    }
}

/// Scene events a DOM event is forwarded as: the namespaced one first, then
/// the 1:1 name.
pub(crate) fn forwarded_names(event: &DomEvent) -> Vec<String> {
    let namespaced = match event.kind() {
        "keydown" => event.key_name().map(key_event),
        "mousedown" => event
            .button()
            .map(|b| format!("{MOUSE_PREFIX}{}", button_class(b))),
        _ => None,
    };
    namespaced
        .into_iter()
        .chain(std::iter::once(event.kind().to_string()))
        .collect()
}
