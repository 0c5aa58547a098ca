//! Emitter - Named publish/subscribe with set semantics.
//!
//! Listeners are `Rc` closures; the same `Rc` registered twice for one event
//! is stored once, and [`Emitter::off`] takes the `Rc` to remove.
//!
//! # Example
//!
//! ```ignore
//! let events: Emitter<String> = Emitter::new();
//! let greet = listener(|name: &String| {
//!     println!("hello {name}");
//!     Ok(())
//! });
//!
//! events.on("greet", greet.clone());
//! events.emit("greet", &"ada".to_string())?;  // Ok(1)
//! events.off("greet", &greet);
//! ```

use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};

use crate::error::{Error, Result};

/// Reserved event emitted once by [`Emitter::dispose`].
pub const DISPOSE: &str = "dispose";

/// Event listener. Identity is the `Rc` allocation.
pub type Listener<P> = Rc<dyn Fn(&P) -> anyhow::Result<()>>;

/// Box a closure as a [`Listener`].
pub fn listener<P, F>(f: F) -> Listener<P>
where
    F: Fn(&P) -> anyhow::Result<()> + 'static,
{
    Rc::new(f)
}

/// Listener keyed by pointer.
struct Keyed<P>(Listener<P>);

impl<P> Clone for Keyed<P> {
    fn clone(&self) -> Self {
        Keyed(self.0.clone())
    }
}

impl<P> PartialEq for Keyed<P> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<P> Eq for Keyed<P> {}

impl<P> Hash for Keyed<P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).cast::<()>().hash(state);
    }
}

struct EmitterState<P> {
    listeners: IndexMap<String, IndexSet<Keyed<P>>>,
    disposed: bool,
}

impl<P> EmitterState<P> {
    fn remove(&mut self, kind: &str, listener: &Keyed<P>) {
        if let Some(set) = self.listeners.get_mut(kind) {
            set.shift_remove(listener);
            if set.is_empty() {
                self.listeners.shift_remove(kind);
            }
        }
    }
}

/// Runs the closure when dropped, also while unwinding.
struct OnDrop<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Shared listener registry. Clones share registrations.
pub struct Emitter<P> {
    state: Rc<RefCell<EmitterState<P>>>,
}

impl<P> Clone for Emitter<P> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<P: 'static> Default for Emitter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> Emitter<P> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(EmitterState {
                listeners: IndexMap::new(),
                disposed: false,
            })),
        }
    }

    pub fn on(&self, kind: &str, listener: Listener<P>) -> &Self {
        self.state
            .borrow_mut()
            .listeners
            .entry(kind.to_string())
            .or_default()
            .insert(Keyed(listener));
        self
    }

    /// Remove `listener`. Absent listeners are ignored.
    pub fn off(&self, kind: &str, listener: &Listener<P>) -> &Self {
        self.state
            .borrow_mut()
            .remove(kind, &Keyed(listener.clone()));
        self
    }

    /// Register `listener` for one emission.
    ///
    /// The wrapper unregisters itself after the call, even if the listener
    /// fails or panics. The returned wrapper can be passed to [`off`](Self::off).
    pub fn once(&self, kind: &str, listener: Listener<P>) -> Listener<P> {
        let this: Rc<RefCell<Option<Weak<dyn Fn(&P) -> anyhow::Result<()>>>>> =
            Rc::new(RefCell::new(None));
        let state = Rc::downgrade(&self.state);
        let event = kind.to_string();
        let slot = this.clone();

        let wrapper: Listener<P> = Rc::new(move |payload: &P| {
            let _unregister = OnDrop(Some(|| {
                let me = slot.borrow().as_ref().and_then(Weak::upgrade);
                if let (Some(state), Some(me)) = (state.upgrade(), me) {
                    state.borrow_mut().remove(&event, &Keyed(me));
                }
            }));
            listener(payload)
        });

        *this.borrow_mut() = Some(Rc::downgrade(&wrapper));
        self.on(kind, wrapper.clone());
        wrapper
    }

    /// Call every listener for `kind` with `payload`.
    ///
    /// Listeners registered before the call are invoked; the first failure
    /// stops the emission and is returned. Returns the number of listeners
    /// that were registered when the emission started.
    pub fn emit(&self, kind: &str, payload: &P) -> Result<usize> {
        let snapshot: Vec<Listener<P>> = self
            .state
            .borrow()
            .listeners
            .get(kind)
            .map(|set| set.iter().map(|k| k.0.clone()).collect())
            .unwrap_or_default();

        for listener in &snapshot {
            listener(payload).map_err(|error| Error::Listener {
                event: kind.to_string(),
                error,
            })?;
        }
        Ok(snapshot.len())
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.state
            .borrow()
            .listeners
            .get(kind)
            .map(IndexSet::len)
            .unwrap_or(0)
    }

    pub fn has_listeners(&self, kind: &str) -> bool {
        self.listener_count(kind) > 0
    }

    /// Events with at least one listener, in first-registration order.
    pub fn event_names(&self) -> Vec<String> {
        self.state.borrow().listeners.keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().listeners.clear();
    }
}

impl<P: Default + 'static> Emitter<P> {
    /// Emit [`DISPOSE`] with the default payload, then drop every listener.
    ///
    /// Only the first call does anything.
    pub fn dispose(&self) -> Result<usize> {
        if std::mem::replace(&mut self.state.borrow_mut().disposed, true) {
            return Ok(0);
        }
        let result = self.emit(DISPOSE, &P::default());
        self.clear();
        result
    }

    pub fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }
}

// =============================================================================
// TESTS
// =============================================================================
