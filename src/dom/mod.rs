//! DOM Module - Minimal retained element tree and event targets.
//!
//! Scenes need a root container they can show, collapse, focus, and listen
//! on. This module provides exactly that, nothing more: no styling, no
//! layout. Hosts read the tree to present it.
//!
//! # API
//!
//! - `Element::new(tag)` / `Element::text(s)` - Create nodes
//! - `append_child`, `remove`, `children`, `parent`, `is_connected`
//! - `set_collapsed` - Visual collapse (the closed-scene state)
//! - `focus`, `blur`, `active_element()` - Keyboard focus
//! - `add_event_listener(type, fn)` - Returns a cleanup function
//! - `dispatch_event(&event)` - Target, then ancestors (bubbling)
//! - `body()`, `window()` - Per-thread document and window targets
//!
//! Listener errors are logged and never propagate out of `dispatch_event`.

mod event;

pub use event::*;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Cleanup function returned by registrations.
///
/// Call this to remove the listener or release the resource.
pub type Cleanup = Box<dyn FnOnce()>;

/// DOM event listener.
pub type EventListener = Rc<dyn Fn(&DomEvent) -> anyhow::Result<()>>;

// =============================================================================
// EVENT TARGET
// =============================================================================

#[derive(Default)]
struct ListenerRegistry {
    listeners: HashMap<String, Vec<(usize, EventListener)>>,
    next_id: usize,
}

impl ListenerRegistry {
    fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Anything events can be dispatched to.
#[derive(Clone, Default)]
pub struct EventTarget {
    registry: Rc<RefCell<ListenerRegistry>>,
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Returns cleanup function.
    pub fn add_event_listener<F>(&self, kind: &str, listener: F) -> Cleanup
    where
        F: Fn(&DomEvent) -> anyhow::Result<()> + 'static,
    {
        let kind = kind.to_string();
        let listener: EventListener = Rc::new(listener);
        let id = {
            let mut reg = self.registry.borrow_mut();
            let id = reg.next_id();
            reg.listeners
                .entry(kind.clone())
                .or_default()
                .push((id, listener));
            id
        };

        let registry = Rc::downgrade(&self.registry);
        Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                let mut reg = registry.borrow_mut();
                if let Some(listeners) = reg.listeners.get_mut(&kind) {
                    listeners.retain(|(listener_id, _)| *listener_id != id);
                    if listeners.is_empty() {
                        reg.listeners.remove(&kind);
                    }
                }
            }
        })
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: &str) -> usize {
        self.registry
            .borrow()
            .listeners
            .get(kind)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Invoke listeners for this target only. Returns the number invoked.
    pub fn fire(&self, event: &DomEvent) -> usize {
        // Snapshot so listeners may add/remove listeners while we iterate.
        // Listeners added during dispatch wait for the next event; removed
        // ones are skipped.
        let snapshot: Vec<(usize, EventListener)> = self
            .registry
            .borrow()
            .listeners
            .get(event.kind())
            .cloned()
            .unwrap_or_default();

        let mut invoked = 0;
        for (id, listener) in &snapshot {
            if !self.is_registered(event.kind(), *id) {
                continue;
            }
            invoked += 1;
            if let Err(err) = listener(event) {
                log::error!("listener for '{}' failed: {err:#}", event.kind());
            }
        }
        invoked
    }

    fn is_registered(&self, kind: &str, id: usize) -> bool {
        self.registry
            .borrow()
            .listeners
            .get(kind)
            .is_some_and(|ls| ls.iter().any(|(listener_id, _)| *listener_id == id))
    }

    fn clear(&self) {
        self.registry.borrow_mut().listeners.clear();
    }
}

// =============================================================================
// ELEMENT
// =============================================================================

struct ElementInner {
    tag: String,
    text: RefCell<String>,
    children: RefCell<Vec<Element>>,
    parent: RefCell<Weak<ElementInner>>,
    collapsed: Cell<bool>,
    target: EventTarget,
}

/// Shared handle to a node in the element tree.
#[derive(Clone)]
pub struct Element {
    inner: Rc<ElementInner>,
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.inner.tag)
            .field("text", &*self.inner.text.borrow())
            .field("children", &self.inner.children.borrow().len())
            .field("collapsed", &self.inner.collapsed.get())
            .finish()
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Element {
    /// Create a detached element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(ElementInner {
                tag: tag.into(),
                text: RefCell::new(String::new()),
                children: RefCell::new(Vec::new()),
                parent: RefCell::new(Weak::new()),
                collapsed: Cell::new(false),
                target: EventTarget::new(),
            }),
        }
    }

    /// Create a text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_text("#text", text)
    }

    /// Create an element holding text of its own.
    pub fn with_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        let el = Self::new(tag);
        el.set_text(text);
        el
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn own_text(&self) -> String {
        self.inner.text.borrow().clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *self.inner.text.borrow_mut() = text.into();
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // -------------------------------------------------------------------------
    // Tree
    // -------------------------------------------------------------------------

    /// Append `child`, detaching it from any previous parent first.
    pub fn append_child(&self, child: &Element) {
        child.remove();
        *child.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);
        self.inner.children.borrow_mut().push(child.clone());
    }

    /// Detach this element from its parent. No-op if detached.
    pub fn remove(&self) {
        let parent = self.inner.parent.borrow().upgrade();
        if let Some(parent) = parent {
            parent
                .children
                .borrow_mut()
                .retain(|c| !Rc::ptr_eq(&c.inner, &self.inner));
        }
        *self.inner.parent.borrow_mut() = Weak::new();
    }

    pub fn clear_children(&self) {
        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in children {
            *child.inner.parent.borrow_mut() = Weak::new();
        }
    }

    pub fn parent(&self) -> Option<Element> {
        self.inner
            .parent
            .borrow()
            .upgrade()
            .map(|inner| Element { inner })
    }

    pub fn children(&self) -> Vec<Element> {
        self.inner.children.borrow().clone()
    }

    /// Whether `other` is this element or one of its descendants.
    pub fn contains(&self, other: &Element) -> bool {
        let mut node = Some(other.clone());
        while let Some(current) = node {
            if current.ptr_eq(self) {
                return true;
            }
            node = current.parent();
        }
        false
    }

    /// Whether this element is attached to the document body.
    pub fn is_connected(&self) -> bool {
        body().contains(self)
    }

    // -------------------------------------------------------------------------
    // Visibility & focus
    // -------------------------------------------------------------------------

    /// Collapse (scale to zero) or restore this element.
    pub fn set_collapsed(&self, collapsed: bool) {
        self.inner.collapsed.set(collapsed);
    }

    pub fn is_collapsed(&self) -> bool {
        self.inner.collapsed.get()
    }

    /// Visible when neither this element nor any ancestor is collapsed.
    pub fn is_visible(&self) -> bool {
        let mut node = Some(self.clone());
        while let Some(current) = node {
            if current.is_collapsed() {
                return false;
            }
            node = current.parent();
        }
        true
    }

    pub fn focus(&self) {
        ACTIVE.with(|active| *active.borrow_mut() = Rc::downgrade(&self.inner));
    }

    /// Drop focus if this element holds it.
    pub fn blur(&self) {
        if self.is_focused() {
            ACTIVE.with(|active| *active.borrow_mut() = Weak::new());
        }
    }

    pub fn is_focused(&self) -> bool {
        active_element().is_some_and(|el| el.ptr_eq(self))
    }

    /// Lines of text visible in this subtree, in document order.
    pub fn visible_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.collect_lines(&mut lines);
        lines
    }

    fn collect_lines(&self, lines: &mut Vec<String>) {
        if self.is_collapsed() {
            return;
        }
        let text = self.inner.text.borrow();
        if !text.is_empty() {
            lines.extend(text.lines().map(str::to_string));
        }
        drop(text);
        for child in self.children() {
            child.collect_lines(lines);
        }
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    pub fn add_event_listener<F>(&self, kind: &str, listener: F) -> Cleanup
    where
        F: Fn(&DomEvent) -> anyhow::Result<()> + 'static,
    {
        self.inner.target.add_event_listener(kind, listener)
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.inner.target.listener_count(kind)
    }

    /// Dispatch to this element, then bubble to its ancestors.
    ///
    /// Returns false if a listener called `prevent_default`.
    pub fn dispatch_event(&self, event: &DomEvent) -> bool {
        let mut node = Some(self.clone());
        while let Some(current) = node {
            current.inner.target.fire(event);
            if event.propagation_stopped() {
                break;
            }
            node = current.parent();
        }
        !event.default_prevented()
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

thread_local! {
    static BODY: RefCell<Element> = RefCell::new(Element::new("body"));
    static WINDOW: RefCell<Element> = RefCell::new(Element::new("window"));
    static ACTIVE: RefCell<Weak<ElementInner>> = RefCell::new(Weak::new());
}

/// The document body for this thread.
pub fn body() -> Element {
    BODY.with(|b| b.borrow().clone())
}

/// The window event target (`visibilitychange`, `resize`, `beforeunload`).
pub fn window() -> Element {
    WINDOW.with(|w| w.borrow().clone())
}

/// The focused element, if it is still alive.
pub fn active_element() -> Option<Element> {
    ACTIVE.with(|active| active.borrow().upgrade().map(|inner| Element { inner }))
}

/// Replace the document with a fresh body and window (for testing).
pub fn reset_document() {
    BODY.with(|b| {
        let old = b.replace(Element::new("body"));
        old.clear_children();
        old.inner.target.clear();
    });
    WINDOW.with(|w| {
        let old = w.replace(Element::new("window"));
        old.inner.target.clear();
    });
    ACTIVE.with(|active| *active.borrow_mut() = Weak::new());
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() {
        reset_document();
    }

    #[test]
    fn test_append_reparents() {
        setup();
        let a = Element::new("a");
        let b = Element::new("b");
        let child = Element::text("x");

        a.append_child(&child);
        b.append_child(&child);

        assert!(a.children().is_empty());
        assert_eq!(b.children().len(), 1);
        assert!(child.parent().unwrap().ptr_eq(&b));
    }

    #[test]
    fn test_connected_through_body() {
        setup();
        let root = Element::new("app");
        let leaf = Element::new("leaf");
        root.append_child(&leaf);
        assert!(!leaf.is_connected());

        body().append_child(&root);
        assert!(leaf.is_connected());

        root.remove();
        assert!(!leaf.is_connected());
    }

    #[test]
    fn test_cleanup_removes_listener() {
        setup();
        let el = Element::new("div");
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let cleanup = el.add_event_listener("click", move |_| {
            h.set(h.get() + 1);
            Ok(())
        });

        el.dispatch_event(&DomEvent::new("click"));
        cleanup();
        el.dispatch_event(&DomEvent::new("click"));

        assert_eq!(hits.get(), 1);
        assert_eq!(el.listener_count("click"), 0);
    }

    #[test]
    fn test_events_bubble_until_stopped() {
        setup();
        let parent = Element::new("parent");
        let child = Element::new("child");
        parent.append_child(&child);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let _c1 = parent.add_event_listener("keydown", move |_| {
            s.borrow_mut().push("parent");
            Ok(())
        });
        let s = seen.clone();
        let _c2 = child.add_event_listener("keydown", move |_| {
            s.borrow_mut().push("child");
            Ok(())
        });

        child.dispatch_event(&DomEvent::new("keydown"));
        assert_eq!(*seen.borrow(), vec!["child", "parent"]);

        let _c3 = child.add_event_listener("keydown", |ev| {
            ev.stop_propagation();
            Ok(())
        });
        seen.borrow_mut().clear();
        child.dispatch_event(&DomEvent::new("keydown"));
        assert_eq!(*seen.borrow(), vec!["child"]);
    }

    #[test]
    fn test_listener_removed_during_dispatch_is_skipped() {
        setup();
        let el = Element::new("div");
        let hits = Rc::new(Cell::new(0));
        let later: Rc<RefCell<Option<Cleanup>>> = Rc::new(RefCell::new(None));

        let l = later.clone();
        let _first = el.add_event_listener("click", move |_| {
            if let Some(cleanup) = l.borrow_mut().take() {
                cleanup();
            }
            Ok(())
        });
        let h = hits.clone();
        *later.borrow_mut() = Some(el.add_event_listener("click", move |_| {
            h.set(h.get() + 1);
            Ok(())
        }));

        el.dispatch_event(&DomEvent::new("click"));
        assert_eq!(hits.get(), 0);
        assert_eq!(el.listener_count("click"), 1);
    }

    #[test]
    fn test_listener_error_does_not_stop_others() {
        setup();
        let el = Element::new("div");
        let hits = Rc::new(Cell::new(0));
        let _c1 = el.add_event_listener("click", |_| anyhow::bail!("broken"));
        let h = hits.clone();
        let _c2 = el.add_event_listener("click", move |_| {
            h.set(h.get() + 1);
            Ok(())
        });

        el.dispatch_event(&DomEvent::new("click"));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_collapsed_subtree_hides_text() {
        setup();
        let root = Element::new("root");
        let scene = Element::new("scene");
        scene.append_child(&Element::text("+"));
        root.append_child(&scene);

        assert_eq!(root.visible_lines(), vec!["+"]);
        scene.set_collapsed(true);
        assert!(root.visible_lines().is_empty());
        assert!(!scene.children()[0].is_visible());
    }

    #[test]
    fn test_focus_and_blur() {
        setup();
        let a = Element::new("a");
        let b = Element::new("b");
        a.focus();
        assert!(a.is_focused());
        b.blur();
        assert!(a.is_focused());
        a.blur();
        assert!(active_element().is_none());
    }
}
