//! Effects - computations that re-run when what they read changes.
//!
//! One effect at a time is "recording": reads on a [`Reactive`](super::Reactive)
//! register the recording effect as a dependent of the key read.

use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::config;
use crate::error::{Error, Result};

type Runner = Box<dyn FnMut() -> anyhow::Result<()>>;

pub(crate) struct EffectInner {
    run: RefCell<Runner>,
}

/// Identity handle for a registered effect.
#[derive(Clone)]
pub(crate) struct EffectRef(Rc<EffectInner>);

impl PartialEq for EffectRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for EffectRef {}

impl Hash for EffectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<EffectRef>> = const { RefCell::new(None) };
}

/// The effect currently recording dependencies, if any.
pub(crate) fn active_effect() -> Option<EffectRef> {
    ACTIVE.with(|a| a.borrow().clone())
}

/// Restores the previous recorder on drop, including during unwinding.
struct Recording {
    previous: Option<EffectRef>,
}

impl Recording {
    fn enter(effect: Option<EffectRef>) -> Self {
        let previous = ACTIVE.with(|a| a.replace(effect));
        Self { previous }
    }
}

impl Drop for Recording {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE.with(|a| *a.borrow_mut() = previous);
    }
}

impl EffectRef {
    /// Run the effect while it records.
    ///
    /// Returns None when the effect is already running further up the stack.
    pub(crate) fn run(&self) -> Option<anyhow::Result<()>> {
        let mut run = self.0.run.try_borrow_mut().ok()?;
        let _recording = Recording::enter(Some(self.clone()));
        Some((*run)())
    }
}

/// Register an effect and run it once, now.
///
/// Every reactive read during a run becomes a dependency; a later write to
/// any of them schedules a batched re-run. Panics in the first run reach
/// the caller; panics in re-runs are caught and logged.
pub fn effect(mut f: impl FnMut() + 'static) -> Result<()> {
    try_effect(move || {
        f();
        Ok(())
    })
}

/// Like [`effect`], for fallible bodies.
///
/// An error from the first run is returned as [`Error::Effect`]; errors from
/// re-runs are logged.
pub fn try_effect(f: impl FnMut() -> anyhow::Result<()> + 'static) -> Result<()> {
    if active_effect().is_some() && config::is_development() {
        return Err(Error::NestedEffect);
    }

    let effect = EffectRef(Rc::new(EffectInner {
        run: RefCell::new(Box::new(f)),
    }));
    match effect.run() {
        Some(Err(err)) => Err(Error::Effect(err)),
        Some(Ok(())) | None => Ok(()),
    }
}

/// Run `f` without recording reads into the current effect.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _recording = Recording::enter(None);
    f()
}
