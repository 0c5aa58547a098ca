//! Frame-duration measurement.
//!
//! Collects consecutive refresh intervals while a panel is visible, then
//! averages them after dropping outliers beyond two standard deviations.
//! Losing visibility mid-run abandons the measurement: the participant is
//! alerted and the session reloaded.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use serde::Serialize;

use crate::dom::{self, Cleanup, Element};
use crate::error::{Error, Result};
use crate::runtime::{self, FrameRequestId};

/// Default number of intervals collected.
pub const DEFAULT_SAMPLES: usize = 60;

/// Samples further than this many standard deviations from the mean are dropped.
pub const OUTLIER_SD: f64 = 2.0;

/// Frame duration assumed when none is known: a 60 Hz display.
pub const FALLBACK_FRAME_MS: f64 = 1000.0 / 60.0;

const PANEL_TEXT: &str = "Measuring your display. Please keep this window visible.";
const INTERRUPTED_ALERT: &str =
    "The display measurement was interrupted because the page was hidden. The page will reload.";

/// Result of a measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameStats {
    /// Intervals collected.
    pub samples: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1).
    pub std_dev: f64,
    /// Intervals kept after outlier filtering.
    pub valid: usize,
    /// Mean of the kept intervals: the frame duration in ms.
    pub frame_ms: f64,
}

impl FrameStats {
    pub fn from_intervals(intervals: &[f64]) -> Result<Self> {
        let samples = intervals.len();
        if samples == 0 {
            return Err(Error::MeasurementFailure { samples });
        }

        let n = samples as f64;
        let mean = intervals.iter().sum::<f64>() / n;
        let std_dev = if samples > 1 {
            let var = intervals.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };

        let limit = OUTLIER_SD * std_dev;
        let valid: Vec<f64> = intervals
            .iter()
            .copied()
            .filter(|x| (x - mean).abs() <= limit)
            .collect();
        if valid.is_empty() {
            return Err(Error::MeasurementFailure { samples });
        }

        let frame_ms = valid.iter().sum::<f64>() / valid.len() as f64;
        Ok(Self {
            samples,
            mean,
            std_dev,
            valid: valid.len(),
            frame_ms,
        })
    }
}

// =============================================================================
// SAMPLER
// =============================================================================

struct Sampler {
    target: usize,
    last: Option<f64>,
    intervals: Vec<f64>,
    request: Option<FrameRequestId>,
    sender: Option<oneshot::Sender<Result<Vec<f64>>>>,
}

fn sample_next(sampler: Rc<RefCell<Sampler>>) {
    let s = sampler.clone();
    let id = runtime::request_animation_frame(move |timestamp| {
        let done = {
            let mut st = s.borrow_mut();
            st.request = None;
            if st.sender.is_none() {
                return;
            }
            if let Some(last) = st.last {
                st.intervals.push(timestamp - last);
            }
            st.last = Some(timestamp);
            st.intervals.len() >= st.target
        };

        if done {
            let mut st = s.borrow_mut();
            let intervals = std::mem::take(&mut st.intervals);
            if let Some(sender) = st.sender.take() {
                let _ = sender.send(Ok(intervals));
            }
        } else {
            sample_next(s);
        }
    });
    sampler.borrow_mut().request = Some(id);
}

/// Detaches the panel and listeners however the measurement ends.
struct MeasurementGuard {
    panel: Element,
    visibility: Option<Cleanup>,
    sampler: Rc<RefCell<Sampler>>,
}

impl Drop for MeasurementGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.visibility.take() {
            cleanup();
        }
        if let Some(id) = self.sampler.borrow_mut().request.take() {
            runtime::cancel_animation_frame(id);
        }
        self.panel.remove();
    }
}

/// Measure the display's frame duration over `samples` refresh intervals.
pub async fn measure_frame_duration(root: &Element, samples: usize) -> Result<FrameStats> {
    if samples == 0 {
        return Err(Error::MeasurementFailure { samples });
    }

    let panel = Element::with_text("measure", PANEL_TEXT);
    root.append_child(&panel);

    let (sender, receiver) = oneshot::channel();
    let sampler = Rc::new(RefCell::new(Sampler {
        target: samples,
        last: None,
        intervals: Vec::with_capacity(samples),
        request: None,
        sender: Some(sender),
    }));

    let s = sampler.clone();
    let visibility = dom::window().add_event_listener("visibilitychange", move |_| {
        if runtime::environment().visible {
            return Ok(());
        }
        let sender = s.borrow_mut().sender.take();
        if let Some(sender) = sender {
            log::warn!("page hidden during frame measurement");
            runtime::alert(INTERRUPTED_ALERT);
            runtime::request_reload();
            let _ = sender.send(Err(Error::MeasurementInterrupted));
        }
        Ok(())
    });

    let _guard = MeasurementGuard {
        panel,
        visibility: Some(visibility),
        sampler: sampler.clone(),
    };
    sample_next(sampler);

    let intervals = receiver.await.map_err(|_| Error::Aborted)??;
    let stats = FrameStats::from_intervals(&intervals)?;
    log::info!(
        "measured frame duration {:.3}ms ({} of {} samples valid, sd {:.3}ms)",
        stats.frame_ms,
        stats.valid,
        stats.samples,
        stats.std_dev
    );
    Ok(stats)
}

// =============================================================================
// TESTS
// =============================================================================
