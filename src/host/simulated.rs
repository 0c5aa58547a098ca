//! Deterministic host for tests and headless runs.
//!
//! Refreshes arrive on a fixed interval (optionally with jitter); input is
//! scripted against frame numbers and delivered halfway between the
//! previous refresh and the one it is attached to.

use std::collections::BTreeMap;
use std::io;

use super::{Environment, Frame, Host, HostEvent, TimedEvent};
use crate::dom::Element;

/// Default refresh interval: 60 Hz.
pub const DEFAULT_INTERVAL: f64 = 1000.0 / 60.0;

const DEFAULT_START: f64 = 1000.0;
const DEFAULT_FRAME_LIMIT: u64 = 100_000;

#[derive(Debug, Clone)]
pub struct SimulatedHost {
    interval: f64,
    start: f64,
    jitter: Vec<f64>,
    frame: u64,
    frame_limit: u64,
    script: BTreeMap<u64, Vec<HostEvent>>,
    environment: Environment,
    alerts: Vec<String>,
    reloads: usize,
    unloads: Vec<bool>,
    presented: Vec<String>,
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            start: DEFAULT_START,
            jitter: Vec::new(),
            frame: 0,
            frame_limit: DEFAULT_FRAME_LIMIT,
            script: BTreeMap::new(),
            environment: Environment::default(),
            alerts: Vec::new(),
            reloads: 0,
            unloads: Vec::new(),
            presented: Vec::new(),
        }
    }

    /// Refresh interval in ms.
    pub fn with_interval(mut self, interval: f64) -> Self {
        self.interval = interval;
        self
    }

    /// Timestamp of the first refresh.
    pub fn with_start(mut self, start: f64) -> Self {
        self.start = start;
        self
    }

    /// Per-frame timestamp offsets, applied cyclically.
    ///
    /// Offsets must stay below half the interval so timestamps keep
    /// increasing.
    pub fn with_jitter(mut self, jitter: Vec<f64>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Fail `next_frame` once this many refreshes have been produced.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = limit;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Deliver `event` just before refresh number `frame` (0-based).
    pub fn at(mut self, frame: u64, event: HostEvent) -> Self {
        self.push_event(frame, event);
        self
    }

    pub fn push_event(&mut self, frame: u64, event: HostEvent) {
        self.script.entry(frame).or_default().push(event);
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Refreshes produced so far; also the number of the next refresh.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    pub fn reloads(&self) -> usize {
        self.reloads
    }

    /// `prevented` flag of each `beforeunload` outcome.
    pub fn unloads(&self) -> &[bool] {
        &self.unloads
    }

    /// Visible text at the last `present`.
    pub fn presented(&self) -> &[String] {
        &self.presented
    }

    /// Timestamp of refresh number `frame`.
    pub fn timestamp_of(&self, frame: u64) -> f64 {
        let offset = if self.jitter.is_empty() {
            0.0
        } else {
            self.jitter[(frame % self.jitter.len() as u64) as usize]
        };
        self.start + frame as f64 * self.interval + offset
    }

    fn apply(&mut self, event: &HostEvent) {
        match *event {
            HostEvent::Visibility(visible) => self.environment.visible = visible,
            HostEvent::Resize { width, height } => {
                self.environment.window_width = width;
                self.environment.window_height = height;
            }
            HostEvent::PixelRatio(ratio) => self.environment.pixel_ratio = ratio,
            _ => {}
        }
    }
}

impl Host for SimulatedHost {
    fn next_frame(&mut self) -> io::Result<Frame> {
        if self.frame >= self.frame_limit {
            return Err(io::Error::other(format!(
                "simulated host reached its limit of {} frames",
                self.frame_limit
            )));
        }

        let n = self.frame;
        let timestamp = self.timestamp_of(n);
        let input_time = timestamp - self.interval / 2.0;
        let scripted = self.script.remove(&n).unwrap_or_default();
        for event in &scripted {
            self.apply(event);
        }
        let events = scripted
            .into_iter()
            .map(|event| TimedEvent {
                timestamp: input_time,
                event,
            })
            .collect();

        self.frame += 1;
        Ok(Frame { timestamp, events })
    }

    fn present(&mut self, body: &Element) -> io::Result<()> {
        self.presented = body.visible_lines();
        Ok(())
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }

    fn reload(&mut self) {
        self.reloads += 1;
    }

    fn unload(&mut self, prevented: bool) {
        self.unloads.push(prevented);
    }

    fn environment(&self) -> Environment {
        self.environment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::KeyboardEvent;

    #[test]
    fn test_timestamps_follow_interval_and_jitter() {
        let mut host = SimulatedHost::new()
            .with_start(100.0)
            .with_interval(10.0)
            .with_jitter(vec![0.0, 1.5]);

        let stamps: Vec<f64> = (0..4).map(|_| host.next_frame().unwrap().timestamp).collect();
        assert_eq!(stamps, vec![100.0, 111.5, 120.0, 131.5]);
    }

    #[test]
    fn test_scripted_events_arrive_before_their_frame() {
        let mut host = SimulatedHost::new()
            .with_start(100.0)
            .with_interval(10.0)
            .at(1, HostEvent::Key(KeyboardEvent::new(" ")));

        assert!(host.next_frame().unwrap().events.is_empty());
        let frame = host.next_frame().unwrap();
        assert_eq!(frame.events.len(), 1);
        assert_eq!(frame.events[0].timestamp, 105.0);
    }

    #[test]
    fn test_environment_tracks_scripted_changes() {
        let mut host = SimulatedHost::new()
            .at(0, HostEvent::PixelRatio(2.0))
            .at(0, HostEvent::Visibility(false));
        host.next_frame().unwrap();
        assert_eq!(host.environment().pixel_ratio, 2.0);
        assert!(!host.environment().visible);
    }

    #[test]
    fn test_frame_limit() {
        let mut host = SimulatedHost::new().with_frame_limit(1);
        assert!(host.next_frame().is_ok());
        assert!(host.next_frame().is_err());
    }
}
