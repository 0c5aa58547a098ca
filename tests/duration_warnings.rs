//! Development-mode warning for scene durations that are not a whole number
//! of frames.
//!
//! Installs its own logger, so everything runs in one test.
//!
//! Run with: cargo test --test duration_warnings

use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};
use psyframe::runtime::reset_runtime;
use psyframe::{App, AppOptions, Mode, Reactive, SceneContext, SceneOptions, Setup};

const FRAME: f64 = 1000.0 / 60.0;

struct Capture {
    lines: Mutex<Vec<String>>,
}

impl Log for Capture {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if let Ok(mut lines) = self.lines.lock() {
                lines.push(record.args().to_string());
            }
        }
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture {
    lines: Mutex::new(Vec::new()),
};

fn fixation(_: &Reactive, _: &SceneContext) -> anyhow::Result<Setup> {
    Ok(Setup::new("+"))
}

/// Show and close a scene, returning the mismatch warnings it logged.
fn warnings_for(mode: Mode, duration: f64) -> Vec<String> {
    reset_runtime();
    psyframe::set_mode(mode);
    CAPTURE.lines.lock().unwrap().clear();

    let app = App::with_frame_ms(AppOptions::new().confirm_leave(false), FRAME);
    let scene = app
        .scene(fixation, SceneOptions::new().duration(duration))
        .unwrap();
    let _pending = scene.show(None).unwrap();
    scene.close().unwrap();

    CAPTURE
        .lines
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.contains("off a whole number"))
        .cloned()
        .collect()
}

#[test]
fn mismatched_duration_warns_only_in_development() {
    log::set_logger(&CAPTURE).unwrap();
    log::set_max_level(LevelFilter::Warn);

    let warnings = warnings_for(Mode::Development, 108.0);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("108ms"), "{}", warnings[0]);
    assert!(warnings[0].contains("+8.00ms"), "{}", warnings[0]);
    assert!(warnings[0].contains("6 frames"), "{}", warnings[0]);

    assert!(warnings_for(Mode::Production, 108.0).is_empty());
    assert!(warnings_for(Mode::Development, 100.0).is_empty());
}
