//! Frame-accurate timing rules for duration-limited scenes.
//!
//! All times are milliseconds. `elapsed` is the refresh timestamp minus the
//! timestamp of the scene's first refresh.

/// Frames of tolerance in the closed-form closing test.
pub const CLOSE_TOLERANCE_FRAMES: f64 = 1.5;

/// Largest distance (ms) from a whole number of frames that is not reported.
pub const MISMATCH_TOLERANCE_MS: f64 = 1.0;

/// Whether the refresh at `elapsed` is the one that closes the scene.
///
/// Closes once `elapsed >= duration - 1.5 * frame_ms`.
pub fn should_close(elapsed: f64, duration: f64, frame_ms: f64) -> bool {
    elapsed >= duration - frame_ms * CLOSE_TOLERANCE_FRAMES
}

/// Signed timing error of closing at `elapsed`.
pub fn closing_error(elapsed: f64, duration: f64) -> f64 {
    elapsed - duration
}

/// Nearest-boundary rule: closing now is no worse than closing one frame later.
pub fn prefers_current_frame(error: f64, next_frame: f64) -> bool {
    error.abs() <= (error + next_frame).abs()
}

/// Distance from `duration` to the nearest whole number of frames, when it
/// exceeds [`MISMATCH_TOLERANCE_MS`].
pub fn duration_mismatch(duration: f64, frame_ms: f64) -> Option<f64> {
    if !(frame_ms > 0.0) {
        return None;
    }
    let nearest = (duration / frame_ms).round() * frame_ms;
    let diff = duration - nearest;
    (diff.abs() > MISMATCH_TOLERANCE_MS).then_some(diff)
}

/// Index of the refresh (0 = first) that closes a scene on an exact clock.
pub fn closing_frame(duration: f64, frame_ms: f64) -> u64 {
    if !(frame_ms > 0.0) {
        return 0;
    }
    ((duration - frame_ms * CLOSE_TOLERANCE_FRAMES) / frame_ms)
        .ceil()
        .max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hundred_ms_at_sixty_hz() {
        let f = 16.67;
        assert!(!should_close(4.0 * f, 100.0, f));
        assert!(should_close(5.0 * f, 100.0, f));
        assert_eq!(closing_frame(100.0, f), 5);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(should_close(75.0, 100.0, 50.0 / 3.0));
        assert!(!should_close(74.9, 100.0, 50.0 / 3.0));
    }

    #[test]
    fn test_nearest_boundary_rule() {
        // 4 ms early beats 12.67 ms late.
        assert!(prefers_current_frame(-4.0, 16.67));
        // 12 ms early loses to 4.67 ms late.
        assert!(!prefers_current_frame(-12.0, 16.67));
        assert_eq!(closing_error(96.0, 100.0), -4.0);
    }

    #[test]
    fn test_duration_mismatch() {
        assert_eq!(duration_mismatch(500.0, 50.0 / 3.0), None);
        assert_eq!(duration_mismatch(100.5, 50.0 / 3.0), None);
        let diff = duration_mismatch(108.0, 50.0 / 3.0).unwrap();
        assert!((diff - 8.0).abs() < 1e-9);
        assert_eq!(duration_mismatch(100.0, 0.0), None);
    }

    #[test]
    fn test_zero_duration_closes_on_first_frame() {
        assert_eq!(closing_frame(0.0, 16.0), 0);
        assert_eq!(closing_frame(20.0, 16.0), 0);
    }

    #[test]
    fn test_closing_frame_for_long_durations() {
        let f = 20.0;
        let frame = closing_frame(1.0e9, f);
        assert_eq!(frame, 49_999_999);
        assert!(should_close(frame as f64 * f, 1.0e9, f));
        assert!(!should_close((frame - 1) as f64 * f, 1.0e9, f));
    }

    #[test]
    fn test_closing_frame_matches_threshold() {
        let f = 1000.0 / 60.0;
        for duration in [50.0, 100.0, 108.0, 500.0, 1234.5] {
            let frame = closing_frame(duration, f);
            assert!(should_close(frame as f64 * f, duration, f), "{duration}");
            assert!(!should_close((frame - 1) as f64 * f, duration, f), "{duration}");
        }
    }
}
