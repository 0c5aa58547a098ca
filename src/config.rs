//! Config - Development/production mode switch.
//!
//! Development mode enables diagnostics that cost time or would be noisy for
//! participants: duration/frame-multiple warnings and nested-effect errors.
//!
//! The mode is per thread. It starts from the `PSYFRAME_MODE` environment
//! variable (`development` or `production`) and otherwise follows the build
//! profile: debug builds are development, release builds are production.
//!
//! # API
//!
//! - `mode()` - Current mode
//! - `set_mode(mode)` - Override the mode for this thread
//! - `is_development()` - Shorthand used by diagnostics
//! - `reset_mode()` - Forget the override (next read re-resolves)

use std::cell::Cell;

/// Environment variable consulted on first use.
pub const MODE_ENV: &str = "PSYFRAME_MODE";

/// Build mode gating development diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    /// Parse a mode name. Accepts the short forms `dev` and `prod`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Mode::Development),
            "production" | "prod" => Some(Mode::Production),
            _ => None,
        }
    }

    /// Mode implied by the build profile.
    pub fn from_build() -> Self {
        if cfg!(debug_assertions) {
            Mode::Development
        } else {
            Mode::Production
        }
    }

    /// Mode from `PSYFRAME_MODE`, falling back to the build profile.
    pub fn from_env() -> Self {
        match std::env::var(MODE_ENV) {
            Ok(value) => Mode::parse(&value).unwrap_or_else(|| {
                log::warn!("{MODE_ENV}={value:?} is not a known mode, using build default");
                Mode::from_build()
            }),
            Err(_) => Mode::from_build(),
        }
    }
}

thread_local! {
    static MODE: Cell<Option<Mode>> = const { Cell::new(None) };
}

/// Current mode for this thread.
pub fn mode() -> Mode {
    MODE.with(|m| match m.get() {
        Some(mode) => mode,
        None => {
            let mode = Mode::from_env();
            m.set(Some(mode));
            mode
        }
    })
}

pub fn set_mode(mode: Mode) {
    MODE.with(|m| m.set(Some(mode)));
}

pub fn is_development() -> bool {
    mode() == Mode::Development
}

pub fn reset_mode() {
    MODE.with(|m| m.set(None));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode_names() {
        assert_eq!(Mode::parse("production"), Some(Mode::Production));
        assert_eq!(Mode::parse(" Dev "), Some(Mode::Development));
        assert_eq!(Mode::parse("staging"), None);
    }

    #[test]
    fn test_set_mode_overrides() {
        set_mode(Mode::Production);
        assert!(!is_development());
        set_mode(Mode::Development);
        assert!(is_development());
        reset_mode();
    }
}
