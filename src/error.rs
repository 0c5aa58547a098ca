//! Error types shared by every module.

use std::io;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `show()` on a shown scene or `close()` on a closed one.
    #[error("cannot {operation} a scene that is already {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Outlier filtering left nothing to average.
    #[error("frame duration measurement produced no valid samples out of {samples}")]
    MeasurementFailure { samples: usize },

    #[error("frame duration measurement was interrupted because the page lost visibility")]
    MeasurementInterrupted,

    #[error("effects cannot be registered while another effect is running")]
    NestedEffect,

    #[error("effect failed: {0:#}")]
    Effect(anyhow::Error),

    #[error("listener for '{event}' failed: {error:#}")]
    Listener { event: String, error: anyhow::Error },

    #[error("scene setup failed: {0:#}")]
    Setup(anyhow::Error),

    #[error("scene was dropped before it closed")]
    SceneDropped,

    #[error("experiment aborted by the participant")]
    Aborted,

    #[error(transparent)]
    Io(#[from] io::Error),
}
