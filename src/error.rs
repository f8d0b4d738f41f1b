//! Unified error handling for loopclaim.
//!
//! Every fallible operation in the crate returns [`Result<T>`]. None of these
//! errors are fatal: tracking errors drop a single fix or retract a closure,
//! reporting errors are logged and swallowed, and density errors surface to
//! the caller.

use thiserror::Error;

/// Errors produced by the tracking, geometry and presence layers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoopClaimError {
    /// `start()` was called while a loop is already being tracked.
    #[error("already tracking a path")]
    AlreadyTracking,

    /// A fix was ingested while the tracker was not in the tracking state.
    #[error("not tracking: fixes are only accepted while tracking")]
    NotTracking,

    /// A coordinate outside the valid latitude/longitude range, or non-finite.
    #[error("invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// The ring cannot enclose a meaningful area.
    #[error("degenerate polygon: {reason}")]
    DegeneratePolygon { reason: String },

    /// A network-facing operation was attempted without a signed-in player.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Transport or RPC failure talking to the backend.
    #[error("network error: {message}")]
    Network { message: String },

    /// Configuration could not be read or parsed.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl LoopClaimError {
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegeneratePolygon {
            reason: reason.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// True for errors that the reporting path swallows after logging.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::NotAuthenticated)
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, LoopClaimError>;

/// Extension trait for converting `Option` into crate errors.
pub trait OptionExt<T> {
    /// Map `None` to [`LoopClaimError::NotAuthenticated`].
    fn ok_or_not_authenticated(self) -> Result<T>;

    /// Map `None` to [`LoopClaimError::DegeneratePolygon`] with the given reason.
    fn ok_or_degenerate(self, reason: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_authenticated(self) -> Result<T> {
        self.ok_or(LoopClaimError::NotAuthenticated)
    }

    fn ok_or_degenerate(self, reason: &str) -> Result<T> {
        self.ok_or_else(|| LoopClaimError::degenerate(reason))
    }
}
