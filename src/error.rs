//! Error types for the motion system.
//!
//! `MotionError` separates the ways a two-axis stage operation can fail so
//! callers can tell a configuration mistake from a device that stopped
//! answering:
//!
//! - **`DriverUnavailable`**: the driver backend failed its startup check.
//!   Permanent for the lifetime of the process.
//! - **`InvalidArgument`**: a scale factor or coordinate that cannot be turned
//!   into motor steps. Nothing was sent to the hardware.
//! - **`NotConnected`**: an operation was attempted before `connect()` (or
//!   after `disconnect()`). Nothing was sent to the hardware.
//! - **`DriverFailure`**: a driver call failed. Carries the axis, the
//!   operation and the original [`DriverError`].
//!
//! No variant implies a retry; the caller owns retry policy.

use stage_core::DriverError;
use thiserror::Error;

/// Stage axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
        }
    }
}

/// Primary error type for motion system operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// The driver backend cannot be used.
    #[error("Stage driver unavailable: {0}")]
    DriverUnavailable(#[source] DriverError),

    /// A value cannot be used to command the stages.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation requires a connected motion system.
    #[error("Motion system not connected")]
    NotConnected,

    /// A driver call on one axis failed.
    #[error("{axis} stage {operation} failed: {source}")]
    DriverFailure {
        /// Axis whose driver call failed
        axis: Axis,
        /// Operation that failed (e.g. "connect", "move", "wait_move")
        operation: &'static str,
        /// Original driver error
        #[source]
        source: DriverError,
    },
}

impl MotionError {
    /// Wrap a driver error raised by `operation` on `axis`.
    pub fn driver(axis: Axis, operation: &'static str, source: DriverError) -> Self {
        Self::DriverFailure {
            axis,
            operation,
            source,
        }
    }
}

/// Convenience alias for motion system results.
pub type MotionResult<T> = std::result::Result<T, MotionError>;
