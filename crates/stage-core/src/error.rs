//! Driver error type shared by every axis controller implementation.
//!
//! Drivers report failures as a [`DriverError`]: the driver type that raised
//! it, a coarse [`DriverErrorKind`] and a human readable message. Callers that
//! need richer context (which axis, which operation) wrap it in their own
//! error enum and keep the `DriverError` as the source.

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Coarse classification of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// The driver backend is missing or could not be initialized.
    Unavailable,
    /// Opening a device handle failed (unknown serial, device busy).
    Connection,
    /// I/O with an open device failed.
    Communication,
    /// The device reported a fault.
    Hardware,
    /// A wait for motion or homing completion gave up.
    Timeout,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Unavailable => "unavailable",
            DriverErrorKind::Connection => "connection",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::Timeout => "timeout",
        };
        write!(f, "{}", label)
    }
}

/// Error raised by an [`AxisDriverFactory`](crate::driver::AxisDriverFactory)
/// or an [`AxisController`](crate::driver::AxisController).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Driver '{driver_type}' {kind} error: {message}")]
pub struct DriverError {
    /// Driver type that raised the error (e.g. "mock_kdc101").
    pub driver_type: String,
    /// Failure classification.
    pub kind: DriverErrorKind,
    /// Detail message.
    pub message: String,
}

impl DriverError {
    /// Build a new driver error.
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Convenience alias for driver-level results.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_driver() {
        let err = DriverError::new("mock_kdc101", DriverErrorKind::Timeout, "wait_move timed out");
        assert_eq!(
            err.to_string(),
            "Driver 'mock_kdc101' timeout error: wait_move timed out"
        );
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(DriverErrorKind::Unavailable.to_string(), "unavailable");
        assert_eq!(DriverErrorKind::Communication.to_string(), "communication");
    }
}
