//! Operational modes for simulated controllers.
//!
//! - **Instant**: Zero delays, deterministic behavior for unit tests
//! - **Realistic**: Controller-like travel and settling time for dry runs

use serde::{Deserialize, Serialize};

/// Operational modes for simulated controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockMode {
    /// Zero delays, deterministic - for unit tests
    #[default]
    Instant,
    /// Travel time from speed plus a settling delay
    Realistic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        assert_eq!(MockMode::default(), MockMode::Instant);
    }

    #[test]
    fn test_mode_serde_names() {
        use serde::de::{value::Error as ValueError, IntoDeserializer};

        let mode: Result<MockMode, ValueError> =
            MockMode::deserialize("realistic".into_deserializer());
        assert_eq!(mode.unwrap(), MockMode::Realistic);

        let bad: Result<MockMode, ValueError> = MockMode::deserialize("chaos".into_deserializer());
        assert!(bad.is_err());
    }
}
