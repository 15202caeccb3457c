//! Simulated axis controllers for xy-stage.
//!
//! This crate provides a stand-in for KDC101-style servo controllers so the
//! motion system can be exercised without hardware.
//!
//! # Available Types
//!
//! - [`MockAxisFactory`] - [`AxisDriverFactory`](stage_core::AxisDriverFactory) handing out axes by serial
//! - [`MockAxis`] - one simulated axis with a command log and error injection
//!
//! # Usage
//!
//! ```rust,ignore
//! use stage_driver_mock::{MockAxis, MockAxisFactory};
//!
//! let x = MockAxis::builder("27269534").initial_position(10_000).build();
//! let factory = MockAxisFactory::new().with_axis(x.clone()).strict();
//! ```

pub mod common;
mod mock_axis;

pub use common::{ErrorConfig, ErrorScenario, MockMode, MockRng};
pub use mock_axis::{
    AxisCommand, MockAxis, MockAxisBuilder, MockAxisConfig, MockAxisFactory, SharedCommandLog,
    DRIVER_TYPE, MAX_TRAVEL_TIME,
};
