//! # xy-stage
//!
//! Control library for two-axis motorized stages driven by KDC101-style servo
//! controllers. A [`MotionSystem`] opens the X and Y controllers through an
//! injected driver factory, converts physical units to motor steps with a
//! fixed scale factor, and issues move, home and position queries.
//!
//! ## Crate Structure
//!
//! - **`motion_system`**: the [`MotionSystem`] façade and [`Position`].
//! - **`error`**: [`MotionError`], separating unavailable drivers, bad
//!   arguments, missing connections and driver failures.
//! - **`config`**: Figment-based loading of `config/xy_stage.toml` plus
//!   `XY_STAGE_` environment overrides.
//! - **`path_runner`**: loading X,Y coordinate files and visiting each point
//!   with a dwell time.
//! - **`tracing_setup`**: `tracing-subscriber` initialization.
//!
//! The driver seam lives in `stage-core`; a simulated controller backend lives
//! in `stage-driver-mock`.

pub mod config;
pub mod error;
pub mod motion_system;
pub mod path_runner;
pub mod tracing_setup;

pub use error::{Axis, MotionError, MotionResult};
pub use motion_system::{MotionSystem, Position};
pub use stage_core::{AxisController, AxisDriverFactory, DriverError, DriverErrorKind};
