//! `stage-core`
//!
//! Driver seam for two-axis stage control. Defines the traits a controller
//! backend implements ([`AxisDriverFactory`], [`AxisController`]) and the
//! error type they report ([`DriverError`]).

pub mod driver;
pub mod error;

pub use driver::{AxisController, AxisDriverFactory};
pub use error::{DriverError, DriverErrorKind, DriverResult};
