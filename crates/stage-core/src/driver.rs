//! Axis Driver Seam
//!
//! A motion system talks to its hardware through two traits:
//!
//! - [`AxisDriverFactory`] turns a controller serial number into a live
//!   [`AxisController`] handle. It also answers a startup capability check
//!   ([`AxisDriverFactory::probe`]) so a missing backend is reported before any
//!   device is touched.
//! - [`AxisController`] is one open axis (a single KDC101-style controller and
//!   its stage). Positions are raw motor steps; unit conversion belongs to the
//!   caller.
//!
//! # Contract
//!
//! - `move_to` and `home` initiate motion and return without waiting
//! - `wait_move` / `wait_home` block until the device reports completion
//! - `close` consumes the handle; a failed close still releases it
//!
//! All calls are blocking and take `&mut self`: a handle is owned by exactly
//! one caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use stage_core::driver::{AxisController, AxisDriverFactory};
//!
//! fn nudge(factory: &dyn AxisDriverFactory) -> stage_core::DriverResult<()> {
//!     factory.probe()?;
//!     let mut axis = factory.open("27269534")?;
//!     let here = axis.position()?;
//!     axis.move_to(here + 100)?;
//!     axis.wait_move()?;
//!     axis.close()
//! }
//! ```

use crate::error::DriverResult;

/// One open axis controller.
pub trait AxisController: Send {
    /// Serial number this handle was opened with.
    fn serial(&self) -> &str;

    /// Start an absolute move to `steps`.
    ///
    /// Returns once the command is accepted; motion continues in the device.
    fn move_to(&mut self, steps: i64) -> DriverResult<()>;

    /// Block until the last move has completed.
    fn wait_move(&mut self) -> DriverResult<()>;

    /// Start the homing sequence.
    fn home(&mut self) -> DriverResult<()>;

    /// Block until homing has completed.
    ///
    /// # Default Implementation
    /// Homing is reported through the same completion path as moves on most
    /// controllers, so this defers to [`AxisController::wait_move`].
    fn wait_home(&mut self) -> DriverResult<()> {
        self.wait_move()
    }

    /// Current position in raw steps.
    fn position(&mut self) -> DriverResult<i64>;

    /// Release the device.
    fn close(self: Box<Self>) -> DriverResult<()>;
}

/// Creates [`AxisController`] handles by serial number.
pub trait AxisDriverFactory {
    /// Short machine name (e.g. "mock_kdc101").
    fn driver_type(&self) -> &'static str;

    /// Human readable name.
    fn name(&self) -> &'static str;

    /// Startup capability check.
    ///
    /// Returns an [`Unavailable`](crate::error::DriverErrorKind::Unavailable)
    /// error when the backend cannot be used at all.
    fn probe(&self) -> DriverResult<()> {
        Ok(())
    }

    /// Open the controller with the given serial number.
    fn open(&self, serial: &str) -> DriverResult<Box<dyn AxisController>>;
}

impl<F: AxisDriverFactory + ?Sized> AxisDriverFactory for Box<F> {
    fn driver_type(&self) -> &'static str {
        (**self).driver_type()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn probe(&self) -> DriverResult<()> {
        (**self).probe()
    }

    fn open(&self, serial: &str) -> DriverResult<Box<dyn AxisController>> {
        (**self).open(serial)
    }
}
