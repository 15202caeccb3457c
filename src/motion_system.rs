//! Two-axis motion system
//!
//! [`MotionSystem`] drives an X and a Y stage controller through an injected
//! [`AxisDriverFactory`]. It owns both device handles, converts physical units
//! to motor steps with a single scale factor, and reports every failure as a
//! [`MotionError`].
//!
//! # Conversion
//!
//! - commanded steps = `round(units / dist_per_step)`
//! - reported units  = `steps * dist_per_step`
//!
//! # Motion
//!
//! `move_to` and `home` command X, then Y, before waiting on either, so both
//! stages travel at the same time. Completion is then awaited X first, then Y.
//!
//! # Example
//!
//! ```rust
//! use stage_driver_mock::MockAxisFactory;
//! use xy_stage::MotionSystem;
//!
//! # fn main() -> Result<(), xy_stage::MotionError> {
//! let mut motion = MotionSystem::new(MockAxisFactory::new(), "27269534", "27269887", 0.5)?;
//! motion.connect()?;
//! motion.move_to(10.0, 5.0)?;
//! let pos = motion.get_position()?;
//! assert_eq!((pos.x, pos.y), (10.0, 5.0));
//! motion.disconnect();
//! # Ok(())
//! # }
//! ```

use crate::config::MotionConfig;
use crate::error::{Axis, MotionError, MotionResult};
use serde::Serialize;
use stage_core::driver::{AxisController, AxisDriverFactory};
use tracing::{debug, error, info, warn};

/// Stage position in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(X={:.2}, Y={:.2})", self.x, self.y)
    }
}

/// Controller for a two-axis stage.
///
/// Single owner, blocking calls. Dropping a connected system disconnects it.
pub struct MotionSystem<F: AxisDriverFactory> {
    factory: F,
    x_serial: String,
    y_serial: String,
    dist_per_step: f64,
    stage_x: Option<Box<dyn AxisController>>,
    stage_y: Option<Box<dyn AxisController>>,
    connected: bool,
}

impl<F: AxisDriverFactory> MotionSystem<F> {
    /// Create a motion system for the controllers `x_serial` and `y_serial`.
    ///
    /// # Errors
    /// - [`MotionError::DriverUnavailable`] if the factory fails its startup check
    /// - [`MotionError::InvalidArgument`] if `dist_per_step` is zero or not finite
    pub fn new(
        factory: F,
        x_serial: impl Into<String>,
        y_serial: impl Into<String>,
        dist_per_step: f64,
    ) -> MotionResult<Self> {
        factory.probe().map_err(MotionError::DriverUnavailable)?;

        if dist_per_step == 0.0 {
            return Err(MotionError::InvalidArgument(
                "dist_per_step cannot be zero".to_string(),
            ));
        }
        if !dist_per_step.is_finite() {
            return Err(MotionError::InvalidArgument(format!(
                "dist_per_step must be finite, got {}",
                dist_per_step
            )));
        }

        let system = Self {
            factory,
            x_serial: x_serial.into(),
            y_serial: y_serial.into(),
            dist_per_step,
            stage_x: None,
            stage_y: None,
            connected: false,
        };
        debug!(
            driver = system.factory.driver_type(),
            x_serial = %system.x_serial,
            y_serial = %system.y_serial,
            dist_per_step,
            "MotionSystem created"
        );
        Ok(system)
    }

    /// Create a motion system from the `[motion]` configuration section.
    pub fn from_config(factory: F, config: &MotionConfig) -> MotionResult<Self> {
        Self::new(
            factory,
            config.x_serial.clone(),
            config.y_serial.clone(),
            config.dist_per_step,
        )
    }

    /// Serial number of the X-axis controller.
    pub fn x_serial(&self) -> &str {
        &self.x_serial
    }

    /// Serial number of the Y-axis controller.
    pub fn y_serial(&self) -> &str {
        &self.y_serial
    }

    /// Physical units per motor step.
    pub fn dist_per_step(&self) -> f64 {
        self.dist_per_step
    }

    /// Convert a physical coordinate to the nearest step count.
    pub fn to_steps(&self, units: f64) -> MotionResult<i64> {
        let steps = (units / self.dist_per_step).round();
        // i64::MAX as f64 rounds up to 2^63, which is already out of range
        if !steps.is_finite() || steps < i64::MIN as f64 || steps >= i64::MAX as f64 {
            return Err(MotionError::InvalidArgument(format!(
                "{} cannot be converted to motor steps",
                units
            )));
        }
        Ok(steps as i64)
    }

    /// Convert a step count to physical units.
    pub fn to_units(&self, steps: i64) -> f64 {
        steps as f64 * self.dist_per_step
    }

    /// Open both controllers.
    ///
    /// Already connected is not an error. If either controller fails to open,
    /// any handle already acquired is closed and the system stays disconnected.
    pub fn connect(&mut self) -> MotionResult<()> {
        if self.is_connected() {
            warn!("Motion system already connected");
            return Ok(());
        }

        info!(serial = %self.x_serial, "Connecting to X stage");
        let stage_x = match self.factory.open(&self.x_serial) {
            Ok(handle) => handle,
            Err(e) => return Err(self.connect_failed(Axis::X, e, None)),
        };

        info!(serial = %self.y_serial, "Connecting to Y stage");
        let stage_y = match self.factory.open(&self.y_serial) {
            Ok(handle) => handle,
            Err(e) => return Err(self.connect_failed(Axis::Y, e, Some(stage_x))),
        };

        self.stage_x = Some(stage_x);
        self.stage_y = Some(stage_y);
        self.connected = true;
        info!("Motion system connected");
        Ok(())
    }

    fn connect_failed(
        &mut self,
        axis: Axis,
        source: stage_core::DriverError,
        acquired: Option<Box<dyn AxisController>>,
    ) -> MotionError {
        error!(
            %axis,
            x_serial = %self.x_serial,
            y_serial = %self.y_serial,
            error = %source,
            "Failed to connect to motion stages"
        );
        if let Some(handle) = acquired {
            let serial = handle.serial().to_string();
            if let Err(e) = handle.close() {
                warn!(%serial, error = %e, "Failed to close stage after partial connect");
            }
        }
        self.stage_x = None;
        self.stage_y = None;
        self.connected = false;
        MotionError::driver(axis, "connect", source)
    }

    /// Close both controllers.
    ///
    /// Never fails: close errors are logged, both handles are released and the
    /// system always ends disconnected. A no-op when already disconnected.
    pub fn disconnect(&mut self) {
        if !self.connected && self.stage_x.is_none() && self.stage_y.is_none() {
            warn!("Motion system already disconnected");
            return;
        }

        info!("Disconnecting motion system");
        for (axis, handle) in [(Axis::X, self.stage_x.take()), (Axis::Y, self.stage_y.take())] {
            let Some(handle) = handle else { continue };
            let serial = handle.serial().to_string();
            match handle.close() {
                Ok(()) => info!(%axis, %serial, "Stage disconnected"),
                Err(e) => error!(%axis, %serial, error = %e, "Error closing stage"),
            }
        }
        self.connected = false;
        info!("Motion system disconnection finished");
    }

    /// True when both controllers are open.
    pub fn is_connected(&self) -> bool {
        self.connected && self.stage_x.is_some() && self.stage_y.is_some()
    }

    fn stages(&mut self) -> MotionResult<(&mut dyn AxisController, &mut dyn AxisController)> {
        if !self.is_connected() {
            return Err(MotionError::NotConnected);
        }
        match (self.stage_x.as_deref_mut(), self.stage_y.as_deref_mut()) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(MotionError::NotConnected),
        }
    }

    /// Move both stages to (`x_units`, `y_units`) and wait for completion.
    pub fn move_to(&mut self, x_units: f64, y_units: f64) -> MotionResult<()> {
        if !self.is_connected() {
            error!("Cannot move stages: motion system not connected");
            return Err(MotionError::NotConnected);
        }

        let (target_x, target_y) = match (self.to_steps(x_units), self.to_steps(y_units)) {
            (Ok(tx), Ok(ty)) => (tx, ty),
            (Err(e), _) | (_, Err(e)) => {
                error!(x_units, y_units, error = %e, "Rejected move target");
                return Err(e);
            }
        };
        debug!(
            x_units,
            y_units, target_x, target_y, "Moving to target (units -> steps)"
        );

        let (x, y) = self.stages()?;
        let result = (|| -> MotionResult<()> {
            x.move_to(target_x)
                .map_err(|e| MotionError::driver(Axis::X, "move", e))?;
            y.move_to(target_y)
                .map_err(|e| MotionError::driver(Axis::Y, "move", e))?;

            debug!("Waiting for X stage move completion");
            x.wait_move()
                .map_err(|e| MotionError::driver(Axis::X, "wait_move", e))?;
            debug!("Waiting for Y stage move completion");
            y.wait_move()
                .map_err(|e| MotionError::driver(Axis::Y, "wait_move", e))
        })();

        match &result {
            Ok(()) => info!(x_units, y_units, "Motion complete"),
            Err(e) => error!(error = %e, "Error during stage movement or wait"),
        }
        result
    }

    /// Read both stage positions in physical units.
    pub fn get_position(&mut self) -> MotionResult<Position> {
        if !self.is_connected() {
            error!("Cannot get position: motion system not connected");
            return Err(MotionError::NotConnected);
        }

        let (x, y) = self.stages()?;
        let steps = x
            .position()
            .map_err(|e| MotionError::driver(Axis::X, "position", e))
            .and_then(|sx| {
                y.position()
                    .map(|sy| (sx, sy))
                    .map_err(|e| MotionError::driver(Axis::Y, "position", e))
            });

        match steps {
            Ok((sx, sy)) => {
                let position = Position {
                    x: self.to_units(sx),
                    y: self.to_units(sy),
                };
                debug!(x = position.x, y = position.y, "Current position");
                Ok(position)
            }
            Err(e) => {
                error!(error = %e, "Error getting stage position");
                Err(e)
            }
        }
    }

    /// Home both stages.
    ///
    /// With `wait == false` this returns once both home commands are accepted;
    /// the stages may still be travelling.
    pub fn home(&mut self, wait: bool) -> MotionResult<()> {
        if !self.is_connected() {
            error!("Cannot home stages: motion system not connected");
            return Err(MotionError::NotConnected);
        }

        info!("Starting homing sequence for X and Y stages");
        let (x, y) = self.stages()?;
        let result = (|| -> MotionResult<()> {
            x.home().map_err(|e| MotionError::driver(Axis::X, "home", e))?;
            y.home().map_err(|e| MotionError::driver(Axis::Y, "home", e))?;

            if wait {
                debug!("Waiting for X stage homing");
                x.wait_home()
                    .map_err(|e| MotionError::driver(Axis::X, "wait_home", e))?;
                debug!("Waiting for Y stage homing");
                y.wait_home()
                    .map_err(|e| MotionError::driver(Axis::Y, "wait_home", e))?;
            }
            Ok(())
        })();

        match &result {
            Ok(()) if wait => info!("Homing sequence complete"),
            Ok(()) => info!("Homing sequence initiated (waiting disabled)"),
            Err(e) => error!(error = %e, "Error during homing sequence"),
        }
        result
    }
}

impl<F: AxisDriverFactory> Drop for MotionSystem<F> {
    fn drop(&mut self) {
        if self.connected || self.stage_x.is_some() || self.stage_y.is_some() {
            self.disconnect();
        }
    }
}

impl<F: AxisDriverFactory> std::fmt::Debug for MotionSystem<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionSystem")
            .field("driver", &self.factory.driver_type())
            .field("x_serial", &self.x_serial)
            .field("y_serial", &self.y_serial)
            .field("dist_per_step", &self.dist_per_step)
            .field("connected", &self.is_connected())
            .finish()
    }
}
