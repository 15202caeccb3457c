//! Simulated KDC101-style axis controller.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use stage_core::driver::{AxisController, AxisDriverFactory};
use stage_core::error::{DriverError, DriverErrorKind, DriverResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{ErrorConfig, MockMode};

/// Driver type reported in every error raised by this crate.
pub const DRIVER_TYPE: &str = "mock_kdc101";

/// Longest simulated travel; slower speeds are clamped to this.
pub const MAX_TRAVEL_TIME: Duration = Duration::from_secs(3600);

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for simulated axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockAxisConfig {
    /// Timing mode
    pub mode: MockMode,
    /// Travel speed in steps/sec (Realistic mode)
    pub speed_steps_per_sec: f64,
    /// Settling delay after each move in milliseconds (Realistic mode)
    pub settle_ms: u64,
    /// Raw step position reported right after power-up
    pub initial_position: i64,
}

impl Default for MockAxisConfig {
    fn default() -> Self {
        Self {
            mode: MockMode::Instant,
            speed_steps_per_sec: 20_000.0,
            settle_ms: 50,
            initial_position: 0,
        }
    }
}

/// A call received by a [`MockAxis`], recorded in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisCommand {
    /// `move_to(steps)`
    MoveTo(i64),
    /// `wait_move()`
    WaitMove,
    /// `home()`
    Home,
    /// `wait_home()`
    WaitHome,
    /// `position()`
    Position,
    /// `close()`
    Close,
}

/// Command log shared by several axes, recording calls in global order.
///
/// Each axis keeps its own log; a shared log shows how calls on different
/// axes interleave.
#[derive(Debug, Clone, Default)]
pub struct SharedCommandLog {
    entries: Arc<Mutex<Vec<(String, AxisCommand)>>>,
}

impl SharedCommandLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(serial, command)` recorded so far, in call order.
    pub fn entries(&self) -> Vec<(String, AxisCommand)> {
        self.entries.lock().clone()
    }

    fn push(&self, serial: &str, command: AxisCommand) {
        self.entries.lock().push((serial.to_string(), command));
    }
}

// =============================================================================
// Internal State
// =============================================================================

#[derive(Debug)]
struct AxisState {
    position: i64,
    /// Target of the move or homing run still in flight
    pending: Option<i64>,
    homing: bool,
    is_homed: bool,
    is_open: bool,
    open_count: u32,
    close_count: u32,
    commands: Vec<AxisCommand>,
}

// =============================================================================
// MockAxis
// =============================================================================

/// Simulated axis controller.
///
/// Clones share state, so a test can keep one clone for inspection while the
/// other is handed out as an [`AxisController`].
///
/// # Example
///
/// ```rust,ignore
/// let axis = MockAxis::builder("27269534").initial_position(10_000).build();
/// let factory = MockAxisFactory::new().with_axis(axis.clone());
/// // ... drive it through a MotionSystem ...
/// assert_eq!(axis.commanded_targets(), vec![180]);
/// ```
#[derive(Clone)]
pub struct MockAxis {
    serial: String,
    state: Arc<Mutex<AxisState>>,
    mode: MockMode,
    speed_steps_per_sec: f64,
    settle_ms: u64,
    error_config: ErrorConfig,
    shared_log: Option<SharedCommandLog>,
}

impl MockAxis {
    /// Create a simulated axis at step 0 in instant mode.
    pub fn new(serial: impl Into<String>) -> Self {
        Self::builder(serial).build()
    }

    /// Create a simulated axis from configuration.
    pub fn with_config(serial: impl Into<String>, config: &MockAxisConfig) -> Self {
        Self::builder(serial)
            .initial_position(config.initial_position)
            .mode(config.mode)
            .speed(config.speed_steps_per_sec)
            .settle_ms(config.settle_ms)
            .build()
    }

    /// Create a builder for configuring a MockAxis
    pub fn builder(serial: impl Into<String>) -> MockAxisBuilder {
        MockAxisBuilder::new(serial)
    }

    /// Raw step position, without recording a command.
    pub fn position_steps(&self) -> i64 {
        self.state.lock().position
    }

    /// Whether a handle to this axis is currently open.
    pub fn is_open(&self) -> bool {
        self.state.lock().is_open
    }

    /// Whether a homing run has completed.
    pub fn is_homed(&self) -> bool {
        self.state.lock().is_homed
    }

    /// Whether a move or homing run is still pending completion.
    pub fn is_moving(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Number of times a handle was opened.
    pub fn open_count(&self) -> u32 {
        self.state.lock().open_count
    }

    /// Number of `close` calls received.
    pub fn close_count(&self) -> u32 {
        self.state.lock().close_count
    }

    /// Every call received so far, in order.
    pub fn commands(&self) -> Vec<AxisCommand> {
        self.state.lock().commands.clone()
    }

    /// Targets of every `move_to` received so far.
    pub fn commanded_targets(&self) -> Vec<i64> {
        self.state
            .lock()
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                AxisCommand::MoveTo(steps) => Some(*steps),
                _ => None,
            })
            .collect()
    }

    fn record(&self, command: AxisCommand) {
        self.state.lock().commands.push(command);
        if let Some(log) = &self.shared_log {
            log.push(&self.serial, command);
        }
    }

    fn check(&self, operation: &'static str) -> DriverResult<()> {
        self.error_config.check_operation(DRIVER_TYPE, operation)
    }

    fn travel_time(&self, distance: i64) -> Duration {
        match self.mode {
            MockMode::Instant => Duration::ZERO,
            MockMode::Realistic => {
                let travel = if self.speed_steps_per_sec > 0.0 {
                    let secs = distance.unsigned_abs() as f64 / self.speed_steps_per_sec;
                    Duration::try_from_secs_f64(secs)
                        .unwrap_or(MAX_TRAVEL_TIME)
                        .min(MAX_TRAVEL_TIME)
                } else {
                    Duration::ZERO
                };
                travel.saturating_add(Duration::from_millis(self.settle_ms))
            }
        }
    }

    /// Finish whatever is in flight. Returns whether a homing run completed.
    fn complete_pending(&self) -> bool {
        let (target, distance) = {
            let state = self.state.lock();
            match state.pending {
                Some(target) => (target, target - state.position),
                None => return false,
            }
        };

        // Lock released while the stage travels
        let delay = self.travel_time(distance);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock();
        state.position = target;
        state.pending = None;
        let homed = std::mem::take(&mut state.homing);
        if homed {
            state.is_homed = true;
        }
        homed
    }

    fn mark_opened(&self) -> DriverResult<()> {
        let mut state = self.state.lock();
        if state.is_open {
            return Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::Connection,
                format!("Controller {} is already open", self.serial),
            ));
        }
        state.is_open = true;
        state.open_count += 1;
        Ok(())
    }
}

impl std::fmt::Debug for MockAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAxis")
            .field("serial", &self.serial)
            .field("mode", &self.mode)
            .field("position", &self.position_steps())
            .finish()
    }
}

impl AxisController for MockAxis {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn move_to(&mut self, steps: i64) -> DriverResult<()> {
        self.record(AxisCommand::MoveTo(steps));
        self.check("move")?;

        let mut state = self.state.lock();
        tracing::debug!(
            serial = %self.serial,
            from = state.position,
            to = steps,
            "MockAxis: move started"
        );
        state.pending = Some(steps);
        state.homing = false;
        Ok(())
    }

    fn wait_move(&mut self) -> DriverResult<()> {
        self.record(AxisCommand::WaitMove);
        self.check("wait_move")?;
        self.complete_pending();
        tracing::debug!(serial = %self.serial, "MockAxis: move settled");
        Ok(())
    }

    fn home(&mut self) -> DriverResult<()> {
        self.record(AxisCommand::Home);
        self.check("home")?;

        let mut state = self.state.lock();
        tracing::debug!(serial = %self.serial, "MockAxis: homing started");
        state.pending = Some(0);
        state.homing = true;
        Ok(())
    }

    fn wait_home(&mut self) -> DriverResult<()> {
        self.record(AxisCommand::WaitHome);
        self.check("wait_home")?;
        if self.complete_pending() {
            tracing::debug!(serial = %self.serial, "MockAxis: homing complete");
        }
        Ok(())
    }

    fn position(&mut self) -> DriverResult<i64> {
        self.record(AxisCommand::Position);
        self.check("position")?;
        Ok(self.position_steps())
    }

    fn close(self: Box<Self>) -> DriverResult<()> {
        self.record(AxisCommand::Close);
        {
            // The handle is gone whether or not the device acknowledges
            let mut state = self.state.lock();
            state.is_open = false;
            state.close_count += 1;
        }
        self.check("close")?;
        tracing::debug!(serial = %self.serial, "MockAxis: closed");
        Ok(())
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for MockAxis with fluent API
pub struct MockAxisBuilder {
    serial: String,
    config: MockAxisConfig,
    error_config: ErrorConfig,
    shared_log: Option<SharedCommandLog>,
}

impl MockAxisBuilder {
    /// Create a new builder with defaults
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            config: MockAxisConfig::default(),
            error_config: ErrorConfig::none(),
            shared_log: None,
        }
    }

    /// Set initial raw step position
    pub fn initial_position(mut self, steps: i64) -> Self {
        self.config.initial_position = steps;
        self
    }

    /// Set operational mode
    pub fn mode(mut self, mode: MockMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set travel speed (steps/sec)
    pub fn speed(mut self, steps_per_sec: f64) -> Self {
        self.config.speed_steps_per_sec = steps_per_sec;
        self
    }

    /// Set settling delay (ms)
    pub fn settle_ms(mut self, ms: u64) -> Self {
        self.config.settle_ms = ms;
        self
    }

    /// Set error configuration
    pub fn error_config(mut self, config: ErrorConfig) -> Self {
        self.error_config = config;
        self
    }

    /// Also record every call into `log`
    pub fn shared_log(mut self, log: SharedCommandLog) -> Self {
        self.shared_log = Some(log);
        self
    }

    /// Build the MockAxis
    pub fn build(self) -> MockAxis {
        MockAxis {
            serial: self.serial,
            state: Arc::new(Mutex::new(AxisState {
                position: self.config.initial_position,
                pending: None,
                homing: false,
                is_homed: false,
                is_open: false,
                open_count: 0,
                close_count: 0,
                commands: Vec::new(),
            })),
            mode: self.config.mode,
            speed_steps_per_sec: self.config.speed_steps_per_sec,
            settle_ms: self.config.settle_ms,
            error_config: self.error_config,
            shared_log: self.shared_log,
        }
    }
}

// =============================================================================
// MockAxisFactory - AxisDriverFactory implementation
// =============================================================================

/// Factory handing out [`MockAxis`] handles by serial number.
///
/// By default any serial answers: unknown serials get a fresh axis built from
/// the factory defaults. Use [`MockAxisFactory::strict`] to refuse them.
pub struct MockAxisFactory {
    axes: Mutex<HashMap<String, MockAxis>>,
    defaults: MockAxisConfig,
    open_errors: ErrorConfig,
    strict: bool,
    available: bool,
}

impl MockAxisFactory {
    /// Factory answering every serial with instant-mode axes.
    pub fn new() -> Self {
        Self::with_config(MockAxisConfig::default())
    }

    /// Factory answering every serial with axes built from `config`.
    pub fn with_config(config: MockAxisConfig) -> Self {
        Self {
            axes: Mutex::new(HashMap::new()),
            defaults: config,
            open_errors: ErrorConfig::none(),
            strict: false,
            available: true,
        }
    }

    /// Pre-register an axis under its serial number.
    pub fn with_axis(self, axis: MockAxis) -> Self {
        self.axes.lock().insert(axis.serial.clone(), axis);
        self
    }

    /// Refuse serials that were not registered with [`with_axis`](Self::with_axis).
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Make the startup capability check fail.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Inject failures into `open` (operation name "open").
    pub fn with_open_errors(mut self, errors: ErrorConfig) -> Self {
        self.open_errors = errors;
        self
    }

    /// The axis registered (or created) for `serial`.
    pub fn axis(&self, serial: &str) -> Option<MockAxis> {
        self.axes.lock().get(serial).cloned()
    }
}

impl Default for MockAxisFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AxisDriverFactory for MockAxisFactory {
    fn driver_type(&self) -> &'static str {
        DRIVER_TYPE
    }

    fn name(&self) -> &'static str {
        "Simulated KDC101 Controller"
    }

    fn probe(&self) -> DriverResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(DriverError::new(
                DRIVER_TYPE,
                DriverErrorKind::Unavailable,
                "Simulated controller backend disabled",
            ))
        }
    }

    fn open(&self, serial: &str) -> DriverResult<Box<dyn AxisController>> {
        self.probe()?;
        self.open_errors.check_operation(DRIVER_TYPE, "open")?;

        let axis = {
            let mut axes = self.axes.lock();
            match axes.get(serial) {
                Some(axis) => axis.clone(),
                None if self.strict => {
                    return Err(DriverError::new(
                        DRIVER_TYPE,
                        DriverErrorKind::Connection,
                        format!("No controller with serial {}", serial),
                    ));
                }
                None => {
                    let axis = MockAxis::with_config(serial, &self.defaults);
                    axes.insert(serial.to_string(), axis.clone());
                    axis
                }
            }
        };

        axis.mark_opened()?;
        tracing::debug!(serial, "MockAxis: opened");
        Ok(Box::new(axis))
    }
}
