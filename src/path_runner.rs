//! Coordinate path runs
//!
//! A path is a list of X,Y points in physical units, one per line:
//!
//! ```text
//! # x, y
//! 0.0, 0.0
//! 150.0, 0.0
//! 150.0, 75.5
//! ```
//!
//! Lines starting with `#` and blank lines are skipped; columns after the
//! second are ignored. [`PathRunner::run`] connects the motion system,
//! optionally moves to the origin, then visits every point and dwells there.
//! The motion system is disconnected when the run ends, successfully or not.

use crate::config::RunnerConfig;
use crate::error::MotionError;
use crate::motion_system::{MotionSystem, Position};
use stage_core::AxisDriverFactory;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors raised while loading or running a path.
#[derive(Error, Debug)]
pub enum PathError {
    /// The coordinate file could not be read.
    #[error("Failed to read coordinate file {path}: {source}")]
    Read {
        /// File being read
        path: PathBuf,
        /// Underlying CSV or I/O error
        #[source]
        source: csv::Error,
    },

    /// A line is not an X,Y pair of finite numbers.
    #[error("Coordinate line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: u64,
        /// What was wrong with it
        message: String,
    },

    /// Nothing to visit.
    #[error("Coordinate list contains no points")]
    Empty,

    /// Dwell or overhead time cannot be used.
    #[error("Invalid run timing: {0}")]
    InvalidTiming(String),

    /// Connecting or moving to the origin failed.
    #[error("Path run setup failed: {0}")]
    Setup(#[from] MotionError),

    /// Moving to a point failed.
    #[error("Step {step}/{total} failed: {source}")]
    Step {
        /// 1-based index of the point
        step: usize,
        /// Number of points in the path
        total: usize,
        /// Motion error raised by the move
        #[source]
        source: MotionError,
    },
}

/// Read a coordinate file.
pub fn load_coordinates<P: AsRef<Path>>(path: P) -> Result<Vec<Position>, PathError> {
    let path = path.as_ref();
    info!(path = %path.display(), "Loading coordinates");

    let reader = reader_builder()
        .from_path(path)
        .map_err(|source| PathError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let points = collect_points(reader, path)?;
    info!(points = points.len(), "Coordinates loaded");
    Ok(points)
}

/// Parse coordinates from any reader (e.g. an in-memory buffer).
pub fn parse_coordinates<R: Read>(input: R) -> Result<Vec<Position>, PathError> {
    collect_points(reader_builder().from_reader(input), Path::new("<input>"))
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true);
    builder
}

fn collect_points<R: Read>(
    mut reader: csv::Reader<R>,
    path: &Path,
) -> Result<Vec<Position>, PathError> {
    let mut points = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|source| PathError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let line = record.position().map_or(0, |pos| pos.line());

        if record.len() < 2 {
            return Err(PathError::Parse {
                line,
                message: format!("expected X and Y columns, found {}", record.len()),
            });
        }

        let coordinate = |index: usize| -> Result<f64, PathError> {
            let field = &record[index];
            match field.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(PathError::Parse {
                    line,
                    message: format!("'{}' is not a finite number", field),
                }),
            }
        };

        points.push(Position {
            x: coordinate(0)?,
            y: coordinate(1)?,
        });
    }

    if points.is_empty() {
        return Err(PathError::Empty);
    }
    Ok(points)
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    /// Points visited
    pub points_visited: usize,
    /// Wall-clock time from start to disconnect
    pub elapsed: Duration,
}

/// Visits a list of points with a fixed dwell at each.
#[derive(Debug, Clone)]
pub struct PathRunner {
    points: Vec<Position>,
    dwell: Duration,
    move_overhead: Duration,
    start_at_origin: bool,
}

impl PathRunner {
    /// Runner with the default move overhead, starting at the origin.
    pub fn new(points: Vec<Position>, dwell: Duration) -> Self {
        let defaults = RunnerConfig::default();
        Self {
            points,
            dwell,
            move_overhead: Duration::from_secs_f64(defaults.move_overhead_s),
            start_at_origin: defaults.start_at_origin,
        }
    }

    /// Runner using the `[runner]` configuration section.
    pub fn from_config(points: Vec<Position>, config: &RunnerConfig) -> Result<Self, PathError> {
        Ok(Self {
            points,
            dwell: seconds("dwell_s", config.dwell_s)?,
            move_overhead: seconds("move_overhead_s", config.move_overhead_s)?,
            start_at_origin: config.start_at_origin,
        })
    }

    /// Move to (0, 0) before the first point or not.
    pub fn with_start_at_origin(mut self, enabled: bool) -> Self {
        self.start_at_origin = enabled;
        self
    }

    /// Points in visiting order.
    pub fn points(&self) -> &[Position] {
        &self.points
    }

    /// Expected run time: every point costs its dwell plus the move overhead.
    pub fn estimate_duration(&self) -> Duration {
        let per_point = self.dwell.saturating_add(self.move_overhead);
        u32::try_from(self.points.len())
            .ok()
            .and_then(|n| per_point.checked_mul(n))
            .unwrap_or(Duration::MAX)
    }

    /// Visit every point.
    ///
    /// Connects `motion` if needed and always leaves it disconnected.
    pub fn run<F: AxisDriverFactory>(
        &self,
        motion: &mut MotionSystem<F>,
    ) -> Result<RunReport, PathError> {
        if self.points.is_empty() {
            error!("Path run aborted: no points to visit");
            return Err(PathError::Empty);
        }

        info!(points = self.points.len(), "Starting path run");
        let start = Instant::now();
        let result = self.visit_all(motion);

        info!("Path run finished, disconnecting");
        motion.disconnect();

        let elapsed = start.elapsed();
        match &result {
            Ok(visited) => info!(
                visited,
                elapsed = %format_hms(elapsed),
                "Path run complete"
            ),
            Err(e) => error!(
                error = %e,
                elapsed = %format_hms(elapsed),
                "Path run aborted"
            ),
        }

        result.map(|points_visited| RunReport {
            points_visited,
            elapsed,
        })
    }

    fn visit_all<F: AxisDriverFactory>(
        &self,
        motion: &mut MotionSystem<F>,
    ) -> Result<usize, PathError> {
        if !motion.is_connected() {
            motion.connect()?;
        }

        let total = self.points.len();
        info!(
            total,
            dwell_s = self.dwell.as_secs_f64(),
            estimate = %format_hms(self.estimate_duration()),
            "Estimated run duration"
        );

        if self.start_at_origin {
            info!("Moving to origin (0, 0)");
            motion.move_to(0.0, 0.0)?;
        }

        for (index, point) in self.points.iter().enumerate() {
            let step = index + 1;
            let step_start = Instant::now();
            info!(
                step,
                total,
                percent = format_args!("{:.1}", step as f64 * 100.0 / total as f64),
                x = point.x,
                y = point.y,
                "Moving to point"
            );

            motion
                .move_to(point.x, point.y)
                .map_err(|source| PathError::Step {
                    step,
                    total,
                    source,
                })?;

            if !self.dwell.is_zero() {
                std::thread::sleep(self.dwell);
            }
            debug!(step, elapsed_s = step_start.elapsed().as_secs_f64(), "Step done");
        }

        Ok(total)
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration, PathError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(PathError::InvalidTiming(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|e| PathError::InvalidTiming(format!("{}: {}", name, e)))
}

/// Render a duration as `"{h}h {m}m {s}s"`, rounded to whole seconds.
pub fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs_f64().round() as u64;
    format!("{}h {}m {}s", total / 3600, (total % 3600) / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stage_driver_mock::{
        ErrorConfig, ErrorScenario, MockAxis, MockAxisFactory, SharedCommandLog, AxisCommand,
    };
    use std::io::Write;

    const X: &str = "27269534";
    const Y: &str = "27269887";

    fn points(pairs: &[(f64, f64)]) -> Vec<Position> {
        pairs.iter().map(|&(x, y)| Position { x, y }).collect()
    }

    fn motion_with(x: MockAxis, y: MockAxis) -> MotionSystem<MockAxisFactory> {
        let factory = MockAxisFactory::new().with_axis(x).with_axis(y).strict();
        MotionSystem::new(factory, X, Y, 1.0).unwrap()
    }

    #[test]
    fn test_parse_with_comments_and_extra_columns() {
        let input = "# x, y\n1.5, 2.5\n\n  -3,4 , 99\n";
        let parsed = parse_coordinates(input.as_bytes()).unwrap();
        assert_eq!(parsed, points(&[(1.5, 2.5), (-3.0, 4.0)]));
    }

    #[test]
    fn test_parse_single_row() {
        let parsed = parse_coordinates("10,20".as_bytes()).unwrap();
        assert_eq!(parsed, points(&[(10.0, 20.0)]));
    }

    #[test]
    fn test_parse_reports_line_of_bad_number() {
        let err = parse_coordinates("1,2\n3,abc\n".as_bytes()).unwrap_err();
        match err {
            PathError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("abc"));
            }
            other => panic!("expected Parse, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_single_column_and_non_finite() {
        assert!(matches!(
            parse_coordinates("1\n".as_bytes()),
            Err(PathError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            parse_coordinates("1,inf\n".as_bytes()),
            Err(PathError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(matches!(
            parse_coordinates("# nothing here\n".as_bytes()),
            Err(PathError::Empty)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0,0\n100,50").unwrap();

        let loaded = load_coordinates(file.path()).unwrap();
        assert_eq!(loaded, points(&[(0.0, 0.0), (100.0, 50.0)]));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_coordinates("/nonexistent/coords.csv"),
            Err(PathError::Read { .. })
        ));
    }

    #[test]
    fn test_estimate_duration() {
        let runner = PathRunner::new(points(&[(0.0, 0.0); 4]), Duration::from_secs(1));
        // 4 x (1s dwell + 0.5s overhead)
        assert_eq!(runner.estimate_duration(), Duration::from_secs(6));
    }

    #[test]
    fn test_from_config_rejects_negative_dwell() {
        let config = RunnerConfig {
            dwell_s: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            PathRunner::from_config(points(&[(1.0, 1.0)]), &config),
            Err(PathError::InvalidTiming(_))
        ));
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(Duration::from_secs(3725)), "1h 2m 5s");
        assert_eq!(format_hms(Duration::from_millis(59_600)), "0h 1m 0s");
    }

    #[test]
    fn test_run_visits_origin_then_points_and_disconnects() {
        let log = SharedCommandLog::new();
        let x = MockAxis::builder(X)
            .initial_position(7)
            .shared_log(log.clone())
            .build();
        let y = MockAxis::builder(Y).shared_log(log.clone()).build();
        let mut motion = motion_with(x.clone(), y.clone());

        let runner = PathRunner::new(points(&[(10.0, 20.0), (30.0, 40.0)]), Duration::ZERO);
        let report = runner.run(&mut motion).unwrap();

        assert_eq!(report.points_visited, 2);
        assert_eq!(x.commanded_targets(), vec![0, 10, 30]);
        assert_eq!(y.commanded_targets(), vec![0, 20, 40]);
        assert!(!motion.is_connected());
        assert!(!x.is_open() && !y.is_open());
        assert_eq!(
            log.entries().last(),
            Some(&(Y.to_string(), AxisCommand::Close))
        );
    }

    #[test]
    fn test_run_without_origin() {
        let x = MockAxis::new(X);
        let mut motion = motion_with(x.clone(), MockAxis::new(Y));

        PathRunner::new(points(&[(5.0, 5.0)]), Duration::ZERO)
            .with_start_at_origin(false)
            .run(&mut motion)
            .unwrap();

        assert_eq!(x.commanded_targets(), vec![5]);
    }

    #[test]
    fn test_failed_step_still_disconnects() {
        let y = MockAxis::builder(Y)
            .error_config(ErrorConfig::scenario(ErrorScenario::FailAfterN {
                operation: "move",
                count: 2,
            }))
            .build();
        let x = MockAxis::new(X);
        let mut motion = motion_with(x.clone(), y.clone());

        // Origin and point 1 succeed, point 2 fails
        let runner = PathRunner::new(
            points(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]),
            Duration::ZERO,
        );
        match runner.run(&mut motion) {
            Err(PathError::Step { step, total, .. }) => {
                assert_eq!(step, 2);
                assert_eq!(total, 3);
            }
            other => panic!("expected Step error, got {:?}", other),
        }

        assert!(!motion.is_connected());
        assert!(!x.is_open() && !y.is_open());
        assert_eq!(x.commanded_targets(), vec![0, 1, 2]);
    }

    #[test]
    fn test_connect_failure_moves_nothing() {
        let x = MockAxis::new(X);
        let factory = MockAxisFactory::new().with_axis(x.clone()).strict();
        let mut motion = MotionSystem::new(factory, X, Y, 1.0).unwrap();

        let err = PathRunner::new(points(&[(1.0, 1.0)]), Duration::ZERO)
            .run(&mut motion)
            .unwrap_err();

        assert!(matches!(err, PathError::Setup(MotionError::DriverFailure { .. })));
        assert!(x.commands().iter().all(|c| *c == AxisCommand::Close));
    }

    #[test]
    fn test_empty_run_does_not_connect() {
        let x = MockAxis::new(X);
        let mut motion = motion_with(x.clone(), MockAxis::new(Y));

        let err = PathRunner::new(Vec::new(), Duration::ZERO)
            .run(&mut motion)
            .unwrap_err();

        assert!(matches!(err, PathError::Empty));
        assert_eq!(x.open_count(), 0);
    }

    #[test]
    fn test_dwell_is_applied() {
        let mut motion = motion_with(MockAxis::new(X), MockAxis::new(Y));
        let runner = PathRunner::new(points(&[(1.0, 1.0), (2.0, 2.0)]), Duration::from_millis(30));

        let report = runner.run(&mut motion).unwrap();
        assert!(report.elapsed >= Duration::from_millis(60));
    }
}
