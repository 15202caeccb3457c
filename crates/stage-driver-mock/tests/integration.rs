//! Integration tests for the simulated controller driver
//!
//! Drives two axes through the `AxisDriverFactory` seam the way a motion
//! system does: open both, command both, wait both, close both.

use stage_core::{AxisDriverFactory, DriverErrorKind};
use stage_driver_mock::*;

#[test]
fn test_two_axes_through_factory() {
    let x = MockAxis::builder("27269534").initial_position(100).build();
    let y = MockAxis::builder("27269887").initial_position(-100).build();
    let factory = MockAxisFactory::new()
        .with_axis(x.clone())
        .with_axis(y.clone())
        .strict();

    let mut hx = factory.open("27269534").unwrap();
    let mut hy = factory.open("27269887").unwrap();

    hx.move_to(1_000).unwrap();
    hy.move_to(-2_000).unwrap();
    hx.wait_move().unwrap();
    hy.wait_move().unwrap();

    assert_eq!(hx.position().unwrap(), 1_000);
    assert_eq!(hy.position().unwrap(), -2_000);

    hx.close().unwrap();
    hy.close().unwrap();

    assert!(!x.is_open());
    assert!(!y.is_open());
    assert_eq!(x.commanded_targets(), vec![1_000]);
    assert_eq!(y.commanded_targets(), vec![-2_000]);
}

#[test]
fn test_reopen_after_close() {
    let factory = MockAxisFactory::new();

    let handle = factory.open("1").unwrap();
    handle.close().unwrap();
    let handle = factory.open("1").unwrap();
    handle.close().unwrap();

    assert_eq!(factory.axis("1").unwrap().open_count(), 2);
}

#[test]
fn test_open_failure_injection() {
    let factory = MockAxisFactory::new().with_open_errors(ErrorConfig::scenario(
        ErrorScenario::FailAfterN {
            operation: "open",
            count: 1,
        },
    ));

    assert!(factory.open("x").is_ok());
    let err = factory.open("y").err().unwrap();
    assert_eq!(err.kind, DriverErrorKind::Hardware);
    assert!(factory.axis("y").is_none());
}

#[test]
fn test_config_defaults() {
    let config = MockAxisConfig::default();
    assert_eq!(config.mode, MockMode::Instant);
    assert_eq!(config.initial_position, 0);
    assert!(config.speed_steps_per_sec > 0.0);
}
