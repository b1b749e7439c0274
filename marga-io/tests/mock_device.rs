//! Mock device integration tests
//!
//! Exercise the simulated robot through the same trait objects the
//! navigation core uses.

use approx::assert_relative_eq;
use marga_io::{DeviceConfig, RangeReading, SimRobot, SimulationConfig, create_device};
use std::f64::consts::PI;
use std::thread;
use std::time::Duration;

fn noiseless() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.encoder.slip_stddev = 0.0;
    config.line_sensor.noise_stddev = 0.0;
    config.range_sensor.noise_stddev = 0.0;
    config
}

#[test]
fn test_tacho_counts_match_true_travel() {
    let robot = SimRobot::shared(noiseless());
    robot.lock().place(0.0, 0.0, 0.0);
    let devices = marga_io::devices::mock::handles(&robot);

    devices.motors.set_speeds(180.0, 180.0).unwrap();
    for _ in 0..400 {
        robot.lock().step(0.005);
    }
    devices.motors.stop().unwrap();

    let counts = devices.encoders.tacho_counts().unwrap();
    assert!((counts.left - 360).abs() <= 1, "left={}", counts.left);
    assert_eq!(counts.left, counts.right);

    let pose = robot.lock().true_pose();
    assert_relative_eq!(pose.y, 2.0 * PI * 2.18, epsilon = 1e-6);
}

#[test]
fn test_line_sensor_darkens_over_line() {
    let robot = SimRobot::shared(noiseless());
    let devices = marga_io::devices::mock::handles(&robot);

    // Heading 0 puts the sensor 10.5 cm behind the centre
    robot.lock().place(15.0, 10.5, 0.0);
    let on_line = devices.line_sensor.intensity().unwrap();
    robot.lock().place(15.0, 20.0, 0.0);
    let off_line = devices.line_sensor.intensity().unwrap();
    assert!(off_line - on_line > 0.3, "on={on_line} off={off_line}");
}

#[test]
fn test_range_profile_in_corner() {
    let robot = SimRobot::shared(noiseless());
    let devices = marga_io::devices::mock::handles(&robot);

    let near = |heading: f64| {
        robot.lock().place(-15.24, -15.24, heading);
        match devices.range_sensor.distance().unwrap() {
            RangeReading::Echo(d) => d < 40.0,
            RangeReading::NoEcho => false,
        }
    };
    assert!(near(135.0));
    assert!(near(60.0));
    assert!(!near(0.0));
    assert!(!near(315.0));
}

#[test]
fn test_mock_driver_moves_in_real_time() {
    let mut config = noiseless();
    config.start_x = 50.0;
    config.start_y = 50.0;
    config.start_heading = 0.0;
    config.speed_factor = 4.0;
    let device_config = DeviceConfig {
        simulation: Some(config),
        ..DeviceConfig::default()
    };

    let mut driver = create_device(&device_config).unwrap();
    let devices = driver.initialize().unwrap();
    devices.motors.set_speeds(360.0, 360.0).unwrap();
    thread::sleep(Duration::from_millis(250));
    devices.motors.stop().unwrap();
    driver.shutdown().unwrap();

    let counts = devices.encoders.tacho_counts().unwrap();
    assert!(counts.left > 100, "left={}", counts.left);
    // Shutdown is idempotent
    driver.shutdown().unwrap();
}
