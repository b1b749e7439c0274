//! Odometer against the simulated robot in lockstep

mod common;

use approx::assert_relative_eq;
use common::{Rig, STEP, heading_error, quiet_sim, sim_at};
use std::f64::consts::PI;

#[test]
fn test_straight_drive_matches_truth() {
    let mut rig = Rig::at_truth(sim_at(15.0, 15.0, 0.0));
    rig.command(360.0, 360.0);
    for _ in 0..100 {
        rig.tick();
    }

    // One wheel revolution
    let pose = rig.pose.get();
    assert_relative_eq!(pose.y - 15.0, 2.0 * PI * 2.18, epsilon = 0.1);
    assert_relative_eq!(pose.x, 15.0, epsilon = 1e-6);
    assert!(rig.position_error() < 0.1, "error {}", rig.position_error());
}

#[test]
fn test_spin_in_place_tracks_heading() {
    let mut rig = Rig::at_truth(sim_at(15.0, 15.0, 0.0));
    rig.command(-180.0, 180.0);
    for _ in 0..100 {
        rig.tick();
    }
    let pose = rig.pose.get();
    let truth = rig.truth();
    // Half a wheel revolution each way turns the robot about 57.7 degrees
    assert_relative_eq!(pose.heading, 57.71, epsilon = 0.2);
    assert!(heading_error(pose.heading, truth.heading).abs() < 0.2);
    assert!(rig.position_error() < 0.05);
}

#[test]
fn test_arc_drift_stays_small() {
    let mut rig = Rig::at_truth(sim_at(60.0, 60.0, 0.0));
    rig.command(180.0, 360.0);
    for _ in 0..200 {
        rig.tick();
    }
    let truth = rig.truth();
    let pose = rig.pose.get();
    assert!(rig.position_error() < 0.3, "error {}", rig.position_error());
    assert!(heading_error(pose.heading, truth.heading).abs() < 0.5);
    // Curving left from heading 0
    assert!(pose.x < 60.0);
}

#[test]
fn test_slip_bias_accumulates_without_correction() {
    let mut sim = quiet_sim();
    sim.start_x = 15.0;
    sim.start_y = 0.0;
    sim.start_heading = 0.0;
    sim.encoder.slip_bias = 0.03;
    let mut rig = Rig::at_truth(sim);
    rig.command(360.0, 360.0);
    for _ in 0..1000 {
        rig.tick();
    }
    // 3% of roughly 137 cm
    let error = rig.pose.get().y - rig.truth().y;
    assert!(error > 3.0 && error < 5.0, "error {}", error);
}

#[test]
fn test_drift_bounded_under_tick_jitter() {
    let mut rig = Rig::at_truth(sim_at(60.0, 60.0, 0.0));
    rig.command(180.0, 360.0);

    // Odometer periods between 5 and 25 ms
    let jitter = [2, 1, 3, 2, 5, 1, 4, 2, 3];
    let mut elapsed = 0.0;
    for steps in jitter.iter().cycle() {
        if elapsed >= 2.0 {
            break;
        }
        rig.tick_steps(*steps);
        elapsed += *steps as f64 * STEP;
    }

    let truth = rig.truth();
    let pose = rig.pose.get();
    assert!(rig.position_error() < 0.3, "error {}", rig.position_error());
    assert!(heading_error(pose.heading, truth.heading).abs() < 0.5);
    // The arc really turned
    assert!(heading_error(truth.heading, 0.0).abs() > 30.0);
}
