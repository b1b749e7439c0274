//! Drift correction while driving across grid lines in lockstep

mod common;

use common::{Rig, quiet_sim};
use marga_io::SimulationConfig;
use marga_nav::config::{CorrectionConfig, GridConfig};
use marga_nav::correction::{Axis, CorrectionOutcome, DriftCorrector};

fn biased_sim() -> SimulationConfig {
    let mut sim = quiet_sim();
    sim.start_x = 15.24;
    sim.start_y = 20.0;
    sim.start_heading = 0.0;
    sim.encoder.slip_bias = 0.03;
    sim
}

fn corrector(rig: &Rig) -> DriftCorrector {
    DriftCorrector::new(
        CorrectionConfig::default(),
        GridConfig::default(),
        rig.kinematics,
        rig.handles.line_sensor.clone(),
        rig.pose.clone(),
    )
}

/// Drive +y until the true centre passes `stop_y`; returns the outcomes seen.
fn drive_north(rig: &mut Rig, corrector: &mut DriftCorrector, stop_y: f64) -> Vec<CorrectionOutcome> {
    let mut outcomes = Vec::new();
    rig.command(360.0, 360.0);
    while rig.truth().y < stop_y {
        rig.tick();
        let outcome = corrector.tick().unwrap();
        if !matches!(outcome, CorrectionOutcome::NoCrossing | CorrectionOutcome::Off) {
            outcomes.push(outcome);
        }
    }
    rig.command(0.0, 0.0);
    outcomes
}

#[test]
fn test_crossings_remove_accumulated_drift() {
    let mut rig = Rig::at_truth(biased_sim());
    let mut corrector = corrector(&rig);
    corrector.set_on(true);

    let outcomes = drive_north(&mut rig, &mut corrector, 172.0);

    // Sensor passes the lines at 30.48 .. 152.4
    assert_eq!(outcomes.len(), 5, "{:?}", outcomes);
    for outcome in &outcomes {
        match outcome {
            CorrectionOutcome::Corrected { axis, delta } => {
                assert_eq!(*axis, Axis::Y);
                // Odometry over-reports, so corrections pull y back
                assert!(*delta < 0.0, "delta {}", delta);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    // Only the travel since the last line is uncorrected
    assert!(rig.position_error() < 1.0, "error {}", rig.position_error());
    assert_eq!(corrector.stats().corrected, 5);
}

#[test]
fn test_disabled_corrector_leaves_drift() {
    let mut rig = Rig::at_truth(biased_sim());
    let mut corrector = corrector(&rig);

    let outcomes = drive_north(&mut rig, &mut corrector, 172.0);
    assert!(outcomes.is_empty());
    assert!(rig.position_error() > 3.0, "error {}", rig.position_error());
}

#[test]
fn test_correction_keeps_heading() {
    let mut sim = biased_sim();
    sim.start_heading = 4.0;
    let mut rig = Rig::at_truth(sim);
    let mut corrector = corrector(&rig);
    corrector.set_on(true);

    drive_north(&mut rig, &mut corrector, 80.0);
    assert!(corrector.stats().corrected >= 1);
    let heading = rig.pose.get().heading;
    assert!((heading - 4.0).abs() < 0.1, "heading {}", heading);
}
