//! Mission orchestration.
//!
//! Owns every periodic process and sequences them so that only one
//! component commands the motors at a time:
//!
//! ```text
//!   Idle ──start──► Localizing ──► Correcting ──► Navigating ──► Finished
//!                        │              │              │
//!                        └──────────────┴──────────────┴──► Halted(reason)
//! ```
//!
//! The odometer runs from `start` until `stop`. The drift corrector runs from
//! `start` too, but stays switched off until localization has seeded the
//! pose. The navigator thread idles (and leaves the motors alone) until the
//! first waypoint is sent.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use marga_io::DeviceHandles;

use crate::config::MargaConfig;
use crate::correction::{CorrectionSwitch, DriftCorrector, LineDetector};
use crate::error::{MargaError, Result};
use crate::kinematics::Kinematics;
use crate::localization::{LineLocalizer, RangeLocalizer};
use crate::navigation::Navigator;
use crate::odometer::Odometer;
use crate::shared::{Pose, SharedPose};
use crate::threads::{PeriodicThread, spawn_corrector, spawn_odometer};

/// Granularity of waits, so shutdown is noticed promptly
const WAIT_SLICE: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Localizing,
    Correcting,
    Navigating,
    Finished,
    Halted(String),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Halted(reason) => write!(f, "Halted ({})", reason),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Running processes, present between `start` and `stop`
struct Processes {
    odometer: PeriodicThread,
    corrector: PeriodicThread,
    correction: CorrectionSwitch,
    navigator: Navigator,
    pose_log: PeriodicThread,
}

pub struct Orchestrator {
    config: MargaConfig,
    handles: DeviceHandles,
    kinematics: Kinematics,
    pose: SharedPose,
    running: Arc<AtomicBool>,
    phase: Phase,
    processes: Option<Processes>,
}

impl Orchestrator {
    /// `running` is the process-wide shutdown flag; clearing it interrupts
    /// localization and waits.
    pub fn new(config: MargaConfig, handles: DeviceHandles, running: Arc<AtomicBool>) -> Self {
        Self {
            kinematics: Kinematics::from_config(&config.robot),
            config,
            handles,
            pose: SharedPose::default(),
            running,
            phase: Phase::Idle,
            processes: None,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn pose(&self) -> SharedPose {
        self.pose.clone()
    }

    pub fn is_started(&self) -> bool {
        self.processes.is_some()
    }

    /// Spawn the odometer, corrector (off), navigator and pose logger.
    /// Does nothing if already started.
    pub fn start(&mut self) -> Result<()> {
        if self.processes.is_some() {
            return Ok(());
        }
        log::info!("Starting processes");

        let odometer = Odometer::new(
            self.kinematics,
            Arc::clone(&self.handles.encoders),
            self.pose.clone(),
        );
        let odometer = spawn_odometer(odometer, self.config.odometer.period())?;

        let corrector = DriftCorrector::new(
            self.config.correction.clone(),
            self.config.grid.clone(),
            self.kinematics,
            Arc::clone(&self.handles.line_sensor),
            self.pose.clone(),
        );
        let correction = corrector.switch();
        correction.set_on(false);
        let corrector = spawn_corrector(corrector, self.config.correction.period())?;

        let navigator = Navigator::spawn(
            self.config.navigation.clone(),
            self.kinematics,
            Arc::clone(&self.handles.motors),
            self.pose.clone(),
        )?;

        let pose = self.pose.clone();
        let pose_log = PeriodicThread::spawn(
            "pose-log",
            Duration::from_millis(self.config.mission.pose_log_ms.max(1)),
            Arc::new(AtomicBool::new(true)),
            move || {
                let p = pose.get();
                log::info!("Pose: ({:.2}, {:.2}) cm, {:.1} deg", p.x, p.y, p.heading);
            },
        )?;

        self.processes = Some(Processes {
            odometer,
            corrector,
            correction,
            navigator,
            pose_log,
        });
        Ok(())
    }

    /// Range then line localization. Leaves the seeded pose in the estimator.
    pub fn localize(&mut self) -> Result<Pose> {
        let processes = self.processes.as_ref().ok_or_else(not_started)?;
        processes.correction.set_on(false);
        self.transition(Phase::Localizing);

        let mut range = RangeLocalizer::new(
            self.config.localization.range.clone(),
            Arc::clone(&self.handles.range_sensor),
            Arc::clone(&self.handles.motors),
            self.pose.clone(),
        );
        let fix = range.run(&self.running)?;
        log::info!(
            "Heading offset {:+.2} deg after {} attempt(s)",
            fix.heading_offset,
            range.attempts()
        );

        let mut line = LineLocalizer::new(
            self.config.localization.line.clone(),
            self.config.grid.clone(),
            self.kinematics,
            LineDetector::from_config(&self.config.correction),
            Arc::clone(&self.handles.line_sensor),
            Arc::clone(&self.handles.motors),
            self.pose.clone(),
        );
        line.run(&self.running)
    }

    /// Switch drift correction on.
    pub fn enable_correction(&mut self) -> Result<()> {
        let processes = self.processes.as_ref().ok_or_else(not_started)?;
        processes.correction.set_on(true);
        self.transition(Phase::Correcting);
        Ok(())
    }

    /// Visit `waypoints` (tile units) in order.
    pub fn navigate(&mut self, waypoints: &[[f64; 2]]) -> Result<()> {
        let timeout = Duration::from_secs_f64(self.config.mission.waypoint_timeout_secs.max(0.0));
        self.transition(Phase::Navigating);

        for (i, [tx, ty]) in waypoints.iter().copied().enumerate() {
            let (x, y) = self.config.grid.tile_to_world(tx, ty);
            log::info!(
                "Waypoint {}/{}: tile ({}, {}) -> ({:.2}, {:.2})",
                i + 1,
                waypoints.len(),
                tx,
                ty,
                x,
                y
            );
            let navigator = &self.processes.as_ref().ok_or_else(not_started)?.navigator;
            navigator.travel_to(x, y);
            self.wait_for(navigator, timeout)?;
        }
        Ok(())
    }

    /// Block on the navigator in short slices, watching the shutdown flag.
    fn wait_for(&self, navigator: &Navigator, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            match navigator.wait_until_done_timeout(WAIT_SLICE) {
                Ok(()) => return Ok(()),
                Err(MargaError::Timeout(_)) => {}
                Err(e) => return Err(e),
            }
            if !self.running.load(Ordering::Relaxed) {
                navigator.cancel();
                return Err(MargaError::Interrupted);
            }
            if started.elapsed() >= timeout {
                navigator.cancel();
                return Err(MargaError::Timeout(timeout));
            }
        }
    }

    /// Start, localize, enable correction, visit the configured waypoints,
    /// stop. A failure halts the robot and is returned.
    pub fn run_mission(&mut self) -> Result<()> {
        match self.mission() {
            Ok(()) => {
                let pose = self.pose.get();
                log::info!("Mission complete at {:?}", pose);
                self.stop();
                self.transition(Phase::Finished);
                Ok(())
            }
            Err(e) => {
                self.halt(&e);
                Err(e)
            }
        }
    }

    fn mission(&mut self) -> Result<()> {
        self.start()?;
        self.localize()?;
        self.enable_correction()?;
        let waypoints = self.config.mission.waypoints.clone();
        self.navigate(&waypoints)
    }

    /// Stop the motors and every process, recording why.
    pub fn halt(&mut self, reason: &MargaError) {
        log::error!("Halting: {}", reason);
        self.stop();
        self.transition(Phase::Halted(reason.to_string()));
    }

    /// Stop all processes and the motors. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(mut processes) = self.processes.take() {
            log::info!("Stopping processes");
            processes.correction.set_on(false);
            processes.navigator.stop();
            processes.corrector.stop();
            processes.odometer.stop();
            processes.pose_log.stop();
        }
        if let Err(e) = self.handles.motors.stop() {
            log::warn!("Failed to stop motors: {}", e);
        }
    }

    fn transition(&mut self, next: Phase) {
        if self.phase != next {
            log::info!("Phase {} -> {}", self.phase, next);
            self.phase = next;
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn not_started() -> MargaError {
    MargaError::Thread("processes not started".to_string())
}
