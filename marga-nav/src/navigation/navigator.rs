//! Navigator thread: the periodic process around [`NavController`].
//!
//! Commands (`travel_to`, `turn_to`, `cancel`) only update a shared request
//! slot and return immediately; the `navigator` thread picks the newest
//! request up on its next tick. Completion is signalled through a condvar so
//! callers can block in `wait_until_done`.
//!
//! Motors are written only while a goal is active, plus exactly one stop
//! when the controller goes idle. While idle the navigator leaves the motors
//! alone, so localizers can drive them.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use marga_io::DriveMotors;
use parking_lot::{Condvar, Mutex};

use super::controller::{Goal, MotorCommand, NavController, Waypoint};
use crate::config::NavigationConfig;
use crate::error::{MargaError, Result};
use crate::kinematics::Kinematics;
use crate::shared::SharedPose;
use crate::threads::{LogThrottle, PeriodicThread};

/// Request slot shared between callers and the navigator thread
#[derive(Debug, Default)]
struct Request {
    /// Newest goal not yet seen by the thread (None with `cancel` = stop)
    pending: Option<Goal>,
    cancel: bool,
    /// True from `travel_to` until the controller reports idle
    active: bool,
}

#[derive(Debug, Default)]
struct NavShared {
    request: Mutex<Request>,
    done: Condvar,
}

impl NavShared {
    fn submit(&self, goal: Goal) {
        let mut request = self.request.lock();
        request.pending = Some(goal);
        request.cancel = false;
        request.active = true;
    }
}

/// Periodic navigation controller with a blocking completion API
pub struct Navigator {
    shared: Arc<NavShared>,
    pose: SharedPose,
    motors: Arc<dyn DriveMotors>,
    thread: PeriodicThread,
}

impl Navigator {
    /// Start the `navigator` thread.
    pub fn spawn(
        config: NavigationConfig,
        kinematics: Kinematics,
        motors: Arc<dyn DriveMotors>,
        pose: SharedPose,
    ) -> Result<Self> {
        let shared = Arc::new(NavShared::default());
        let period = config.period();
        let mut worker = NavWorker {
            controller: NavController::new(config, kinematics),
            shared: Arc::clone(&shared),
            motors: Arc::clone(&motors),
            pose: pose.clone(),
            driving: false,
            errors: LogThrottle::new(Duration::from_secs(1)),
        };
        let thread = PeriodicThread::spawn(
            "navigator",
            period,
            Arc::new(AtomicBool::new(true)),
            move || worker.tick(),
        )?;
        Ok(Self {
            shared,
            pose,
            motors,
            thread,
        })
    }

    /// Drive to (x, y). Replaces any goal in progress.
    pub fn travel_to(&self, x: f64, y: f64) {
        log::info!("travel_to({:.2}, {:.2})", x, y);
        self.shared.submit(Goal::Travel(Waypoint::new(x, y)));
    }

    /// Drive to (x, y), then turn to `heading`.
    pub fn travel_to_pose(&self, x: f64, y: f64, heading: f64) {
        log::info!("travel_to_pose({:.2}, {:.2}, {:.1})", x, y, heading);
        self.shared
            .submit(Goal::Travel(Waypoint::with_heading(x, y, heading)));
    }

    /// Turn in place to `heading`.
    pub fn turn_to(&self, heading: f64) {
        log::info!("turn_to({:.1})", heading);
        self.shared.submit(Goal::Turn(heading));
    }

    /// Abandon the current goal and stop the motors.
    pub fn cancel(&self) {
        let mut request = self.shared.request.lock();
        if request.active || request.pending.is_some() {
            log::info!("Navigation cancelled");
        }
        request.pending = None;
        request.cancel = true;
    }

    pub fn is_navigating(&self) -> bool {
        self.shared.request.lock().active
    }

    /// Block until the navigator is idle.
    pub fn wait_until_done(&self) {
        let mut request = self.shared.request.lock();
        while request.active {
            self.shared.done.wait(&mut request);
        }
    }

    /// Block until idle or until `timeout` elapses.
    pub fn wait_until_done_timeout(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut request = self.shared.request.lock();
        while request.active {
            if self
                .shared
                .done
                .wait_until(&mut request, deadline)
                .timed_out()
            {
                if request.active {
                    return Err(MargaError::Timeout(timeout));
                }
                break;
            }
        }
        Ok(())
    }

    pub fn pose(&self) -> &SharedPose {
        &self.pose
    }

    /// Stop the thread, halting the motors if a goal was in progress.
    pub fn stop(&mut self) {
        if !self.thread.is_running() {
            return;
        }
        self.cancel();
        self.thread.stop();

        // Nobody is left to clear the flag
        let mut request = self.shared.request.lock();
        if std::mem::take(&mut request.active)
            && let Err(e) = self.motors.stop()
        {
            log::warn!("Failed to stop motors: {}", e);
        }
        self.shared.done.notify_all();
    }
}

impl Drop for Navigator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the navigator thread
struct NavWorker {
    controller: NavController,
    shared: Arc<NavShared>,
    motors: Arc<dyn DriveMotors>,
    pose: SharedPose,
    /// Motors have been commanded since the last stop
    driving: bool,
    errors: LogThrottle,
}

impl NavWorker {
    fn tick(&mut self) {
        {
            let mut request = self.shared.request.lock();
            if request.cancel {
                request.cancel = false;
                self.controller.cancel();
            }
            if let Some(goal) = request.pending.take() {
                self.controller.set_goal(goal);
            }
        }

        let command = if self.controller.is_idle() {
            MotorCommand::STOP
        } else {
            let pose = self.pose.get();
            self.controller.step(&pose)
        };

        if self.controller.is_idle() {
            if self.driving {
                self.send(MotorCommand::STOP);
                self.driving = false;
            }
            let mut request = self.shared.request.lock();
            // A goal submitted since the top of this tick keeps us active
            if request.active && request.pending.is_none() {
                request.active = false;
                log::info!("Navigation idle at {:?}", self.pose.get());
                self.shared.done.notify_all();
            }
        } else {
            self.send(command);
            self.driving = true;
        }
    }

    fn send(&mut self, command: MotorCommand) {
        if let Err(e) = self.motors.set_speeds(command.left, command.right)
            && let Some(suppressed) = self.errors.ready()
        {
            log::warn!("Motor command failed: {} ({} suppressed)", e, suppressed);
        }
    }
}
