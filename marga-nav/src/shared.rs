//! Shared state for the periodic processes.
//!
//! The odometer, drift corrector, localizers and navigator all touch the
//! same pose. It lives in a single [`SharedPose`] that only offers
//! whole-tuple operations: a snapshot read, a full overwrite, and a
//! read-modify-write closure that runs under the lock. No caller can set a
//! single field while another is half way through an update.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::utils::normalize_degrees;

/// Robot pose in the world frame.
///
/// x and y are centimetres; heading is degrees in [0, 360), 0 facing +y,
/// counter-clockwise positive.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading: normalize_degrees(heading),
        }
    }

    /// Unit vector the robot drives along
    #[inline]
    pub fn forward(&self) -> (f64, f64) {
        let (s, c) = self.heading.to_radians().sin_cos();
        (-s, c)
    }

    /// Unit vector pointing to the robot's left
    #[inline]
    pub fn left(&self) -> (f64, f64) {
        let (s, c) = self.heading.to_radians().sin_cos();
        (-c, -s)
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (x - self.x).hypot(y - self.y)
    }

    /// Heading (degrees) that faces the point (x, y)
    pub fn bearing_to(&self, x: f64, y: f64) -> f64 {
        let (dx, dy) = (x - self.x, y - self.y);
        normalize_degrees((-dx).atan2(dy).to_degrees())
    }

    fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading.is_finite()
    }
}

/// Thread-safe pose container.
///
/// Cloning shares the same underlying pose.
#[derive(Clone, Debug, Default)]
pub struct SharedPose {
    inner: Arc<Mutex<Pose>>,
}

impl SharedPose {
    pub fn new(pose: Pose) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Pose::new(pose.x, pose.y, pose.heading))),
        }
    }

    /// Consistent snapshot of all three fields.
    pub fn get(&self) -> Pose {
        *self.inner.lock()
    }

    /// Overwrite the whole pose. Non-finite input is rejected and logged.
    pub fn set(&self, x: f64, y: f64, heading: f64) {
        let pose = Pose::new(x, y, heading);
        if !pose.is_valid() {
            log::warn!("Rejected non-finite pose ({}, {}, {})", x, y, heading);
            return;
        }
        *self.inner.lock() = pose;
    }

    /// Atomic read-modify-write.
    ///
    /// The closure sees the current pose and may change any field; heading is
    /// renormalized afterwards. If the closure leaves a non-finite value the
    /// previous pose is kept. Returns the pose after the update.
    pub fn update_with<F>(&self, f: F) -> Pose
    where
        F: FnOnce(&mut Pose),
    {
        let mut guard = self.inner.lock();
        let mut next = *guard;
        f(&mut next);
        next.heading = normalize_degrees(next.heading);
        if next.is_valid() {
            *guard = next;
        } else {
            log::warn!("Discarded non-finite pose update {:?}", next);
        }
        *guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::thread;

    #[test]
    fn test_set_normalizes_heading() {
        let pose = SharedPose::default();
        pose.set(1.0, 2.0, -90.0);
        assert_relative_eq!(pose.get().heading, 270.0);
        pose.set(1.0, 2.0, 450.0);
        assert_relative_eq!(pose.get().heading, 90.0);
    }

    #[test]
    fn test_non_finite_rejected() {
        let pose = SharedPose::new(Pose::new(5.0, 6.0, 7.0));
        pose.set(f64::NAN, 0.0, 0.0);
        pose.update_with(|p| p.x = f64::INFINITY);
        assert_eq!(pose.get(), Pose::new(5.0, 6.0, 7.0));
    }

    #[test]
    fn test_direction_vectors() {
        let pose = Pose::new(0.0, 0.0, 0.0);
        let (fx, fy) = pose.forward();
        assert_relative_eq!(fx, 0.0);
        assert_relative_eq!(fy, 1.0);
        let (lx, ly) = pose.left();
        assert_relative_eq!(lx, -1.0);
        assert_relative_eq!(ly, 0.0);

        let pose = Pose::new(0.0, 0.0, 90.0);
        let (fx, fy) = pose.forward();
        assert_relative_eq!(fx, -1.0);
        assert_relative_eq!(fy, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bearing_to() {
        let pose = Pose::new(10.0, 10.0, 0.0);
        assert_relative_eq!(pose.bearing_to(10.0, 20.0), 0.0);
        assert_relative_eq!(pose.bearing_to(0.0, 10.0), 90.0);
        assert_relative_eq!(pose.bearing_to(10.0, 0.0), 180.0);
        assert_relative_eq!(pose.bearing_to(20.0, 10.0), 270.0);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let pose = SharedPose::default();
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let pose = pose.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        pose.update_with(|p| {
                            p.x += 1.0;
                            p.y -= 1.0;
                        });
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        let snapshot = pose.get();
        assert_relative_eq!(snapshot.x, 4000.0);
        assert_relative_eq!(snapshot.y, -4000.0);
    }
}
