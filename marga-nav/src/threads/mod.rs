//! Periodic processes for MargaNav.
//!
//! Every long-lived process is a named OS thread driven by a
//! `crossbeam_channel::tick` ticker:
//! - `odometer`: integrates wheel samples into the shared pose
//! - `drift-corrector`: snaps the pose on grid-line crossings (when enabled)
//! - `navigator`: closes the loop between pose and motors
//! - `pose-log`: periodic status line for the daemon
//!
//! A ticker never queues: if a task runs late, the missed ticks are dropped
//! and the next iteration runs at the following deadline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::correction::{CorrectionOutcome, DriftCorrector};
use crate::error::{MargaError, Result};
use crate::odometer::Odometer;

/// Rate limiter for noisy log lines
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    last: Option<Instant>,
    suppressed: u64,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            suppressed: 0,
        }
    }

    /// Returns the number of suppressed events when a line may be logged now.
    pub fn ready(&mut self) -> Option<u64> {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => {
                self.suppressed += 1;
                None
            }
            _ => {
                self.last = Some(now);
                Some(std::mem::take(&mut self.suppressed))
            }
        }
    }
}

/// Handle to a named periodic thread.
pub struct PeriodicThread {
    name: String,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicThread {
    /// Spawn `task` on a thread called `name`, run once per `period` while
    /// `running` stays true.
    pub fn spawn<F>(name: &str, period: Duration, running: Arc<AtomicBool>, mut task: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        if period.is_zero() {
            return Err(MargaError::Config(format!("{}: period must be non-zero", name)));
        }
        running.store(true, Ordering::SeqCst);

        let thread_name = name.to_string();
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                log::info!("{} thread started ({}ms period)", thread_name, period.as_millis());
                let ticker = crossbeam_channel::tick(period);
                let overrun_limit = period.mul_f64(1.5);
                let mut overruns = LogThrottle::new(Duration::from_secs(1));
                let mut last_start: Option<Instant> = None;

                while flag.load(Ordering::Relaxed) {
                    if ticker.recv().is_err() {
                        break;
                    }
                    if !flag.load(Ordering::Relaxed) {
                        break;
                    }

                    let start = Instant::now();
                    if let Some(last) = last_start {
                        let gap = start.duration_since(last);
                        if gap > overrun_limit
                            && let Some(suppressed) = overruns.ready()
                        {
                            log::warn!(
                                "{}: tick overrun, {:?} since last tick (period {:?}, {} more suppressed)",
                                thread_name,
                                gap,
                                period,
                                suppressed
                            );
                        }
                    }
                    last_start = Some(start);

                    task();
                }
                log::info!("{} thread stopped", thread_name);
            })
            .map_err(|e| MargaError::Thread(format!("Failed to spawn {}: {}", name, e)))?;

        Ok(Self {
            name: name.to_string(),
            running,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::Relaxed)
    }

    /// Signal the thread and wait for it to exit. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("{} thread panicked", self.name);
        }
    }
}

impl Drop for PeriodicThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run the odometer on its own thread.
pub fn spawn_odometer(mut odometer: Odometer, period: Duration) -> Result<PeriodicThread> {
    let mut errors = LogThrottle::new(Duration::from_secs(1));
    PeriodicThread::spawn(
        "odometer",
        period,
        Arc::new(AtomicBool::new(true)),
        move || {
            if let Err(e) = odometer.tick()
                && let Some(suppressed) = errors.ready()
            {
                log::warn!("Odometer read failed: {} ({} suppressed)", e, suppressed);
            }
        },
    )
}

/// Run the drift corrector on its own thread.
///
/// Correction stays off until switched on through
/// [`DriftCorrector::switch`], which must be taken before calling this.
pub fn spawn_corrector(mut corrector: DriftCorrector, period: Duration) -> Result<PeriodicThread> {
    let mut errors = LogThrottle::new(Duration::from_secs(1));
    let mut skips = LogThrottle::new(Duration::from_secs(1));
    PeriodicThread::spawn(
        "drift-corrector",
        period,
        Arc::new(AtomicBool::new(true)),
        move || match corrector.tick() {
            Ok(CorrectionOutcome::Corrected { axis, delta }) => {
                log::info!("Drift correction on {:?}: {:+.2} cm", axis, delta);
            }
            Ok(CorrectionOutcome::Skipped(reason)) => {
                if let Some(suppressed) = skips.ready() {
                    log::debug!("Correction skipped: {:?} ({} suppressed)", reason, suppressed);
                }
            }
            Ok(_) => {}
            Err(e) => {
                if let Some(suppressed) = errors.ready() {
                    log::warn!("Line sensor read failed: {} ({} suppressed)", e, suppressed);
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_periodic_thread_runs_and_stops() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let mut thread = PeriodicThread::spawn(
            "test-periodic",
            Duration::from_millis(5),
            Arc::new(AtomicBool::new(false)),
            move || {
                counter.fetch_add(1, Ordering::Relaxed);
            },
        )
        .unwrap();
        assert!(thread.is_running());

        thread::sleep(Duration::from_millis(100));
        thread.stop();
        let after_stop = count.load(Ordering::Relaxed);
        assert!(after_stop >= 5, "only {} ticks", after_stop);
        assert!(!thread.is_running());

        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::Relaxed), after_stop);
        // Idempotent
        thread.stop();
    }

    #[test]
    fn test_zero_period_rejected() {
        let result = PeriodicThread::spawn(
            "test-zero",
            Duration::ZERO,
            Arc::new(AtomicBool::new(true)),
            || {},
        );
        assert!(matches!(result, Err(MargaError::Config(_))));
    }

    #[test]
    fn test_log_throttle_counts_suppressed() {
        let mut throttle = LogThrottle::new(Duration::from_secs(60));
        assert_eq!(throttle.ready(), Some(0));
        assert_eq!(throttle.ready(), None);
        assert_eq!(throttle.ready(), None);
        let mut immediate = LogThrottle::new(Duration::ZERO);
        assert_eq!(immediate.ready(), Some(0));
        assert_eq!(immediate.ready(), Some(0));
    }
}
