//! MargaNav - Pose estimation and motion control for the Marga grid robot
//!
//! A two-wheeled robot on a floor painted with a square grid of dark lines
//! keeps track of where it is by dead reckoning and corrects drift whenever
//! its line sensor crosses a grid line.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  orchestrator                       │  ← Mission phases
//! └─────────────────────────────────────────────────────┘
//!            │                │                 │
//! ┌──────────────────┐ ┌──────────────┐ ┌───────────────┐
//! │   localization   │ │  navigation  │ │  correction   │  ← Controllers
//! │  (range, line)   │ │ (controller, │ │ (line detect, │
//! │                  │ │  navigator)  │ │  drift snap)  │
//! └──────────────────┘ └──────────────┘ └───────────────┘
//!            │                │                 │
//! ┌─────────────────────────────────────────────────────┐
//! │        odometer  ──►  shared::SharedPose            │  ← Estimation
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                 marga_io traits                     │  ← Hardware
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Every periodic process runs on its own thread (see [`threads`]).

pub mod config;
pub mod correction;
pub mod error;
pub mod kinematics;
pub mod localization;
pub mod navigation;
pub mod odometer;
pub mod orchestrator;
pub mod shared;
pub mod threads;
pub mod utils;

// Re-export commonly used types
pub use config::MargaConfig;
pub use correction::{CorrectionOutcome, DriftCorrector, LineDetector};
pub use error::{MargaError, Result};
pub use kinematics::Kinematics;
pub use localization::{LineLocalizer, RangeFix, RangeLocalizer};
pub use navigation::{NavController, Navigator, Waypoint};
pub use odometer::Odometer;
pub use orchestrator::{Orchestrator, Phase};
pub use shared::{Pose, SharedPose};
