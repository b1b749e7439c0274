//! Startup localization.
//!
//! Two one-shot state machines run back to back before navigation starts:
//! [`RangeLocalizer`] fixes the heading against the corner walls, then
//! [`LineLocalizer`] fixes x and y against the nearest grid intersection.
//! Both drive the motors themselves and must not overlap with the navigator.

pub mod line;
pub mod range;

pub use line::{LineLocalizer, LinePhase};
pub use range::{RangeFix, RangeLocalizer, RangePhase};
