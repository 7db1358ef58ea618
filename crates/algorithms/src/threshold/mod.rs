//! Supervised threshold selection on a change magnitude
//!
//! - **lk**: the Lk agreement metric of a thresholded magnitude against
//!   two reference class maps
//! - **optimize**: coarse-to-fine search for the threshold maximizing Lk

mod lk;
mod optimize;

pub use lk::{compute_lk, LK_UNDEFINED};
pub use optimize::{optimize_threshold, SearchPass, ThresholdParams, ThresholdResult, ThresholdUpdate};
