//! Image utilities outside the tracking core
//!
//! - `warp_correct`: replace out-of-bounds markers in warp images with NaN

pub mod warp_correct;

pub use warp_correct::{correct_warp, correct_warp_file, parse_marker, WarpCorrection};
