// THEORY:
// This file is the entry point for the `motion_mask` library crate. It exposes a
// minimal two-frame motion detector: difference two grayscale frames, threshold
// the difference into a binary mask, and optionally clean the mask with a
// morphological opening.
//
// The stages live in `core_modules` as pure functions over immutable grids. The
// `pipeline` module is the high-level, synchronous interface; the
// `parallel_pipeline` module runs the same stages across a tokio worker pool.
// Video decoding, display and anything that remembers past frames are left to
// the caller.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use core_modules::difference::{DifferenceImage, compute_difference};
pub use core_modules::frame::Frame;
pub use core_modules::grid::Dimensions;
pub use core_modules::mask::BinaryMask;
pub use core_modules::morphology::{BorderPolicy, StructuringElement, apply_opening, dilate, erode, open_with_border};
pub use core_modules::threshold::{Threshold, apply_threshold};
pub use error::{MotionError, Result};
pub use parallel_pipeline::ParallelPipeline;
pub use pipeline::{MotionPipeline, MotionReport, PipelineConfig, detect_motion};
