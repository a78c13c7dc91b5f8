// THEORY:
// Every failure in the engine is a precondition violation detected before any
// output is produced. The pure stages have no transient failure modes, so
// nothing here is retryable; callers either fix their input or give up.

use crate::core_modules::grid::Dimensions;

pub type Result<T, E = MotionError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error("frame dimensions differ: start is {start}, end is {end}")]
    DimensionMismatch { start: Dimensions, end: Dimensions },
    #[error("threshold {0} is outside 0..=255")]
    InvalidThreshold(i64),
    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("sample buffer holds {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },
    #[error("invalid structuring element: {0}")]
    InvalidStructuringElement(&'static str),
    #[error("worker pool is no longer accepting bands")]
    WorkerUnavailable,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
