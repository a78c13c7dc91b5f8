// THEORY:
// A `Frame` is the engine's input: one grayscale snapshot of the scene. It is a
// "dumb" data container that only knows its geometry and its intensity samples.
// It never compares itself to other frames; that is the differencer's job.
//
// Key principles:
// 1.  **Validated at birth**: every constructor rejects empty grids and buffers
//     whose length disagrees with the dimensions, so downstream stages never
//     have to re-check a frame's shape against its own data.
// 2.  **Immutable**: there is no mutable access to the samples. Stages borrow
//     frames and build fresh outputs, so a frame can be shared across worker
//     threads without locking.
// 3.  **Color is collapsed early**: RGB/RGBA sources are reduced to a single
//     Rec. 601 luma channel on construction. Everything after this point is
//     single-channel.

use crate::core_modules::grid::Dimensions;
use crate::error::{MotionError, Result};
use image::GrayImage;

pub type Intensity = u8;
pub type Luminance = f64;

const RGB_CHANNELS: usize = 3;
const RGBA_CHANNELS: usize = 4;

/// An immutable single-channel 8-bit image, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    dimensions: Dimensions,
    samples: Vec<Intensity>,
}

impl Frame {
    /// Wraps a buffer of `width * height` luma samples.
    pub fn new(width: u32, height: u32, samples: Vec<Intensity>) -> Result<Self> {
        let dimensions = Self::validate(width, height)?;
        if samples.len() != dimensions.len() {
            return Err(MotionError::BufferSizeMismatch {
                expected: dimensions.len(),
                actual: samples.len(),
            });
        }
        Ok(Self { dimensions, samples })
    }

    /// A frame where every pixel has the same intensity.
    pub fn filled(width: u32, height: u32, value: Intensity) -> Result<Self> {
        let dimensions = Self::validate(width, height)?;
        Ok(Self {
            dimensions,
            samples: vec![value; dimensions.len()],
        })
    }

    /// Copies the samples out of an `image` luma buffer.
    pub fn from_luma_image(image: &GrayImage) -> Result<Self> {
        Self::new(image.width(), image.height(), image.as_raw().clone())
    }

    /// Converts an interleaved RGBA buffer to luma. Alpha is ignored.
    pub fn from_rgba(width: u32, height: u32, buffer: &[u8]) -> Result<Self> {
        Self::from_interleaved(width, height, buffer, RGBA_CHANNELS)
    }

    /// Converts an interleaved RGB buffer to luma.
    pub fn from_rgb(width: u32, height: u32, buffer: &[u8]) -> Result<Self> {
        Self::from_interleaved(width, height, buffer, RGB_CHANNELS)
    }

    fn from_interleaved(width: u32, height: u32, buffer: &[u8], channels: usize) -> Result<Self> {
        let dimensions = Self::validate(width, height)?;
        let expected = dimensions.len() * channels;
        if buffer.len() != expected {
            return Err(MotionError::BufferSizeMismatch {
                expected,
                actual: buffer.len(),
            });
        }

        let samples = buffer
            .chunks_exact(channels)
            .map(|pixel| luma(pixel[0], pixel[1], pixel[2]))
            .collect();

        Ok(Self { dimensions, samples })
    }

    fn validate(width: u32, height: u32) -> Result<Dimensions> {
        let dimensions = Dimensions::new(width, height);
        if dimensions.is_empty() {
            return Err(MotionError::EmptyFrame { width, height });
        }
        Ok(dimensions)
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    pub fn samples(&self) -> &[Intensity] {
        &self.samples
    }

    /// Intensity at `(x, y)`, or `None` outside the frame.
    pub fn get(&self, x: u32, y: u32) -> Option<Intensity> {
        self.dimensions
            .checked_index(x as i64, y as i64)
            .map(|index| self.samples[index])
    }

    /// Copies the frame into an `image` luma buffer.
    pub fn to_luma_image(&self) -> GrayImage {
        // Dimensions and buffer length were checked on construction.
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            image::Luma([self.samples[self.dimensions.index(x, y)]])
        })
    }
}

/// Rec. 601 luma of one RGB triple, rounded to the nearest intensity.
pub fn luma(red: u8, green: u8, blue: u8) -> Intensity {
    let luminance: Luminance =
        0.299_f64 * red as f64 + 0.587_f64 * green as f64 + 0.114_f64 * blue as f64;
    luminance.round().clamp(0.0, 255.0) as Intensity
}
