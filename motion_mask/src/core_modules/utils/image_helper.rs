// File-level glue between the engine's grids and the `image` crate: decode any
// still image into a luma `Frame`, and write masks/difference images as
// single-channel PNGs.

use crate::core_modules::difference::DifferenceImage;
use crate::core_modules::frame::Frame;
use crate::core_modules::mask::BinaryMask;
use crate::error::Result;
use image::ImageEncoder;
use std::path::Path;

/// Decodes an image file and collapses it to grayscale with the same Rec. 601
/// weights as [`Frame::from_rgb`]. `to_luma8` would apply Rec. 709 instead.
pub fn load_frame(path: impl AsRef<Path>) -> Result<Frame> {
    let image = image::open(path)?.to_rgb8();
    Frame::from_rgb(image.width(), image.height(), image.as_raw())
}

pub fn save_mask(path: impl AsRef<Path>, mask: &BinaryMask) -> Result<()> {
    let dims = mask.dimensions();
    save_luma(path.as_ref(), dims.width, dims.height, mask.samples())
}

pub fn save_difference(path: impl AsRef<Path>, diff: &DifferenceImage) -> Result<()> {
    let dims = diff.dimensions();
    save_luma(path.as_ref(), dims.width, dims.height, diff.samples())
}

pub fn save_frame(path: impl AsRef<Path>, frame: &Frame) -> Result<()> {
    save_luma(path.as_ref(), frame.width(), frame.height(), frame.samples())
}

fn save_luma(path: &Path, width: u32, height: u32, buffer: &[u8]) -> Result<()> {
    let output = std::fs::File::create(path)?;
    let encoder = image::codecs::png::PngEncoder::new(output);

    encoder.write_image(buffer, width, height, image::ExtendedColorType::L8)?;

    Ok(())
}
