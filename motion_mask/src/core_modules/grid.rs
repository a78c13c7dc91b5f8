// THEORY:
// Every image type in the engine (frames, difference images, masks) is a flat,
// row-major buffer of bytes plus a `Dimensions` header. Keeping the geometry in
// one small `Copy` type means the stages only ever agree or disagree on a single
// value, and the row-band math used by the parallel pipeline lives in one place.

use std::fmt;
use std::ops::Range;

/// Width and height of a row-major grid, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Row-major index of an in-bounds coordinate.
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Row-major index of a signed coordinate, or `None` when it falls off the grid.
    pub fn checked_index(&self, x: i64, y: i64) -> Option<usize> {
        let inside = x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64;
        inside.then(|| y as usize * self.width as usize + x as usize)
    }

    /// Every coordinate of the given rows, in row-major order.
    pub(crate) fn coordinates(&self, rows: Range<usize>) -> impl Iterator<Item = (i64, i64)> + use<> {
        let width = self.width as i64;
        rows.flat_map(move |y| (0..width).map(move |x| (x, y as i64)))
    }

    /// Flat sample range covered by a band of rows.
    pub(crate) fn sample_range(&self, rows: &Range<usize>) -> Range<usize> {
        let width = self.width as usize;
        rows.start * width..rows.end * width
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Splits `0..height` into at most `bands` contiguous, non-empty row ranges.
/// Earlier bands absorb the remainder, so band sizes differ by at most one row.
pub(crate) fn row_bands(height: usize, bands: usize) -> Vec<Range<usize>> {
    if height == 0 {
        return Vec::new();
    }
    let bands = bands.clamp(1, height);
    let base = height / bands;
    let extra = height % bands;

    let mut start = 0;
    (0..bands)
        .map(|band| {
            let rows = base + usize::from(band < extra);
            let range = start..start + rows;
            start += rows;
            range
        })
        .collect()
}
