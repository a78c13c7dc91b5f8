// THEORY:
// The morphological cleaner is the optional last stage. Raw thresholded masks are
// speckled with sensor noise: isolated pixels whose intensity jittered past the
// cutoff. An opening (erosion followed by dilation) removes every foreground
// region too small to contain the structuring element while giving larger
// regions back their original outline.
//
// Key principles:
// 1.  **Explicit borders**: what lies beyond the grid edge is a `BorderPolicy`
//     value, never an accident of indexing. The default treats the outside as
//     background, so regions touching the edge erode from that side too.
// 2.  **Offsets, not kernels**: a structuring element is reduced once to the list
//     of `(dx, dy)` offsets of its true cells relative to its anchor. Erosion asks
//     "are all of them foreground", dilation asks "is any of them foreground".
// 3.  **Pure**: the input mask is only read. Each pass builds a fresh mask.

use crate::core_modules::grid::Dimensions;
use crate::core_modules::mask::{BinaryMask, to_sample};
use crate::error::{MotionError, Result};
use std::ops::Range;

pub type Offset = (i64, i64);

/// How erosion and dilation treat neighbours that fall outside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderPolicy {
    /// Out-of-bounds neighbours are background (0). Edge pixels erode.
    #[default]
    Background,
    /// Out-of-bounds neighbours are skipped, as if the element were clipped
    /// to the grid. Edge-touching regions keep their edge pixels.
    Ignore,
}

impl BorderPolicy {
    /// Value an off-grid neighbour contributes to an erosion test.
    fn erosion_outside(self) -> bool {
        match self {
            BorderPolicy::Background => false,
            BorderPolicy::Ignore => true,
        }
    }
}

/// An odd-sized boolean neighbourhood anchored at its centre cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    width: u32,
    height: u32,
    cells: Vec<bool>,
    offsets: Vec<Offset>,
}

impl StructuringElement {
    /// A `size` x `size` element with every cell set.
    pub fn square(size: u32) -> Result<Self> {
        let cells = vec![true; size as usize * size as usize];
        Self::from_cells(size, size, cells)
    }

    /// A `size` x `size` element with only the centre row and column set.
    pub fn cross(size: u32) -> Result<Self> {
        let centre = size / 2;
        let cells = (0..size)
            .flat_map(|y| (0..size).map(move |x| x == centre || y == centre))
            .collect();
        Self::from_cells(size, size, cells)
    }

    /// An element from row-major cells. Both sides must be odd and at least one
    /// cell must be set.
    pub fn from_cells(width: u32, height: u32, cells: Vec<bool>) -> Result<Self> {
        if width % 2 == 0 || height % 2 == 0 {
            return Err(MotionError::InvalidStructuringElement(
                "width and height must be odd so the element has a centre",
            ));
        }
        if cells.len() != width as usize * height as usize {
            return Err(MotionError::InvalidStructuringElement(
                "cell count does not match width * height",
            ));
        }

        let (anchor_x, anchor_y) = ((width / 2) as i64, (height / 2) as i64);
        let offsets: Vec<Offset> = Dimensions::new(width, height)
            .coordinates(0..height as usize)
            .zip(&cells)
            .filter(|&(_, &set)| set)
            .map(|((x, y), _)| (x - anchor_x, y - anchor_y))
            .collect();

        if offsets.is_empty() {
            return Err(MotionError::InvalidStructuringElement("no cell is set"));
        }

        Ok(Self {
            width,
            height,
            cells,
            offsets,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    /// Anchor-relative offsets of the set cells.
    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }
}

impl Default for StructuringElement {
    /// The 3x3 all-true square.
    fn default() -> Self {
        Self {
            width: 3,
            height: 3,
            cells: vec![true; 9],
            offsets: (-1..=1).flat_map(|dy| (-1..=1).map(move |dx| (dx, dy))).collect(),
        }
    }
}

/// A pixel survives only if every neighbour under the element is foreground.
pub fn erode(mask: &BinaryMask, element: &StructuringElement, border: BorderPolicy) -> BinaryMask {
    let samples = erode_rows(mask, element, border, all_rows(mask));
    BinaryMask::from_samples(mask.dimensions(), samples)
}

/// A pixel becomes foreground if any neighbour under the element is foreground.
/// Off-grid neighbours never contribute, whatever the border policy.
pub fn dilate(mask: &BinaryMask, element: &StructuringElement) -> BinaryMask {
    let samples = dilate_rows(mask, element, all_rows(mask));
    BinaryMask::from_samples(mask.dimensions(), samples)
}

/// Opening with the default (background) border policy.
pub fn apply_opening(mask: &BinaryMask, element: &StructuringElement) -> BinaryMask {
    open_with_border(mask, element, BorderPolicy::default())
}

pub fn open_with_border(mask: &BinaryMask, element: &StructuringElement, border: BorderPolicy) -> BinaryMask {
    let eroded = erode(mask, element, border);
    dilate(&eroded, element)
}

fn all_rows(mask: &BinaryMask) -> Range<usize> {
    0..mask.dimensions().height as usize
}

pub(crate) fn erode_rows(
    mask: &BinaryMask,
    element: &StructuringElement,
    border: BorderPolicy,
    rows: Range<usize>,
) -> Vec<u8> {
    let outside = border.erosion_outside();
    mask.dimensions()
        .coordinates(rows)
        .map(|(x, y)| {
            let fits = element
                .offsets()
                .iter()
                .all(|&(dx, dy)| mask.foreground_at(x + dx, y + dy).unwrap_or(outside));
            to_sample(fits)
        })
        .collect()
}

// The element is reflected through its anchor so that an opening is the union of
// every placement that fit inside the mask. For symmetric elements this is the
// same neighbourhood erosion uses.
pub(crate) fn dilate_rows(mask: &BinaryMask, element: &StructuringElement, rows: Range<usize>) -> Vec<u8> {
    mask.dimensions()
        .coordinates(rows)
        .map(|(x, y)| {
            let hit = element
                .offsets()
                .iter()
                .any(|&(dx, dy)| mask.foreground_at(x - dx, y - dy).unwrap_or(false));
            to_sample(hit)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn block(width: u32, height: u32, xs: Range<u32>, ys: Range<u32>) -> BinaryMask {
        BinaryMask::from_fn(width, height, |x, y| xs.contains(&x) && ys.contains(&y))
    }

    fn random_mask(rng: &mut StdRng, width: u32, height: u32, density: f64) -> BinaryMask {
        BinaryMask::from_fn(width, height, |_, _| rng.gen_bool(density))
    }

    #[test]
    fn default_element_is_full_three_by_three() {
        let element = StructuringElement::default();
        assert_eq!(element, StructuringElement::square(3).expect("odd size"));
        assert_eq!(element.offsets().len(), 9);
        assert!(element.offsets().contains(&(-1, -1)));
        assert!(element.offsets().contains(&(1, 1)));
    }

    #[test]
    fn cross_has_five_cells() {
        let cross = StructuringElement::cross(3).expect("odd size");
        assert_eq!(cross.cells(), &[false, true, false, true, true, true, false, true, false]);
        assert_eq!(cross.offsets(), &[(0, -1), (-1, 0), (0, 0), (1, 0), (0, 1)]);
    }

    #[test]
    fn rejects_malformed_elements() {
        assert!(matches!(
            StructuringElement::square(2),
            Err(MotionError::InvalidStructuringElement(_))
        ));
        assert!(matches!(
            StructuringElement::from_cells(3, 3, vec![false; 9]),
            Err(MotionError::InvalidStructuringElement(_))
        ));
        assert!(matches!(
            StructuringElement::from_cells(3, 1, vec![true; 2]),
            Err(MotionError::InvalidStructuringElement(_))
        ));
    }

    #[test]
    fn isolated_pixel_is_removed() {
        let mask = block(5, 5, 2..3, 2..3);
        let opened = apply_opening(&mask, &StructuringElement::default());
        assert!(opened.is_empty());
    }

    #[test]
    fn large_block_survives_unchanged() {
        let mask = block(10, 10, 2..7, 2..7);
        let element = StructuringElement::default();

        let eroded = erode(&mask, &element, BorderPolicy::Background);
        assert_eq!(eroded, block(10, 10, 3..6, 3..6));

        let opened = apply_opening(&mask, &element);
        assert_eq!(opened, mask);
    }

    #[test]
    fn dilation_grows_by_one_ring() {
        let mask = block(7, 7, 3..4, 3..4);
        let dilated = dilate(&mask, &StructuringElement::default());
        assert_eq!(dilated, block(7, 7, 2..5, 2..5));
    }

    #[test]
    fn all_zero_stays_zero() {
        let mask = BinaryMask::from_fn(6, 4, |_, _| false);
        let opened = apply_opening(&mask, &StructuringElement::default());
        assert!(opened.is_empty());
    }

    #[test]
    fn all_foreground_erodes_at_border_then_recovers() {
        let mask = BinaryMask::from_fn(10, 10, |_, _| true);
        let element = StructuringElement::default();

        let eroded = erode(&mask, &element, BorderPolicy::Background);
        assert_eq!(eroded, block(10, 10, 1..9, 1..9));

        let opened = apply_opening(&mask, &element);
        assert_eq!(opened, mask);
    }

    #[test]
    fn thin_edge_strip_depends_on_border_policy() {
        // Two columns hugging the left edge: too thin for a 3x3 element unless
        // the off-grid column is ignored.
        let strip = block(8, 8, 0..2, 0..8);
        let element = StructuringElement::default();

        let with_background = open_with_border(&strip, &element, BorderPolicy::Background);
        assert!(with_background.is_empty());

        let with_ignore = open_with_border(&strip, &element, BorderPolicy::Ignore);
        assert_eq!(with_ignore, strip);
    }

    #[test]
    fn ignore_policy_still_removes_isolated_noise() {
        let mask = block(5, 5, 0..1, 0..1);
        let opened = open_with_border(&mask, &StructuringElement::default(), BorderPolicy::Ignore);
        assert!(opened.is_empty());
    }

    #[test]
    fn opening_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(2024);
        let elements = [
            StructuringElement::default(),
            StructuringElement::cross(3).expect("odd size"),
            StructuringElement::from_cells(3, 1, vec![true, true, false]).expect("valid cells"),
        ];

        for _ in 0..24 {
            let mask = random_mask(&mut rng, 16, 12, 0.7);
            for element in &elements {
                for border in [BorderPolicy::Background, BorderPolicy::Ignore] {
                    let once = open_with_border(&mask, element, border);
                    let twice = open_with_border(&once, element, border);
                    assert_eq!(once, twice);
                    assert!(once.is_subset_of(&mask));
                }
            }
        }
    }

    #[test]
    fn opening_preserves_inclusion() {
        let mut rng = StdRng::seed_from_u64(99);
        let element = StructuringElement::default();

        for _ in 0..24 {
            let larger = random_mask(&mut rng, 14, 14, 0.75);
            let keep = random_mask(&mut rng, 14, 14, 0.8);
            let smaller = BinaryMask::from_fn(14, 14, |x, y| {
                larger.is_foreground(x, y) && keep.is_foreground(x, y)
            });
            assert!(smaller.is_subset_of(&larger));

            let opened_small = apply_opening(&smaller, &element);
            let opened_large = apply_opening(&larger, &element);
            assert!(opened_small.is_subset_of(&opened_large));
        }
    }

    #[test]
    fn banded_passes_match_whole_grid() {
        let mut rng = StdRng::seed_from_u64(5);
        let mask = random_mask(&mut rng, 9, 11, 0.6);
        let element = StructuringElement::default();

        let mut eroded = erode_rows(&mask, &element, BorderPolicy::Background, 0..4);
        eroded.extend(erode_rows(&mask, &element, BorderPolicy::Background, 4..11));
        assert_eq!(eroded, erode(&mask, &element, BorderPolicy::Background).samples());

        let mut dilated = dilate_rows(&mask, &element, 0..6);
        dilated.extend(dilate_rows(&mask, &element, 6..11));
        assert_eq!(dilated, dilate(&mask, &element).samples());
    }
}
