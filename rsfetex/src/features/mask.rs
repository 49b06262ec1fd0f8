//! Segment masks and bounding boxes derived from a label raster
//!
//! Every function here is pure: it borrows its inputs and returns a new
//! array (or a view) rather than masking in place.

use ndarray::{s, Array2, ArrayView2, ArrayView3, Zip};
use std::collections::BTreeMap;

/// Inclusive pixel bounding box of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

impl PixelBounds {
    fn at(row: usize, col: usize) -> Self {
        PixelBounds {
            min_row: row,
            max_row: row,
            min_col: col,
            max_col: col,
        }
    }

    fn include(&mut self, row: usize, col: usize) {
        self.min_row = self.min_row.min(row);
        self.max_row = self.max_row.max(row);
        self.min_col = self.min_col.min(col);
        self.max_col = self.max_col.max(col);
    }

    pub fn rows(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    pub fn cols(&self) -> usize {
        self.max_col - self.min_col + 1
    }
}

/// Full-raster mask of one segment plus its bounding box
#[derive(Debug, Clone)]
pub struct SegmentMask {
    pub id: i64,
    pub mask: Array2<bool>,
    pub bounds: PixelBounds,
}

impl SegmentMask {
    /// Mask restricted to the bounding box
    pub fn cropped(&self) -> Array2<bool> {
        crop_mask(self.mask.view(), &self.bounds)
    }
}

/// Build the mask of `id` over the whole label raster.
///
/// Returns `None` when no cell carries the identifier.
pub fn segment_mask(labels: ArrayView2<'_, i64>, id: i64) -> Option<SegmentMask> {
    let mask = labels.mapv(|v| v == id);
    let mut bounds: Option<PixelBounds> = None;
    for ((row, col), &inside) in mask.indexed_iter() {
        if inside {
            match bounds.as_mut() {
                Some(b) => b.include(row, col),
                None => bounds = Some(PixelBounds::at(row, col)),
            }
        }
    }
    bounds.map(|bounds| SegmentMask { id, mask, bounds })
}

pub fn crop_mask(mask: ArrayView2<'_, bool>, bounds: &PixelBounds) -> Array2<bool> {
    mask.slice(s![
        bounds.min_row..=bounds.max_row,
        bounds.min_col..=bounds.max_col
    ])
    .to_owned()
}

/// View of the image cube restricted to the bounding box (all bands)
pub fn crop_cube<'a>(cube: ArrayView3<'a, f64>, bounds: &PixelBounds) -> ArrayView3<'a, f64> {
    cube.slice_move(s![
        bounds.min_row..=bounds.max_row,
        bounds.min_col..=bounds.max_col,
        ..
    ])
}

/// Values of `band` where `mask` is true, skipping `nodata` when given.
pub fn masked_values(
    band: ArrayView2<'_, f64>,
    mask: ArrayView2<'_, bool>,
    nodata: Option<f64>,
) -> Vec<f64> {
    let mut values = Vec::new();
    Zip::from(band).and(mask).for_each(|&v, &inside| {
        if inside && nodata.map_or(true, |nd| v != nd) {
            values.push(v);
        }
    });
    values
}

/// Copy of `band` with every cell outside `mask` replaced by `fill`
pub fn fill_outside(band: ArrayView2<'_, f64>, mask: ArrayView2<'_, bool>, fill: f64) -> Array2<f64> {
    Zip::from(band)
        .and(mask)
        .map_collect(|&v, &inside| if inside { v } else { fill })
}

/// Bounding boxes of every identifier, computed in one pass.
///
/// Cropping the label raster to an identifier's bounds and comparing
/// against the identifier gives the same mask as [`segment_mask`]
/// followed by [`crop_mask`], without allocating a full-raster mask per
/// segment.
#[derive(Debug, Clone, Default)]
pub struct SegmentIndex {
    bounds: BTreeMap<i64, PixelBounds>,
}

impl SegmentIndex {
    pub fn build(labels: ArrayView2<'_, i64>) -> Self {
        let mut bounds: BTreeMap<i64, PixelBounds> = BTreeMap::new();
        for ((row, col), &id) in labels.indexed_iter() {
            bounds
                .entry(id)
                .and_modify(|b| b.include(row, col))
                .or_insert_with(|| PixelBounds::at(row, col));
        }
        SegmentIndex { bounds }
    }

    /// Distinct identifiers in ascending order
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.bounds.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn bounds(&self, id: i64) -> Option<PixelBounds> {
        self.bounds.get(&id).copied()
    }

    /// Cropped mask of `id`, or `None` for identifiers absent from the raster
    pub fn cropped_mask(
        &self,
        labels: ArrayView2<'_, i64>,
        id: i64,
    ) -> Option<(PixelBounds, Array2<bool>)> {
        let bounds = self.bounds(id)?;
        let window = labels.slice(s![
            bounds.min_row..=bounds.max_row,
            bounds.min_col..=bounds.max_col
        ]);
        Some((bounds, window.mapv(|v| v == id)))
    }
}
