//! Feature table assembly: the per-segment extraction loop

use ndarray::{ArrayView2, ArrayView3, Axis};

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "rayon")]
use std::sync::atomic::{AtomicUsize, Ordering};

use super::mask::{crop_cube, fill_outside, masked_values, SegmentIndex};
use super::progress::ProgressReporter;
use super::radiometric::radiometric_features;
use super::shape::shape_features;
use super::table::{BandFeatures, FeatureRow, FeatureTable};
use super::texture::texture_features;
use crate::config::{ExtractionConfig, TextureBackground};
use crate::error::{Error, Result};

/// Extract one feature row per segment of `labels`.
///
/// Every distinct identifier of the label raster is visited once in
/// ascending order, except the configured background label. Segments
/// with no usable pixel in some band are dropped from the table.
///
/// `cube` is shaped rows × columns × bands and must share the raster's
/// row and column extent.
pub fn extract_features(
    labels: ArrayView2<'_, i64>,
    cube: ArrayView3<'_, f64>,
    config: &ExtractionConfig,
    progress: &dyn ProgressReporter,
) -> Result<FeatureTable> {
    check_inputs(labels, cube, config)?;
    let index = SegmentIndex::build(labels);
    let ids: Vec<i64> = index
        .ids()
        .filter(|&id| Some(id) != config.background_label)
        .collect();
    Ok(run(labels, cube, &index, &ids, config, progress))
}

/// Same as [`extract_features`] for an explicit list of identifiers.
///
/// The list is sorted and deduplicated first. Identifiers absent from
/// the raster are skipped without error.
pub fn extract_features_for_ids(
    labels: ArrayView2<'_, i64>,
    cube: ArrayView3<'_, f64>,
    ids: &[i64],
    config: &ExtractionConfig,
    progress: &dyn ProgressReporter,
) -> Result<FeatureTable> {
    check_inputs(labels, cube, config)?;
    let index = SegmentIndex::build(labels);
    let mut ids: Vec<i64> = ids
        .iter()
        .copied()
        .filter(|&id| Some(id) != config.background_label)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(run(labels, cube, &index, &ids, config, progress))
}

fn check_inputs(
    labels: ArrayView2<'_, i64>,
    cube: ArrayView3<'_, f64>,
    config: &ExtractionConfig,
) -> Result<()> {
    config.validate()?;
    let (lr, lc) = labels.dim();
    let (ir, ic, n_bands) = cube.dim();
    if (lr, lc) != (ir, ic) {
        return Err(Error::SizeMismatch { lr, lc, ir, ic });
    }
    if n_bands == 0 {
        return Err(Error::NoBands);
    }
    Ok(())
}

fn run(
    labels: ArrayView2<'_, i64>,
    cube: ArrayView3<'_, f64>,
    index: &SegmentIndex,
    ids: &[i64],
    config: &ExtractionConfig,
    progress: &dyn ProgressReporter,
) -> FeatureTable {
    let total = ids.len();
    progress.start(total);

    let rows: Vec<Option<FeatureRow>> = if config.parallel {
        evaluate_parallel(labels, cube, index, ids, config, progress)
    } else {
        ids.iter()
            .enumerate()
            .map(|(k, &id)| {
                let row = evaluate_segment(labels, cube, index, id, config);
                progress.advance(k + 1, total, id);
                row
            })
            .collect()
    };
    progress.finish();

    let mut table = FeatureTable::new(cube.len_of(Axis(2)));
    for (&id, row) in ids.iter().zip(rows) {
        match row {
            Some(row) => {
                if row.shape.is_degenerate() {
                    tracing::warn!(
                        "Segment {} has a zero perimeter, compactness index is undefined",
                        id
                    );
                }
                table.push(row);
            }
            None => tracing::debug!("Segment {} dropped: no usable pixels", id),
        }
    }
    tracing::info!(
        "{} of {} segments kept, {} degenerate",
        table.len(),
        total,
        table.degenerate_ids().len()
    );
    table
}

#[cfg(feature = "rayon")]
fn evaluate_parallel(
    labels: ArrayView2<'_, i64>,
    cube: ArrayView3<'_, f64>,
    index: &SegmentIndex,
    ids: &[i64],
    config: &ExtractionConfig,
    progress: &dyn ProgressReporter,
) -> Vec<Option<FeatureRow>> {
    let total = ids.len();
    let processed = AtomicUsize::new(0);
    // par_iter over a slice is indexed, so collect keeps the input order
    ids.par_iter()
        .map(|&id| {
            let row = evaluate_segment(labels, cube, index, id, config);
            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            progress.advance(done, total, id);
            row
        })
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn evaluate_parallel(
    labels: ArrayView2<'_, i64>,
    cube: ArrayView3<'_, f64>,
    index: &SegmentIndex,
    ids: &[i64],
    config: &ExtractionConfig,
    progress: &dyn ProgressReporter,
) -> Vec<Option<FeatureRow>> {
    tracing::warn!("Built without the rayon feature, extracting sequentially");
    let total = ids.len();
    ids.iter()
        .enumerate()
        .map(|(k, &id)| {
            let row = evaluate_segment(labels, cube, index, id, config);
            progress.advance(k + 1, total, id);
            row
        })
        .collect()
}

/// Features of a single segment, `None` when it must be dropped.
fn evaluate_segment(
    labels: ArrayView2<'_, i64>,
    cube: ArrayView3<'_, f64>,
    index: &SegmentIndex,
    id: i64,
    config: &ExtractionConfig,
) -> Option<FeatureRow> {
    let (bounds, mask) = index.cropped_mask(labels, id)?;
    if !mask.iter().any(|&inside| inside) {
        return None;
    }
    let rect = crop_cube(cube, &bounds);
    let shape = shape_features(mask.view(), config.pixel_size);

    let mut bands = Vec::with_capacity(rect.len_of(Axis(2)));
    for band in rect.axis_iter(Axis(2)) {
        let values = masked_values(band, mask.view(), config.nodata);
        let radiometric = radiometric_features(&values)?;
        let texture = match config.texture.background {
            TextureBackground::Raw => texture_features(band, &config.texture, config.nodata),
            TextureBackground::Zeroed => {
                let zeroed = fill_outside(band, mask.view(), 0.0);
                texture_features(zeroed.view(), &config.texture, config.nodata)
            }
        };
        bands.push(BandFeatures {
            radiometric,
            texture,
        });
    }

    Some(FeatureRow { id, shape, bands })
}
