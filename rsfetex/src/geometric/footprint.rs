//! Border removal on an image's valid-data footprint
//!
//! Scene edges of orthorectified tiles carry resampling artifacts. The
//! footprint (nonzero pixels of band 1) is shrunk by a buffer distance
//! and everything outside it is set to 0.

use anyhow::{Context, Result};
use ndarray::{s, Array2, ArrayView2, Axis};
use std::path::Path;

use crate::io::{read_image_cube, write_u16_tiff};

/// Default inward buffer, in ground units of the image CRS (degrees for EPSG:4326)
pub const DEFAULT_BORDER_DISTANCE: f64 = 0.00002;

/// Offsets of the cells within `radius` of the center (Euclidean)
pub fn disk_offsets(radius: usize) -> Vec<(isize, isize)> {
    let r = radius as isize;
    let mut offsets = Vec::new();
    for dr in -r..=r {
        for dc in -r..=r {
            if dr * dr + dc * dc <= r * r {
                offsets.push((dr, dc));
            }
        }
    }
    offsets
}

/// Cells holding data: every value other than 0
pub fn footprint(band: ArrayView2<'_, f64>) -> Array2<bool> {
    band.mapv(|v| v != 0.0)
}

/// Binary erosion by a disk. Cells beyond the array edge count as outside.
pub fn erode_disk(mask: ArrayView2<'_, bool>, radius: usize) -> Array2<bool> {
    if radius == 0 {
        return mask.to_owned();
    }
    let (rows, cols) = mask.dim();
    let offsets = disk_offsets(radius);
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        if !mask[[r, c]] {
            return false;
        }
        offsets.iter().all(|&(dr, dc)| {
            let nr = r as isize + dr;
            let nc = c as isize + dc;
            nr >= 0
                && nc >= 0
                && (nr as usize) < rows
                && (nc as usize) < cols
                && mask[[nr as usize, nc as usize]]
        })
    })
}

/// Buffer distance expressed in whole pixels, rounded to the nearest one
pub fn distance_in_pixels(distance: f64, pixel_size: f64) -> Result<usize> {
    if !distance.is_finite() || distance < 0.0 {
        anyhow::bail!("Border distance must be a non-negative number, got {}", distance);
    }
    if !pixel_size.is_finite() || pixel_size <= 0.0 {
        anyhow::bail!("Pixel size must be positive, got {}", pixel_size);
    }
    Ok((distance / pixel_size).round() as usize)
}

/// Keep `band` inside its footprint eroded by `radius` pixels, as uint16
pub fn remove_borders_array(band: ArrayView2<'_, f64>, radius: usize) -> Array2<u16> {
    let kept = erode_disk(footprint(band).view(), radius);
    ndarray::Zip::from(band)
        .and(&kept)
        .map_collect(|&v, &inside| if inside { v as u16 } else { 0 })
}

/// Like [`remove_borders_array`], cropped to the bounding box of the
/// eroded footprint. Returns the crop and the (row, col) of its upper-left
/// pixel, or `None` when nothing survives the erosion.
pub fn crop_to_footprint(
    band: ArrayView2<'_, f64>,
    radius: usize,
) -> Option<(Array2<u16>, (usize, usize))> {
    let kept = erode_disk(footprint(band).view(), radius);
    let (mut r0, mut c0, mut r1, mut c1) = (usize::MAX, usize::MAX, 0, 0);
    for ((r, c), &inside) in kept.indexed_iter() {
        if inside {
            r0 = r0.min(r);
            c0 = c0.min(c);
            r1 = r1.max(r);
            c1 = c1.max(c);
        }
    }
    if r0 == usize::MAX {
        return None;
    }
    let cropped = ndarray::Zip::from(band.slice(s![r0..=r1, c0..=c1]))
        .and(kept.slice(s![r0..=r1, c0..=c1]))
        .map_collect(|&v, &inside| if inside { v as u16 } else { 0 });
    Some((cropped, (r0, c0)))
}

/// Read band 1 of `input_path`, remove a `distance` wide border from its
/// footprint and write the part inside the remaining footprint's bounding
/// box to `save_path` as uint16 with nodata 0.
pub fn remove_borders<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    save_path: Q,
    distance: f64,
) -> Result<()> {
    let input_path = input_path.as_ref();
    let raster = read_image_cube(input_path)?;
    let pixel_size = raster.transform.map_or(1.0, |gt| gt.pixel_width().abs());
    let radius = distance_in_pixels(distance, pixel_size)
        .with_context(|| format!("Invalid border distance for {:?}", input_path))?;
    let largest_side = raster.height().max(raster.width());
    if radius > largest_side {
        anyhow::bail!(
            "Border of {} pixels exceeds the {}x{} raster {:?}; check the distance units",
            radius,
            raster.width(),
            raster.height(),
            input_path
        );
    }
    tracing::info!(
        "Removing a {} pixel border from {:?}",
        radius,
        input_path
    );

    let band = raster.data.index_axis(Axis(2), 0);
    let (cleaned, (row, col)) = crop_to_footprint(band, radius)
        .with_context(|| format!("No footprint of {:?} is left after removing the border", input_path))?;
    let transform = raster.transform.map(|gt| gt.window(row, col));
    write_u16_tiff(&cleaned, transform, save_path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_disk_offsets() {
        assert_eq!(disk_offsets(0), vec![(0, 0)]);
        assert_eq!(disk_offsets(1).len(), 5);
        // radius 2: 5x5 square minus its four corners
        assert_eq!(disk_offsets(2).len(), 21);
    }

    #[test]
    fn test_erode_disk_shrinks_block() {
        let mask = Array2::from_elem((5, 5), true);
        let eroded = erode_disk(mask.view(), 1);
        assert_eq!(eroded.iter().filter(|&&v| v).count(), 9);
        assert!(eroded[[2, 2]]);
        assert!(!eroded[[0, 2]]);
        assert_eq!(erode_disk(mask.view(), 0), mask);
    }

    #[test]
    fn test_remove_borders_array() {
        let band = array![
            [0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 9.0, 9.0, 9.0, 0.0],
            [0.0, 9.0, 7.5, 9.0, 0.0],
            [0.0, 9.0, 9.0, 9.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 0.0],
        ];
        let cleaned = remove_borders_array(band.view(), 1);
        assert_eq!(cleaned[[2, 2]], 7);
        assert_eq!(cleaned.iter().filter(|&&v| v != 0).count(), 1);
    }

    #[test]
    fn test_crop_to_footprint() {
        let band = Array2::from_shape_fn((7, 6), |(r, c)| {
            if (1..6).contains(&r) && (1..4).contains(&c) {
                (10 * r + c) as f64
            } else {
                0.0
            }
        });
        let (cropped, origin) = crop_to_footprint(band.view(), 1).unwrap();
        assert_eq!(origin, (2, 2));
        assert_eq!(cropped.dim(), (3, 1));
        assert_eq!(cropped[[0, 0]], 22);
        assert!(crop_to_footprint(band.view(), 2).is_none());
    }

    #[test]
    fn test_distance_in_pixels() {
        assert_eq!(distance_in_pixels(0.00002, 0.00001).unwrap(), 2);
        assert_eq!(distance_in_pixels(1.4, 1.0).unwrap(), 1);
        assert_eq!(distance_in_pixels(0.0, 1.0).unwrap(), 0);
        assert!(distance_in_pixels(-1.0, 1.0).is_err());
        assert!(distance_in_pixels(1.0, 0.0).is_err());
    }

    #[cfg(any(feature = "tiff", feature = "gdal"))]
    #[test]
    fn test_remove_borders_file() {
        use crate::geo_core::GeoTransform;
        use crate::io::{read_image_cube, write_u16_tiff};

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.tif");
        let output = dir.path().join("out").join("clean.tif");
        let band = Array2::from_shape_fn((6, 6), |(r, c)| (1 + r * 6 + c) as u16);
        let gt = GeoTransform::north_up(-72.4, 18.6, 0.00001, 0.00001);
        write_u16_tiff(&band, Some(gt), &input).unwrap();

        remove_borders(&input, &output, 0.00001).unwrap();
        let cleaned = read_image_cube(&output).unwrap();
        // the 6x6 footprint shrinks to its inner 4x4 block
        assert_eq!(cleaned.data.dim(), (4, 4, 1));
        assert_eq!(cleaned.transform, Some(gt.window(1, 1)));
        assert_eq!(cleaned.data[[0, 0, 0]], band[[1, 1]] as f64);
        assert_eq!(cleaned.data[[1, 2, 0]], band[[2, 3]] as f64);
        assert_eq!(cleaned.data.iter().filter(|&&v| v != 0.0).count(), 16);
    }

    #[cfg(any(feature = "tiff", feature = "gdal"))]
    #[test]
    fn test_remove_borders_rejects_oversized_distance() {
        use crate::geo_core::GeoTransform;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.tif");
        let band = Array2::from_elem((5, 5), 3u16);
        // metres given for a grid in degrees
        let gt = GeoTransform::north_up(-72.4, 18.6, 0.00001, 0.00001);
        write_u16_tiff(&band, Some(gt), &input).unwrap();

        let err = remove_borders(&input, dir.path().join("out.tif"), 2.0).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
        assert!(!dir.path().join("out.tif").exists());
    }
}
