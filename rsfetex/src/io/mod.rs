//! Raster input and output
//!
//! GeoTIFF files are decoded with the pure-Rust `tiff` backend by default.
//! When the `gdal` feature is enabled, GDAL takes over reading and writing
//! so that every raster format it supports can be used.

#[cfg(feature = "gdal")]
pub mod gdal_io;
#[cfg(feature = "tiff")]
pub mod tiff_io;

use anyhow::Result;
use ndarray::{Array2, Array3};
use serde::Serialize;
use std::path::Path;

use crate::geo_core::{BoundingBox, GeoTransform};

/// A raster read as rows × columns × bands
#[derive(Debug, Clone)]
pub struct RasterData {
    pub data: Array3<f64>,
    pub transform: Option<GeoTransform>,
}

impl RasterData {
    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn bands(&self) -> usize {
        self.data.dim().2
    }
}

/// Size and extent of a raster file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageMetadata {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    /// `[left, bottom, right, top]`; pixel space when the file has no georeferencing
    pub bounds: [f64; 4],
    pub transform: Option<GeoTransform>,
}

impl ImageMetadata {
    pub(crate) fn new(
        width: usize,
        height: usize,
        bands: usize,
        transform: Option<GeoTransform>,
    ) -> Self {
        let bounds = match transform {
            Some(gt) => gt.bounds(width, height),
            None => BoundingBox::new(0.0, 0.0, width as f64, height as f64),
        };
        ImageMetadata {
            width,
            height,
            bands,
            bounds: bounds.as_array(),
            transform,
        }
    }
}

/// Read every band of a raster into an image cube
pub fn read_image_cube<P: AsRef<Path>>(path: P) -> Result<RasterData> {
    let path = path.as_ref();
    tracing::debug!("Reading image cube {:?}", path);
    #[cfg(feature = "gdal")]
    return gdal_io::read_raster(path);
    #[cfg(all(feature = "tiff", not(feature = "gdal")))]
    return tiff_io::read_raster(path);
    #[cfg(not(any(feature = "tiff", feature = "gdal")))]
    anyhow::bail!("No raster backend enabled, cannot read {:?}", path)
}

/// Read band 1 of a raster as segment identifiers.
///
/// Values must be integral; fractional or non-finite cells are an error.
pub fn read_label_raster<P: AsRef<Path>>(path: P) -> Result<(Array2<i64>, Option<GeoTransform>)> {
    let path = path.as_ref();
    let raster = read_image_cube(path)?;
    let band = raster.data.index_axis(ndarray::Axis(2), 0);
    let mut labels = Array2::<i64>::zeros(band.dim());
    for ((r, c), &v) in band.indexed_iter() {
        if !v.is_finite() || v.fract() != 0.0 {
            anyhow::bail!(
                "Label raster {:?} holds a non-integer value {} at row {}, column {}",
                path,
                v,
                r,
                c
            );
        }
        labels[[r, c]] = v as i64;
    }
    Ok((labels, raster.transform))
}

/// Width, height, band count and bounds of a raster file
pub fn get_image_metadata<P: AsRef<Path>>(path: P) -> Result<ImageMetadata> {
    let path = path.as_ref();
    #[cfg(feature = "gdal")]
    return gdal_io::read_metadata(path);
    #[cfg(all(feature = "tiff", not(feature = "gdal")))]
    return tiff_io::read_metadata(path);
    #[cfg(not(any(feature = "tiff", feature = "gdal")))]
    anyhow::bail!("No raster backend enabled, cannot read {:?}", path)
}

/// Save a label raster as a single-band int16 GeoTIFF
pub fn export_label_tiff<P: AsRef<Path>>(
    labels: &Array2<i64>,
    transform: Option<GeoTransform>,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    let mut data = Vec::with_capacity(labels.len());
    for &v in labels.iter() {
        let v = i16::try_from(v)
            .map_err(|_| anyhow::anyhow!("Label {} does not fit in int16", v))?;
        data.push(v);
    }
    tracing::info!("Exporting labels to {:?}", path);
    let (height, width) = labels.dim();
    #[cfg(feature = "gdal")]
    return gdal_io::write_i16(path, &data, width, height, transform);
    #[cfg(all(feature = "tiff", not(feature = "gdal")))]
    return tiff_io::write_i16(path, &data, width, height, transform);
    #[cfg(not(any(feature = "tiff", feature = "gdal")))]
    anyhow::bail!("No raster backend enabled, cannot write {:?}", path)
}

/// Save a single band as uint16 GeoTIFF with 0 as nodata
pub fn write_u16_tiff<P: AsRef<Path>>(
    band: &Array2<u16>,
    transform: Option<GeoTransform>,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    let (height, width) = band.dim();
    let data: Vec<u16> = band.iter().copied().collect();
    #[cfg(feature = "gdal")]
    return gdal_io::write_u16(path, &data, width, height, transform);
    #[cfg(all(feature = "tiff", not(feature = "gdal")))]
    return tiff_io::write_u16(path, &data, width, height, transform);
    #[cfg(not(any(feature = "tiff", feature = "gdal")))]
    anyhow::bail!("No raster backend enabled, cannot write {:?}", path)
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    use anyhow::Context;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }
    Ok(())
}
