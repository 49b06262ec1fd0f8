//! GDAL-backed raster I/O, enabled by the `gdal` feature

use anyhow::{Context, Result};
use gdal::raster::{Buffer, GdalType};
use gdal::{Dataset, DriverManager};
use ndarray::Array3;
use std::path::Path;

use super::{ensure_parent_dir, ImageMetadata, RasterData};
use crate::geo_core::GeoTransform;

fn geo_transform(dataset: &Dataset) -> Option<GeoTransform> {
    dataset.geo_transform().ok().map(GeoTransform)
}

pub fn read_raster(path: &Path) -> Result<RasterData> {
    let dataset = Dataset::open(path).with_context(|| format!("Failed to open raster {:?}", path))?;
    let (width, height) = dataset.raster_size();
    let bands = dataset.raster_count();
    if bands == 0 {
        anyhow::bail!("Raster {:?} has no bands", path);
    }

    let mut data = Array3::<f64>::zeros((height, width, bands));
    for b in 0..bands {
        let band = dataset
            .rasterband(b + 1)
            .with_context(|| format!("Failed to get band {}", b + 1))?;
        let buffer = band
            .read_as::<f64>((0, 0), (width, height), (width, height), None)
            .with_context(|| format!("Failed to read band {}", b + 1))?;
        for (i, &v) in buffer.data().iter().enumerate() {
            data[[i / width, i % width, b]] = v;
        }
    }

    Ok(RasterData {
        data,
        transform: geo_transform(&dataset),
    })
}

pub fn read_metadata(path: &Path) -> Result<ImageMetadata> {
    let dataset = Dataset::open(path).with_context(|| format!("Failed to open raster {:?}", path))?;
    let (width, height) = dataset.raster_size();
    Ok(ImageMetadata::new(
        width,
        height,
        dataset.raster_count(),
        geo_transform(&dataset),
    ))
}

fn write_band<T: GdalType + Copy>(
    path: &Path,
    data: &[T],
    width: usize,
    height: usize,
    transform: Option<GeoTransform>,
    nodata: Option<f64>,
) -> Result<()> {
    ensure_parent_dir(path)?;
    let driver = DriverManager::get_driver_by_name("GTiff").context("Failed to get GTiff driver")?;
    let mut dataset = driver
        .create_with_band_type::<T, _>(path, width, height, 1)
        .with_context(|| format!("Failed to create GeoTIFF dataset {:?}", path))?;
    if let Some(gt) = transform {
        dataset
            .set_geo_transform(&gt.0)
            .context("Failed to set geotransform")?;
    }
    let mut band = dataset.rasterband(1).context("Failed to get output band")?;
    let mut buffer = Buffer::new((width, height), data.to_vec());
    band.write((0, 0), (width, height), &mut buffer)
        .context("Failed to write band")?;
    if nodata.is_some() {
        band.set_no_data_value(nodata)
            .context("Failed to set no data value")?;
    }
    Ok(())
}

pub fn write_i16(
    path: &Path,
    data: &[i16],
    width: usize,
    height: usize,
    transform: Option<GeoTransform>,
) -> Result<()> {
    write_band(path, data, width, height, transform, None)
}

pub fn write_u16(
    path: &Path,
    data: &[u16],
    width: usize,
    height: usize,
    transform: Option<GeoTransform>,
) -> Result<()> {
    write_band(path, data, width, height, transform, Some(0.0))
}
