//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Pixel-interleaved images become one band per sample. Georeferencing
//! is limited to the ModelPixelScale and ModelTiepoint tags.

use anyhow::{Context, Result};
use ndarray::Array3;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{ColorType, Gray16, GrayI16};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

use super::{ensure_parent_dir, ImageMetadata, RasterData};
use crate::geo_core::GeoTransform;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("Failed to open raster {:?}", path))?;
    let decoder = Decoder::new(BufReader::new(file))
        .with_context(|| format!("Failed to decode TIFF header of {:?}", path))?;
    Ok(decoder.with_limits(Limits::unlimited()))
}

fn decoding_to_f64(result: DecodingResult) -> Result<Vec<f64>> {
    let data = match result {
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        #[allow(unreachable_patterns)]
        _ => anyhow::bail!("Unsupported TIFF sample format"),
    };
    Ok(data)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT)).ok()?;
    GeoTransform::from_tiepoint(&scale, &tiepoint)
}

/// Read every sample of the first image as a band
pub fn read_raster(path: &Path) -> Result<RasterData> {
    let mut decoder = open_decoder(path)?;
    let (width, height) = decoder
        .dimensions()
        .with_context(|| format!("Cannot read dimensions of {:?}", path))?;
    let (cols, rows) = (width as usize, height as usize);

    let result = decoder
        .read_image()
        .with_context(|| format!("Cannot read image data of {:?}", path))?;
    let data = decoding_to_f64(result)?;

    let pixels = rows * cols;
    if pixels == 0 || data.len() % pixels != 0 {
        anyhow::bail!(
            "Unexpected sample count {} for a {}x{} raster in {:?}",
            data.len(),
            cols,
            rows,
            path
        );
    }
    let bands = data.len() / pixels;
    let data = Array3::from_shape_vec((rows, cols, bands), data)
        .context("Failed to shape raster samples")?;

    Ok(RasterData {
        data,
        transform: read_geotransform(&mut decoder),
    })
}

pub fn read_metadata(path: &Path) -> Result<ImageMetadata> {
    let mut decoder = open_decoder(path)?;
    let (width, height) = decoder
        .dimensions()
        .with_context(|| format!("Cannot read dimensions of {:?}", path))?;
    let bands = decoder
        .get_tag_u32(Tag::SamplesPerPixel)
        .map(|n| n as usize)
        .unwrap_or(1);
    let transform = read_geotransform(&mut decoder);
    Ok(ImageMetadata::new(
        width as usize,
        height as usize,
        bands,
        transform,
    ))
}

fn write_single_band<C, W>(
    writer: W,
    data: &[C::Inner],
    width: usize,
    height: usize,
    transform: Option<GeoTransform>,
    nodata: Option<&str>,
) -> Result<()>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).context("TIFF encoder error")?;
    let mut image = encoder
        .new_image::<C>(width as u32, height as u32)
        .context("Cannot create TIFF image")?;

    if let Some(gt) = transform {
        let (origin_x, origin_y) = gt.origin();
        let scale = [gt.pixel_width(), gt.pixel_height(), 0.0];
        image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
            .context("Cannot write pixel scale tag")?;
        let tiepoint = [0.0, 0.0, 0.0, origin_x, origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
            .context("Cannot write tiepoint tag")?;
        // Version 1.1.0 with two keys: projected model, pixel-is-area
        let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];
        image
            .encoder()
            .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &geokeys[..])
            .context("Cannot write geokey tag")?;
    }
    if let Some(nodata) = nodata {
        image
            .encoder()
            .write_tag(Tag::Unknown(GDAL_NODATA), nodata)
            .context("Cannot write nodata tag")?;
    }

    image.write_data(data).context("Cannot write image data")?;
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    ensure_parent_dir(path)?;
    let file = File::create(path).with_context(|| format!("Failed to create raster {:?}", path))?;
    Ok(BufWriter::new(file))
}

pub fn write_i16(
    path: &Path,
    data: &[i16],
    width: usize,
    height: usize,
    transform: Option<GeoTransform>,
) -> Result<()> {
    let mut writer = create(path)?;
    write_single_band::<GrayI16, _>(&mut writer, data, width, height, transform, None)
        .with_context(|| format!("Failed to write {:?}", path))?;
    writer.flush().context("Failed to flush raster")?;
    Ok(())
}

pub fn write_u16(
    path: &Path,
    data: &[u16],
    width: usize,
    height: usize,
    transform: Option<GeoTransform>,
) -> Result<()> {
    let mut writer = create(path)?;
    write_single_band::<Gray16, _>(&mut writer, data, width, height, transform, Some("0"))
        .with_context(|| format!("Failed to write {:?}", path))?;
    writer.flush().context("Failed to flush raster")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_rgb_samples_become_bands() {
        let mut buf = Vec::new();
        {
            let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).unwrap();
            let pixels: Vec<u8> = vec![1, 2, 3, 4, 5, 6];
            encoder
                .write_image::<tiff::encoder::colortype::RGB8>(2, 1, &pixels)
                .unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        std::fs::write(&path, &buf).unwrap();

        let raster = read_raster(&path).unwrap();
        assert_eq!(raster.data.dim(), (1, 2, 3));
        assert_eq!(raster.data[[0, 1, 0]], 4.0);
        assert_eq!(raster.data[[0, 1, 2]], 6.0);
        assert!(raster.transform.is_none());

        let meta = read_metadata(&path).unwrap();
        assert_eq!(meta.bands, 3);
        assert_eq!(meta.bounds, [0.0, 0.0, 2.0, 1.0]);
    }
}
