use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use serde_json::Map;
use std::path::{Path, PathBuf};

#[cfg(feature = "indicatif")]
use indicatif::ProgressBar;

use crate::commons::pool::run_pool;
use crate::config::{LasToVectorConfig, VectorFormat};
use crate::geo_core::Reprojector;

/// Name of the folder created next to the input files
pub const OUTPUT_DIR_NAME: &str = "las_to_vector";

/// Point attributes kept in the vector output
#[derive(Debug, Clone, PartialEq)]
pub struct LasPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// ASPRS class code
    pub new_class: u8,
    /// Classification byte as stored in legacy point formats: class code
    /// in bits 0-4, synthetic, key-point and withheld flags in bits 5-7
    pub raw_class: u8,
    pub intensity: u16,
}

/// Map a las point to the exported attributes.
#[inline]
fn to_las_point(point: &las::Point) -> LasPoint {
    let new_class = u8::from(point.classification);
    let raw_class = if new_class < 32 {
        new_class
            | (u8::from(point.is_synthetic) << 5)
            | (u8::from(point.is_key_point) << 6)
            | (u8::from(point.is_withheld) << 7)
    } else {
        new_class
    };
    LasPoint {
        x: point.x,
        y: point.y,
        z: point.z,
        new_class,
        raw_class,
        intensity: point.intensity,
    }
}

/// Read the points of a LAS/LAZ file whose z lies within `z_bounds` (inclusive)
pub fn read_las_points<P: AsRef<Path>>(path: P, z_bounds: (f64, f64)) -> Result<Vec<LasPoint>> {
    let path = path.as_ref();
    let mut reader =
        las::Reader::from_path(path).with_context(|| format!("Failed to open LAS file {:?}", path))?;

    let (z_min, z_max) = z_bounds;
    let point_count = reader.header().number_of_points() as usize;
    let mut points = Vec::with_capacity(point_count);
    for point_result in reader.points() {
        let point = point_result.with_context(|| format!("Failed to read point from {:?}", path))?;
        if point.z >= z_min && point.z <= z_max {
            points.push(to_las_point(&point));
        }
    }
    tracing::debug!(
        "{:?}: kept {} of {} points within z [{}, {}]",
        path,
        points.len(),
        point_count,
        z_min,
        z_max
    );
    Ok(points)
}

/// `<input dir>/las_to_vector/<input stem>.<format extension>`
pub fn output_path_for(input: &Path, format: VectorFormat) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .with_context(|| format!("Input path has no file name: {:?}", input))?;
    let parent = input.parent().unwrap_or_else(|| Path::new(""));
    Ok(parent
        .join(OUTPUT_DIR_NAME)
        .join(stem)
        .with_extension(format.extension()))
}

fn to_geojson(points: &[LasPoint], reprojector: &Reprojector) -> Result<GeoJson> {
    let mut features = Vec::with_capacity(points.len());
    for point in points {
        let (x, y) = reprojector.convert(point.x, point.y)?;
        let geometry = Geometry::new(Value::Point(vec![x, y]));

        let mut properties = Map::new();
        properties.insert("x".to_string(), serde_json::json!(point.x));
        properties.insert("y".to_string(), serde_json::json!(point.y));
        properties.insert("z".to_string(), serde_json::json!(point.z));
        properties.insert("new_class".to_string(), serde_json::json!(point.new_class));
        properties.insert("raw_class".to_string(), serde_json::json!(point.raw_class));
        properties.insert("intensity".to_string(), serde_json::json!(point.intensity));

        let mut feature = Feature::from(geometry);
        feature.properties = Some(properties);
        features.push(feature);
    }

    Ok(GeoJson::from(FeatureCollection {
        bbox: None,
        foreign_members: None,
        features,
    }))
}

fn write_geojson(points: &[LasPoint], reprojector: &Reprojector, output: &Path) -> Result<()> {
    let geojson = to_geojson(points, reprojector)?;
    std::fs::write(output, geojson.to_string())
        .with_context(|| format!("Failed to write GeoJSON file: {:?}", output))
}

#[cfg(feature = "gdal")]
fn write_with_gdal(
    points: &[LasPoint],
    reprojector: &Reprojector,
    crs: &str,
    format: VectorFormat,
    output: &Path,
) -> Result<()> {
    use gdal::spatial_ref::SpatialRef;
    use gdal::vector::{FieldValue, Geometry as GdalGeometry, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType};
    use gdal::DriverManager;

    let driver = DriverManager::get_driver_by_name(format.driver_name())
        .with_context(|| format!("{} driver not available", format.driver_name()))?;
    if output.exists() {
        std::fs::remove_file(output)
            .with_context(|| format!("Failed to replace existing file {:?}", output))?;
    }
    let mut dataset = driver
        .create_vector_only(output)
        .with_context(|| format!("Failed to create {:?}", output))?;
    let srs = SpatialRef::from_definition(crs)
        .with_context(|| format!("Invalid spatial reference: {}", crs))?;
    let layer_name = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(OUTPUT_DIR_NAME);
    let mut layer = dataset
        .create_layer(LayerOptions {
            name: layer_name,
            srs: Some(&srs),
            ty: OGRwkbGeometryType::wkbPoint,
            ..Default::default()
        })
        .context("Failed to create layer")?;
    layer
        .create_defn_fields(&[
            ("x", OGRFieldType::OFTReal),
            ("y", OGRFieldType::OFTReal),
            ("z", OGRFieldType::OFTReal),
            ("new_class", OGRFieldType::OFTInteger),
            ("raw_class", OGRFieldType::OFTInteger),
            ("intensity", OGRFieldType::OFTInteger),
        ])
        .context("Failed to create fields")?;

    let names = ["x", "y", "z", "new_class", "raw_class", "intensity"];
    for point in points {
        let (x, y) = reprojector.convert(point.x, point.y)?;
        let geometry = GdalGeometry::from_wkt(&format!("POINT ({} {})", x, y))
            .context("Failed to build point geometry")?;
        layer
            .create_feature_fields(
                geometry,
                &names,
                &[
                    FieldValue::RealValue(point.x),
                    FieldValue::RealValue(point.y),
                    FieldValue::RealValue(point.z),
                    FieldValue::IntegerValue(point.new_class as i32),
                    FieldValue::IntegerValue(point.raw_class as i32),
                    FieldValue::IntegerValue(point.intensity as i32),
                ],
            )
            .context("Failed to create feature in layer")?;
    }
    Ok(())
}

/// Convert one LAS file to a point vector file and return the output path.
///
/// Points outside the z bounds are discarded. When a destination CRS is
/// configured, geometries are reprojected while the `x` and `y`
/// attributes keep the source coordinates.
pub fn las_to_vector<P: AsRef<Path>>(path: P, config: &LasToVectorConfig) -> Result<PathBuf> {
    let path = path.as_ref();
    tracing::info!("Working on {:?}", path);

    let points = read_las_points(path, config.z_bounds)?;
    let target_crs = config.dst_srs.as_deref().unwrap_or(&config.src_srs);
    let reprojector = Reprojector::new(&config.src_srs, target_crs)?;

    let output = output_path_for(path, config.format)?;
    if let Some(folder) = output.parent() {
        std::fs::create_dir_all(folder)
            .with_context(|| format!("Failed to create output folder {:?}", folder))?;
    }

    match config.format {
        VectorFormat::GeoJson => write_geojson(&points, &reprojector, &output)?,
        #[cfg(feature = "gdal")]
        format => write_with_gdal(&points, &reprojector, target_crs, format, &output)?,
        #[cfg(not(feature = "gdal"))]
        format => anyhow::bail!(
            "Writing {} requires the 'gdal' feature; use the geojson format instead",
            format.driver_name()
        ),
    }

    tracing::info!("{} points saved to {:?}", points.len(), output);
    Ok(output)
}

/// Convert many LAS files on a pool of `config.worker_count()` workers.
///
/// Every input gets its own result, in input order. A failed file does
/// not stop the others and produces no output.
pub fn convert_all<P>(paths: &[P], config: &LasToVectorConfig) -> Result<Vec<Result<PathBuf>>>
where
    P: AsRef<Path> + Sync,
{
    let workers = config.worker_count();
    tracing::info!("Converting {} LAS files with {} workers", paths.len(), workers);

    #[cfg(feature = "indicatif")]
    let pb = {
        let pb = ProgressBar::new(paths.len() as u64);
        pb.set_style(crate::features::progress::progress_style());
        pb.set_message("Files");
        pb
    };

    let results = run_pool(paths, workers, |path| {
        let result = las_to_vector(path, config);
        if let Err(e) = &result {
            tracing::error!("Failed to convert {:?}: {:#}", path.as_ref(), e);
        }
        #[cfg(feature = "indicatif")]
        pb.inc(1);
        result
    })?;

    #[cfg(feature = "indicatif")]
    pb.finish_with_message("All files processed");
    Ok(results)
}
