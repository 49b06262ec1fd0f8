//! Run configuration, built once at process entry and passed by reference.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Which values fill the bounding-box rectangle used for texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureBackground {
    /// Image values over the whole rectangle, segment or not.
    #[default]
    Raw,
    /// Cells outside the segment are replaced by 0 before quantization.
    Zeroed,
}

/// Parameters of the co-occurrence texture calculator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureParams {
    /// Number of real quantization bins (default: 16)
    pub n_bins: usize,
    /// Pixel distance of the co-occurrence offset (default: 1)
    pub distance: usize,
    /// Rectangle fill for non-segment cells
    pub background: TextureBackground,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            n_bins: 16,
            distance: 1,
            background: TextureBackground::Raw,
        }
    }
}

/// Settings of one feature-extraction run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Ground distance covered by one pixel edge
    pub pixel_size: f64,
    /// Label value treated as "no segment"; `None` keeps every value
    pub background_label: Option<i64>,
    /// Image value excluded from the radiometric statistics
    pub nodata: Option<f64>,
    pub texture: TextureParams,
    /// Evaluate segments on the rayon pool; output order is unchanged
    pub parallel: bool,
    /// Report progress while extracting
    pub debug: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pixel_size: 1.0,
            background_label: None,
            nodata: None,
            texture: TextureParams::default(),
            parallel: false,
            debug: false,
        }
    }
}

impl ExtractionConfig {
    /// Load a configuration from a JSON file; missing keys take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: ExtractionConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.pixel_size.is_finite() || self.pixel_size <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "pixel_size",
                value: self.pixel_size.to_string(),
                reason: "must be a finite, positive ground distance".to_string(),
            });
        }
        if self.texture.n_bins < 2 {
            return Err(Error::InvalidParameter {
                name: "texture.n_bins",
                value: self.texture.n_bins.to_string(),
                reason: "at least two bins are needed".to_string(),
            });
        }
        if self.texture.distance == 0 {
            return Err(Error::InvalidParameter {
                name: "texture.distance",
                value: "0".to_string(),
                reason: "co-occurrence distance must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Output vector format of the LAS converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorFormat {
    GeoPackage,
    Shapefile,
    GeoJson,
}

impl VectorFormat {
    /// Map a file extension to a format. Unknown extensions fall back to GeoPackage.
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "shp" => VectorFormat::Shapefile,
            "json" | "geojson" => VectorFormat::GeoJson,
            _ => VectorFormat::GeoPackage,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VectorFormat::GeoPackage => "gpkg",
            VectorFormat::Shapefile => "shp",
            VectorFormat::GeoJson => "geojson",
        }
    }

    /// GeoPackage when the `gdal` feature can write it, GeoJSON otherwise
    pub fn build_default() -> Self {
        if cfg!(feature = "gdal") {
            VectorFormat::GeoPackage
        } else {
            VectorFormat::GeoJson
        }
    }

    /// OGR driver name
    pub fn driver_name(&self) -> &'static str {
        match self {
            VectorFormat::GeoPackage => "GPKG",
            VectorFormat::Shapefile => "ESRI Shapefile",
            VectorFormat::GeoJson => "GeoJSON",
        }
    }
}

/// WGS84 / UTM zone 18N, the CRS of the Haiti LIDAR deliveries
pub const DEFAULT_SRC_SRS: &str = "+proj=utm +zone=18 +datum=WGS84 +units=m +no_defs";
pub const DEFAULT_DST_SRS: &str = "EPSG:4326";

/// `DEFAULT_DST_SRS` when reprojection is compiled in, the input CRS otherwise
pub fn default_dst_srs() -> Option<String> {
    if cfg!(feature = "proj") {
        Some(DEFAULT_DST_SRS.to_string())
    } else {
        None
    }
}

/// Settings of a LAS to vector conversion batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LasToVectorConfig {
    /// PROJ string or `EPSG:xxxx` code of the input points
    pub src_srs: String,
    /// Output CRS; `None` writes the input coordinates unchanged
    pub dst_srs: Option<String>,
    pub format: VectorFormat,
    /// Inclusive (min, max) range of kept z values
    pub z_bounds: (f64, f64),
    /// Worker count; `None` uses all cores but one
    pub workers: Option<usize>,
}

impl Default for LasToVectorConfig {
    fn default() -> Self {
        Self {
            src_srs: DEFAULT_SRC_SRS.to_string(),
            dst_srs: default_dst_srs(),
            format: VectorFormat::build_default(),
            z_bounds: (0.0, 25.0),
            workers: None,
        }
    }
}

impl LasToVectorConfig {
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| num_cpus::get().saturating_sub(1))
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_config_default() {
        let config = ExtractionConfig::default();
        assert_eq!(config.pixel_size, 1.0);
        assert_eq!(config.texture.n_bins, 16);
        assert_eq!(config.texture.distance, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_extraction_config_rejects_bad_pixel_size() {
        let mut config = ExtractionConfig::default();
        config.pixel_size = 0.0;
        assert!(config.validate().is_err());
        config.pixel_size = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extraction_config_partial_json() {
        let config: ExtractionConfig =
            serde_json::from_str(r#"{"pixel_size": 0.5, "texture": {"background": "zeroed"}}"#)
                .unwrap();
        assert_eq!(config.pixel_size, 0.5);
        assert_eq!(config.texture.background, TextureBackground::Zeroed);
        assert_eq!(config.texture.n_bins, 16);
        assert!(!config.parallel);
    }

    #[test]
    fn test_extraction_config_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"pixel_size": -1.0}"#).unwrap();
        assert!(ExtractionConfig::from_json_file(&path).is_err());

        std::fs::write(&path, r#"{"background_label": 0, "debug": true}"#).unwrap();
        let config = ExtractionConfig::from_json_file(&path).unwrap();
        assert_eq!(config.background_label, Some(0));
        assert!(config.debug);
    }

    #[test]
    fn test_vector_format_from_extension() {
        assert_eq!(VectorFormat::from_extension("shp"), VectorFormat::Shapefile);
        assert_eq!(VectorFormat::from_extension(".geojson"), VectorFormat::GeoJson);
        assert_eq!(VectorFormat::from_extension("JSON"), VectorFormat::GeoJson);
        assert_eq!(VectorFormat::from_extension("gpkg"), VectorFormat::GeoPackage);
        assert_eq!(VectorFormat::from_extension("kml"), VectorFormat::GeoPackage);
        assert_eq!(VectorFormat::Shapefile.driver_name(), "ESRI Shapefile");
    }

    #[test]
    fn test_las_defaults_follow_enabled_backends() {
        let config = LasToVectorConfig::default();
        #[cfg(feature = "gdal")]
        assert_eq!(config.format, VectorFormat::GeoPackage);
        #[cfg(not(feature = "gdal"))]
        assert_eq!(config.format, VectorFormat::GeoJson);
        #[cfg(feature = "proj")]
        assert_eq!(config.dst_srs.as_deref(), Some("EPSG:4326"));
        #[cfg(not(feature = "proj"))]
        assert_eq!(config.dst_srs, None);
    }

    #[test]
    fn test_worker_count_is_at_least_one() {
        let mut config = LasToVectorConfig::default();
        config.workers = Some(0);
        assert_eq!(config.worker_count(), 1);
        config.workers = None;
        assert!(config.worker_count() >= 1);
    }
}
