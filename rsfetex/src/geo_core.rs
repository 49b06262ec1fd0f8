use anyhow::Result;
use geo::{coord, Rect};
#[cfg(feature = "proj")]
use anyhow::Context;
#[cfg(feature = "proj")]
use proj::Proj;
use serde::{Deserialize, Serialize};

/// Affine pixel-to-ground transform in GDAL coefficient order:
/// `x = c0 + col·c1 + row·c2`, `y = c3 + col·c4 + row·c5`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform from the upper-left corner and the pixel size
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GeoTransform([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height.abs()])
    }

    /// Build from GeoTIFF ModelPixelScale and ModelTiepoint tag values
    pub fn from_tiepoint(scale: &[f64], tiepoint: &[f64]) -> Option<Self> {
        if scale.len() < 2 || tiepoint.len() < 6 {
            return None;
        }
        // tiepoint: [I, J, K, X, Y, Z]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        Some(GeoTransform::north_up(origin_x, origin_y, scale[0], scale[1]))
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.0[0], self.0[3])
    }

    pub fn pixel_width(&self) -> f64 {
        self.0[1]
    }

    pub fn pixel_height(&self) -> f64 {
        self.0[5].abs()
    }

    /// Transform of a window whose upper-left pixel is (row, col)
    pub fn window(&self, row: usize, col: usize) -> GeoTransform {
        let (x, y) = self.apply(row as f64, col as f64);
        let t = self.0;
        GeoTransform([x, t[1], t[2], y, t[4], t[5]])
    }

    /// Ground coordinates of the upper-left corner of pixel (row, col)
    pub fn apply(&self, row: f64, col: f64) -> (f64, f64) {
        let t = &self.0;
        (t[0] + col * t[1] + row * t[2], t[3] + col * t[4] + row * t[5])
    }

    /// Extent covered by a raster of `width` x `height` pixels
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(0.0, width as f64),
            self.apply(height as f64, 0.0),
            self.apply(height as f64, width as f64),
        ];
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }
}

impl Default for GeoTransform {
    /// Identity pixel grid: one ground unit per pixel, rows growing downward
    fn default() -> Self {
        GeoTransform::north_up(0.0, 0.0, 1.0, 1.0)
    }
}

/// Bounding box structure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// `[left, bottom, right, top]`
    pub fn as_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_x, y: self.min_y },
            coord! { x: self.max_x, y: self.max_y },
        )
    }
}

/// Coordinate transformation between two CRS definitions.
///
/// Accepts anything PROJ understands (`EPSG:xxxx`, PROJ strings, WKT).
/// Without the `proj` feature only the identity (same CRS on both sides)
/// can be built.
pub struct Reprojector {
    identity: bool,
    #[cfg(feature = "proj")]
    proj: Option<Proj>,
}

impl Reprojector {
    pub fn new(from_crs: &str, to_crs: &str) -> Result<Self> {
        if from_crs.trim() == to_crs.trim() {
            return Ok(Reprojector::identity());
        }
        #[cfg(feature = "proj")]
        {
            let proj = Proj::new_known_crs(from_crs, to_crs, None).with_context(|| {
                format!("Failed to create Proj transformation {} -> {}", from_crs, to_crs)
            })?;
            Ok(Reprojector {
                identity: false,
                proj: Some(proj),
            })
        }
        #[cfg(not(feature = "proj"))]
        {
            anyhow::bail!(
                "Reprojection {} -> {} requires the 'proj' feature",
                from_crs,
                to_crs
            )
        }
    }

    pub fn identity() -> Self {
        Reprojector {
            identity: true,
            #[cfg(feature = "proj")]
            proj: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Transform coordinates from one CRS to another
    pub fn convert(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if self.identity {
            return Ok((x, y));
        }
        #[cfg(feature = "proj")]
        if let Some(proj) = &self.proj {
            return proj
                .convert((x, y))
                .context("Failed to transform coordinates");
        }
        anyhow::bail!("Reprojection is not available in this build")
    }
}
