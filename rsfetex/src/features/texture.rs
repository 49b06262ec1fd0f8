//! Gray-level co-occurrence (GLCM) texture features
//!
//! A band rectangle is quantized into `n_bins` equal-width bins, one
//! co-occurrence matrix is accumulated per orientation and four Haralick
//! descriptors are averaged over the orientations.

use ndarray::{Array2, ArrayView2};

use crate::config::TextureParams;

/// Row/column unit steps for 0°, 90°, 180° and 270° (90° points up).
pub const ORIENTATIONS: [(isize, isize); 4] = [(0, 1), (-1, 0), (0, -1), (1, 0)];

/// Texture descriptors of one band, averaged over the four orientations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureFeatures {
    pub contrast: f64,
    pub dissimilarity: f64,
    pub homogeneity: f64,
    /// Angular second moment
    pub asm: f64,
}

/// `n` evenly spaced edges from `min` to `max`, both included.
pub fn bin_edges(min: f64, max: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![min];
    }
    let step = (max - min) / (n - 1) as f64;
    let mut edges: Vec<f64> = (0..n).map(|k| min + k as f64 * step).collect();
    edges[n - 1] = max;
    edges
}

/// Number of edges less than or equal to `value`.
///
/// With edges spanning the band range, the minimum maps to level 1 and
/// the maximum to level `edges.len()`. Level 0 is only reached by values
/// below the range and by non-finite values.
pub fn digitize(value: f64, edges: &[f64]) -> usize {
    if !value.is_finite() {
        return 0;
    }
    edges.partition_point(|&edge| edge <= value)
}

fn is_valid(value: f64, nodata: Option<f64>) -> bool {
    value.is_finite() && nodata.map_or(true, |nd| value != nd)
}

/// Quantize a band into levels `0..=n_bins` using the range of its valid values.
///
/// Non-finite cells and cells equal to `nodata` are left at level 0 and do
/// not take part in the range.
pub fn quantize(band: ArrayView2<'_, f64>, n_bins: usize, nodata: Option<f64>) -> Array2<usize> {
    let (vmin, vmax) = band
        .iter()
        .filter(|&&v| is_valid(v, nodata))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if vmin > vmax {
        return Array2::zeros(band.dim());
    }
    let edges = bin_edges(vmin, vmax, n_bins);
    band.mapv(|v| if is_valid(v, nodata) { digitize(v, &edges) } else { 0 })
}

/// Raw co-occurrence counts of `(level at p, level at p + offset)` pairs.
///
/// The returned matrix is `n_levels` x `n_levels`, row-major.
pub fn cooccurrence(levels: ArrayView2<'_, usize>, n_levels: usize, offset: (isize, isize)) -> Vec<f64> {
    let (rows, cols) = levels.dim();
    let mut glcm = vec![0.0; n_levels * n_levels];
    for ((r, c), &i) in levels.indexed_iter() {
        let r2 = r as isize + offset.0;
        let c2 = c as isize + offset.1;
        if r2 < 0 || c2 < 0 || r2 as usize >= rows || c2 as usize >= cols {
            continue;
        }
        let j = levels[[r2 as usize, c2 as usize]];
        if i < n_levels && j < n_levels {
            glcm[i * n_levels + j] += 1.0;
        }
    }
    glcm
}

// Drop level 0 (background) and normalize to probabilities.
fn normalized_without_background(glcm: &[f64], n_levels: usize) -> Vec<f64> {
    let n = n_levels - 1;
    let mut p = Vec::with_capacity(n * n);
    for i in 1..n_levels {
        p.extend_from_slice(&glcm[i * n_levels + 1..(i + 1) * n_levels]);
    }
    let total: f64 = p.iter().sum();
    if total > 0.0 {
        for v in &mut p {
            *v /= total;
        }
    }
    p
}

fn descriptors(p: &[f64], n: usize) -> TextureFeatures {
    let mut out = TextureFeatures {
        contrast: 0.0,
        dissimilarity: 0.0,
        homogeneity: 0.0,
        asm: 0.0,
    };
    for i in 0..n {
        for j in 0..n {
            let v = p[i * n + j];
            if v == 0.0 {
                continue;
            }
            let diff = i as f64 - j as f64;
            out.contrast += v * diff * diff;
            out.dissimilarity += v * diff.abs();
            out.homogeneity += v / (1.0 + diff * diff);
            out.asm += v * v;
        }
    }
    out
}

/// Texture descriptors of one band rectangle. Pairs touching a `nodata`
/// cell are ignored.
pub fn texture_features(
    band: ArrayView2<'_, f64>,
    params: &TextureParams,
    nodata: Option<f64>,
) -> TextureFeatures {
    let n_levels = params.n_bins + 1;
    let levels = quantize(band, params.n_bins, nodata);
    let d = params.distance as isize;

    let mut sum = TextureFeatures {
        contrast: 0.0,
        dissimilarity: 0.0,
        homogeneity: 0.0,
        asm: 0.0,
    };
    for &(dr, dc) in ORIENTATIONS.iter() {
        let glcm = cooccurrence(levels.view(), n_levels, (dr * d, dc * d));
        let p = normalized_without_background(&glcm, n_levels);
        let t = descriptors(&p, params.n_bins);
        sum.contrast += t.contrast;
        sum.dissimilarity += t.dissimilarity;
        sum.homogeneity += t.homogeneity;
        sum.asm += t.asm;
    }

    let k = ORIENTATIONS.len() as f64;
    TextureFeatures {
        contrast: sum.contrast / k,
        dissimilarity: sum.dissimilarity / k,
        homogeneity: sum.homogeneity / k,
        asm: sum.asm / k,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn params() -> TextureParams {
        TextureParams::default()
    }

    #[test]
    fn test_bin_edges_linspace() {
        let edges = bin_edges(0.0, 15.0, 16);
        assert_eq!(edges.len(), 16);
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[1], 1.0);
        assert_eq!(edges[15], 15.0);
    }

    #[test]
    fn test_digitize_edges() {
        let edges = bin_edges(0.0, 15.0, 16);
        assert_eq!(digitize(0.0, &edges), 1);
        assert_eq!(digitize(0.5, &edges), 1);
        assert_eq!(digitize(1.0, &edges), 2);
        // the band maximum lands in the last real bin
        assert_eq!(digitize(15.0, &edges), 16);
        assert_eq!(digitize(-1.0, &edges), 0);
        assert_eq!(digitize(99.0, &edges), 16);
        assert_eq!(digitize(f64::NAN, &edges), 0);
    }

    #[test]
    fn test_quantize_constant_band() {
        let band = Array2::from_elem((3, 3), 10.0);
        let levels = quantize(band.view(), 16, None);
        assert!(levels.iter().all(|&l| l == 16));
    }

    #[test]
    fn test_quantize_skips_nodata() {
        let band = array![[-9999.0, 0.0], [15.0, 5.0]];
        let levels = quantize(band.view(), 16, Some(-9999.0));
        assert_eq!(levels, array![[0usize, 1], [16, 6]]);
    }

    #[test]
    fn test_nodata_cell_does_not_change_texture() {
        let clean = Array2::from_shape_fn((3, 3), |(r, c)| if (r + c) % 2 == 0 { 10.0 } else { 110.0 });
        let mut holed = clean.clone();
        holed[[0, 0]] = -9999.0;
        let a = texture_features(clean.view(), &params(), Some(-9999.0));
        let b = texture_features(holed.view(), &params(), Some(-9999.0));
        assert!((a.contrast - 225.0).abs() < 1e-12);
        assert!((b.contrast - 225.0).abs() < 1e-12);
        assert!((b.dissimilarity - 15.0).abs() < 1e-12);
        // without the nodata value the outlier stretches the bins
        let c = texture_features(holed.view(), &params(), None);
        assert!(c.contrast < 225.0);
    }

    #[test]
    fn test_cooccurrence_horizontal() {
        let levels = array![[1usize, 2], [2, 2]];
        let glcm = cooccurrence(levels.view(), 3, (0, 1));
        assert_eq!(glcm[1 * 3 + 2], 1.0);
        assert_eq!(glcm[2 * 3 + 2], 1.0);
        assert_eq!(glcm.iter().sum::<f64>(), 2.0);
    }

    #[test]
    fn test_uniform_band() {
        let band = Array2::from_elem((2, 2), 10.0);
        let t = texture_features(band.view(), &params(), None);
        assert_eq!(t.asm, 1.0);
        assert_eq!(t.contrast, 0.0);
        assert_eq!(t.dissimilarity, 0.0);
        assert_eq!(t.homogeneity, 1.0);
    }

    #[test]
    fn test_single_column_has_no_horizontal_pairs() {
        let band = array![[1.0], [1.0], [1.0]];
        let t = texture_features(band.view(), &params(), None);
        // only the two vertical orientations contribute
        assert_eq!(t.asm, 0.5);
        assert_eq!(t.homogeneity, 0.5);
    }

    #[test]
    fn test_checkerboard_contrast() {
        let band = Array2::from_shape_fn((4, 4), |(r, c)| ((r + c) % 2) as f64);
        let t = texture_features(band.view(), &params(), None);
        // every neighbour pair jumps from level 1 to level 16
        assert!((t.dissimilarity - 15.0).abs() < 1e-12);
        assert!((t.contrast - 225.0).abs() < 1e-12);
        assert!((t.asm - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_descriptors_finite_and_non_negative() {
        let band = Array2::from_shape_fn((7, 5), |(r, c)| ((r * 31 + c * 17) % 23) as f64 * 1.7);
        let t = texture_features(band.view(), &params(), None);
        for v in [t.contrast, t.dissimilarity, t.homogeneity, t.asm] {
            assert!(v.is_finite());
            assert!(v >= 0.0);
        }
    }

    #[test]
    fn test_rotation_invariance_of_symmetric_band() {
        // pinwheel: 4-fold rotationally symmetric but not mirror symmetric
        let band = array![
            [1.0, 5.0, 2.0, 1.0],
            [2.0, 8.0, 8.0, 5.0],
            [5.0, 8.0, 8.0, 2.0],
            [1.0, 2.0, 5.0, 1.0],
        ];
        let rotated = Array2::from_shape_fn((4, 4), |(r, c)| band[[c, 3 - r]]);
        assert_eq!(rotated, band);
        assert_ne!(band.t(), band);
        let a = texture_features(band.view(), &params(), None);
        let b = texture_features(rotated.view(), &params(), None);
        assert!((a.contrast - b.contrast).abs() < 1e-12);
        assert!((a.dissimilarity - b.dissimilarity).abs() < 1e-12);
        assert!((a.homogeneity - b.homogeneity).abs() < 1e-12);
        assert!((a.asm - b.asm).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_of_any_band() {
        let (h, w) = (5, 3);
        let band = Array2::from_shape_fn((h, w), |(r, c)| ((r * 7 + c * 3) % 5) as f64);
        let rotated = Array2::from_shape_fn((w, h), |(r, c)| band[[c, w - 1 - r]]);
        let a = texture_features(band.view(), &params(), None);
        let b = texture_features(rotated.view(), &params(), None);
        assert!((a.contrast - b.contrast).abs() < 1e-12);
        assert!((a.asm - b.asm).abs() < 1e-12);
    }
}
