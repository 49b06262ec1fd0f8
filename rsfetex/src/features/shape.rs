//! Shape features of a cropped segment mask

use ndarray::{Array2, ArrayView2};
use std::f64::consts::{PI, SQRT_2};

/// Area, perimeter and compactness of one segment in ground units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeFeatures {
    pub area: f64,
    pub perimeter: f64,
    /// 4π·area / perimeter², `NaN` when the perimeter is zero
    pub compactness_index: f64,
}

impl ShapeFeatures {
    pub fn is_degenerate(&self) -> bool {
        self.perimeter == 0.0
    }
}

pub fn shape_features(mask: ArrayView2<'_, bool>, pixel_size: f64) -> ShapeFeatures {
    let cells = mask.iter().filter(|&&v| v).count();
    let area = cells as f64 * pixel_size * pixel_size;
    let perimeter = perimeter(mask) * pixel_size;
    ShapeFeatures {
        area,
        perimeter,
        compactness_index: compactness_index(area, perimeter),
    }
}

pub fn compactness_index(area: f64, perimeter: f64) -> f64 {
    if perimeter == 0.0 {
        return f64::NAN;
    }
    4.0 * PI * area / (perimeter * perimeter)
}

// Convolution codes of border pixels with their 4-connected border neighbours.
const KERNEL: [[u8; 3]; 3] = [[10, 2, 10], [2, 1, 2], [10, 2, 10]];

fn code_weight(code: u8) -> f64 {
    match code {
        5 | 7 | 15 | 17 | 25 | 27 => 1.0,
        21 | 33 => SQRT_2,
        13 | 23 => (1.0 + SQRT_2) / 2.0,
        _ => 0.0,
    }
}

/// Boundary length of a binary mask in pixel units (4-connectivity).
///
/// Border pixels are the mask minus its erosion by a cross; cells beyond
/// the array edge count as background. Each border pixel is weighted by
/// the arrangement of its border neighbours, so straight runs count 1
/// per pixel and diagonal steps count √2.
pub fn perimeter(mask: ArrayView2<'_, bool>) -> f64 {
    let (rows, cols) = mask.dim();
    let at = |r: isize, c: isize| -> bool {
        r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols && mask[[r as usize, c as usize]]
    };

    let border = Array2::from_shape_fn((rows, cols), |(r, c)| {
        let (r, c) = (r as isize, c as isize);
        at(r, c) && !(at(r - 1, c) && at(r + 1, c) && at(r, c - 1) && at(r, c + 1))
    });

    let mut total = 0.0;
    for ((r, c), &is_border) in border.indexed_iter() {
        if !is_border {
            continue;
        }
        let mut code = 0u8;
        for (kr, kernel_row) in KERNEL.iter().enumerate() {
            for (kc, &weight) in kernel_row.iter().enumerate() {
                let nr = r as isize + kr as isize - 1;
                let nc = c as isize + kc as isize - 1;
                if nr >= 0
                    && nc >= 0
                    && (nr as usize) < rows
                    && (nc as usize) < cols
                    && border[[nr as usize, nc as usize]]
                {
                    code += weight;
                }
            }
        }
        total += code_weight(code);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_single_pixel_is_degenerate() {
        let mask = array![[true]];
        let shape = shape_features(mask.view(), 1.0);
        assert_eq!(shape.area, 1.0);
        assert_eq!(shape.perimeter, 0.0);
        assert!(shape.is_degenerate());
        assert!(shape.compactness_index.is_nan());
    }

    #[test]
    fn test_two_by_two_block() {
        // Four corner pixels, each with two straight neighbours and one diagonal
        let mask = Array2::from_elem((2, 2), true);
        assert!((perimeter(mask.view()) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_square_with_interior() {
        // 3x3 block: 8 border pixels around one interior pixel
        let mask = Array2::from_elem((3, 3), true);
        assert!((perimeter(mask.view()) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_diagonal_pair() {
        let mask = array![[true, false], [false, true]];
        // each pixel sees a single diagonal border neighbour (code 11)
        assert_eq!(perimeter(mask.view()), 0.0);
        let mask = array![[true, false, false], [false, true, false], [false, false, true]];
        // the middle pixel joins two diagonals (code 21)
        assert!((perimeter(mask.view()) - SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn test_horizontal_line() {
        let mask = array![[true, true, true, true]];
        let p = perimeter(mask.view());
        // two end pixels (code 3, weight 0) and two inner pixels (code 5)
        assert!((p - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_area_scales_with_pixel_size() {
        let mask = array![[true, false, true], [true, true, false]];
        for pixel_size in [0.25, 1.0, 3.0] {
            let shape = shape_features(mask.view(), pixel_size);
            assert_eq!(shape.area, 4.0 * pixel_size * pixel_size);
        }
    }

    #[test]
    fn test_compactness_matches_definition() {
        let mask = Array2::from_elem((5, 4), true);
        let shape = shape_features(mask.view(), 2.0);
        assert!(shape.perimeter > 0.0);
        let expected = 4.0 * PI * shape.area / shape.perimeter.powi(2);
        assert!((shape.compactness_index - expected).abs() < 1e-12);
    }

    #[test]
    fn test_false_cells_do_not_count() {
        let mask = array![[false, false, false], [false, true, false], [false, false, false]];
        assert_eq!(perimeter(mask.view()), 0.0);
    }
}
