// Feature extraction on a small synthetic scene
use anyhow::Result;
use ndarray::{Array2, Array3};
use rsfetex::features::progress::LogProgress;
use rsfetex::{extract_features, ExtractionConfig};

fn main() -> Result<()> {
    // 3x3 grid of 4x4 blocks, each block one segment
    let labels = Array2::from_shape_fn((12, 12), |(r, c)| ((r / 4) * 3 + c / 4 + 1) as i64);

    // Two bands: a gradient and a checkerboard
    let image = Array3::from_shape_fn((12, 12, 2), |(r, c, b)| match b {
        0 => (r * 12 + c) as f64,
        _ => ((r + c) % 2) as f64 * 100.0,
    });

    let config = ExtractionConfig {
        pixel_size: 0.5,
        ..ExtractionConfig::default()
    };
    let table = extract_features(
        labels.view(),
        image.view(),
        &config,
        &LogProgress { every: 3 },
    )?;

    println!("Segments: {}", table.len());
    println!("Columns: {}", table.schema().names().join(", "));

    let df = table.to_polars_df()?;
    println!("\nDataFrame Polars:");
    println!("{}", df);

    Ok(())
}
