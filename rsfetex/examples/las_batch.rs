// Convert every LAS file given on the command line to GeoJSON
use anyhow::Result;
use rsfetex::config::{LasToVectorConfig, VectorFormat};
use rsfetex::geometric::lidar::convert_all;
use std::path::PathBuf;

fn main() -> Result<()> {
    let inputs: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if inputs.is_empty() {
        println!("Usage: las_batch <file.las>...");
        return Ok(());
    }

    // Keep the input CRS so the example runs without PROJ
    let config = LasToVectorConfig {
        dst_srs: None,
        format: VectorFormat::GeoJson,
        ..LasToVectorConfig::default()
    };

    for (input, result) in inputs.iter().zip(convert_all(&inputs, &config)?) {
        match result {
            Ok(output) => println!("{} -> {}", input.display(), output.display()),
            Err(e) => println!("{}: {:#}", input.display(), e),
        }
    }

    Ok(())
}
