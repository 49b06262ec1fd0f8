//! rsfetex command line: feature extraction and the remote-sensing helpers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rsfetex::collect::imagery::{fetch_image, ImageType};
use rsfetex::config::{LasToVectorConfig, VectorFormat, DEFAULT_DST_SRS, DEFAULT_SRC_SRS};
use rsfetex::features::progress::{BarProgress, LogProgress, NoProgress, ProgressReporter};
use rsfetex::geometric::footprint::{remove_borders, DEFAULT_BORDER_DISTANCE};
use rsfetex::geometric::lidar::convert_all;
use rsfetex::geometric::segments::export_segments_vector;
use rsfetex::io::{get_image_metadata, read_image_cube, read_label_raster};
use rsfetex::{extract_features, extract_features_for_ids, ExtractionConfig, TextureBackground};

#[derive(Parser)]
#[command(name = "rsfetex")]
#[command(author, version, about = "Remote-sensing feature extraction toolkit", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ImageKind {
    Vnir,
    Swir,
}

impl From<ImageKind> for ImageType {
    fn from(kind: ImageKind) -> Self {
        match kind {
            ImageKind::Vnir => ImageType::Vnir,
            ImageKind::Swir => ImageType::Swir,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute per-segment shape, radiometric and texture features
    Extract {
        /// Label raster (band 1 holds segment identifiers)
        #[arg(short, long)]
        labels: PathBuf,
        /// Image aligned with the label raster, all bands are used
        #[arg(short, long)]
        image: PathBuf,
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
        /// JSON configuration file; command-line flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Ground distance of one pixel edge
        #[arg(short, long)]
        pixel_size: Option<f64>,
        /// Label value that marks "no segment"
        #[arg(long)]
        background_label: Option<i64>,
        /// Image value excluded from the statistics
        #[arg(long)]
        nodata: Option<f64>,
        /// Only extract these segment identifiers
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        ids: Option<Vec<i64>>,
        /// Zero the non-segment cells of the texture rectangle
        #[arg(long)]
        zeroed_texture: bool,
        /// Evaluate segments in parallel
        #[arg(long)]
        parallel: bool,
        /// Log progress every 100 segments
        #[arg(short, long)]
        debug: bool,
        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },
    /// Convert LAS files to point vector files
    LasToVector {
        /// One or more input LAS/LAZ files
        #[arg(short, long, num_args = 1.., required = true)]
        input_files: Vec<PathBuf>,
        /// PROJ string or EPSG code of the input points
        #[arg(long, default_value = DEFAULT_SRC_SRS)]
        src_srs: String,
        /// PROJ string or EPSG code of the output files ("none" keeps the input CRS).
        /// Defaults to EPSG:4326 with the proj feature, the input CRS otherwise
        #[arg(long)]
        dst_srs: Option<String>,
        /// Output format: gpkg, shp, json or geojson.
        /// Defaults to gpkg with the gdal feature, geojson otherwise
        #[arg(short, long)]
        extension: Option<String>,
        /// Minimum and maximum z of the kept points
        #[arg(short, long, num_args = 2, default_values_t = [0.0, 25.0])]
        bounds: Vec<f64>,
        /// Worker count (default: available cores minus one)
        #[arg(short, long)]
        number_of_cores: Option<usize>,
    },
    /// Download one orthoimage from the imagery archive
    FetchImage {
        /// Image file name
        name: String,
        /// Image product
        #[arg(short = 't', long, value_enum)]
        image_type: ImageKind,
        /// Destination folder
        #[arg(short, long, default_value = ".")]
        save_folder: PathBuf,
        /// Archive base URL (http or https)
        #[arg(short, long)]
        base_url: Option<String>,
    },
    /// Polygonize a label raster into a vector file with segment_id and class attributes
    ExportSegments {
        /// Label raster (band 1 holds segment identifiers)
        labels: PathBuf,
        /// Output vector file; the format follows its extension
        output: PathBuf,
        /// CRS recorded in GeoPackage / Shapefile output
        #[arg(long, default_value = DEFAULT_DST_SRS)]
        crs: String,
    },
    /// Print width, height and bounds of a raster as JSON
    Metadata {
        /// Input raster file
        input: PathBuf,
    },
    /// Remove the border strip of an image's valid-data footprint
    RemoveBorders {
        /// Input raster file
        input: PathBuf,
        /// Output file (uint16, nodata 0)
        output: PathBuf,
        /// Inward buffer distance in ground units
        #[arg(short, long, default_value_t = DEFAULT_BORDER_DISTANCE)]
        distance: f64,
    },
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

#[allow(clippy::too_many_arguments)]
fn build_extraction_config(
    config: Option<PathBuf>,
    pixel_size: Option<f64>,
    background_label: Option<i64>,
    nodata: Option<f64>,
    zeroed_texture: bool,
    parallel: bool,
    debug: bool,
) -> Result<ExtractionConfig> {
    let mut cfg = match config {
        Some(path) => ExtractionConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load configuration {:?}", path))?,
        None => ExtractionConfig::default(),
    };
    if let Some(pixel_size) = pixel_size {
        cfg.pixel_size = pixel_size;
    }
    if background_label.is_some() {
        cfg.background_label = background_label;
    }
    if nodata.is_some() {
        cfg.nodata = nodata;
    }
    if zeroed_texture {
        cfg.texture.background = TextureBackground::Zeroed;
    }
    cfg.parallel |= parallel;
    cfg.debug |= debug;
    cfg.validate()?;
    Ok(cfg)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Extract {
            labels,
            image,
            output,
            config,
            pixel_size,
            background_label,
            nodata,
            ids,
            zeroed_texture,
            parallel,
            debug,
            progress,
        } => {
            let config = build_extraction_config(
                config,
                pixel_size,
                background_label,
                nodata,
                zeroed_texture,
                parallel,
                debug,
            )?;
            let (labels, _) = read_label_raster(&labels)?;
            let cube = read_image_cube(&image)?;

            let reporter: Box<dyn ProgressReporter> = if progress {
                Box::new(BarProgress::new())
            } else if config.debug {
                Box::new(LogProgress::default())
            } else {
                Box::new(NoProgress)
            };

            let start = Instant::now();
            let table = match ids {
                Some(ids) => extract_features_for_ids(
                    labels.view(),
                    cube.data.view(),
                    &ids,
                    &config,
                    reporter.as_ref(),
                )?,
                None => extract_features(labels.view(), cube.data.view(), &config, reporter.as_ref())?,
            };
            info!(
                "{} segments, {} columns in {:.2?}",
                table.len(),
                table.schema().len(),
                start.elapsed()
            );
            if !table.degenerate_ids().is_empty() {
                info!("Degenerate segments: {:?}", table.degenerate_ids());
            }
            table.write_csv(&output)?;
        }
        Commands::LasToVector {
            input_files,
            src_srs,
            dst_srs,
            extension,
            bounds,
            number_of_cores,
        } => {
            let defaults = LasToVectorConfig::default();
            let dst_srs = match dst_srs.as_deref() {
                None => defaults.dst_srs,
                Some("none") => None,
                Some(other) => Some(other.to_string()),
            };
            let format = extension
                .as_deref()
                .map_or(defaults.format, VectorFormat::from_extension);
            let config = LasToVectorConfig {
                src_srs,
                dst_srs,
                format,
                z_bounds: (bounds[0], bounds[1]),
                workers: number_of_cores,
            };
            let results = convert_all(&input_files, &config)?;
            let failed = results.iter().filter(|r| r.is_err()).count();
            if failed > 0 {
                anyhow::bail!("{} of {} files failed to convert", failed, results.len());
            }
            info!("Converted {} files", results.len());
        }
        Commands::FetchImage {
            name,
            image_type,
            save_folder,
            base_url,
        } => {
            let path = fetch_image(&name, image_type.into(), &save_folder, base_url.as_deref())?;
            println!("{}", path.display());
        }
        Commands::ExportSegments {
            labels,
            output,
            crs,
        } => {
            let (segments, transform) = read_label_raster(&labels)?;
            let extension = output
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            let count = export_segments_vector(
                segments.view(),
                transform,
                Some(crs.as_str()),
                &output,
                VectorFormat::from_extension(extension),
            )?;
            info!("Wrote {} polygons to {:?}", count, output);
        }
        Commands::Metadata { input } => {
            let meta = get_image_metadata(&input)?;
            let json = serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?;
            println!("{}", json);
        }
        Commands::RemoveBorders {
            input,
            output,
            distance,
        } => {
            remove_borders(&input, &output, distance)?;
            info!("Saved {:?}", output);
        }
    }

    Ok(())
}
