pub mod collect;
pub mod commons;
pub mod config;
pub mod error;
pub mod features;
pub mod geo_core;
pub mod geometric;
pub mod io;

pub use config::{ExtractionConfig, TextureBackground, TextureParams};
pub use error::{Error, Result};
pub use features::extract::{extract_features, extract_features_for_ids};
pub use features::table::{FeatureColumn, FeatureRow, FeatureSchema, FeatureTable};
