//! Per-segment feature extraction
//!
//! Leaves first: [`mask`] derives segment masks from a label raster,
//! [`shape`], [`radiometric`] and [`texture`] compute the per-segment and
//! per-band features, [`table`] holds the result and [`extract`] drives
//! the loop.

pub mod extract;
pub mod mask;
pub mod progress;
pub mod radiometric;
pub mod shape;
pub mod table;
pub mod texture;

pub use extract::{extract_features, extract_features_for_ids};
pub use progress::{LogProgress, NoProgress, ProgressReporter};
pub use table::{FeatureColumn, FeatureRow, FeatureSchema, FeatureTable};
