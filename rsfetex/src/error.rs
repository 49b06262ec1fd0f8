//! Error types for the feature-extraction core

use thiserror::Error;

/// Errors raised by the in-memory algorithms.
///
/// File, network and driver failures in the workflow modules are reported
/// through `anyhow` instead, with context attached at each call site.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Raster size mismatch: labels are ({lr}, {lc}), image is ({ir}, {ic})")]
    SizeMismatch {
        lr: usize,
        lc: usize,
        ir: usize,
        ic: usize,
    },

    #[error("Image cube has no bands")]
    NoBands,

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type alias for the feature-extraction core
pub type Result<T> = std::result::Result<T, Error>;
