//! Retrieval of remote imagery

pub mod global_variables;
#[cfg(feature = "reqwest")]
pub mod imagery;

pub use global_variables::{DEFAULT_IMAGERY_BASE_URL, DOWNLOAD_TIMEOUT_SECS};
