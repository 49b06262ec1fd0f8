//! Helpers shared by the workflows: sample bookkeeping and the task pool

pub mod basic_functions;
pub mod pool;

pub use basic_functions::{get_fid, list_stratum_images};
pub use pool::run_pool;
