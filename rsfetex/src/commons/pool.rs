//! Fixed-size worker pool for independent file-level tasks

use anyhow::Result;
#[cfg(feature = "rayon")]
use anyhow::Context;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Run `task` once per item on `workers` threads.
///
/// Results come back in input order. Tasks share nothing but their
/// inputs; a task that fails reports it in its own result and does not
/// stop its siblings.
pub fn run_pool<T, R, F>(items: &[T], workers: usize, task: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = workers.max(1);

    #[cfg(feature = "rayon")]
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .context("Failed to create worker pool")?;
        Ok(pool.install(|| items.par_iter().map(|item| task(item)).collect()))
    }

    #[cfg(not(feature = "rayon"))]
    {
        if workers > 1 {
            tracing::warn!("Built without the rayon feature, running {} tasks sequentially", items.len());
        }
        Ok(items.iter().map(|item| task(item)).collect())
    }
}
