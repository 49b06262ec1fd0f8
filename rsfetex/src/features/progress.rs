//! Progress reporting for long extraction runs
//!
//! Reporters only observe the run; nothing they do feeds back into the
//! feature table.

#[cfg(feature = "indicatif")]
use indicatif::{ProgressBar, ProgressStyle};

pub trait ProgressReporter: Sync {
    fn start(&self, _total: usize) {}

    /// Called once per visited identifier, dropped segments included.
    fn advance(&self, processed: usize, total: usize, id: i64);

    fn finish(&self) {}
}

/// Closures receive `(processed, total, id)`.
impl<F> ProgressReporter for F
where
    F: Fn(usize, usize, i64) + Sync,
{
    fn advance(&self, processed: usize, total: usize, id: i64) {
        self(processed, total, id)
    }
}

/// Silent reporter
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn advance(&self, _processed: usize, _total: usize, _id: i64) {}
}

/// Logs a percentage line every `every` identifiers
#[derive(Debug, Clone, Copy)]
pub struct LogProgress {
    pub every: usize,
}

impl Default for LogProgress {
    fn default() -> Self {
        LogProgress { every: 100 }
    }
}

pub fn percent(processed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (100.0 * processed as f64 / total as f64).round()
}

impl ProgressReporter for LogProgress {
    fn start(&self, total: usize) {
        tracing::info!("{} segments to process", total);
    }

    fn advance(&self, processed: usize, total: usize, id: i64) {
        if self.every > 0 && (processed % self.every == 0 || processed == total) {
            tracing::info!(
                "Segments processed: {} (last id {}), {} %",
                processed,
                id,
                percent(processed, total)
            );
        }
    }
}

#[cfg(feature = "indicatif")]
pub(crate) fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {percent}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Terminal progress bar
#[cfg(feature = "indicatif")]
pub struct BarProgress {
    bar: ProgressBar,
}

#[cfg(feature = "indicatif")]
impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(progress_style());
        bar.set_message("Segments");
        BarProgress { bar }
    }
}

#[cfg(feature = "indicatif")]
impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "indicatif")]
impl ProgressReporter for BarProgress {
    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.tick();
    }

    fn advance(&self, _processed: usize, _total: usize, _id: i64) {
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_with_message("All segments processed");
    }
}
