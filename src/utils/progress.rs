//! Progress indicators for downloads
//!
//! Wraps `indicatif` with upkeep styling. Bars are hidden when the caller asks
//! for it (the `hide_progress_bar` setting) or when `UPKEEP_NO_PROGRESS` is
//! set, so scripted runs and CI logs stay clean.
//!
//! # Examples
//!
//! ```rust
//! use upkeep_cli::utils::progress::ProgressBar;
//!
//! let progress = ProgressBar::download(Some(1024), true);
//! progress.set_prefix("nuclei_linux_amd64.zip");
//! progress.inc(512);
//! progress.inc(512);
//! progress.finish_and_clear();
//! ```

use std::time::Duration;

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};

use crate::constants::NO_PROGRESS_ENV;

/// Checks if progress bars are disabled through the environment.
///
/// ```bash
/// export UPKEEP_NO_PROGRESS=1
/// upkeep update nuclei --current-version 3.0.0   # no progress bar
/// ```
pub fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// A progress indicator with upkeep styling.
///
/// Hidden bars silently ignore every call, so callers never branch on
/// whether progress is visible.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Creates a byte-counting bar for a download.
    ///
    /// With an unknown length (no `Content-Length`) a spinner is shown
    /// instead. `hidden` forces a hidden bar regardless of the environment.
    #[must_use]
    pub fn download(len: Option<u64>, hidden: bool) -> Self {
        if hidden || is_progress_disabled() {
            return Self {
                inner: IndicatifBar::hidden(),
            };
        }

        let bar = match len {
            Some(len) => {
                let bar = IndicatifBar::new(len);
                bar.set_style(download_style());
                bar
            }
            None => {
                let bar = IndicatifBar::new_spinner();
                bar.set_style(spinner_style());
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        };
        Self {
            inner: bar,
        }
    }

    /// Sets the label shown before the bar (usually the asset name).
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.inner.set_prefix(prefix.into());
    }

    /// Advances by `delta` bytes.
    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    /// Current position in bytes.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Whether the bar is hidden.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }

    /// Finishes and removes the bar from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

// Templates are constants, a parse failure falls back to indicatif's default
fn download_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .map(|style| style.progress_chars("━╸━"))
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {bytes}")
        .map(|style| style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
}
