//! Utility modules shared by the update core and the CLI.

pub mod progress;

pub use progress::{ProgressBar, is_progress_disabled};
