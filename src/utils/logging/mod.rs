//! Logging utilities for output and progress tracking

pub mod log;
pub mod progress;

pub use log::{ScanSummary, log_scan_complete, log_scan_start};
pub use progress::{create_main_progress_bar, create_spinner, finish_progress_bar};
