//! Shared helpers for the library and the command-line driver

pub mod logging;

pub use logging::{
    ScanSummary, create_main_progress_bar, create_spinner, finish_progress_bar, log_scan_complete,
    log_scan_start,
};
