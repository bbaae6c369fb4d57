//! Log lines for timeline scans

use std::path::Path;
use std::time::Duration;

use crate::reader::FilePartition;

/// Totals gathered while walking the timelines of a file or partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub timelines: usize,
    pub time_points: usize,
    /// Aligned rows extracted, when the scan extracts series
    pub rows: usize,
}

impl ScanSummary {
    /// Count one compiled timeline
    pub fn add_timeline(&mut self, time_points: usize, rows: usize) {
        self.timelines += 1;
        self.time_points += time_points;
        self.rows += rows;
    }

    /// Combine the totals of two partitions
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            timelines: self.timelines + other.timelines,
            time_points: self.time_points + other.time_points,
            rows: self.rows + other.rows,
        }
    }

    /// Mean number of time points per timeline
    #[must_use]
    pub fn points_per_timeline(&self) -> Option<f64> {
        #[allow(clippy::cast_precision_loss)]
        (self.timelines > 0).then(|| self.time_points as f64 / self.timelines as f64)
    }
}

/// Log the start of a scan over a whole file or one partition of it
///
/// # Arguments
/// * `operation` - Description of the scan
/// * `path` - The TDF file
/// * `partition` - Byte range the scan is bounded by, if any
pub fn log_scan_start(operation: &str, path: &Path, partition: Option<FilePartition>) {
    match partition {
        Some(p) => log::info!(
            "{operation} {} bytes [{}, {})",
            path.display(),
            p.start,
            p.stop
        ),
        None => log::info!("{operation} {}", path.display()),
    }
}

/// Log the totals of a finished scan
///
/// An empty scan is logged as a warning, since it usually means the file
/// has no `<TL>` elements or the partition size is wrong.
pub fn log_scan_complete(
    operation: &str,
    path: &Path,
    summary: &ScanSummary,
    elapsed: Option<Duration>,
) {
    if summary.timelines == 0 {
        log::warn!("No timelines {operation} from {}", path.display());
        return;
    }

    let elapsed = elapsed.map(|d| format!(" in {d:?}")).unwrap_or_default();
    match summary.points_per_timeline() {
        Some(mean) if summary.time_points > 0 => log::info!(
            "Successfully {operation} {} timelines from {}{elapsed} ({} time points, {mean:.1} per timeline, {} aligned rows)",
            summary.timelines,
            path.display(),
            summary.time_points,
            summary.rows
        ),
        _ => log::info!(
            "Successfully {operation} {} timelines from {}{elapsed}",
            summary.timelines,
            path.display()
        ),
    }
}
