//! Byte-range partitions of a TDF file

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TdfError};

/// A `[start, stop)` byte range
///
/// A timeline belongs to the partition holding its opening marker; the
/// timeline itself may end past `stop`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FilePartition {
    pub start: u64,
    pub stop: u64,
}

impl FilePartition {
    #[must_use]
    pub const fn new(start: u64, stop: u64) -> Self {
        Self { start, stop }
    }

    /// Number of bytes in the range
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.stop.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.stop <= self.start
    }

    /// Whether `offset` falls inside the range
    #[must_use]
    pub const fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.stop
    }
}

/// Split `total` bytes into contiguous partitions of at most `size` bytes
///
/// # Errors
/// Returns `InvalidConfig` when `size` is zero.
pub fn split_range(total: u64, size: u64) -> Result<Vec<FilePartition>> {
    if size == 0 {
        return Err(TdfError::InvalidConfig(
            "partition size must be greater than zero".to_string(),
        ));
    }
    let mut partitions = Vec::new();
    let mut start = 0;
    while start < total {
        let stop = start.saturating_add(size).min(total);
        partitions.push(FilePartition::new(start, stop));
        start = stop;
    }
    Ok(partitions)
}

/// Split a file into contiguous partitions of at most `size` bytes
///
/// # Arguments
/// * `path` - The file to partition
/// * `size` - Maximum bytes per partition
///
/// # Returns
/// Partitions covering the whole file, in file order
pub fn create_partitions(path: &Path, size: u64) -> Result<Vec<FilePartition>> {
    let total = fs::metadata(path)?.len();
    let partitions = split_range(total, size)?;
    log::debug!(
        "Split {} ({total} bytes) into {} partitions",
        path.display(),
        partitions.len()
    );
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test partitions cover the range without gaps or overlap
    #[test]
    fn test_split_range() {
        let partitions = split_range(10, 4).unwrap();
        assert_eq!(
            partitions,
            vec![
                FilePartition::new(0, 4),
                FilePartition::new(4, 8),
                FilePartition::new(8, 10)
            ]
        );
        assert!(split_range(0, 4).unwrap().is_empty());
        assert!(split_range(10, 0).is_err());
    }

    /// Test membership is half-open
    #[test]
    fn test_contains() {
        let partition = FilePartition::new(4, 8);
        assert!(partition.contains(4));
        assert!(partition.contains(7));
        assert!(!partition.contains(8));
        assert_eq!(partition.len(), 4);
    }
}
