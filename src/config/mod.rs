//! Configuration for `TdfReader`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TdfError};

/// Smallest read buffer the boundary scanner accepts
pub const MIN_READ_BUFFER_SIZE: usize = 64;

/// Configuration for the `TdfReader`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Seed each new time point with a copy of the previous snapshot
    pub carry_forward: bool,
    /// Report any nonzero extracted result as 1
    pub convert_results_to_bools: bool,
    /// Buffer size for the boundary scanner
    pub read_buffer_size: usize,
    /// Upper bound on the bytes read while looking for the end of the header
    pub max_header_bytes: usize,
    /// Log every data value dropped for being unparseable or out of range
    pub log_dropped_values: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            carry_forward: true,
            convert_results_to_bools: false,
            read_buffer_size: 64 * 1024,
            max_header_bytes: 1024 * 1024,
            log_dropped_values: false,
        }
    }
}

impl ReaderConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that buffer sizes are usable
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size < MIN_READ_BUFFER_SIZE {
            return Err(TdfError::InvalidConfig(format!(
                "read_buffer_size must be at least {MIN_READ_BUFFER_SIZE} bytes, got {}",
                self.read_buffer_size
            )));
        }
        if self.max_header_bytes == 0 {
            return Err(TdfError::InvalidConfig(
                "max_header_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_carry_forward(&mut self, carry_forward: bool) -> &mut Self {
        self.carry_forward = carry_forward;
        self
    }

    pub fn with_convert_results_to_bools(&mut self, convert: bool) -> &mut Self {
        self.convert_results_to_bools = convert;
        self
    }

    pub fn with_read_buffer_size(&mut self, size: usize) -> &mut Self {
        self.read_buffer_size = size;
        self
    }

    pub fn with_max_header_bytes(&mut self, size: usize) -> &mut Self {
        self.max_header_bytes = size;
        self
    }

    pub fn with_log_dropped_values(&mut self, log_dropped: bool) -> &mut Self {
        self.log_dropped_values = log_dropped;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Test default values
    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert!(config.carry_forward);
        assert!(!config.convert_results_to_bools);
        assert_eq!(config.read_buffer_size, 65536);
        assert!(config.validate().is_ok());
    }

    /// Test builder setters chain
    #[test]
    fn test_setters() {
        let mut config = ReaderConfig::default();
        config.with_carry_forward(false).with_read_buffer_size(128);
        assert!(!config.carry_forward);
        assert_eq!(config.read_buffer_size, 128);
    }

    /// Test that a tiny buffer is rejected
    #[test]
    fn test_validate_rejects_small_buffer() {
        let mut config = ReaderConfig::default();
        config.with_read_buffer_size(8);
        assert!(matches!(config.validate(), Err(TdfError::InvalidConfig(_))));
    }

    /// Test loading a partial JSON configuration
    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"carry_forward": false, "log_dropped_values": true}}"#).unwrap();
        let config = ReaderConfig::from_json_file(file.path()).unwrap();
        assert!(!config.carry_forward);
        assert!(config.log_dropped_values);
        assert_eq!(config.max_header_bytes, 1024 * 1024);
    }
}
