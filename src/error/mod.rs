//! Error handling for the TDF timeline engine.
//!
//! Only configuration problems, structural corruption and I/O failures are
//! errors. Malformed individual data items are dropped where they are read,
//! and missing data is represented as `None`.

use std::io;

/// Specialized error type for timeline reading, compilation and queries
#[derive(Debug, thiserror::Error)]
pub enum TdfError {
    /// Error opening, reading or seeking the underlying stream
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error tokenizing a header or timeline fragment
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Error decoding an element attribute
    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// Error loading a JSON descriptor table or configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A variable token names a base variable that has no descriptor
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// A variable token names a derived function that does not exist
    #[error("Unknown function '{function}' in '{token}'")]
    UnknownFunction {
        /// The function name as written
        function: String,
        /// The full variable token
        token: String,
    },

    /// A variable token does not follow the reference grammar
    #[error("Malformed variable reference '{token}': {reason}")]
    MalformedReference {
        /// The full variable token
        token: String,
        /// What is wrong with it
        reason: String,
    },

    /// The descriptor dependency graph contains a cycle
    #[error("Dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// A dependency pulled in during expansion has no descriptor
    #[error("Variable '{dependency}' required by '{required_by}' has no descriptor")]
    MissingDescriptor {
        /// The dependency name
        dependency: String,
        /// The variable that declared the dependency
        required_by: String,
    },

    /// An element the format requires is absent
    #[error("Missing element: {0}")]
    MissingElement(String),

    /// The file header could not be located or parsed
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TdfError {
    /// Whether this error is a configuration problem rather than a data or stream problem
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownVariable(_)
                | Self::UnknownFunction { .. }
                | Self::MalformedReference { .. }
                | Self::DependencyCycle(_)
                | Self::MissingDescriptor { .. }
                | Self::InvalidConfig(_)
        )
    }
}

/// Result type for TDF operations
pub type Result<T> = std::result::Result<T, TdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that configuration errors are classified as such
    #[test]
    fn test_configuration_classification() {
        assert!(TdfError::UnknownVariable("Foo".into()).is_configuration());
        assert!(TdfError::DependencyCycle(vec!["A".into(), "B".into(), "A".into()]).is_configuration());
        assert!(!TdfError::MissingElement("TL".into()).is_configuration());
    }

    /// Test the cycle message lists the path
    #[test]
    fn test_cycle_display() {
        let err = TdfError::DependencyCycle(vec!["A".into(), "B".into(), "A".into()]);
        assert_eq!(err.to_string(), "Dependency cycle: A -> B -> A");
    }
}
