//! A Rust library for compiling and querying TDF clinical timeline files,
//! with partitioned streaming so one file can be split between readers.

pub mod compiler;
pub mod config;
pub mod error;
pub mod fragment;
pub mod functions;
pub mod query;
pub mod reader;
pub mod resolver;
pub mod timeline;
pub mod utils;
pub mod variables;
pub mod writer;

// Re-export the most common types for easier use
// Core types
pub use config::ReaderConfig;
pub use error::{Result, TdfError};
pub use reader::{FilePartition, TdfReader, create_partitions};
pub use writer::TdfWriter;

// Variables and resolution
pub use resolver::{FunctionBank, VarId, VariableRequest, VariableSet};
pub use variables::{DataKind, DescriptorTable, VariableDescriptor, VariableReference};

// Compilation
pub use compiler::TimelineCompiler;
pub use fragment::{TimelineFragment, parse_fragment};
pub use timeline::{Snapshot, TimePoint, Timeline};

// Queries
pub use query::{AlignedSeries, DayValue, ExtractOptions, FilterPredicate, TrailingWindow};
