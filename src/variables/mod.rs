//! Variable vocabulary: descriptors and the reference grammar
//!
//! Every value a timeline can hold is described by a `VariableDescriptor`.
//! Callers name variables with tokens such as `Cr`, `Cr[-7:-1]` or
//! `Cr.rate30`, which parse into a `VariableReference`.

pub mod descriptor;
pub mod reference;

pub use descriptor::{ANY_PREDICTED_VALUE, DataKind, DescriptorTable, PostStepAction, VariableDescriptor};
pub use reference::{RangeMode, VariableReference, split_variable_list};

/// Legacy "no value" marker shared by the integer, float and bool encodings
pub const LEGACY_NO_VALUE: f64 = -314_159.0;

/// Any legacy number at or below this is treated as invalid
pub const INVALID_THRESHOLD: f64 = -1000.0;

/// Pseudo-variable that reports the day gap between extracted rows
pub const DAYS_SINCE_PREV: &str = "DaysSincePrev";

/// Whether a legacy numeric value carries data
#[must_use]
pub fn is_valid_legacy(value: f64) -> bool {
    value.is_finite() && value > INVALID_THRESHOLD
}
