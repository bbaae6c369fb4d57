//! Metadata about requested variables

use itertools::Itertools;

use crate::error::{Result, TdfError};
use crate::resolver::VariableSet;
use crate::timeline::FutureCategory;
use crate::variables::{DataKind, DescriptorTable, VariableDescriptor, VariableReference};

/// Zero limit reported when no resolved variable constrains zeros
pub const DEFAULT_MAX_DAYS_WITH_ZERO: u32 = 1024 * 1024;

fn descriptor_of<'t>(
    token: &str,
    table: &'t DescriptorTable,
) -> Result<(VariableReference, &'t VariableDescriptor)> {
    let reference = VariableReference::parse(token, table)?;
    let descriptor = table
        .get(&reference.name)
        .ok_or_else(|| TdfError::UnknownVariable(reference.name.clone()))?;
    Ok((reference, descriptor))
}

/// Data kind of a reference; a function's result kind wins over the base kind
pub fn variable_kind(token: &str, table: &DescriptorTable) -> Result<DataKind> {
    let (reference, descriptor) = descriptor_of(token, table)?;
    Ok(reference
        .function
        .map_or(descriptor.kind, |function| function.result_kind(descriptor.kind)))
}

/// Declared range of a reference's base variable
pub fn min_max(token: &str, table: &DescriptorTable) -> Result<(f64, f64)> {
    let (_, descriptor) = descriptor_of(token, table)?;
    Ok((descriptor.min, descriptor.max))
}

/// Number of output classes a classifier needs for a reference
pub fn num_classes(token: &str, table: &DescriptorTable) -> Result<usize> {
    Ok(match variable_kind(token, table)? {
        DataKind::Boolean => 2,
        DataKind::FutureEventCategory => FutureCategory::COUNT,
        _ => 1,
    })
}

/// Smallest positive zero limit among the resolved variables
#[must_use]
pub fn max_days_with_zero(set: &VariableSet) -> u32 {
    set.descriptors()
        .filter_map(|(_, d)| d.max_days_with_zero)
        .filter(|days| *days > 0)
        .min()
        .unwrap_or(DEFAULT_MAX_DAYS_WITH_ZERO)
}

/// Requested input and result tokens, `;`-joined
#[must_use]
pub fn variable_names(set: &VariableSet) -> String {
    let requested = set.num_inputs() + usize::from(set.result_index().is_some());
    set.entries()
        .iter()
        .take(requested)
        .map(|entry| entry.reference.to_string())
        .join(";")
}
