//! Variable descriptors and the lookup table that holds them

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::INVALID_THRESHOLD;
use crate::error::Result;

/// Bundled vocabulary used by the medicine timeline files
const MEDICINE_VOCABULARY: &str = include_str!("../../resources/medicine_vocabulary.json");

/// Marker in `future_predicted_value` meaning any time point counts toward the trailing window
pub const ANY_PREDICTED_VALUE: &str = "ANY";

/// Data kind of a variable's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    #[serde(rename = "int")]
    Integer,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "bool")]
    Boolean,
    /// A bucketed time-to-event label (see `FutureCategory`)
    #[serde(rename = "future_event_class")]
    FutureEventCategory,
    /// Free text accumulated from event values
    #[serde(rename = "string_list")]
    StringList,
}

/// What happens to a carried-forward value when a new time point starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStepAction {
    /// Carry the value forward unchanged
    #[default]
    Keep,
    /// Mark the value absent
    Invalidate,
    /// Reset the value to zero
    Zero,
    /// Clear text values
    ClearAbsent,
    /// Remove the value from the new snapshot
    Drop,
}

/// Static description of one variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    pub name: String,
    pub kind: DataKind,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub action: PostStepAction,
    /// Computed by the compiler rather than read from data nodes
    #[serde(default)]
    pub calculated: bool,
    /// Daily drug dose, counted by the CYP inducer/inhibitor totals
    #[serde(default)]
    pub is_drug: bool,
    #[serde(default)]
    pub dependencies: SmallVec<[String; 4]>,
    /// Variable whose last occurrence ends the usable range, or `ANY`
    #[serde(default)]
    pub future_predicted_value: Option<String>,
    /// Days of lookahead the value needs before it is trustworthy
    #[serde(default)]
    pub future_days_needed: u32,
    /// A zero is treated as missing when the last nonzero value is older than this
    #[serde(default)]
    pub max_days_with_zero: Option<u32>,
}

impl VariableDescriptor {
    /// Create a descriptor with the default action and no dependencies
    #[must_use]
    pub fn new(name: &str, kind: DataKind, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            kind,
            min,
            max,
            action: PostStepAction::Keep,
            calculated: false,
            is_drug: false,
            dependencies: SmallVec::new(),
            future_predicted_value: None,
            future_days_needed: 0,
            max_days_with_zero: None,
        }
    }

    #[must_use]
    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| (*d).to_string()).collect();
        self
    }

    #[must_use]
    pub const fn with_action(mut self, action: PostStepAction) -> Self {
        self.action = action;
        self
    }

    /// Clamp a value into `[min, max]`
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    /// Validate and clamp a raw value read from a data node
    ///
    /// Returns `None` for values at or below the invalid threshold, and for
    /// values at least ten times the declared maximum.
    #[must_use]
    pub fn sanitize(&self, raw: f64) -> Option<f64> {
        if !raw.is_finite() || raw <= INVALID_THRESHOLD {
            return None;
        }
        if self.max > 0.0 && raw >= 10.0 * self.max {
            return None;
        }
        Some(self.clamp(raw))
    }

    /// Whether the extraction range must stop short of the end of the record
    #[must_use]
    pub fn needs_lookahead(&self) -> bool {
        self.future_predicted_value.is_some() || self.future_days_needed > 0
    }
}

/// Read-only lookup from variable name to descriptor
#[derive(Debug, Clone, Default)]
pub struct DescriptorTable {
    descriptors: Vec<VariableDescriptor>,
    index: FxHashMap<String, usize>,
}

impl DescriptorTable {
    /// Load the bundled medicine vocabulary
    pub fn medicine() -> Result<Self> {
        Self::from_json_str(MEDICINE_VOCABULARY)
    }

    /// Load a table from a JSON array of descriptors
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let descriptors: Vec<VariableDescriptor> =
            serde_json::from_reader(BufReader::new(file))?;
        Ok(descriptors.into_iter().collect())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let descriptors: Vec<VariableDescriptor> = serde_json::from_str(json)?;
        Ok(descriptors.into_iter().collect())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VariableDescriptor> {
        self.index.get(name).map(|&i| &self.descriptors[i])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Variable names in table order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl FromIterator<VariableDescriptor> for DescriptorTable {
    /// Later descriptors with a duplicate name replace earlier ones
    fn from_iter<I: IntoIterator<Item = VariableDescriptor>>(iter: I) -> Self {
        let mut table = Self::default();
        for descriptor in iter {
            if let Some(&existing) = table.index.get(&descriptor.name) {
                table.descriptors[existing] = descriptor;
            } else {
                table
                    .index
                    .insert(descriptor.name.clone(), table.descriptors.len());
                table.descriptors.push(descriptor);
            }
        }
        table
    }
}
