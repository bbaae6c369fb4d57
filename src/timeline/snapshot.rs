//! Copy-on-write variable snapshots

use std::sync::Arc;

use crate::resolver::VarId;

/// A snapshot value: numbers for most kinds, text for string-list variables
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(Arc<str>),
}

impl Value {
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(t) => Some(t),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(Arc::from(value))
    }
}

/// Fixed-size slot array indexed by `VarId`
///
/// Clones share storage; the slots are copied on the first write after a
/// clone.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    slots: Arc<Vec<Option<Value>>>,
}

impl Snapshot {
    /// Snapshot with every slot absent
    #[must_use]
    pub fn empty(len: usize) -> Self {
        Self {
            slots: Arc::new(vec![None; len]),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: VarId) -> Option<&Value> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Numeric value of a slot; text values read as absent
    #[must_use]
    pub fn number(&self, id: VarId) -> Option<f64> {
        self.get(id).and_then(Value::as_number)
    }

    /// Numeric value of an optional slot, for ids that may not be resolved
    #[must_use]
    pub fn number_of(&self, id: Option<VarId>) -> Option<f64> {
        id.and_then(|id| self.number(id))
    }

    #[must_use]
    pub fn text(&self, id: VarId) -> Option<&str> {
        self.get(id).and_then(Value::as_text)
    }

    pub fn set(&mut self, id: VarId, value: Option<Value>) {
        Arc::make_mut(&mut self.slots)[id.index()] = value;
    }

    pub fn set_number(&mut self, id: VarId, value: f64) {
        self.set(id, Some(Value::Number(value)));
    }

    /// Write a number when the id is resolved
    pub fn put(&mut self, id: Option<VarId>, value: f64) {
        if let Some(id) = id {
            self.set_number(id, value);
        }
    }

    /// Clear a slot when the id is resolved
    pub fn clear(&mut self, id: Option<VarId>) {
        if let Some(id) = id {
            if self.get(id).is_some() {
                self.set(id, None);
            }
        }
    }

    /// Whether two snapshots still share one slot array
    #[must_use]
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slots, &other.slots)
    }

    /// Present slots in id order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }
}
