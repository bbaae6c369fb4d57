//! Filter predicates over snapshots
//!
//! A filter is a `;`-separated conjunction of `name<relation>value` tests,
//! for example `InHospital=1;Cr.GT.2.0`. Relations may be written
//! symbolically (`=`, `!=`, `<`, `<=`, `>`, `>=`) or in the dotted form
//! (`.EQ.`, `.NEQ.`, `.LT.`, `.LTE.`, `.GT.`, `.GTE.`).

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, TdfError};
use crate::resolver::{VarId, VariableSet};
use crate::timeline::Snapshot;
use crate::variables::{DataKind, is_valid_legacy, split_variable_list};

/// Relational operator of a filter predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// Dotted forms, longest first so `.LTE.` wins over `.LT.`
const DOTTED: [(&str, Relation); 6] = [
    (".NEQ.", Relation::Neq),
    (".LTE.", Relation::Lte),
    (".GTE.", Relation::Gte),
    (".EQ.", Relation::Eq),
    (".LT.", Relation::Lt),
    (".GT.", Relation::Gt),
];

impl Relation {
    /// Parse a symbolic or dotted operator
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(&(_, relation)) = DOTTED.iter().find(|(d, _)| d.eq_ignore_ascii_case(text)) {
            return Some(relation);
        }
        match text {
            "=" | "==" => Some(Self::Eq),
            "!=" | "<>" | "≠" => Some(Self::Neq),
            "<" => Some(Self::Lt),
            "<=" | "≤" => Some(Self::Lte),
            ">" => Some(Self::Gt),
            ">=" | "≥" => Some(Self::Gte),
            _ => None,
        }
    }

    /// Whether an ordering between actual and target satisfies the relation
    #[must_use]
    pub const fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Neq => !matches!(ordering, Ordering::Equal),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Lte => !matches!(ordering, Ordering::Greater),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Gte => !matches!(ordering, Ordering::Less),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Eq => ".EQ.",
            Self::Neq => ".NEQ.",
            Self::Lt => ".LT.",
            Self::Lte => ".LTE.",
            Self::Gt => ".GT.",
            Self::Gte => ".GTE.",
        };
        f.write_str(text)
    }
}

/// One `variable relation value` test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterPredicate {
    pub variable: VarId,
    pub kind: DataKind,
    pub relation: Relation,
    pub value: f64,
}

/// Split `name<op>value` into its three parts
fn split_predicate(text: &str) -> Result<(&str, Relation, &str)> {
    let malformed = |reason: &str| TdfError::MalformedReference {
        token: text.to_string(),
        reason: reason.to_string(),
    };

    let upper = text.to_ascii_uppercase();
    for (dotted, relation) in DOTTED {
        if let Some(at) = upper.find(dotted) {
            return Ok((&text[..at], relation, &text[at + dotted.len()..]));
        }
    }

    let is_op = |c: char| matches!(c, '<' | '>' | '=' | '!' | '≠' | '≤' | '≥');
    let start = text.find(is_op).ok_or_else(|| malformed("no relation"))?;
    let length = text[start..]
        .find(|c: char| !is_op(c))
        .unwrap_or(text.len() - start);
    let op = &text[start..start + length];
    let relation = Relation::parse(op).ok_or_else(|| malformed(&format!("unknown relation '{op}'")))?;
    Ok((&text[..start], relation, &text[start + length..]))
}

/// Base variable names tested by a filter string, for building a request
pub fn predicate_variables(filter: &str) -> Result<Vec<String>> {
    split_variable_list(filter)
        .map(|text| split_predicate(text).map(|(name, _, _)| name.trim().to_string()))
        .collect()
}

impl FilterPredicate {
    /// Parse one predicate against a resolved set
    ///
    /// # Errors
    /// Returns `UnknownVariable` when the variable is not in `set`, and
    /// `MalformedReference` for a missing relation or non-numeric value.
    pub fn parse(text: &str, set: &VariableSet) -> Result<Self> {
        let (name, relation, value) = split_predicate(text)?;
        let name = name.trim();
        let variable = set
            .id(name)
            .ok_or_else(|| TdfError::UnknownVariable(name.to_string()))?;
        let value = value.trim().parse::<f64>().map_err(|_| TdfError::MalformedReference {
            token: text.to_string(),
            reason: format!("'{}' is not a number", value.trim()),
        })?;
        Ok(Self {
            variable,
            kind: set.descriptor(variable).kind,
            relation,
            value,
        })
    }

    /// Parse a `;`-separated conjunction
    pub fn parse_list(filter: &str, set: &VariableSet) -> Result<Vec<Self>> {
        split_variable_list(filter)
            .map(|text| Self::parse(text, set))
            .collect()
    }

    /// Test the predicate against a snapshot
    ///
    /// Absent or invalid values fail. Floats compare as floats; integers and
    /// categories compare truncated. Booleans are tested only by equality,
    /// and every other relation passes for them.
    #[must_use]
    pub fn test(&self, snapshot: &Snapshot) -> bool {
        let Some(actual) = snapshot.number(self.variable).filter(|v| is_valid_legacy(*v)) else {
            return false;
        };
        #[allow(clippy::cast_possible_truncation)]
        let truncated = |v: f64| v.trunc() as i64;
        match self.kind {
            DataKind::Float => actual
                .partial_cmp(&self.value)
                .is_some_and(|ordering| self.relation.holds(ordering)),
            DataKind::Integer | DataKind::FutureEventCategory => self
                .relation
                .holds(truncated(actual).cmp(&truncated(self.value))),
            DataKind::Boolean => {
                self.relation != Relation::Eq || truncated(actual) == truncated(self.value)
            }
            DataKind::StringList => false,
        }
    }
}

/// Whether a snapshot passes every predicate
#[must_use]
pub fn evaluate_filter(predicates: &[FilterPredicate], snapshot: &Snapshot) -> bool {
    predicates.iter().all(|p| p.test(snapshot))
}
