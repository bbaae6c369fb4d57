//! Dependency resolution for requested variables
//!
//! A request names input, result and filter variables. Resolution parses
//! each token, pulls in every variable those depend on (recursively, once
//! each), interns every base name to a `VarId`, and rejects cyclic
//! descriptor graphs.

use std::collections::VecDeque;

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::error::{Result, TdfError};
use crate::functions::{FunctionSpec, WindowFunction};
use crate::variables::{
    ANY_PREDICTED_VALUE, DescriptorTable, VariableDescriptor, VariableReference, split_variable_list,
};

/// Dense id of a resolved base variable; indexes snapshot slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u16);

impl VarId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }
}

/// Variables a caller wants available on the compiled timeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableRequest {
    pub inputs: Vec<String>,
    pub result: Option<String>,
    pub filter_variables: Vec<String>,
}

impl VariableRequest {
    /// Build a request from a `;`-separated input list and a result token
    ///
    /// An empty result token means no result variable.
    #[must_use]
    pub fn new(inputs: &str, result: &str) -> Self {
        let result = result.trim();
        Self {
            inputs: split_variable_list(inputs).map(str::to_string).collect(),
            result: (!result.is_empty()).then(|| result.to_string()),
            filter_variables: Vec::new(),
        }
    }

    /// Add variables that filters will test
    #[must_use]
    pub fn with_filter_variables(mut self, names: &str) -> Self {
        self.filter_variables
            .extend(split_variable_list(names).map(str::to_string));
        self
    }
}

/// Why an entry is in the resolved set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRole {
    Input,
    Result,
    Filter,
    Dependency,
}

/// One requested or pulled-in reference, bound to its interned id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub reference: VariableReference,
    pub id: VarId,
    pub role: EntryRole,
}

/// The "zero means missing after N days" rule taken from the first constrained variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZeroLimit {
    /// Index into the resolved entries
    pub entry: usize,
    pub max_days: u32,
}

/// Result of dependency resolution
#[derive(Debug, Clone)]
pub struct VariableSet {
    descriptors: Vec<VariableDescriptor>,
    index: FxHashMap<String, VarId>,
    entries: Vec<ResolvedEntry>,
    num_inputs: usize,
    result_entry: Option<usize>,
    zero_limit: Option<ZeroLimit>,
}

impl VariableSet {
    /// Resolve a request against a descriptor table
    ///
    /// # Errors
    /// Returns a configuration error for unknown names or functions,
    /// malformed tokens, dependencies without descriptors and cyclic
    /// dependency graphs.
    pub fn resolve(table: &DescriptorTable, request: &VariableRequest) -> Result<Self> {
        let mut set = Self {
            descriptors: Vec::new(),
            index: FxHashMap::default(),
            entries: Vec::new(),
            num_inputs: 0,
            result_entry: None,
            zero_limit: None,
        };

        let requested = request
            .inputs
            .iter()
            .map(|t| (t, EntryRole::Input))
            .chain(request.result.iter().map(|t| (t, EntryRole::Result)))
            .chain(request.filter_variables.iter().map(|t| (t, EntryRole::Filter)));

        let mut worklist = VecDeque::new();
        for (token, role) in requested {
            let reference = VariableReference::parse(token, table)?;
            let (id, is_new) = set.intern(&reference.name, table, None)?;
            if is_new {
                worklist.push_back(id);
            }
            match role {
                EntryRole::Input => set.num_inputs += 1,
                EntryRole::Result => set.result_entry = Some(set.entries.len()),
                EntryRole::Filter | EntryRole::Dependency => {}
            }
            set.entries.push(ResolvedEntry { reference, id, role });
        }

        while let Some(id) = worklist.pop_front() {
            let descriptor = &set.descriptors[id.index()];
            let mut dependencies = descriptor.dependencies.clone();
            // The lookahead cutoff reads the predicted variable
            if let Some(predicted) = descriptor
                .future_predicted_value
                .as_ref()
                .filter(|p| *p != ANY_PREDICTED_VALUE)
            {
                dependencies.push(predicted.clone());
            }
            let required_by = descriptor.name.clone();
            for dependency in dependencies.iter().unique() {
                let (dep_id, is_new) = set.intern(dependency, table, Some(&required_by))?;
                if is_new {
                    worklist.push_back(dep_id);
                    set.entries.push(ResolvedEntry {
                        reference: VariableReference::current(dependency),
                        id: dep_id,
                        role: EntryRole::Dependency,
                    });
                }
            }
        }

        set.check_acyclic()?;

        set.zero_limit = set.entries.iter().enumerate().find_map(|(entry, e)| {
            set.descriptors[e.id.index()]
                .max_days_with_zero
                .map(|max_days| ZeroLimit { entry, max_days })
        });

        log::debug!(
            "Resolved {} requested entries into {} variables",
            set.num_inputs + usize::from(set.result_entry.is_some()),
            set.descriptors.len()
        );
        Ok(set)
    }

    /// Intern `name`, returning its id and whether it was new
    fn intern(
        &mut self,
        name: &str,
        table: &DescriptorTable,
        required_by: Option<&str>,
    ) -> Result<(VarId, bool)> {
        if let Some(&id) = self.index.get(name) {
            return Ok((id, false));
        }
        let descriptor = table.get(name).ok_or_else(|| match required_by {
            Some(parent) => TdfError::MissingDescriptor {
                dependency: name.to_string(),
                required_by: parent.to_string(),
            },
            None => TdfError::UnknownVariable(name.to_string()),
        })?;
        let raw = u16::try_from(self.descriptors.len()).map_err(|_| {
            TdfError::InvalidConfig(format!("more than {} resolved variables", u16::MAX))
        })?;
        let id = VarId(raw);
        self.index.insert(name.to_string(), id);
        self.descriptors.push(descriptor.clone());
        Ok((id, true))
    }

    /// Three-colour depth-first search over the resolved dependency graph
    fn check_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Colour {
            White,
            Grey,
            Black,
        }

        fn visit(
            set: &VariableSet,
            id: VarId,
            colours: &mut [Colour],
            path: &mut Vec<VarId>,
        ) -> Result<()> {
            colours[id.index()] = Colour::Grey;
            path.push(id);
            for dependency in &set.descriptors[id.index()].dependencies {
                let Some(dep) = set.id(dependency) else {
                    continue;
                };
                match colours[dep.index()] {
                    Colour::Grey => {
                        let start = path.iter().position(|&p| p == dep).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            path[start..].iter().map(|&p| set.name(p).to_string()).collect();
                        cycle.push(set.name(dep).to_string());
                        return Err(TdfError::DependencyCycle(cycle));
                    }
                    Colour::White => visit(set, dep, colours, path)?,
                    Colour::Black => {}
                }
            }
            path.pop();
            colours[id.index()] = Colour::Black;
            Ok(())
        }

        let mut colours = vec![Colour::White; self.descriptors.len()];
        let mut path = Vec::new();
        for raw in 0..self.descriptors.len() {
            #[allow(clippy::cast_possible_truncation)]
            let id = VarId(raw as u16);
            if colours[raw] == Colour::White {
                visit(self, id, &mut colours, &mut path)?;
            }
        }
        Ok(())
    }

    /// Id of a resolved base variable
    #[must_use]
    pub fn id(&self, name: &str) -> Option<VarId> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn name(&self, id: VarId) -> &str {
        &self.descriptors[id.index()].name
    }

    #[must_use]
    pub fn descriptor(&self, id: VarId) -> &VariableDescriptor {
        &self.descriptors[id.index()]
    }

    /// Number of distinct resolved base variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Resolved base names in id order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.name.as_str())
    }

    /// Every resolved id with its descriptor
    pub fn descriptors(&self) -> impl Iterator<Item = (VarId, &VariableDescriptor)> {
        self.descriptors.iter().enumerate().map(|(i, d)| {
            #[allow(clippy::cast_possible_truncation)]
            let id = VarId(i as u16);
            (id, d)
        })
    }

    /// All entries: inputs, then the result, then filters, then dependencies
    #[must_use]
    pub fn entries(&self) -> &[ResolvedEntry] {
        &self.entries
    }

    #[must_use]
    pub fn inputs(&self) -> &[ResolvedEntry] {
        &self.entries[..self.num_inputs]
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    #[must_use]
    pub fn result_index(&self) -> Option<usize> {
        self.result_entry
    }

    #[must_use]
    pub fn result(&self) -> Option<&ResolvedEntry> {
        self.result_entry.map(|i| &self.entries[i])
    }

    #[must_use]
    pub const fn zero_limit(&self) -> Option<ZeroLimit> {
        self.zero_limit
    }

    /// Descriptors flagged as calculated, in id order
    pub fn calculated(&self) -> impl Iterator<Item = (VarId, &VariableDescriptor)> {
        self.descriptors().filter(|(_, d)| d.calculated)
    }
}

/// Function states for one reader, one per distinct `(variable, function)` pair
///
/// A state is fed at most once per time point; repeated requests for the
/// same time point return the cached output.
#[derive(Debug)]
pub struct FunctionBank {
    states: Vec<FunctionState>,
    slot_of_entry: Vec<Option<usize>>,
}

#[derive(Debug)]
struct FunctionState {
    function: Box<dyn WindowFunction>,
    last: Option<(usize, Option<f64>)>,
}

impl FunctionBank {
    /// Instantiate the functions named by a resolved set's entries
    #[must_use]
    pub fn for_set(set: &VariableSet) -> Self {
        let mut slots: FxHashMap<(VarId, FunctionSpec), usize> = FxHashMap::default();
        let mut states = Vec::new();
        let slot_of_entry = set
            .entries()
            .iter()
            .map(|entry| {
                let spec = entry.reference.function?;
                let slot = *slots.entry((entry.id, spec)).or_insert_with(|| {
                    states.push(FunctionState {
                        function: spec.instantiate(),
                        last: None,
                    });
                    states.len() - 1
                });
                Some(slot)
            })
            .collect();
        Self {
            states,
            slot_of_entry,
        }
    }

    /// Number of distinct function states
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Function state slot for an entry, if the entry names a function
    #[must_use]
    pub fn slot(&self, entry: usize) -> Option<usize> {
        self.slot_of_entry.get(entry).copied().flatten()
    }

    /// Feed an observation from time point `point` into a slot
    pub fn compute(&mut self, slot: usize, point: usize, value: f64, day: i32) -> Option<f64> {
        let state = &mut self.states[slot];
        if let Some((seen, output)) = state.last {
            if seen == point {
                return output;
            }
        }
        let output = state.function.compute(value, day);
        state.last = Some((point, output));
        output
    }

    /// Reset every state before traversing another subject
    pub fn reset(&mut self) {
        for state in &mut self.states {
            state.function.reset();
            state.last = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{DataKind, VariableDescriptor};

    fn table() -> DescriptorTable {
        vec![
            VariableDescriptor::new("Cr", DataKind::Float, 0.5, 6.0),
            VariableDescriptor::new("IsMale", DataKind::Boolean, 0.0, 1.0),
            VariableDescriptor::new("AgeInYrs", DataKind::Integer, 18.0, 80.0),
            VariableDescriptor::new("GFR", DataKind::Float, 5.0, 60.0)
                .with_dependencies(&["Cr", "AgeInYrs", "IsMale"]),
            VariableDescriptor::new("StartCKD5Date", DataKind::Integer, 0.0, 1.0)
                .with_dependencies(&["GFR"]),
            VariableDescriptor::new("Future_Boolean_CKD5", DataKind::Boolean, 0.0, 1.0)
                .with_dependencies(&["GFR", "StartCKD5Date"]),
        ]
        .into_iter()
        .collect()
    }

    /// Test dependencies are pulled in transitively and only once
    #[test]
    fn test_transitive_dependencies() {
        let set = VariableSet::resolve(&table(), &VariableRequest::new("Cr;GFR", "Future_Boolean_CKD5"))
            .unwrap();
        let names: Vec<&str> = set.names().collect();
        assert_eq!(names, vec!["Cr", "GFR", "Future_Boolean_CKD5", "AgeInYrs", "IsMale", "StartCKD5Date"]);
        assert_eq!(set.num_inputs(), 2);
        assert_eq!(set.result().unwrap().reference.name, "Future_Boolean_CKD5");
    }

    /// Test resolution is idempotent and duplicate-free
    #[test]
    fn test_idempotent_and_duplicate_free() {
        let request = VariableRequest::new("GFR;Cr.rate7;Cr.rate30;Cr", "GFR");
        let first = VariableSet::resolve(&table(), &request).unwrap();
        let second = VariableSet::resolve(&table(), &request).unwrap();
        assert_eq!(first.names().collect::<Vec<_>>(), second.names().collect::<Vec<_>>());
        assert_eq!(first.entries(), second.entries());

        let names: Vec<&str> = first.names().collect();
        assert_eq!(names.iter().unique().count(), names.len());
        let plain_dependencies = first
            .entries()
            .iter()
            .filter(|e| e.role == EntryRole::Dependency)
            .map(|e| e.reference.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(plain_dependencies.iter().unique().count(), plain_dependencies.len());
        assert!(!plain_dependencies.contains(&"Cr"));
    }

    /// Test one function state per distinct pair
    #[test]
    fn test_function_bank_slots() {
        let request = VariableRequest::new("Cr.rate7;Cr.rate30;Cr.rate7", "");
        let set = VariableSet::resolve(&table(), &request).unwrap();
        let mut bank = FunctionBank::for_set(&set);
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.slot(0), bank.slot(2));
        assert_ne!(bank.slot(0), bank.slot(1));

        let slot = bank.slot(0).unwrap();
        assert_eq!(bank.compute(slot, 0, 1.0, 0), None);
        let first = bank.compute(slot, 1, 2.0, 1);
        assert_eq!(bank.compute(slot, 1, 2.0, 1), first);
        bank.reset();
        assert_eq!(bank.compute(slot, 1, 2.0, 1), None);
    }

    /// Test a cycle in the descriptor graph is rejected
    #[test]
    fn test_cycle_rejected() {
        let cyclic: DescriptorTable = vec![
            VariableDescriptor::new("A", DataKind::Float, 0.0, 1.0).with_dependencies(&["B"]),
            VariableDescriptor::new("B", DataKind::Float, 0.0, 1.0).with_dependencies(&["C"]),
            VariableDescriptor::new("C", DataKind::Float, 0.0, 1.0).with_dependencies(&["A"]),
        ]
        .into_iter()
        .collect();
        let err = VariableSet::resolve(&cyclic, &VariableRequest::new("A", "")).unwrap_err();
        match err {
            TdfError::DependencyCycle(path) => assert_eq!(path, vec!["A", "B", "C", "A"]),
            other => panic!("unexpected error {other}"),
        }
    }

    /// Test a dependency without a descriptor is a structural error
    #[test]
    fn test_missing_dependency() {
        let broken: DescriptorTable = vec![
            VariableDescriptor::new("A", DataKind::Float, 0.0, 1.0).with_dependencies(&["Ghost"]),
        ]
        .into_iter()
        .collect();
        let err = VariableSet::resolve(&broken, &VariableRequest::new("A", "")).unwrap_err();
        assert!(matches!(err, TdfError::MissingDescriptor { dependency, .. } if dependency == "Ghost"));
    }

    /// Test the first constrained variable supplies the zero limit
    #[test]
    fn test_zero_limit() {
        let mut vanc = VariableDescriptor::new("VancDose", DataKind::Float, 500.0, 4000.0);
        vanc.max_days_with_zero = Some(3);
        let t: DescriptorTable = vec![VariableDescriptor::new("Cr", DataKind::Float, 0.5, 6.0), vanc]
            .into_iter()
            .collect();
        let set = VariableSet::resolve(&t, &VariableRequest::new("Cr;VancDose", "Cr")).unwrap();
        assert_eq!(set.zero_limit(), Some(ZeroLimit { entry: 1, max_days: 3 }));
    }
}
