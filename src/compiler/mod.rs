//! Two-pass timeline compilation
//!
//! The forward pass turns a fragment's ordered nodes into one carry-forward
//! snapshot per day and computes same-day calculated values. A second
//! forward sweep records disease-stage onsets. The reverse pass then walks
//! the days backwards to fill in labels that depend on the subject's future.

mod derived;
mod forward;
mod known;
mod merge;
mod milestones;
mod reverse;

use std::sync::Arc;

pub use derived::{ckd_epi_2021, meld_na};
pub use merge::{MergeKind, MergeRule};
pub use milestones::Stage;

use crate::config::ReaderConfig;
use crate::fragment::TimelineFragment;
use crate::resolver::{VarId, VariableSet};
use crate::timeline::Timeline;
use crate::variables::PostStepAction;
use derived::DerivedStep;
use known::{KnownIds, OutcomeIds};
use milestones::StageIds;

/// Ids of the labels derived from hospital-course and death trackers
#[derive(Debug, Clone, Copy)]
struct TrackedOutcomes {
    death: OutcomeIds,
    discharge: OutcomeIds,
    rapid_response: OutcomeIds,
    into_icu: OutcomeIds,
    out_of_icu: OutcomeIds,
}

/// Compiles fragments against one resolved variable set
///
/// Everything that depends only on the variable set is looked up once here;
/// `compile` holds no state between subjects.
#[derive(Debug, Clone)]
pub struct TimelineCompiler {
    set: Arc<VariableSet>,
    known: KnownIds,
    derived: Vec<DerivedStep>,
    /// Post-step actions other than `Keep`
    actions: Vec<(VarId, PostStepAction)>,
    stages: [StageIds; Stage::COUNT],
    outcomes: TrackedOutcomes,
    carry_forward: bool,
    log_dropped: bool,
}

impl TimelineCompiler {
    /// Prepare a compiler for a resolved set
    #[must_use]
    pub fn new(set: Arc<VariableSet>, config: &ReaderConfig) -> Self {
        let known = KnownIds::new(&set);
        let derived = derived::plan(&set);
        let actions: Vec<_> = set
            .descriptors()
            .filter(|(_, d)| d.action != PostStepAction::Keep)
            .map(|(id, d)| (id, d.action))
            .collect();
        let stages = Stage::ALL.map(|stage| StageIds::new(&set, stage));
        let outcomes = TrackedOutcomes {
            death: OutcomeIds::new(&set, "Death"),
            discharge: OutcomeIds::new(&set, "Discharge"),
            rapid_response: OutcomeIds::new(&set, "RapidResponse"),
            into_icu: OutcomeIds::new(&set, "TransferIntoICU"),
            out_of_icu: OutcomeIds::new(&set, "TransferOutOfICU"),
        };

        log::debug!(
            "Timeline compiler ready: {} variables, {} calculated, {} with post-step actions",
            set.len(),
            derived.len(),
            actions.len()
        );

        Self {
            set,
            known,
            derived,
            actions,
            stages,
            outcomes,
            carry_forward: config.carry_forward,
            log_dropped: config.log_dropped_values,
        }
    }

    /// The variable set snapshots are laid out by
    #[must_use]
    pub fn variables(&self) -> &Arc<VariableSet> {
        &self.set
    }

    /// Compile one subject's fragment
    ///
    /// Malformed items inside the fragment are dropped; compilation itself
    /// cannot fail.
    #[must_use]
    pub fn compile(&self, fragment: &TimelineFragment) -> Timeline {
        let output = forward::ForwardPass::new(self, &fragment.demographics).run(fragment);
        let mut timeline = output.timeline;

        let final_onsets = milestones::sweep(&mut timeline, &self.known, &self.stages);
        reverse::run(self, &mut timeline, &output.events, &final_onsets);

        log::trace!(
            "Compiled subject {} into {} time points",
            timeline.demographics.subject_id,
            timeline.len()
        );
        timeline
    }
}
