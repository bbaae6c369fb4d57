//! Same-day merge rules
//!
//! Nodes that land on the day of the latest time point are folded into it
//! rather than opening a new one. Outcome and diagnosis dates are imprecise
//! in source data, so each gets its own rule.

/// Why a node joined the latest time point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// The latest time point is on the node's day
    SameDay,
    /// Outcome nodes always join a dated time point
    SloppyOutcome,
    /// A diagnosis data node on the latest dated time point's day
    SameDayDiagnosis,
}

/// How the node being placed is classified for merging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    Event,
    Data,
    Diagnosis,
    Outcome,
}

impl MergeRule {
    /// The rule that lets a node on `day` join the latest time point
    ///
    /// Returns `None` when a new time point must be opened, which is always
    /// the case while the timeline is still empty.
    #[must_use]
    pub fn select(latest_day: Option<i32>, day: i32, kind: MergeKind) -> Option<Self> {
        let latest = latest_day?;
        if kind == MergeKind::Diagnosis && latest >= 0 && latest == day {
            Some(Self::SameDayDiagnosis)
        } else if latest == day {
            Some(Self::SameDay)
        } else if kind == MergeKind::Outcome && latest >= 0 {
            Some(Self::SloppyOutcome)
        } else {
            None
        }
    }
}
