//! Stage-onset milestones
//!
//! A second forward sweep over the finished snapshots records, for each
//! disease stage, the first day of the episode the subject is currently in.
//! Leaving a stage clears its onset, so a transient worsening never leaves a
//! stale onset date behind.

use crate::compiler::known::{Known, KnownIds, OutcomeIds};
use crate::resolver::{VarId, VariableSet};
use crate::timeline::Timeline;

/// A rung on the CKD or MELD ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ckd5,
    Ckd4,
    Ckd3b,
    Ckd3a,
    Meld40,
    Meld30,
    Meld20,
    Meld10,
}

/// Onset day per stage, indexed like `Stage::ALL`
pub type Onsets = [Option<i32>; Stage::COUNT];

impl Stage {
    pub const COUNT: usize = 8;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Ckd5,
        Self::Ckd4,
        Self::Ckd3b,
        Self::Ckd3a,
        Self::Meld40,
        Self::Meld30,
        Self::Meld20,
        Self::Meld10,
    ];

    /// Label used in variable names (`StartCKD5Date`, `Future_Boolean_MELD40`)
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ckd5 => "CKD5",
            Self::Ckd4 => "CKD4",
            Self::Ckd3b => "CKD3b",
            Self::Ckd3a => "CKD3a",
            Self::Meld40 => "MELD40",
            Self::Meld30 => "MELD30",
            Self::Meld20 => "MELD20",
            Self::Meld10 => "MELD10",
        }
    }

    const fn source(self) -> Known {
        match self {
            Self::Ckd5 | Self::Ckd4 | Self::Ckd3b | Self::Ckd3a => Known::Gfr,
            Self::Meld40 | Self::Meld30 | Self::Meld20 | Self::Meld10 => Known::Meld,
        }
    }

    /// Whether a score is in this stage; lower GFR and higher MELD are worse
    #[must_use]
    pub fn is_met(self, score: f64) -> bool {
        match self {
            Self::Ckd5 => score < 15.0,
            Self::Ckd4 => score < 30.0,
            Self::Ckd3b => score < 45.0,
            Self::Ckd3a => score < 60.0,
            Self::Meld40 => score >= 40.0,
            Self::Meld30 => score >= 30.0,
            Self::Meld20 => score >= 20.0,
            Self::Meld10 => score >= 10.0,
        }
    }
}

/// Variables written for one stage
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StageIds {
    pub start_date: Option<VarId>,
    pub future: OutcomeIds,
    pub within_two_years: Option<VarId>,
    pub within_five_years: Option<VarId>,
}

impl StageIds {
    pub(crate) fn new(set: &VariableSet, stage: Stage) -> Self {
        let label = stage.label();
        Self {
            start_date: set.id(&format!("Start{label}Date")),
            future: OutcomeIds::new(set, label),
            within_two_years: set.id(&format!("Future_{label}_2YRS")),
            within_five_years: set.id(&format!("Future_{label}_5YRS")),
        }
    }
}

/// Record onsets on every time point, returning the onsets still in effect
/// after the last one
///
/// A time point without a score for a ladder leaves that ladder's onsets
/// as they were.
pub(crate) fn sweep(
    timeline: &mut Timeline,
    known: &KnownIds,
    stages: &[StageIds; Stage::COUNT],
) -> Onsets {
    let mut onsets: Onsets = [None; Stage::COUNT];

    for point in timeline.points_mut() {
        let day = point.day;
        for (i, stage) in Stage::ALL.iter().enumerate() {
            let Some(score) = point.snapshot.number_of(known.get(stage.source())) else {
                continue;
            };
            if !stage.is_met(score) {
                onsets[i] = None;
            } else if onsets[i].is_none() {
                onsets[i] = Some(day);
            }
        }

        for (i, ids) in stages.iter().enumerate() {
            match onsets[i] {
                Some(onset) => point.snapshot.put(ids.start_date, f64::from(onset)),
                None => point.snapshot.clear(ids.start_date),
            }
        }
    }
    onsets
}
