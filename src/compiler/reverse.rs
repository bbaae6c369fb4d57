//! Reverse pass: future-looking labels
//!
//! Time points are visited from last to first. Each point's events update
//! the "next occurrence" trackers before that point's labels are written,
//! so a label always describes what happens from that day forward.

use crate::compiler::TimelineCompiler;
use crate::compiler::derived::ckd_epi_2021;
use crate::compiler::known::{Known, OutcomeIds};
use crate::compiler::milestones::Onsets;
use crate::fragment::EventNode;
use crate::resolver::VarId;
use crate::timeline::{FutureCategory, Snapshot, Timeline};

/// Days in the two- and five-year stage horizons
const TWO_YEARS: i32 = 730;
const FIVE_YEARS: i32 = 1825;

/// Running next-occurrence state, carried from later time points to earlier ones
#[derive(Debug, Default)]
struct Trackers {
    discharge: Option<i32>,
    rapid_response: Option<i32>,
    icu_transfer: Option<i32>,
    ward_transfer: Option<i32>,
    /// Fixed once, by the last discharge of a fatal admission
    death: Option<i32>,
    lowest_future_cr: Option<f64>,
    next_aki: Option<i32>,
    next_resolution: Option<i32>,
}

impl Trackers {
    fn apply_event(&mut self, event: &EventNode, day: i32, snapshot: &Snapshot, died: Option<VarId>) {
        match event.class.as_str() {
            "Admit" => {
                self.discharge = None;
                self.rapid_response = None;
                self.icu_transfer = None;
                self.ward_transfer = None;
            }
            "Discharge" => {
                self.discharge = Some(day);
                self.rapid_response = None;
                self.icu_transfer = None;
                self.ward_transfer = None;
                let fatal = snapshot.number_of(died).is_some_and(|d| d > 0.0);
                if fatal && self.death.is_none() {
                    self.death = Some(day);
                }
            }
            "Transfer" => {
                if matches!(event.value.as_str(), "Ward" | "Prog") {
                    self.ward_transfer = Some(day);
                } else if event.value.starts_with("ICU") {
                    self.icu_transfer = Some(day);
                }
            }
            "RapidResponse" => self.rapid_response = Some(day),
            _ => {}
        }
    }
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

fn put_day(snapshot: &mut Snapshot, id: Option<VarId>, day: Option<i32>) {
    match day {
        Some(day) => snapshot.put(id, f64::from(day)),
        None => snapshot.clear(id),
    }
}

/// Boolean, days-until and category for an event that may lie ahead
///
/// Days are defined only when the event is today or later.
fn put_future(snapshot: &mut Snapshot, ids: &OutcomeIds, day: i32, target: Option<i32>) {
    snapshot.put(ids.boolean, flag(target.is_some()));
    put_day(snapshot, ids.days_until, target.filter(|t| day <= *t).map(|t| t - day));
    snapshot.put(ids.category, FutureCategory::between(day, target).as_value());
}

/// Hospital-course labels: defined only while the subject is in hospital
fn put_in_hospital(
    snapshot: &mut Snapshot,
    ids: &OutcomeIds,
    day: i32,
    in_hospital: bool,
    target: Option<i32>,
) {
    let target = target.filter(|_| in_hospital);
    snapshot.put(ids.boolean, flag(target.is_some()));
    put_day(snapshot, ids.days_until, target.map(|t| (t - day).max(0)));
    snapshot.put(ids.category, FutureCategory::between(day, target).as_value());
}

pub(crate) fn run(
    compiler: &TimelineCompiler,
    timeline: &mut Timeline,
    events: &[Vec<&EventNode>],
    final_onsets: &Onsets,
) {
    let known = &compiler.known;
    let get = |k: Known| known.get(k);
    let mut trackers = Trackers::default();

    for point in timeline.points_mut().iter_mut().rev() {
        let day = point.day;
        let snapshot = &mut point.snapshot;

        for event in events.get(point.index).into_iter().flatten() {
            trackers.apply_event(event, day, snapshot, get(Known::DiedThisAdmission));
        }

        // The baseline can never exceed the lowest value seen later
        let cr = snapshot.number_of(get(Known::Cr));
        if let Some(baseline_id) = get(Known::BaselineCr) {
            if let Some(cr) = cr {
                if trackers.lowest_future_cr.is_none_or(|low| cr < low) {
                    trackers.lowest_future_cr = Some(cr);
                }
            }
            let baseline = snapshot.number(baseline_id);
            if let (Some(low), Some(baseline)) = (trackers.lowest_future_cr, baseline) {
                if low < baseline {
                    snapshot.set_number(baseline_id, low);
                }
            }
        }
        let baseline_cr = snapshot.number_of(get(Known::BaselineCr));

        if let (Some(id), Some(baseline), Some(age)) =
            (get(Known::BaselineGfr), baseline_cr, snapshot.number_of(get(Known::AgeInYrs)))
        {
            let is_male = snapshot.number_of(get(Known::IsMale)).is_some_and(|m| m > 0.0);
            let egfr = ckd_epi_2021(baseline, age, is_male).round_ties_even();
            if egfr > 0.0 {
                snapshot.set_number(id, egfr);
            }
        }

        if let (Some(cr), Some(baseline)) = (cr, baseline_cr) {
            let delta = cr - baseline;
            let in_aki = (baseline <= 1.5 && delta >= 0.3) || delta >= 1.5 * baseline;
            snapshot.put(get(Known::InAki), flag(in_aki));
            if in_aki {
                trackers.next_aki = Some(day);
            } else {
                trackers.next_resolution = Some(day);
            }
        }
        put_day(snapshot, get(Known::NextAkiDate), trackers.next_aki);
        put_day(snapshot, get(Known::NextCrAtBaselineDate), trackers.next_resolution);
        put_day(
            snapshot,
            get(Known::DaysUntilAki),
            trackers.next_aki.map(|t| t - day).filter(|d| *d > 0),
        );
        snapshot.put(
            get(Known::CategoryAki),
            FutureCategory::between(day, trackers.next_aki).as_value(),
        );
        put_day(
            snapshot,
            get(Known::DaysUntilAkiResolution),
            trackers.next_resolution.map(|t| t - day).filter(|d| *d > 0),
        );
        snapshot.put(
            get(Known::CategoryAkiResolution),
            FutureCategory::between(day, trackers.next_resolution).as_value(),
        );

        // Only an episode the subject never leaves counts as a future stage
        for (ids, onset) in compiler.stages.iter().zip(final_onsets.iter().copied()) {
            put_future(snapshot, &ids.future, day, onset);
            snapshot.put(
                ids.within_two_years,
                flag(onset.is_some_and(|t| t - day < TWO_YEARS)),
            );
            snapshot.put(
                ids.within_five_years,
                flag(onset.is_some_and(|t| t - day < FIVE_YEARS)),
            );
        }

        put_day(snapshot, get(Known::EventualDeathDate), trackers.death);
        put_future(snapshot, &compiler.outcomes.death, day, trackers.death);

        let admit_day = snapshot.number_of(get(Known::HospitalAdmitDate));
        match (admit_day, trackers.discharge) {
            (Some(admit), Some(discharge)) => {
                snapshot.put(get(Known::LengthOfStay), f64::from(discharge) - admit);
            }
            _ => snapshot.clear(get(Known::LengthOfStay)),
        }

        let in_hospital = snapshot.number_of(get(Known::InHospital)).is_some_and(|h| h > 0.0);
        let outcomes = &compiler.outcomes;
        for (ids, target) in [
            (&outcomes.discharge, trackers.discharge),
            (&outcomes.rapid_response, trackers.rapid_response),
            (&outcomes.into_icu, trackers.icu_transfer),
            (&outcomes.out_of_icu, trackers.ward_transfer),
        ] {
            put_in_hospital(snapshot, ids, day, in_hospital, target);
        }

        put_day(snapshot, get(Known::NextDischargeDate), trackers.discharge);
        put_day(snapshot, get(Known::NextRapidResponseDate), trackers.rapid_response);
        put_day(snapshot, get(Known::NextIcuTransferDate), trackers.icu_transfer);
        put_day(snapshot, get(Known::NextWardTransferDate), trackers.ward_transfer);
    }
}
