//! Forward pass: raw nodes to carry-forward snapshots

use log::{debug, warn};

use crate::compiler::TimelineCompiler;
use crate::compiler::derived;
use crate::compiler::known::{Known, KnownIds};
use crate::compiler::merge::{MergeKind, MergeRule};
use crate::fragment::{DataNode, EventNode, Node, TimelineFragment};
use crate::functions::MinimumSeries;
use crate::timeline::{Demographics, Snapshot, Timeline, Value, parse_timestamp};
use crate::variables::PostStepAction;

/// Days per year used for `AgeInYrs`
const DAYS_PER_YEAR: i32 = 365;

/// Output of the forward pass: the timeline plus each time point's events in recorded order
pub(crate) struct ForwardOutput<'f> {
    pub timeline: Timeline,
    pub events: Vec<Vec<&'f EventNode>>,
}

pub(crate) struct ForwardPass<'c, 'f> {
    compiler: &'c TimelineCompiler,
    baseline: Snapshot,
    baseline_cr: MinimumSeries,
    timeline: Timeline,
    events: Vec<Vec<&'f EventNode>>,
}

impl<'c, 'f> ForwardPass<'c, 'f> {
    pub(crate) fn new(compiler: &'c TimelineCompiler, demographics: &Demographics) -> Self {
        Self {
            compiler,
            baseline: baseline_snapshot(compiler.set.len(), &compiler.known, demographics),
            baseline_cr: MinimumSeries::baseline(),
            timeline: Timeline::new(demographics.clone()),
            events: Vec::new(),
        }
    }

    /// Walk the fragment's nodes in document order
    pub(crate) fn run(mut self, fragment: &'f TimelineFragment) -> ForwardOutput<'f> {
        // Nodes before the first dated node are anchored at day zero
        let mut previous_day = 0;

        for node in &fragment.nodes {
            let kind = match node {
                Node::Event(_) => MergeKind::Event,
                Node::Data(d) if d.class.trim().eq_ignore_ascii_case("d") => MergeKind::Diagnosis,
                Node::Data(_) => MergeKind::Data,
                Node::Outcome(_) => MergeKind::Outcome,
                Node::Text(_) => continue,
            };

            let day = match node {
                Node::Outcome(_) => previous_day,
                _ => node
                    .timestamp()
                    .and_then(parse_timestamp)
                    .map_or(previous_day, |ts| ts.days),
            };
            previous_day = day;

            let latest_day = self.timeline.last().map(|p| p.day);
            if MergeRule::select(latest_day, day, kind).is_none() {
                self.open_time_point(day);
            }

            match node {
                Node::Outcome(outcome) => self.apply_outcomes(&outcome.text),
                Node::Event(event) => {
                    if let Some(events) = self.events.last_mut() {
                        events.push(event);
                    }
                    self.apply_event(event, day);
                }
                Node::Data(data) => self.apply_data(data, day),
                Node::Text(_) => {}
            }

            self.refresh_derived(day);
        }

        ForwardOutput {
            timeline: self.timeline,
            events: self.events,
        }
    }

    /// Start a new time point seeded from the previous snapshot or the baseline
    fn open_time_point(&mut self, day: i32) {
        let mut snapshot = match self.timeline.last() {
            Some(previous) if self.compiler.carry_forward => previous.snapshot.clone(),
            _ => self.baseline.clone(),
        };

        for &(id, action) in &self.compiler.actions {
            match action {
                PostStepAction::Keep => {}
                PostStepAction::Zero => snapshot.set_number(id, 0.0),
                PostStepAction::Invalidate | PostStepAction::ClearAbsent | PostStepAction::Drop => {
                    if snapshot.get(id).is_some() {
                        snapshot.set(id, None);
                    }
                }
            }
        }

        self.timeline.push(day, snapshot);
        self.events.push(Vec::new());
    }

    fn snapshot(&mut self) -> Option<&mut Snapshot> {
        self.timeline.last_mut().map(|p| &mut p.snapshot)
    }

    fn put(&mut self, known: Known, value: f64) {
        let id = self.compiler.known.get(known);
        if let Some(snapshot) = self.snapshot() {
            snapshot.put(id, value);
        }
    }

    fn clear(&mut self, known: Known) {
        let id = self.compiler.known.get(known);
        if let Some(snapshot) = self.snapshot() {
            snapshot.clear(id);
        }
    }

    fn put_text(&mut self, known: Known, text: &str) {
        let Some(id) = self.compiler.known.get(known) else {
            return;
        };
        if let Some(snapshot) = self.snapshot() {
            snapshot.set(id, Some(Value::from(text)));
        }
    }

    /// Lab and vital values, plus the subject's age
    fn apply_data(&mut self, node: &DataNode, day: i32) {
        let class = node.class.trim();
        if class.eq_ignore_ascii_case("L") || class.eq_ignore_ascii_case("V") {
            for item in node.text.split(',') {
                let mut parts = item.split('=');
                let (Some(name), Some(raw)) = (parts.next(), parts.next()) else {
                    continue;
                };
                let name = name.trim();
                // GFR is always computed, never taken from the file
                if name == "GFR" {
                    continue;
                }
                let Some(id) = self.compiler.set.id(name) else {
                    continue;
                };
                let descriptor = self.compiler.set.descriptor(id);
                let value = parse_lab_value(raw).and_then(|v| descriptor.sanitize(v));
                match value {
                    Some(value) => {
                        if let Some(snapshot) = self.snapshot() {
                            snapshot.set_number(id, value);
                        }
                    }
                    None if self.compiler.log_dropped => {
                        warn!("Dropped value {name}={} on day {day}", raw.trim());
                    }
                    None => debug!("Dropped value {name}={} on day {day}", raw.trim()),
                }
            }
        }

        self.put(Known::AgeInYrs, f64::from(day / DAYS_PER_YEAR));
    }

    /// Status, procedure and medication events
    fn apply_event(&mut self, node: &EventNode, day: i32) {
        let value = node.value.as_str();
        match node.class.as_str() {
            "Admit" => {
                self.put(Known::InHospital, 1.0);
                self.put(Known::HospitalAdmitDate, f64::from(day));
                self.put(Known::HospitalAdmissionFlag, 1.0);
            }
            "Discharge" => {
                self.put(Known::InHospital, 0.0);
                self.clear(Known::HospitalAdmitDate);
                self.put(Known::HospitalDischargeFlag, 1.0);
            }
            "Transfer" => {
                let in_icu = if value.starts_with("ICU") { 1.0 } else { 0.0 };
                self.put(Known::InIcu, in_icu);
            }
            "Proc" => {
                if value.contains("EGD:") || value.contains("Colonoscopy:") {
                    self.put(Known::GiProcedures, 1.0);
                }
                self.put_text(Known::Procedure, value);
                if value == "Dialysis" {
                    self.put(Known::MostRecentDialysisDate, f64::from(day));
                }
            }
            "Surg" => {
                if let Some(id) = self.compiler.known.get(Known::MajorSurgeries) {
                    if let Some(snapshot) = self.snapshot() {
                        let count = snapshot.number(id).unwrap_or(0.0);
                        snapshot.set_number(id, count + 1.0);
                    }
                }
                self.put_text(Known::Surgery, value);
                if value.starts_with("Major") {
                    self.put(Known::MostRecentMajorSurgeryDate, f64::from(day));
                }
            }
            "Blood" => {
                let product = value.split(':').next().unwrap_or_default().trim().to_lowercase();
                let target = match product.as_str() {
                    "rbc" => Known::TransRbc,
                    "plts" => Known::TransPlts,
                    "ffp" => Known::TransFfp,
                    "cryo" => Known::TransCryo,
                    _ => return,
                };
                self.put(target, 1.0);
            }
            "IMed" => self.apply_medications(value, day),
            _ => {}
        }
    }

    /// `med:dose:route:dosesPerDay` entries; each dose replaces the day's prior dose
    fn apply_medications(&mut self, value: &str, day: i32) {
        for drug_info in value.split(',') {
            let parts: Vec<&str> = drug_info.split(':').map(str::trim).collect();
            let name = parts[0];
            let Some(id) = self.compiler.set.id(name) else {
                continue;
            };

            let doses_per_day = match parts.get(3) {
                Some(text) => match text.parse::<u32>() {
                    Ok(n) => n,
                    Err(_) => {
                        debug!("Skipping medication '{drug_info}' on day {day}: bad doses per day");
                        continue;
                    }
                },
                None => 1,
            };
            let route = parts.get(2).copied().unwrap_or("i");
            let dose_text = match parts.get(1).copied() {
                None | Some("" | "0") => "1",
                Some(text) => text,
            };
            let Ok(dose) = dose_text.parse::<f64>() else {
                debug!("Skipping medication '{drug_info}' on day {day}: bad dose");
                continue;
            };

            let descriptor = self.compiler.set.descriptor(id);
            let doses_per_day = if dose > descriptor.max / 2.0 { 1 } else { doses_per_day };
            if name == "VancDose" && (route == "o" || dose < 100.0) {
                debug!("Skipping vancomycin '{drug_info}' on day {day}");
                continue;
            }
            if let Some(snapshot) = self.snapshot() {
                snapshot.set_number(id, dose * f64::from(doses_per_day));
            }
        }
    }

    /// `name=value;...` outcome flags
    fn apply_outcomes(&mut self, text: &str) {
        for pair in text.split(';') {
            let mut parts = pair.split('=');
            let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let value = value.replace('"', "").trim().to_lowercase();
            if name.trim() == "DiedThisAdmission" && value == "t" {
                self.put(Known::DiedThisAdmission, 1.0);
            }
        }
    }

    fn refresh_derived(&mut self, day: i32) {
        let Some(point) = self.timeline.last_mut() else {
            return;
        };
        for step in &self.compiler.derived {
            derived::apply(step, &mut point.snapshot, &self.compiler.known, day, &mut self.baseline_cr);
        }
    }
}

/// Parse a lab value, retrying without comparison marks (`<0.1`, `>90`)
fn parse_lab_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    raw.parse::<f64>()
        .ok()
        .or_else(|| raw.replace(['<', '>'], "").trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Every slot absent apart from demographics and zeroed status counters
pub(crate) fn baseline_snapshot(
    len: usize,
    known: &KnownIds,
    demographics: &Demographics,
) -> Snapshot {
    let mut snapshot = Snapshot::empty(len);
    snapshot.put(known.get(Known::IsMale), if demographics.is_male { 1.0 } else { 0.0 });
    if let Some(weight) = demographics.weight_kg {
        snapshot.put(known.get(Known::WtKg), weight);
    }
    snapshot.put(
        known.get(Known::IsCaucasian),
        if demographics.is_caucasian() { 1.0 } else { 0.0 },
    );
    for status in [
        Known::DiedThisAdmission,
        Known::InHospital,
        Known::MajorSurgeries,
        Known::GiProcedures,
    ] {
        snapshot.put(known.get(status), 0.0);
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test comparison marks are stripped only when a plain parse fails
    #[test]
    fn test_parse_lab_value() {
        assert_eq!(parse_lab_value(" 1.4 "), Some(1.4));
        assert_eq!(parse_lab_value("<0.1"), Some(0.1));
        assert_eq!(parse_lab_value(">90"), Some(90.0));
        assert_eq!(parse_lab_value("pending"), None);
        assert_eq!(parse_lab_value("NaN"), None);
    }
}
