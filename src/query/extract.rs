//! Aligned series extraction
//!
//! This is the hand-off point to model-building code: for every eligible
//! time point, resolve each input reference and the result reference and
//! emit one row of inputs, one result and the day number.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::query::filter::{FilterPredicate, evaluate_filter};
use crate::query::lookup::{DayValue, resolve_value};
use crate::resolver::{FunctionBank, ResolvedEntry, VariableSet};
use crate::timeline::Timeline;
use crate::variables::{ANY_PREDICTED_VALUE, DAYS_SINCE_PREV, VariableDescriptor};

/// Gap reported by `DaysSincePrev` on the first row
const FIRST_ROW_GAP: f64 = 30.0;

/// How the end of the record is treated for future-looking results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrailingWindow {
    /// Drop the final days that cannot yet know the result's outcome
    #[default]
    ExcludeLookahead,
    /// Use every time point
    IncludeAll,
}

/// Caller options for `extract_aligned_series`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Skip rows whose result is not found; otherwise such rows carry no result
    pub require_result: bool,
    /// Count missing inputs per input instead of stopping at the first one
    pub count_misses: bool,
    /// Drop a row identical to the previous row in inputs and result
    pub dedupe: bool,
    /// Map every nonzero result to 1
    pub results_to_bools: bool,
    pub trailing_window: TrailingWindow,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            require_result: true,
            count_misses: false,
            dedupe: true,
            results_to_bools: false,
            trailing_window: TrailingWindow::ExcludeLookahead,
        }
    }
}

/// Three aligned arrays: one input row, one result and one day per returned time point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedSeries {
    pub inputs: Vec<Vec<f64>>,
    pub results: Vec<Option<f64>>,
    pub days: Vec<i32>,
    /// Per-input count of skipped rows, filled when misses are counted
    pub misses: Vec<usize>,
}

impl AlignedSeries {
    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Time point indices usable for a result variable
///
/// When the result needs `D` days of lookahead, the record ends `D` days
/// before the last time point carrying the predicted variable (any time
/// point for `ANY`). Returns `None` when no time point is usable.
#[must_use]
pub fn eligible_points(
    timeline: &Timeline,
    set: &VariableSet,
    result: Option<&VariableDescriptor>,
) -> Option<Range<usize>> {
    let points = timeline.points();
    if points.is_empty() {
        return None;
    }
    let full = 0..points.len();

    let Some(result) = result else {
        return Some(full);
    };
    let (Some(predicted), days_needed) = (&result.future_predicted_value, result.future_days_needed) else {
        return Some(full);
    };
    if days_needed == 0 {
        return Some(full);
    }

    let last_known = if predicted == ANY_PREDICTED_VALUE {
        points.last()
    } else {
        let id = set.id(predicted)?;
        points.iter().rev().find(|p| p.snapshot.get(id).is_some())
    }?;
    let cutoff = last_known.day - i32::try_from(days_needed).unwrap_or(i32::MAX);
    if cutoff < 0 {
        return None;
    }
    let end = points.partition_point(|p| p.day <= cutoff);
    (end > 0).then_some(0..end)
}

fn resolve_entry(
    timeline: &Timeline,
    functions: &mut FunctionBank,
    entries: &[ResolvedEntry],
    entry: usize,
    point: usize,
    last_used_day: Option<i32>,
) -> Option<DayValue> {
    let resolved = &entries[entry];
    let slot = functions.slot(entry);
    resolve_value(
        timeline,
        point,
        resolved.id,
        &resolved.reference,
        last_used_day,
        |value, day| slot.and_then(|slot| functions.compute(slot, point, value, day)),
    )
}

/// Extract aligned input, result and day arrays from one compiled timeline
///
/// # Arguments
/// * `timeline` - The compiled timeline
/// * `set` - The resolved set the timeline was compiled against
/// * `functions` - Window function states, reset here before the traversal
/// * `filters` - Predicates every used time point must pass
/// * `options` - Missing-data, de-duplication and trailing-window policy
pub fn extract_aligned_series(
    timeline: &Timeline,
    set: &VariableSet,
    functions: &mut FunctionBank,
    filters: &[FilterPredicate],
    options: &ExtractOptions,
) -> AlignedSeries {
    let num_inputs = set.num_inputs();
    let mut series = AlignedSeries {
        misses: vec![0; num_inputs],
        ..AlignedSeries::default()
    };

    let result_descriptor = set.result().map(|r| set.descriptor(r.id));
    let range = match options.trailing_window {
        TrailingWindow::ExcludeLookahead => eligible_points(timeline, set, result_descriptor),
        TrailingWindow::IncludeAll => (!timeline.is_empty()).then(|| 0..timeline.len()),
    };
    let Some(range) = range else {
        return series;
    };

    functions.reset();
    let entries = set.entries();
    let zero_limit = set.zero_limit().filter(|z| z.entry < num_inputs);
    let mut last_nonzero_day: Option<i32> = None;
    let mut previous_row_day: Option<i32> = None;
    let mut row = Vec::with_capacity(num_inputs);

    for point in range {
        let time_point = &timeline.points()[point];
        let day = time_point.day;
        if !evaluate_filter(filters, &time_point.snapshot) {
            continue;
        }

        row.clear();
        let mut found_all = true;
        let mut last_used_day = None;
        for entry in 0..num_inputs {
            let found = if entries[entry].reference.name == DAYS_SINCE_PREV {
                Some(DayValue {
                    day,
                    value: previous_row_day.map_or(FIRST_ROW_GAP, |prev| f64::from(day - prev)),
                })
            } else {
                resolve_entry(timeline, functions, entries, entry, point, last_used_day)
            };

            // A long run of zeros counts as missing
            let found = match (found, zero_limit) {
                (Some(found), Some(limit)) if limit.entry == entry => {
                    if found.value == 0.0 {
                        last_nonzero_day
                            .filter(|nonzero| day - nonzero <= i32::try_from(limit.max_days).unwrap_or(i32::MAX))
                            .map(|_| found)
                    } else {
                        last_nonzero_day = Some(day);
                        Some(found)
                    }
                }
                (found, _) => found,
            };

            match found {
                Some(found) => {
                    last_used_day = Some(found.day);
                    row.push(found.value);
                }
                None => {
                    found_all = false;
                    if !options.count_misses {
                        break;
                    }
                    series.misses[entry] += 1;
                }
            }
        }
        if !found_all {
            continue;
        }

        let result = set.result_index().and_then(|entry| {
            resolve_entry(timeline, functions, entries, entry, point, last_used_day)
        });
        let result = result.map(|r| {
            if options.results_to_bools && r.value != 0.0 {
                1.0
            } else {
                r.value
            }
        });
        if result.is_none() && options.require_result && set.result_index().is_some() {
            continue;
        }

        if options.dedupe
            && series.inputs.last().is_some_and(|last| *last == row)
            && series.results.last().is_some_and(|last| *last == result)
        {
            continue;
        }

        series.inputs.push(row.clone());
        series.results.push(result);
        series.days.push(day);
        previous_row_day = Some(day);
    }

    series
}

/// Same-day synchronized value pairs for two references
///
/// Zero and absent values are ignored. The last value of each day is kept,
/// and a day contributes a pair only when both values are present and the
/// pair differs from the previous one.
pub fn synced_pairs<F1, F2>(
    timeline: &Timeline,
    first: (&ResolvedEntry, F1),
    second: (&ResolvedEntry, F2),
    filters: &[FilterPredicate],
) -> (Vec<f64>, Vec<f64>)
where
    F1: FnMut(f64, i32) -> Option<f64>,
    F2: FnMut(f64, i32) -> Option<f64>,
{
    let (first, mut first_function) = first;
    let (second, mut second_function) = second;
    let mut pairs: (Vec<f64>, Vec<f64>) = (Vec::new(), Vec::new());
    let mut current_day: Option<i32> = None;
    let mut today: (Option<f64>, Option<f64>) = (None, None);

    let flush = |today: (Option<f64>, Option<f64>), pairs: &mut (Vec<f64>, Vec<f64>)| {
        if let (Some(a), Some(b)) = today {
            let repeated = pairs.0.last() == Some(&a) && pairs.1.last() == Some(&b);
            if !repeated {
                pairs.0.push(a);
                pairs.1.push(b);
            }
        }
    };

    for (point, time_point) in timeline.points().iter().enumerate() {
        if current_day != Some(time_point.day) {
            flush(today, &mut pairs);
            today = (None, None);
            current_day = Some(time_point.day);
        }
        if !evaluate_filter(filters, &time_point.snapshot) {
            continue;
        }

        let nonzero = |found: Option<DayValue>| found.map(|f| f.value).filter(|v| *v != 0.0);
        let a = resolve_value(timeline, point, first.id, &first.reference, None, &mut first_function);
        let b = resolve_value(timeline, point, second.id, &second.reference, None, &mut second_function);
        if let Some(a) = nonzero(a) {
            today.0 = Some(a);
        }
        if let Some(b) = nonzero(b) {
            today.1 = Some(b);
        }
    }
    flush(today, &mut pairs);
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{EntryRole, VarId, VariableRequest};
    use crate::timeline::{Demographics, Snapshot};
    use crate::variables::{DataKind, DescriptorTable, VariableReference};

    fn table() -> DescriptorTable {
        let mut future = VariableDescriptor::new("Future_Days_Until_Death", DataKind::Integer, 0.0, 3650.0);
        future.future_predicted_value = Some("Cr".to_string());
        future.future_days_needed = 5;
        let mut dose = VariableDescriptor::new("VancDose", DataKind::Float, 500.0, 4000.0);
        dose.max_days_with_zero = Some(3);
        vec![
            VariableDescriptor::new("Cr", DataKind::Float, 0.5, 6.0),
            VariableDescriptor::new("Na", DataKind::Float, 115.0, 155.0),
            VariableDescriptor::new("DaysSincePrev", DataKind::Integer, 0.0, 20.0),
            future,
            dose,
        ]
        .into_iter()
        .collect()
    }

    fn build(set: &VariableSet, rows: &[(i32, &[(&str, f64)])]) -> Timeline {
        let mut timeline = Timeline::new(Demographics::default());
        for (day, values) in rows {
            let mut snapshot = Snapshot::empty(set.len());
            for (name, value) in *values {
                snapshot.set_number(set.id(name).unwrap(), *value);
            }
            timeline.push(*day, snapshot);
        }
        timeline
    }

    fn resolve(inputs: &str, result: &str) -> VariableSet {
        VariableSet::resolve(&table(), &VariableRequest::new(inputs, result)).unwrap()
    }

    /// Test rows, skipped misses and the days-since-previous pseudo-variable
    #[test]
    fn test_extract_rows() {
        let set = resolve("DaysSincePrev;Cr", "Na");
        let timeline = build(
            &set,
            &[
                (1, &[("Cr", 1.0), ("Na", 140.0)]),
                (2, &[("Na", 141.0)]),
                (4, &[("Cr", 1.2), ("Na", 139.0)]),
                (9, &[("Cr", 1.3)]),
            ],
        );
        let mut functions = FunctionBank::for_set(&set);
        let series = extract_aligned_series(&timeline, &set, &mut functions, &[], &ExtractOptions::default());
        assert_eq!(series.days, vec![1, 4]);
        assert_eq!(series.inputs, vec![vec![30.0, 1.0], vec![3.0, 1.2]]);
        assert_eq!(series.results, vec![Some(140.0), Some(139.0)]);

        let options = ExtractOptions {
            require_result: false,
            count_misses: true,
            ..ExtractOptions::default()
        };
        let series = extract_aligned_series(&timeline, &set, &mut functions, &[], &options);
        assert_eq!(series.days, vec![1, 4, 9]);
        assert_eq!(series.results[2], None);
        assert_eq!(series.misses, vec![0, 1]);
    }

    /// Test consecutive identical rows are dropped only when asked
    #[test]
    fn test_dedupe() {
        let set = resolve("Cr", "Na");
        let row: &[(&str, f64)] = &[("Cr", 1.0), ("Na", 140.0)];
        let timeline = build(&set, &[(1, row), (2, row), (3, &[("Cr", 1.1), ("Na", 140.0)])]);
        let mut functions = FunctionBank::for_set(&set);
        let series = extract_aligned_series(&timeline, &set, &mut functions, &[], &ExtractOptions::default());
        assert_eq!(series.days, vec![1, 3]);

        let options = ExtractOptions {
            dedupe: false,
            ..ExtractOptions::default()
        };
        let series = extract_aligned_series(&timeline, &set, &mut functions, &[], &options);
        assert_eq!(series.len(), 3);
    }

    /// Test the trailing days before the last predicted value are excluded
    #[test]
    fn test_trailing_window() {
        let set = resolve("Na", "Future_Days_Until_Death");
        let timeline = build(
            &set,
            &[
                (1, &[("Na", 140.0), ("Future_Days_Until_Death", 9.0)]),
                (5, &[("Na", 141.0), ("Future_Days_Until_Death", 5.0)]),
                (8, &[("Na", 142.0), ("Future_Days_Until_Death", 2.0)]),
                (10, &[("Cr", 1.0)]),
            ],
        );
        let result = set.descriptor(set.result().unwrap().id);
        assert_eq!(eligible_points(&timeline, &set, Some(result)), Some(0..2));

        let mut functions = FunctionBank::for_set(&set);
        let series = extract_aligned_series(&timeline, &set, &mut functions, &[], &ExtractOptions::default());
        assert_eq!(series.days, vec![1, 5]);

        let options = ExtractOptions {
            trailing_window: TrailingWindow::IncludeAll,
            ..ExtractOptions::default()
        };
        let series = extract_aligned_series(&timeline, &set, &mut functions, &[], &options);
        assert_eq!(series.days, vec![1, 5, 8]);
    }

    /// Test a zero after too long without a nonzero value is missing
    #[test]
    fn test_zero_limit() {
        let set = resolve("VancDose", "");
        let timeline = build(
            &set,
            &[
                (1, &[("VancDose", 0.0)]),
                (2, &[("VancDose", 1000.0)]),
                (4, &[("VancDose", 0.0)]),
                (9, &[("VancDose", 0.0)]),
            ],
        );
        let mut functions = FunctionBank::for_set(&set);
        let options = ExtractOptions {
            dedupe: false,
            ..ExtractOptions::default()
        };
        let series = extract_aligned_series(&timeline, &set, &mut functions, &[], &options);
        assert_eq!(series.days, vec![2, 4]);
    }

    /// Test same-day pairs skip zeros and repeated pairs
    #[test]
    fn test_synced_pairs() {
        let set = resolve("Cr;Na", "");
        let timeline = build(
            &set,
            &[
                (1, &[("Cr", 1.0), ("Na", 140.0)]),
                (2, &[("Cr", 1.0), ("Na", 140.0)]),
                (3, &[("Cr", 0.0), ("Na", 141.0)]),
                (4, &[("Cr", 1.5), ("Na", 138.0)]),
            ],
        );
        let entry = |name: &str| ResolvedEntry {
            reference: VariableReference::current(name),
            id: set.id(name).unwrap_or(VarId::from_raw(0)),
            role: EntryRole::Input,
        };
        let (cr, na) = (entry("Cr"), entry("Na"));
        let none = |_: f64, _: i32| None;
        let (a, b) = synced_pairs(&timeline, (&cr, none), (&na, none), &[]);
        assert_eq!(a, vec![1.0, 1.5]);
        assert_eq!(b, vec![140.0, 138.0]);
    }
}
