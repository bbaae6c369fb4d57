//! Whole-timeline value series for one variable

use crate::query::lookup::{DayValue, resolve_value};
use crate::resolver::ResolvedEntry;
use crate::timeline::Timeline;
use crate::variables::is_valid_legacy;

/// Every present value of a variable, in time order
///
/// With `one_per_day`, only the first time point of each day is read.
#[must_use]
pub fn raw_values(timeline: &Timeline, entry: &ResolvedEntry, one_per_day: bool) -> Vec<DayValue> {
    let mut values = Vec::new();
    let mut previous_day = None;
    for point in timeline.points() {
        if one_per_day && previous_day == Some(point.day) {
            continue;
        }
        previous_day = Some(point.day);
        if let Some(value) = point.snapshot.number(entry.id).filter(|v| is_valid_legacy(*v)) {
            values.push(DayValue {
                day: point.day,
                value,
            });
        }
    }
    values
}

/// Present values between two days inclusive, clamped to the variable's range
#[must_use]
pub fn values_between_days(
    timeline: &Timeline,
    entry: &ResolvedEntry,
    (min, max): (f64, f64),
    first_day: i32,
    last_day: i32,
    one_per_day: bool,
) -> Vec<DayValue> {
    let points = timeline.points();
    let start = points.partition_point(|p| p.day < first_day);
    let mut values = Vec::new();
    let mut previous_day = None;
    for point in points[start..].iter().take_while(|p| p.day <= last_day) {
        if one_per_day && previous_day == Some(point.day) {
            continue;
        }
        previous_day = Some(point.day);
        if let Some(value) = point.snapshot.number(entry.id).filter(|v| is_valid_legacy(*v)) {
            values.push(DayValue {
                day: point.day,
                value: value.clamp(min, max),
            });
        }
    }
    values
}

/// Points where the resolved value of a reference changes
///
/// Values below `min_value` count as not found when `min_value` is not
/// negative. The first found value is always reported.
pub fn value_changes<F>(
    timeline: &Timeline,
    entry: &ResolvedEntry,
    min_value: f64,
    mut function: F,
) -> Vec<DayValue>
where
    F: FnMut(f64, i32) -> Option<f64>,
{
    let mut changes: Vec<DayValue> = Vec::new();
    for point in 0..timeline.len() {
        let Some(found) = resolve_value(timeline, point, entry.id, &entry.reference, None, &mut function)
        else {
            continue;
        };
        if min_value >= 0.0 && found.value < min_value {
            continue;
        }
        if changes.last().is_none_or(|last| last.value != found.value) {
            changes.push(DayValue {
                day: timeline.points()[point].day,
                value: found.value,
            });
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{EntryRole, VarId};
    use crate::timeline::{Demographics, Snapshot};
    use crate::variables::VariableReference;

    fn entry() -> ResolvedEntry {
        ResolvedEntry {
            reference: VariableReference::current("Cr"),
            id: VarId::from_raw(0),
            role: EntryRole::Input,
        }
    }

    fn timeline(values: &[(i32, Option<f64>)]) -> Timeline {
        let mut timeline = Timeline::new(Demographics::default());
        for &(day, value) in values {
            let mut snapshot = Snapshot::empty(1);
            if let Some(value) = value {
                snapshot.set_number(VarId::from_raw(0), value);
            }
            timeline.push(day, snapshot);
        }
        timeline
    }

    /// Test one-per-day reads only the first point of a day
    #[test]
    fn test_raw_values() {
        let timeline = timeline(&[(1, Some(1.0)), (1, Some(1.5)), (2, None), (3, Some(2.0))]);
        let days: Vec<_> = raw_values(&timeline, &entry(), false).iter().map(|v| v.value).collect();
        assert_eq!(days, vec![1.0, 1.5, 2.0]);
        let days: Vec<_> = raw_values(&timeline, &entry(), true).iter().map(|v| v.value).collect();
        assert_eq!(days, vec![1.0, 2.0]);
    }

    /// Test day bounds are inclusive and values are clamped
    #[test]
    fn test_values_between_days() {
        let timeline = timeline(&[(1, Some(0.1)), (2, Some(9.0)), (3, Some(1.0)), (4, Some(2.0))]);
        let values = values_between_days(&timeline, &entry(), (0.5, 6.0), 2, 3, false);
        assert_eq!(
            values,
            vec![DayValue { day: 2, value: 6.0 }, DayValue { day: 3, value: 1.0 }]
        );
    }

    /// Test only changes above the minimum are reported
    #[test]
    fn test_value_changes() {
        let timeline = timeline(&[
            (1, Some(1.0)),
            (2, Some(1.0)),
            (3, Some(0.2)),
            (4, Some(2.0)),
            (5, Some(2.0)),
            (6, Some(1.0)),
        ]);
        let none = |_: f64, _: i32| None;
        let changes: Vec<_> = value_changes(&timeline, &entry(), 0.5, none)
            .iter()
            .map(|c| c.day)
            .collect();
        assert_eq!(changes, vec![1, 4, 6]);
        let changes = value_changes(&timeline, &entry(), -1.0, none);
        assert_eq!(changes.len(), 4);
    }
}
