//! Point and windowed value lookup
//!
//! A reference with zero offsets and no function reads the current
//! snapshot. A function reference reads the current snapshot and feeds the
//! value to its window function. Any other reference searches a day window
//! relative to the current day, or to the day matched by the previous
//! reference, and returns the first present value in search order.

use std::cmp::Ordering;

use crate::resolver::VarId;
use crate::timeline::Timeline;
use crate::variables::{RangeMode, VariableReference, is_valid_legacy};

/// A value together with the day it was found on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayValue {
    pub day: i32,
    pub value: f64,
}

/// Present, valid numeric value of `id` at time point `point`
#[must_use]
pub fn value_at(timeline: &Timeline, point: usize, id: VarId) -> Option<DayValue> {
    let time_point = timeline.point(point)?;
    time_point
        .snapshot
        .number(id)
        .filter(|v| is_valid_legacy(*v))
        .map(|value| DayValue {
            day: time_point.day,
            value,
        })
}

/// Resolve `reference` (whose base variable is `id`) at time point `point`
///
/// # Arguments
/// * `timeline` - The compiled timeline
/// * `point` - Index of the current time point
/// * `id` - Interned id of the reference's base variable
/// * `reference` - The parsed reference
/// * `last_used_day` - Day matched by the previous reference in the same row
/// * `function` - Window function state, called only for function references
///
/// # Returns
/// The value and the day it was found on, or `None` when nothing is found
pub fn resolve_value<F>(
    timeline: &Timeline,
    point: usize,
    id: VarId,
    reference: &VariableReference,
    last_used_day: Option<i32>,
    function: F,
) -> Option<DayValue>
where
    F: FnOnce(f64, i32) -> Option<f64>,
{
    if reference.function.is_some() {
        let raw = value_at(timeline, point, id)?;
        return function(raw.value, raw.day)
            .filter(|v| is_valid_legacy(*v))
            .map(|value| DayValue {
                day: raw.day,
                value,
            });
    }
    if reference.is_current_day() {
        return value_at(timeline, point, id);
    }

    let anchor = match reference.mode {
        RangeMode::Nearest => timeline.point(point)?.day,
        RangeMode::RelativeToLastMatch => last_used_day?,
    };
    search_window(timeline, id, anchor + reference.start, anchor + reference.stop)
}

/// First present value scanning from day `first` toward day `last`
///
/// The scan runs forward when `first <= last` and backward otherwise.
#[must_use]
pub fn search_window(timeline: &Timeline, id: VarId, first: i32, last: i32) -> Option<DayValue> {
    let points = timeline.points();
    match first.cmp(&last) {
        Ordering::Less | Ordering::Equal => {
            let start = points.partition_point(|p| p.day < first);
            points[start..]
                .iter()
                .take_while(|p| p.day <= last)
                .find_map(|p| present(p.day, p.snapshot.number(id)))
        }
        Ordering::Greater => {
            let end = points.partition_point(|p| p.day <= first);
            points[..end]
                .iter()
                .rev()
                .take_while(|p| p.day >= last)
                .find_map(|p| present(p.day, p.snapshot.number(id)))
        }
    }
}

fn present(day: i32, value: Option<f64>) -> Option<DayValue> {
    value
        .filter(|v| is_valid_legacy(*v))
        .map(|value| DayValue { day, value })
}
