//! Compiled per-subject timelines
//!
//! A `Timeline` is one subject's record: immutable demographics plus an
//! ordered sequence of `TimePoint`s, one per distinct day, each holding a
//! snapshot of every resolved variable.

pub mod category;
pub mod snapshot;
pub mod timestamp;

pub use category::FutureCategory;
pub use snapshot::{Snapshot, Value};
pub use timestamp::{TimeStamp, date_to_timestamp, make_timestamp, parse_timestamp};

/// Subject attributes from the timeline element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Demographics {
    pub subject_id: String,
    pub is_male: bool,
    /// Race code as written, lower-cased
    pub race: String,
    pub weight_kg: Option<f64>,
}

impl Demographics {
    #[must_use]
    pub fn is_caucasian(&self) -> bool {
        self.race == "w"
    }
}

/// One compiled day
#[derive(Debug, Clone, PartialEq)]
pub struct TimePoint {
    /// Position in the timeline
    pub index: usize,
    /// Subject-relative day number
    pub day: i32,
    pub snapshot: Snapshot,
}

/// One subject's compiled record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    pub demographics: Demographics,
    points: Vec<TimePoint>,
}

impl Timeline {
    #[must_use]
    pub const fn new(demographics: Demographics) -> Self {
        Self {
            demographics,
            points: Vec::new(),
        }
    }

    #[must_use]
    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    #[must_use]
    pub fn point(&self, index: usize) -> Option<&TimePoint> {
        self.points.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Day numbers in order
    pub fn days(&self) -> impl Iterator<Item = i32> + '_ {
        self.points.iter().map(|p| p.day)
    }

    #[must_use]
    pub fn last(&self) -> Option<&TimePoint> {
        self.points.last()
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut TimePoint> {
        self.points.last_mut()
    }

    pub(crate) fn points_mut(&mut self) -> &mut [TimePoint] {
        &mut self.points
    }

    /// Append a time point, keeping indexes sequential
    pub(crate) fn push(&mut self, day: i32, snapshot: Snapshot) -> &mut TimePoint {
        let index = self.points.len();
        self.points.push(TimePoint {
            index,
            day,
            snapshot,
        });
        &mut self.points[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test points are indexed in push order
    #[test]
    fn test_push_indexes() {
        let mut timeline = Timeline::new(Demographics {
            subject_id: "7".into(),
            is_male: true,
            race: "w".into(),
            weight_kg: Some(80.0),
        });
        timeline.push(100, Snapshot::empty(1));
        timeline.push(103, Snapshot::empty(1));
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.point(1).map(|p| (p.index, p.day)), Some((1, 103)));
        assert_eq!(timeline.days().collect::<Vec<_>>(), vec![100, 103]);
        assert!(timeline.demographics.is_caucasian());
    }
}
