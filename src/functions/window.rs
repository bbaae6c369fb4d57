//! Day-bounded observation queue shared by the windowed functions

use std::collections::VecDeque;

/// One `(value, day)` observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub value: f64,
    pub day: i32,
    /// Auxiliary per-observation value (the acceleration function stores its rate here)
    pub aux: f64,
}

impl Observation {
    #[must_use]
    pub const fn new(value: f64, day: i32) -> Self {
        Self {
            value,
            day,
            aux: 0.0,
        }
    }
}

/// Observations ordered by day, bounded to a maximum day-span
#[derive(Debug, Clone)]
pub struct ObservationWindow {
    span: i32,
    items: VecDeque<Observation>,
}

impl ObservationWindow {
    #[must_use]
    pub fn new(span: u32) -> Self {
        Self {
            span: i32::try_from(span).unwrap_or(i32::MAX),
            items: VecDeque::new(),
        }
    }

    /// Window size in days
    #[must_use]
    pub const fn span(&self) -> i32 {
        self.span
    }

    /// Drop observations more than `span` days older than `day`
    ///
    /// `on_evict` sees each evicted observation in order.
    pub fn prune(&mut self, day: i32, mut on_evict: impl FnMut(&Observation)) {
        while let Some(front) = self.items.front() {
            if day - front.day <= self.span {
                break;
            }
            on_evict(front);
            self.items.pop_front();
        }
    }

    pub fn push(&mut self, observation: Observation) {
        self.items.push_back(observation);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn oldest(&self) -> Option<&Observation> {
        self.items.front()
    }

    #[must_use]
    pub fn newest(&self) -> Option<&Observation> {
        self.items.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Observation> + ExactSizeIterator {
        self.items.iter()
    }

    /// Smallest retained value
    #[must_use]
    pub fn min_value(&self) -> Option<f64> {
        self.items.iter().map(|o| o.value).reduce(f64::min)
    }

    /// Largest retained value
    #[must_use]
    pub fn max_value(&self) -> Option<f64> {
        self.items.iter().map(|o| o.value).reduce(f64::max)
    }

    /// Days between the oldest retained observation and `day`
    #[must_use]
    pub fn span_to(&self, day: i32) -> Option<i32> {
        self.items.front().map(|front| day - front.day)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
