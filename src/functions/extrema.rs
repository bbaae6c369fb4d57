//! Functions built on the window minimum and maximum

use super::WindowFunction;
use super::window::{Observation, ObservationWindow};

/// Days of history kept by the trailing minimum used for baselines
pub const BASELINE_WINDOW_DAYS: u32 = 7;

/// Observation window that tracks its extrema incrementally
///
/// The extrema are rescanned only when an evicted value was the tracked
/// minimum or maximum.
#[derive(Debug, Clone)]
struct ExtremaWindow {
    window: ObservationWindow,
    min: Option<f64>,
    max: Option<f64>,
}

impl ExtremaWindow {
    fn new(days: u32) -> Self {
        Self {
            window: ObservationWindow::new(days),
            min: None,
            max: None,
        }
    }

    fn add(&mut self, value: f64, day: i32) {
        let (min, max) = (self.min, self.max);
        let mut stale = false;
        self.window.prune(day, |o| {
            if Some(o.value) == min || Some(o.value) == max {
                stale = true;
            }
        });
        self.window.push(Observation::new(value, day));

        if stale || self.min.is_none() || self.max.is_none() {
            self.min = self.window.min_value();
            self.max = self.window.max_value();
        } else {
            self.min = self.min.map(|m| m.min(value));
            self.max = self.max.map(|m| m.max(value));
        }
    }

    fn len(&self) -> usize {
        self.window.len()
    }

    fn clear(&mut self) {
        self.window.clear();
        self.min = None;
        self.max = None;
    }
}

/// Spread between the window maximum and minimum
#[derive(Debug, Clone)]
pub struct Range {
    absolute: bool,
    inner: ExtremaWindow,
}

impl Range {
    /// A relative range (`absolute == false`) is divided by the window minimum
    #[must_use]
    pub fn new(days: u32, absolute: bool) -> Self {
        Self {
            absolute,
            inner: ExtremaWindow::new(days),
        }
    }
}

impl WindowFunction for Range {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        self.inner.add(value, day);
        if self.inner.len() <= 1 {
            return None;
        }
        let (min, max) = (self.inner.min?, self.inner.max?);
        let spread = max - min;
        if self.absolute {
            Some(spread)
        } else if min == 0.0 {
            Some(0.0)
        } else {
            Some(spread / min)
        }
    }

    fn reset(&mut self) {
        self.inner.clear();
    }
}

/// Rise of the newest value above the window minimum, relative to that minimum
#[derive(Debug, Clone)]
pub struct PercentChange {
    inner: ExtremaWindow,
}

impl PercentChange {
    #[must_use]
    pub fn new(days: u32) -> Self {
        Self {
            inner: ExtremaWindow::new(days),
        }
    }
}

impl WindowFunction for PercentChange {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        self.inner.add(value, day);
        if self.inner.len() < 2 {
            return None;
        }
        let min = self.inner.min?;
        if min == 0.0 {
            return Some(0.0);
        }
        Some((value - min) / min)
    }

    fn reset(&mut self) {
        self.inner.clear();
    }
}

/// 1 when the absolute range stays within a threshold, else 0
#[derive(Debug, Clone)]
pub struct IsStable {
    range: Range,
    threshold: f64,
}

impl IsStable {
    #[must_use]
    pub fn new(days: u32, threshold: f64) -> Self {
        Self {
            range: Range::new(days, true),
            threshold,
        }
    }
}

impl WindowFunction for IsStable {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        let spread = self.range.compute(value, day)?;
        Some(if spread > self.threshold { 0.0 } else { 1.0 })
    }

    fn reset(&mut self) {
        self.range.reset();
    }
}

/// 1 when every retained value stays on one side of a level
///
/// With `above` set the window minimum must be at least the level, otherwise
/// the window maximum must be at most the level. A non-positive level never
/// matches.
#[derive(Debug, Clone)]
pub struct Threshold {
    above: bool,
    level: f64,
    inner: ExtremaWindow,
}

impl Threshold {
    #[must_use]
    pub fn new(above: bool, level: f64, days: u32) -> Self {
        Self {
            above,
            level,
            inner: ExtremaWindow::new(days),
        }
    }
}

impl WindowFunction for Threshold {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        self.inner.add(value, day);
        if self.level <= 0.0 {
            return Some(0.0);
        }
        let holds = if self.above {
            self.inner.min.is_some_and(|min| min >= self.level)
        } else {
            self.inner.max.is_some_and(|max| max <= self.level)
        };
        Some(if holds { 1.0 } else { 0.0 })
    }

    fn reset(&mut self) {
        self.inner.clear();
    }
}

/// Trailing minimum over a fixed number of days
#[derive(Debug, Clone)]
pub struct MinimumSeries {
    inner: ExtremaWindow,
}

impl MinimumSeries {
    #[must_use]
    pub fn new(days: u32) -> Self {
        Self {
            inner: ExtremaWindow::new(days),
        }
    }

    /// The seven-day series used for baseline values
    #[must_use]
    pub fn baseline() -> Self {
        Self::new(BASELINE_WINDOW_DAYS)
    }

    /// Add an observation and return the current minimum
    pub fn push(&mut self, value: f64, day: i32) -> f64 {
        self.inner.add(value, day);
        self.inner.min.unwrap_or(value)
    }

    #[must_use]
    pub const fn minimum(&self) -> Option<f64> {
        self.inner.min
    }
}

impl WindowFunction for MinimumSeries {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        Some(self.push(value, day))
    }

    fn reset(&mut self) {
        self.inner.clear();
    }
}
