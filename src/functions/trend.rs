//! Change-over-time functions: delta, rate, acceleration and rate crossing

use super::WindowFunction;
use super::window::{Observation, ObservationWindow};

/// Largest absolute difference between `value` and any retained value
fn max_abs_delta(window: &ObservationWindow, value: f64) -> f64 {
    window
        .iter()
        .map(|o| (value - o.value).abs())
        .fold(0.0, f64::max)
}

/// Rate between the two most recent observations
#[derive(Debug, Clone, Default)]
pub struct Generic {
    previous: Option<Observation>,
}

impl Generic {
    #[must_use]
    pub const fn new() -> Self {
        Self { previous: None }
    }
}

impl WindowFunction for Generic {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        let previous = self.previous.replace(Observation::new(value, day))?;
        let days = day - previous.day;
        if days <= 0 {
            return None;
        }
        Some((value - previous.value) / f64::from(days))
    }

    fn reset(&mut self) {
        self.previous = None;
    }
}

/// Newest value minus the oldest retained value
#[derive(Debug, Clone)]
pub struct Delta {
    window: ObservationWindow,
}

impl Delta {
    #[must_use]
    pub fn new(days: u32) -> Self {
        Self {
            window: ObservationWindow::new(days),
        }
    }
}

impl WindowFunction for Delta {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        self.window.prune(day, |_| {});
        self.window.push(Observation::new(value, day));
        if self.window.len() <= 1 {
            return None;
        }
        let oldest = self.window.oldest()?;
        if day - oldest.day < 1 {
            return None;
        }
        Some(value - oldest.value)
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Largest absolute change from any retained value, over the full window span
#[derive(Debug, Clone)]
pub struct Rate {
    window: ObservationWindow,
}

impl Rate {
    #[must_use]
    pub fn new(days: u32) -> Self {
        Self {
            window: ObservationWindow::new(days),
        }
    }
}

impl WindowFunction for Rate {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        self.window.prune(day, |_| {});
        self.window.push(Observation::new(value, day));
        if self.window.len() <= 1 {
            return None;
        }
        let span = self.window.span_to(day)?;
        if span <= 0 {
            return None;
        }
        Some(max_abs_delta(&self.window, value) / f64::from(span))
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Change in rate relative to the oldest retained observation
///
/// Each observation stores the rate computed when it arrived, measured over
/// the window as it stood before the observation was added.
#[derive(Debug, Clone)]
pub struct Acceleration {
    window: ObservationWindow,
}

impl Acceleration {
    #[must_use]
    pub fn new(days: u32) -> Self {
        Self {
            window: ObservationWindow::new(days),
        }
    }
}

impl WindowFunction for Acceleration {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        self.window.prune(day, |_| {});

        let new_rate = match self.window.span_to(day) {
            Some(span) if span > 0 => (max_abs_delta(&self.window, value) / f64::from(span)).abs(),
            _ => 0.0,
        };
        self.window.push(Observation {
            value,
            day,
            aux: new_rate,
        });
        if self.window.len() <= 2 {
            return None;
        }

        let oldest = self.window.oldest()?;
        let span = day - oldest.day;
        if span <= 0 {
            return None;
        }
        Some(((new_rate - oldest.aux) / f64::from(span)).abs())
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Margin the short-window rate must exceed the long-window rate by
const RATE_CROSS_MARGIN: f64 = 1.1;

/// Whether the short-window rate has pulled ahead of the long-window rate
#[derive(Debug, Clone)]
pub struct RateCross {
    short: Rate,
    long: Rate,
}

impl RateCross {
    #[must_use]
    pub fn new(short_days: u32, long_days: u32) -> Self {
        Self {
            short: Rate::new(short_days),
            long: Rate::new(long_days),
        }
    }
}

impl WindowFunction for RateCross {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        // Both rates see every observation even when one is still undefined
        let short = self.short.compute(value, day);
        let long = self.long.compute(value, day);
        let (short, long) = (short?, long?);
        Some(if short >= RATE_CROSS_MARGIN * long { 1.0 } else { 0.0 })
    }

    fn reset(&mut self) {
        self.short.reset();
        self.long.reset();
    }
}
