//! Aggregating functions: running sum and average, volatility and Bollinger bands

use super::WindowFunction;
use super::window::{Observation, ObservationWindow};

/// Windowed total with evicted values subtracted from a running sum
#[derive(Debug, Clone)]
struct RunningTotal {
    window: ObservationWindow,
    total: f64,
}

impl RunningTotal {
    fn new(days: u32) -> Self {
        Self {
            window: ObservationWindow::new(days),
            total: 0.0,
        }
    }

    fn add(&mut self, value: f64, day: i32) {
        let mut evicted = 0.0;
        self.window.prune(day, |o| evicted += o.value);
        self.total = if self.window.is_empty() {
            0.0
        } else {
            self.total - evicted
        };
        self.window.push(Observation::new(value, day));
        self.total += value;
    }

    fn clear(&mut self) {
        self.window.clear();
        self.total = 0.0;
    }
}

/// Sum of all values retained in the window
#[derive(Debug, Clone)]
pub struct RunningSum {
    inner: RunningTotal,
}

impl RunningSum {
    #[must_use]
    pub fn new(days: u32) -> Self {
        Self {
            inner: RunningTotal::new(days),
        }
    }
}

impl WindowFunction for RunningSum {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        self.inner.add(value, day);
        Some(self.inner.total)
    }

    fn reset(&mut self) {
        self.inner.clear();
    }
}

/// Mean of all values retained in the window
#[derive(Debug, Clone)]
pub struct RunningAverage {
    inner: RunningTotal,
}

impl RunningAverage {
    #[must_use]
    pub fn new(days: u32) -> Self {
        Self {
            inner: RunningTotal::new(days),
        }
    }
}

impl WindowFunction for RunningAverage {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        self.inner.add(value, day);
        #[allow(clippy::cast_precision_loss)]
        let count = self.inner.window.len() as f64;
        Some(self.inner.total / count)
    }

    fn reset(&mut self) {
        self.inner.clear();
    }
}

/// Total variation: sum of absolute consecutive differences in the window
#[derive(Debug, Clone)]
pub struct Volatility {
    window: ObservationWindow,
}

impl Volatility {
    #[must_use]
    pub fn new(days: u32) -> Self {
        Self {
            window: ObservationWindow::new(days),
        }
    }
}

impl WindowFunction for Volatility {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        self.window.prune(day, |_| {});
        self.window.push(Observation::new(value, day));
        let values: Vec<f64> = self.window.iter().map(|o| o.value).collect();
        Some(values.windows(2).map(|pair| (pair[1] - pair[0]).abs()).sum())
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Whether the newest value sits outside one sample standard deviation of the mean
#[derive(Debug, Clone)]
pub struct Bollinger {
    upper: bool,
    window: ObservationWindow,
}

impl Bollinger {
    #[must_use]
    pub fn new(upper: bool, days: u32) -> Self {
        Self {
            upper,
            window: ObservationWindow::new(days),
        }
    }
}

impl WindowFunction for Bollinger {
    fn compute(&mut self, value: f64, day: i32) -> Option<f64> {
        self.window.prune(day, |_| {});
        self.window.push(Observation::new(value, day));
        let count = self.window.len();
        if count < 2 {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let n = count as f64;
        let mean = self.window.iter().map(|o| o.value).sum::<f64>() / n;
        let variance = self
            .window
            .iter()
            .map(|o| (o.value - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        let stdev = variance.sqrt();

        let outside = if self.upper {
            value >= mean + stdev
        } else {
            value <= mean - stdev
        };
        Some(if outside { 1.0 } else { 0.0 })
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test the running sum subtracts evicted values
    #[test]
    fn test_running_sum() {
        let mut sum = RunningSum::new(3);
        assert_eq!(sum.compute(1.0, 0), Some(1.0));
        assert_eq!(sum.compute(2.0, 2), Some(3.0));
        assert_eq!(sum.compute(4.0, 4), Some(6.0));
        assert_eq!(sum.compute(8.0, 10), Some(8.0));
    }

    /// Test the running average over the retained values
    #[test]
    fn test_running_average() {
        let mut avg = RunningAverage::new(60);
        assert_eq!(avg.compute(2.0, 0), Some(2.0));
        assert_eq!(avg.compute(4.0, 30), Some(3.0));
        assert_eq!(avg.compute(9.0, 61), Some(6.5));
    }

    /// Test volatility sums absolute steps
    #[test]
    fn test_volatility() {
        let mut vol = Volatility::new(30);
        assert_eq!(vol.compute(5.0, 0), Some(0.0));
        assert_eq!(vol.compute(7.0, 1), Some(2.0));
        assert_eq!(vol.compute(4.0, 2), Some(5.0));
    }

    /// Test Bollinger band membership for a spike and a drop
    #[test]
    fn test_bollinger() {
        let mut upper = Bollinger::new(true, 60);
        let mut lower = Bollinger::new(false, 60);
        assert_eq!(upper.compute(10.0, 0), None);
        assert_eq!(lower.compute(10.0, 0), None);
        for day in 1..5 {
            upper.compute(10.0, day);
            lower.compute(10.0, day);
        }
        assert_eq!(upper.compute(20.0, 6), Some(1.0));
        assert_eq!(lower.compute(20.0, 6), Some(0.0));
    }
}
