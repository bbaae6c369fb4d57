//! Sliding-window derived-value functions
//!
//! Each function consumes one subject's `(value, day)` observations for one
//! variable in increasing day order and produces one output per call, or
//! `None` while the retained history is insufficient. A function holds state
//! for a single subject traversal and must be reset before the next one.

pub mod aggregate;
pub mod extrema;
pub mod trend;
pub mod window;

use std::fmt;

pub use aggregate::{Bollinger, RunningAverage, RunningSum, Volatility};
pub use extrema::{IsStable, MinimumSeries, PercentChange, Range, Threshold};
pub use trend::{Acceleration, Delta, Generic, Rate, RateCross};
pub use window::{Observation, ObservationWindow};

use crate::error::{Result, TdfError};
use crate::variables::DataKind;

/// Windows accepted as a numeric suffix (`rate30`, `below45_7`)
pub const SUFFIX_WINDOWS: [u32; 7] = [3, 7, 14, 30, 60, 90, 180];

/// Largest allowed range for the `isstable` family
pub const STABILITY_THRESHOLD: f64 = 0.3;

/// Level used by the `above45` and `below45` families
pub const THRESHOLD_LEVEL: f64 = 45.0;

/// A stateful windowed computation over one variable
pub trait WindowFunction: fmt::Debug + Send {
    /// Feed the next observation and return the function's value, if defined
    fn compute(&mut self, value: f64, day: i32) -> Option<f64>;

    /// Forget all retained observations
    fn reset(&mut self);
}

/// A parsed function name with its window baked in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionSpec {
    Generic,
    Delta { window: u32 },
    Sum { window: u32 },
    Rate { window: u32 },
    Accel { window: u32 },
    Range { window: u32, absolute: bool },
    PercentChange { window: u32 },
    IsStable { window: u32 },
    RunningAverage { window: u32 },
    Volatility { window: u32 },
    Threshold { above: bool, window: u32 },
    Bollinger { upper: bool, window: u32 },
    RateCross { short: u32, long: u32 },
}

/// Stems that take a plain numeric suffix, with their default window
const SUFFIXED_STEMS: [(&str, u32); 11] = [
    ("delta", 1),
    ("sum", 1),
    ("rate", 1),
    ("accel", 2),
    ("range", 1),
    ("relrange", 1),
    ("percentchange", 2),
    ("isstable", 3),
    ("runavg", 60),
    ("runnavg", 60),
    ("vol", 60),
];

impl FunctionSpec {
    /// Parse a function name case-insensitively
    ///
    /// # Arguments
    /// * `name` - The function name, without the leading `.`
    /// * `token` - The full variable token, used in error messages
    pub fn parse(name: &str, token: &str) -> Result<Self> {
        let lower = name.trim().to_ascii_lowercase();
        Self::parse_lower(&lower).ok_or_else(|| TdfError::UnknownFunction {
            function: name.to_string(),
            token: token.to_string(),
        })
    }

    fn parse_lower(name: &str) -> Option<Self> {
        match name {
            "generic" => return Some(Self::Generic),
            "bollup" => return Some(Self::Bollinger { upper: true, window: 60 }),
            "bolllow" => return Some(Self::Bollinger { upper: false, window: 60 }),
            _ => {}
        }

        if let Some(rest) = name.strip_prefix("faster") {
            let (short, long) = rest.split_once("than")?;
            let short = short.parse::<u32>().ok().filter(|&d| d > 0)?;
            let long = long.parse::<u32>().ok().filter(|&d| d > 0)?;
            return Some(Self::RateCross { short, long });
        }

        for (prefix, above) in [("above45", true), ("below45", false)] {
            if let Some(rest) = name.strip_prefix(prefix) {
                let window = if rest.is_empty() {
                    60
                } else {
                    let days = rest.strip_prefix('_')?.parse::<u32>().ok()?;
                    SUFFIX_WINDOWS.contains(&days).then_some(days)?
                };
                return Some(Self::Threshold { above, window });
            }
        }

        let digits_at = name
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(name.len());
        let (stem, suffix) = name.split_at(digits_at);
        let &(stem, default_window) = SUFFIXED_STEMS.iter().find(|(s, _)| *s == stem)?;
        let window = if suffix.is_empty() {
            default_window
        } else {
            let days = suffix.parse::<u32>().ok()?;
            let allowed = SUFFIX_WINDOWS.contains(&days) && !(stem == "isstable" && days == 3);
            allowed.then_some(days)?
        };

        Some(match stem {
            "delta" => Self::Delta { window },
            "sum" => Self::Sum { window },
            "rate" => Self::Rate { window },
            "accel" => Self::Accel { window },
            "range" => Self::Range { window, absolute: true },
            "relrange" => Self::Range { window, absolute: false },
            "percentchange" => Self::PercentChange { window },
            "isstable" => Self::IsStable { window },
            "runavg" | "runnavg" => Self::RunningAverage { window },
            "vol" => Self::Volatility { window },
            _ => return None,
        })
    }

    /// Create a fresh state machine for this function
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn WindowFunction> {
        match *self {
            Self::Generic => Box::new(Generic::new()),
            Self::Delta { window } => Box::new(Delta::new(window)),
            Self::Sum { window } => Box::new(RunningSum::new(window)),
            Self::Rate { window } => Box::new(Rate::new(window)),
            Self::Accel { window } => Box::new(Acceleration::new(window)),
            Self::Range { window, absolute } => Box::new(Range::new(window, absolute)),
            Self::PercentChange { window } => Box::new(PercentChange::new(window)),
            Self::IsStable { window } => Box::new(IsStable::new(window, STABILITY_THRESHOLD)),
            Self::RunningAverage { window } => Box::new(RunningAverage::new(window)),
            Self::Volatility { window } => Box::new(Volatility::new(window)),
            Self::Threshold { above, window } => {
                Box::new(Threshold::new(above, THRESHOLD_LEVEL, window))
            }
            Self::Bollinger { upper, window } => Box::new(Bollinger::new(upper, window)),
            Self::RateCross { short, long } => Box::new(RateCross::new(short, long)),
        }
    }

    /// Data kind of the function's output given the base variable's kind
    #[must_use]
    pub const fn result_kind(&self, base: DataKind) -> DataKind {
        match self {
            Self::Generic
            | Self::Rate { .. }
            | Self::Accel { .. }
            | Self::PercentChange { .. }
            | Self::RunningAverage { .. }
            | Self::Volatility { .. } => DataKind::Float,
            Self::Range { absolute: false, .. } => DataKind::Float,
            Self::IsStable { .. }
            | Self::Threshold { .. }
            | Self::Bollinger { .. }
            | Self::RateCross { .. } => DataKind::Boolean,
            Self::Delta { .. } | Self::Sum { .. } | Self::Range { absolute: true, .. } => base,
        }
    }
}

impl fmt::Display for FunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stem_with_window = |f: &mut fmt::Formatter<'_>, stem: &str, window: u32| {
            let default = SUFFIXED_STEMS
                .iter()
                .find(|(s, _)| *s == stem)
                .map_or(0, |&(_, d)| d);
            if window == default {
                write!(f, "{stem}")
            } else {
                write!(f, "{stem}{window}")
            }
        };
        match *self {
            Self::Generic => write!(f, "generic"),
            Self::Delta { window } => stem_with_window(f, "delta", window),
            Self::Sum { window } => stem_with_window(f, "sum", window),
            Self::Rate { window } => stem_with_window(f, "rate", window),
            Self::Accel { window } => stem_with_window(f, "accel", window),
            Self::Range { window, absolute: true } => stem_with_window(f, "range", window),
            Self::Range { window, absolute: false } => stem_with_window(f, "relrange", window),
            Self::PercentChange { window } => stem_with_window(f, "percentchange", window),
            Self::IsStable { window } => stem_with_window(f, "isstable", window),
            Self::RunningAverage { window } => stem_with_window(f, "runavg", window),
            Self::Volatility { window } => stem_with_window(f, "vol", window),
            Self::Threshold { above, window } => {
                let stem = if above { "above45" } else { "below45" };
                if window == 60 {
                    write!(f, "{stem}")
                } else {
                    write!(f, "{stem}_{window}")
                }
            }
            Self::Bollinger { upper: true, .. } => write!(f, "bollup"),
            Self::Bollinger { upper: false, .. } => write!(f, "bolllow"),
            Self::RateCross { short, long } => write!(f, "faster{short}than{long}"),
        }
    }
}
