//! Bucketed time-to-event categories

/// How far in the future an event lies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FutureCategory {
    NowOrPast = 0,
    WithinOneDay = 1,
    WithinSevenDays = 2,
    WithinThirtyDays = 3,
    WithinOneYear = 4,
    WithinTenYears = 5,
    NotWithinTenYears = 6,
}

impl FutureCategory {
    /// Number of categories
    pub const COUNT: usize = 7;

    /// Bucket the distance from `current_day` to `target_day`
    ///
    /// A missing target falls in the last bucket.
    #[must_use]
    pub const fn between(current_day: i32, target_day: Option<i32>) -> Self {
        let Some(target) = target_day else {
            return Self::NotWithinTenYears;
        };
        match target - current_day {
            i32::MIN..=0 => Self::NowOrPast,
            1 => Self::WithinOneDay,
            2..=7 => Self::WithinSevenDays,
            8..=30 => Self::WithinThirtyDays,
            31..=365 => Self::WithinOneYear,
            366..=3650 => Self::WithinTenYears,
            _ => Self::NotWithinTenYears,
        }
    }

    /// Numeric label stored in snapshots
    #[must_use]
    pub fn as_value(self) -> f64 {
        f64::from(self as u8)
    }
}
