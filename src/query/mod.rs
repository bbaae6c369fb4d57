//! Queries over compiled timelines
//!
//! Point and windowed lookup, filter predicates, aligned series for model
//! building, and the bulk accessors built on them.

pub mod admissions;
pub mod extract;
pub mod filter;
pub mod lookup;
pub mod metadata;
pub mod normalize;
pub mod series;

pub use admissions::{Admission, admissions};
pub use extract::{
    AlignedSeries, ExtractOptions, TrailingWindow, eligible_points, extract_aligned_series,
    synced_pairs,
};
pub use filter::{FilterPredicate, Relation, evaluate_filter, predicate_variables};
pub use lookup::{DayValue, resolve_value, search_window, value_at};
pub use metadata::{
    DEFAULT_MAX_DAYS_WITH_ZERO, max_days_with_zero, min_max, num_classes, variable_kind,
    variable_names,
};
pub use normalize::{normalize_input_value, parse_user_value_list};
pub use series::{raw_values, value_changes, values_between_days};
