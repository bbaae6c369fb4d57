//! Scaling of user-supplied input values

use rustc_hash::FxHashMap;

/// Clamp to `[min, max]` and scale to a 0..100 percentage, rounded to two decimals
///
/// An empty or inverted range yields 0.
#[must_use]
pub fn normalize_input_value(value: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if span <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    let fraction = (value.clamp(min, max) - min) / span;
    (fraction * 100.0 * 100.0).round() / 100.0
}

/// Parse `name=value;...` text into normalized input rows
///
/// # Arguments
/// * `inputs` - Input names with their declared ranges, in row order
/// * `text` - The user text; with `series`, rows are separated by `/`
/// * `series` - Whether `text` holds more than one row
///
/// # Returns
/// One row per input block, or `None` if any block lacks a named input or
/// holds a non-numeric value for it
#[must_use]
pub fn parse_user_value_list(
    inputs: &[(&str, f64, f64)],
    text: &str,
    series: bool,
) -> Option<Vec<Vec<f64>>> {
    let blocks: Vec<&str> = if series {
        text.split('/').filter(|b| !b.trim().is_empty()).collect()
    } else {
        vec![text]
    };

    blocks
        .into_iter()
        .map(|block| {
            let values: FxHashMap<&str, &str> = block
                .split(';')
                .filter_map(|pair| pair.split_once('='))
                .map(|(name, value)| (name.trim(), value.trim()))
                .collect();
            inputs
                .iter()
                .map(|&(name, min, max)| {
                    let value = values.get(name)?.parse::<f64>().ok()?;
                    Some(normalize_input_value(value, min, max))
                })
                .collect::<Option<Vec<f64>>>()
        })
        .collect()
}
