use crate::domain::{
    length::LengthCategory,
    track::{CleanRow, EnrichedRow},
};

const MS_PER_MINUTE: f64 = 60_000.0;

/// Adds `duration_minutes` and `length_category` to a clean row.
///
/// Both stay `None` when the duration is missing, non-numeric or negative.
pub fn enrich(row: CleanRow) -> EnrichedRow {
    let duration_minutes = row
        .duration_ms
        .as_deref()
        .and_then(parse_duration_ms)
        .map(|ms| round_2(ms / MS_PER_MINUTE));
    let length_category = duration_minutes.map(LengthCategory::from_minutes);

    EnrichedRow {
        row,
        duration_minutes,
        length_category,
    }
}

fn parse_duration_ms(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
}

/// rounds half away from zero to two decimals
fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
