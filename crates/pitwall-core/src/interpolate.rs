//! Value lookup at arbitrary timestamps.
//!
//! The lookup is a binary search over sample timestamps, so cost stays
//! O(log n) per call regardless of series length. It runs once per driver
//! per channel on every tick.

use crate::telemetry::{ChannelKind, SampleValue, TelemetrySeries};

/// Value of `series` at `t_ms`.
///
/// - Empty series: `None`.
/// - `t_ms` outside the recorded span: the nearest boundary sample.
/// - Exact sample timestamp: that sample's value.
/// - Numeric channels: linear interpolation between the bracketing pair.
///   Non-numeric values in a numeric channel fall back to the earlier sample.
/// - Categorical channels: the last sample at or before `t_ms`.
pub fn value_at(series: &TelemetrySeries, kind: ChannelKind, t_ms: f64) -> Option<SampleValue> {
    let samples = series.samples();
    let first = samples.first()?;
    let last = samples.last()?;

    if t_ms <= first.timestamp_ms {
        return Some(first.value.clone());
    }
    if t_ms >= last.timestamp_ms {
        return Some(last.value.clone());
    }

    // First index whose timestamp is > t. Bounds above guarantee 1..len.
    let upper = samples.partition_point(|s| s.timestamp_ms <= t_ms);
    let before = &samples[upper - 1];
    if before.timestamp_ms == t_ms || kind == ChannelKind::Categorical {
        return Some(before.value.clone());
    }

    let after = &samples[upper];
    match (before.value.as_f64(), after.value.as_f64()) {
        (Some(v0), Some(v1)) => {
            let ratio = (t_ms - before.timestamp_ms) / (after.timestamp_ms - before.timestamp_ms);
            Some(SampleValue::Number(v0 + (v1 - v0) * ratio))
        }
        _ => Some(before.value.clone()),
    }
}

/// Numeric shortcut over [`value_at`].
pub fn numeric_at(series: &TelemetrySeries, t_ms: f64) -> Option<f64> {
    value_at(series, ChannelKind::Numeric, t_ms).and_then(|v| v.as_f64())
}
