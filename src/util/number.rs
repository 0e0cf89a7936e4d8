//! Numeric coercion helpers shared by the differ and the scoring function.
//!
//! Upstream data is dirty: ratings arrive as strings, download counts can be
//! missing or negative. Everything that enters a formula passes through here
//! first so that NaN and infinities never reach a score.

/// Replace NaN and infinities with `0.0`.
#[must_use]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Like [`finite_or_zero`] but for optional inputs.
#[must_use]
pub fn finite_or(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => fallback,
    }
}

/// Round to four decimal digits, the precision used for every serialized score.
///
/// Non-finite input rounds to `0.0`. Negative zero is normalised so that
/// serialized output stays byte-identical across runs.
#[must_use]
pub fn round4(value: f64) -> f64 {
    let value = finite_or_zero(value);
    let rounded = (value * 10_000.0).round() / 10_000.0;
    if rounded.abs() < f64::EPSILON { 0.0 } else { rounded }
}

/// Parse a loosely typed numeric field: JSON numbers and numeric strings.
#[must_use]
pub fn lenient_f64(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Parse a download count. Negative or fractional counts are clamped/truncated.
#[must_use]
pub fn lenient_count(value: &serde_json::Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    lenient_f64(value).map(|v| {
        if v <= 0.0 {
            0
        } else {
            // saturating float-to-int cast
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let count = v.trunc() as u64;
            count
        }
    })
}
