//! JSON value coercion to the schema's numeric kinds.

use serde_json::{Number, Value};

use crate::schema::NumericKind;

/// Integer view of a JSON value.
///
/// Accepts integers, floats without a fractional part, and strings holding
/// either. Everything else (bool, null, arrays, objects, `"abc"`, `1.5`) is
/// rejected.
pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => number_to_integer(n),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

/// Finite float view of a JSON value (numbers and numeric strings).
pub fn coerce_float(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(f)
}

/// Coerce `value` to `kind`, returning the normalized JSON number and its
/// `f64` magnitude for range checks.
pub fn coerce(value: &Value, kind: NumericKind) -> Option<(Value, f64)> {
    match kind {
        NumericKind::Integer => coerce_integer(value).map(|i| (Value::from(i), i as f64)),
        NumericKind::Float => {
            let f = coerce_float(value)?;
            Number::from_f64(f).map(|n| (Value::Number(n), f))
        }
    }
}

fn number_to_integer(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| n.as_f64().and_then(integral))
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
        .then_some(f as i64)
}
