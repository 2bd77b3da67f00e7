use log::warn;

use super::document::Dialect;

/// A normalized numeric value. Integral strings stay integers so callers
/// can tell "1234" from "1234.5"; facts ultimately store an f64 either way.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumericValue {
    Integer(i64),
    Float(f64),
}

impl NumericValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            NumericValue::Integer(v) => *v as f64,
            NumericValue::Float(v) => *v,
        }
    }
}

/// Converts a display string to a number: thousands separators and
/// currency symbols are stripped, parentheses denote negation. Returns
/// `None` for anything non-numeric; that is a skip signal, not an error.
pub fn normalize(text: &str) -> Option<NumericValue> {
    let mut cleaned = text.trim().replace(',', "").replace('$', "");
    if cleaned.is_empty() {
        return None;
    }

    let negative = cleaned.starts_with('(') && cleaned.ends_with(')');
    if negative {
        cleaned = cleaned[1..cleaned.len() - 1].trim().to_string();
    }

    let mut number: f64 = cleaned.parse().ok()?;
    if negative {
        number = -number;
    }
    if !number.is_finite() {
        return None;
    }

    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Some(NumericValue::Integer(number as i64))
    } else {
        Some(NumericValue::Float(number))
    }
}

/// Applies the `decimals` hint to a normalized value. `INF` or a missing
/// hint leaves the value untouched. The power-of-ten rescale applies only
/// to the inline dialect; standalone instance documents carry values that
/// are already fully scaled.
pub fn apply_decimals(value: f64, hint: Option<&str>, dialect: Dialect) -> f64 {
    let hint = match hint {
        Some(h) if !h.is_empty() && !h.eq_ignore_ascii_case("INF") => h,
        _ => return value,
    };

    match hint.trim().parse::<i32>() {
        Ok(decimals) => match dialect {
            Dialect::Inline => value * 10f64.powi(-decimals),
            Dialect::Standard => value,
        },
        Err(_) => {
            warn!("Unknown decimals hint '{}'; using raw value", hint);
            value
        }
    }
}
