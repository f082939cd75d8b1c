//! Typed coercion of stored attribute values
//!
//! Every accessor in this module is total except [`to_date`]: numbers that
//! cannot be read degrade to zero, unknown enum values to `None`. Numeric
//! strings are read by their longest valid leading token, so `"078"` is 78,
//! `" 901"` is 901, `"1ab"` is 1 and `"nan"` is 0.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use satchel_core::{invalid_argument_error, SatchelResult};
use serde_json::{Map, Value};

const COMPONENT: &str = "cast";

/// A closed set of named variants parseable from their stored raw value
///
/// ```
/// use satchel_session::BackedEnum;
/// use serde_json::Value;
///
/// #[derive(Debug, PartialEq)]
/// enum Theme {
///     Light,
///     Dark,
/// }
///
/// impl BackedEnum for Theme {
///     fn try_from_raw(raw: &Value) -> Option<Self> {
///         match raw.as_str()? {
///             "light" => Some(Theme::Light),
///             "dark" => Some(Theme::Dark),
///             _ => None,
///         }
///     }
/// }
///
/// assert_eq!(Theme::try_from_raw(&Value::from("dark")), Some(Theme::Dark));
/// ```
pub trait BackedEnum: Sized {
    fn try_from_raw(raw: &Value) -> Option<Self>;
}

/// Returns the longest prefix of `input` that reads as a decimal number
///
/// Leading whitespace is skipped. The grammar is an optional sign, digits,
/// an optional fraction and an optional exponent; at least one digit must
/// appear in the mantissa. Returns an empty string when nothing matches.
pub fn numeric_prefix(input: &str) -> &str {
    let s = input.trim_start_matches([' ', '\t', '\n', '\r', '\x0b', '\x0c']);
    let bytes = s.as_bytes();
    let digits_from = |mut at: usize| {
        while bytes.get(at).is_some_and(u8::is_ascii_digit) {
            at += 1;
        }
        at
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_start = end;
    end = digits_from(end);
    let int_digits = end - int_start;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        frac_digits = frac_end - end - 1;
        if int_digits > 0 || frac_digits > 0 {
            end = frac_end;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return "";
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_start = end + 1;
        if matches!(bytes.get(exp_start), Some(b'+' | b'-')) {
            exp_start += 1;
        }
        let exp_end = digits_from(exp_start);
        if exp_end > exp_start {
            end = exp_end;
        }
    }

    &s[..end]
}

/// Parse the leading numeric token of `input` as an integer
///
/// Fractions truncate toward zero and out-of-range values saturate.
pub fn parse_int_prefix(input: &str) -> i64 {
    let prefix = numeric_prefix(input);
    if prefix.is_empty() {
        return 0;
    }

    if prefix.contains(['.', 'e', 'E']) {
        return parse_float_prefix(prefix) as i64;
    }

    prefix.parse::<i64>().unwrap_or(if prefix.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Parse the leading numeric token of `input` as a float
pub fn parse_float_prefix(input: &str) -> f64 {
    let prefix = numeric_prefix(input);
    if prefix.is_empty() {
        return 0.0;
    }
    prefix.parse::<f64>().unwrap_or(0.0)
}

/// True for float numbers and strings whose leading number has a fraction or exponent
pub fn reads_as_float(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_f64(),
        Value::String(s) => numeric_prefix(s).contains(['.', 'e', 'E']),
        _ => false,
    }
}

pub fn to_integer(value: &Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Bool(b) => i64::from(*b),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        Value::String(s) => parse_int_prefix(s),
        Value::Array(items) => i64::from(!items.is_empty()),
        Value::Object(map) => i64::from(!map.is_empty()),
    }
}

pub fn to_float(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_float_prefix(s),
        Value::Array(items) => f64::from(u8::from(!items.is_empty())),
        Value::Object(map) => f64::from(u8::from(!map.is_empty())),
    }
}

/// `1`, `true`, `"on"` and `"yes"` (any case) are true; everything else is false
pub fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
        _ => false,
    }
}

/// Render a value the way it would be printed into a template
pub fn to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => {
            if n.is_f64() {
                format_float(n.as_f64().unwrap_or(0.0))
            } else {
                n.to_string()
            }
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Interpret a stored value as a timestamp
///
/// `format` uses chrono's strftime syntax, with `"U"` accepted for unix
/// seconds. Without a format the value is tried as RFC 3339, then
/// `Y-m-d H:M:S` (two- or four-digit year), a bare date (midnight), a bare
/// time (today) and finally a unix timestamp. Null yields `Ok(None)`.
pub fn to_date(
    value: &Value,
    format: Option<&str>,
    field: &str,
) -> SatchelResult<Option<NaiveDateTime>> {
    let raw = match value {
        Value::Null => return Ok(None),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        other => {
            return Err(invalid_argument_error!(
                format!("Cannot interpret {} as a date", other),
                field,
                COMPONENT
            ))
        }
    };

    let parsed = match format {
        Some(format) => parse_with_format(&raw, format),
        None => parse_automatic(&raw),
    };

    parsed.map(Some).ok_or_else(|| {
        invalid_argument_error!(
            match format {
                Some(format) => format!("Value '{}' does not match date format '{}'", raw, format),
                None => format!("Could not parse '{}' as a date", raw),
            },
            field,
            COMPONENT
        )
    })
}

fn parse_with_format(raw: &str, format: &str) -> Option<NaiveDateTime> {
    let format = if format == "U" { "%s" } else { format };

    NaiveDateTime::parse_from_str(raw, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            NaiveTime::parse_from_str(raw, format)
                .ok()
                .map(|time| Utc::now().date_naive().and_time(time))
        })
}

fn parse_automatic(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    // "20-01-01" is a two-digit year, not the year 20
    let two_digit_year = raw.split('-').next().map_or(0, str::len) == 2;
    let datetime_formats: &[&str] = if two_digit_year {
        &["%y-%m-%d %H:%M:%S", "%y-%m-%dT%H:%M:%S"]
    } else {
        &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
    };
    let date_format = if two_digit_year { "%y-%m-%d" } else { "%Y-%m-%d" };

    for format in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, date_format) {
        return date.and_hms_opt(0, 0, 0);
    }

    if let Ok(time) = NaiveTime::parse_from_str(raw, "%H:%M:%S") {
        return Some(Utc::now().date_naive().and_time(time));
    }

    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        let secs = raw.parse::<i64>().ok()?;
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc());
    }

    None
}

/// Ordered container returned by `collect`
///
/// Always wraps either a sequence or a keyed mapping. Scalars become a
/// one-element sequence and null becomes an empty one.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    items: Value,
}

impl Collection {
    pub fn from_value(value: Value) -> Self {
        let items = match value {
            Value::Null => Value::Array(Vec::new()),
            Value::Array(_) | Value::Object(_) => value,
            scalar => Value::Array(vec![scalar]),
        };
        Self { items }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            items: Value::Object(map),
        }
    }

    pub fn len(&self) -> usize {
        match &self.items {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The wrapped sequence or mapping
    pub fn all(&self) -> &Value {
        &self.items
    }

    /// Values in order, discarding keys
    pub fn values(&self) -> Vec<&Value> {
        match &self.items {
            Value::Array(items) => items.iter().collect(),
            Value::Object(map) => map.values().collect(),
            _ => Vec::new(),
        }
    }

    pub fn into_inner(self) -> Value {
        self.items
    }
}
