/*
 * src/fieldmap/value.rs
 *
 * File for the Field Value Type
 *
 * Purpose:
 *   A small sum type every field-map accessor returns, together with the
 *   the wire protocol's display-string normalization rules.
 */

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    Decimal(f64),
    /// Minutes; rendered as `H:MM:SS`, zero-padding the hour to two digits
    /// when the total is under ten hours.
    DurationMinutes(i32),
    List(Vec<String>),
    None,
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn opt_str(s: &Option<String>) -> Self {
        match s {
            Some(v) if !v.is_empty() => Value::Str(v.clone()),
            _ => Value::None,
        }
    }

    /// The canonical display string for this value (bool → "1"/"0", list →
    /// comma-joined distinct elements, Decimal → trailing zeros stripped,
    /// None → "").
    pub fn display(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Bool(b) => if *b { "1".to_string() } else { "0".to_string() },
            Value::Decimal(d) => format_decimal(*d),
            Value::DurationMinutes(minutes) => format_duration_minutes(*minutes),
            Value::List(items) => {
                let mut seen = Vec::new();
                for item in items {
                    if !seen.contains(item) {
                        seen.push(item.clone());
                    }
                }
                seen.join(",")
            }
            Value::None => String::new(),
        }
    }
}

fn format_decimal(value: f64) -> String {
    let text = format!("{value:.12}");
    let trimmed = text.trim_end_matches('0');
    let trimmed = trimmed.trim_end_matches('.');
    if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
}

fn format_duration_minutes(minutes: i32) -> String {
    let seconds = minutes as i64 * 60;
    let hours = seconds / 3600;
    let rem = seconds % 3600;
    if seconds < 36_000 {
        format!("0{hours}:{:02}:{:02}", rem / 60, rem % 60)
    } else {
        format!("{hours}:{:02}:{:02}", rem / 60, rem % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_renders_as_one_or_zero() {
        assert_eq!(Value::Bool(true).display(), "1");
        assert_eq!(Value::Bool(false).display(), "0");
    }

    #[test]
    fn list_dedupes_and_joins_with_commas() {
        let v = Value::List(vec!["O".into(), "D".into(), "O".into()]);
        assert_eq!(v.display(), "O,D");
    }

    #[test]
    fn decimal_strips_trailing_zeros() {
        assert_eq!(Value::Decimal(45.5).display(), "45.5");
        assert_eq!(Value::Decimal(45.0).display(), "45");
    }

    #[test]
    fn duration_under_ten_hours_pads_the_hour() {
        assert_eq!(Value::DurationMinutes(90).display(), "01:30:00");
    }

    #[test]
    fn duration_of_ten_hours_or_more_is_unpadded() {
        assert_eq!(Value::DurationMinutes(630).display(), "10:30:00");
    }

    #[test]
    fn none_renders_empty() {
        assert_eq!(Value::None.display(), "");
    }
}
