/*
 * src/normalize/mod.rs
 *
 * File for the Normalizers
 *
 * Purpose:
 *   Pure coercion helpers shared by the per-record-kind validators, plus the
 *   `ImportFailure` type the import orchestrator turns into an ImportProblem
 *   row.
 */

pub mod format;
pub mod meeting;
pub mod naws_row;
pub mod service_body;

use chrono::NaiveTime;
use serde_json::Value as Json;

/// A rejected upstream record: the message is persisted verbatim as
/// `ImportProblem.message`, the raw record as `ImportProblem.data`.
#[derive(Debug, Clone)]
pub struct ImportFailure {
    pub message: String,
    pub raw: String,
}

impl ImportFailure {
    pub fn new(message: impl Into<String>, raw: &Json) -> Self {
        ImportFailure { message: message.into(), raw: raw.to_string() }
    }
}

pub type NormResult<T> = Result<T, ImportFailure>;

fn get<'a>(raw: &'a Json, key: &str) -> Option<&'a Json> {
    raw.get(key)
}

fn get_str<'a>(raw: &'a Json, key: &str) -> Option<&'a str> {
    get(raw, key).and_then(|v| v.as_str())
}

pub fn get_required_str(raw: &Json, key: &str) -> NormResult<String> {
    match get_str(raw, key) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ImportFailure::new(format!("Missing required key {key}"), raw)),
    }
}

pub fn get_optional_str(raw: &Json, key: &str) -> Option<String> {
    get_str(raw, key).filter(|v| !v.is_empty()).map(|v| v.to_string())
}

/// Parses a decimal integer field. Empty or non-numeric ⇒ "Malformed <key>".
pub fn get_int(raw: &Json, key: &str) -> NormResult<i64> {
    match get(raw, key) {
        Some(Json::Number(n)) => n.as_i64().ok_or_else(|| ImportFailure::new(format!("Malformed {key}"), raw)),
        Some(Json::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ImportFailure::new(format!("Malformed {key}"), raw)),
        _ => Err(ImportFailure::new(format!("Malformed {key}"), raw)),
    }
}

pub fn get_int_in(raw: &Json, key: &str, valid: &[i64]) -> NormResult<i64> {
    let v = get_int(raw, key)?;
    if valid.contains(&v) {
        Ok(v)
    } else {
        Err(ImportFailure::new(format!("Invalid {key}"), raw))
    }
}

/// Parses a decimal (lat/lon) field. Invalid ⇒ "Invalid <key>".
pub fn get_decimal(raw: &Json, key: &str) -> NormResult<f64> {
    match get(raw, key) {
        Some(Json::Number(n)) => n.as_f64().ok_or_else(|| ImportFailure::new(format!("Invalid {key}"), raw)),
        Some(Json::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ImportFailure::new(format!("Invalid {key}"), raw)),
        _ => Err(ImportFailure::new(format!("Invalid {key}"), raw)),
    }
}

/// Parses an `hh:mm` field, or bare minutes if no `:` is present
/// ("time (hh:mm)").
pub fn get_time(raw: &Json, key: &str) -> NormResult<NaiveTime> {
    let text = get_str(raw, key).ok_or_else(|| ImportFailure::new(format!("Malformed {key}"), raw))?;
    let normalized = minutes_to_hhmm(text).ok_or_else(|| ImportFailure::new(format!("Malformed {key}"), raw))?;
    let parts: Vec<&str> = normalized.split(':').collect();
    if parts.len() < 2 {
        return Err(ImportFailure::new(format!("Malformed {key}"), raw));
    }
    let hour: u32 = parts[0].parse().map_err(|_| ImportFailure::new(format!("Malformed {key}"), raw))?;
    let minute: u32 = parts[1].parse().map_err(|_| ImportFailure::new(format!("Malformed {key}"), raw))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| ImportFailure::new(format!("Malformed {key}"), raw))
}

/// Parses a duration field into total minutes.
pub fn get_timedelta_minutes(raw: &Json, key: &str) -> NormResult<i32> {
    let text = get_str(raw, key).ok_or_else(|| ImportFailure::new(format!("Malformed {key}"), raw))?;
    if !text.contains(':') {
        let minutes: i32 = text.trim().parse().map_err(|_| ImportFailure::new(format!("Malformed {key}"), raw))?;
        return Ok(minutes);
    }
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() < 2 {
        return Err(ImportFailure::new(format!("Malformed {key}"), raw));
    }
    let hours: i32 = parts[0].parse().map_err(|_| ImportFailure::new(format!("Malformed {key}"), raw))?;
    let minutes: i32 = parts[1].parse().map_err(|_| ImportFailure::new(format!("Malformed {key}"), raw))?;
    Ok(hours * 60 + minutes)
}

/// `hh:mm` values arrive either already colon-separated or as bare minutes
/// (e.g. "90" ⇒ "1:30").
fn minutes_to_hhmm(value: &str) -> Option<String> {
    if value.contains(':') {
        return Some(value.to_string());
    }
    let total: i64 = value.trim().parse().ok()?;
    if total < 60 {
        Some(format!("00:{total:02}"))
    } else {
        Some(format!("{}:{}", total / 60, total % 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_int_rejects_non_numeric() {
        let raw = json!({"id": "abc"});
        assert!(get_int(&raw, "id").is_err());
    }

    #[test]
    fn get_int_accepts_numeric_string() {
        let raw = json!({"id": "42"});
        assert_eq!(get_int(&raw, "id").unwrap(), 42);
    }

    #[test]
    fn get_required_str_rejects_empty() {
        let raw = json!({"name": ""});
        assert!(get_required_str(&raw, "name").is_err());
    }

    #[test]
    fn get_time_interprets_bare_minutes_under_an_hour() {
        let raw = json!({"start_time": "45"});
        let t = get_time(&raw, "start_time").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(0, 45, 0).unwrap());
    }

    #[test]
    fn get_time_interprets_bare_minutes_over_an_hour() {
        let raw = json!({"start_time": "90"});
        let t = get_time(&raw, "start_time").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(1, 30, 0).unwrap());
    }

    #[test]
    fn get_time_accepts_colon_form() {
        let raw = json!({"start_time": "19:30"});
        let t = get_time(&raw, "start_time").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(19, 30, 0).unwrap());
    }

    #[test]
    fn get_timedelta_minutes_from_bare_number() {
        let raw = json!({"duration_time": "90"});
        assert_eq!(get_timedelta_minutes(&raw, "duration_time").unwrap(), 90);
    }

    #[test]
    fn get_timedelta_minutes_from_colon_form() {
        let raw = json!({"duration_time": "1:30"});
        assert_eq!(get_timedelta_minutes(&raw, "duration_time").unwrap(), 90);
    }

    #[test]
    fn get_int_in_rejects_out_of_range_weekday() {
        let raw = json!({"weekday_tinyint": "9"});
        assert!(get_int_in(&raw, "weekday_tinyint", &[1, 2, 3, 4, 5, 6, 7]).is_err());
    }
}
