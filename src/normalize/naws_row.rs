/*
 * src/normalize/naws_row.rs
 *
 * File for the NAWS Tabular Dump Row Normalizer
 *
 * Purpose:
 *   Validate one CSV row of a per-service-body GetNAWSDump export into a
 *   meeting the merge path can insert. The dump speaks its own dialect:
 *   weekday as a day name, time as numeric HHMM, open/closed and wheelchair
 *   as dedicated columns, formats as NAWS world ids, and the owning service
 *   body as the AreaRegion world id.
 */

use std::collections::HashMap;

use chrono::NaiveTime;

use super::ImportFailure;

#[derive(Debug, Clone)]
pub struct CanonicalNawsMeeting {
    pub bmlt_id: i64,
    pub world_id: Option<String>,
    pub name: String,
    pub weekday: i16,
    pub start_time: Option<NaiveTime>,
    pub language: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// AreaRegion column; resolved to a service body by world_id.
    pub service_body_world_id: Option<String>,
    /// NAWS world ids from Closed/WheelChr/Format1..5, resolved to this
    /// root's formats by world_id.
    pub format_world_ids: Vec<String>,
    pub location_text: Option<String>,
    pub location_street: Option<String>,
    pub location_municipality: Option<String>,
    pub location_neighborhood: Option<String>,
    pub location_province: Option<String>,
    pub location_postal_code_1: Option<String>,
    pub location_nation: Option<String>,
    pub location_info: Option<String>,
    pub deleted: bool,
    pub unpublished: bool,
}

pub type NawsRow = HashMap<String, String>;

fn get<'a>(row: &'a NawsRow, key: &str) -> Option<&'a str> {
    row.get(key).map(String::as_str).map(str::trim).filter(|v| !v.is_empty())
}

fn optional(row: &NawsRow, key: &str) -> Option<String> {
    get(row, key).map(str::to_string)
}

fn failure(message: impl Into<String>, row: &NawsRow) -> ImportFailure {
    let mut pairs: Vec<(&String, &String)> = row.iter().collect();
    pairs.sort();
    let raw = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",");
    ImportFailure { message: message.into(), raw }
}

fn weekday_from_day_name(name: &str) -> Option<i16> {
    Some(match name {
        "Sunday" => 1,
        "Monday" => 2,
        "Tuesday" => 3,
        "Wednesday" => 4,
        "Thursday" => 5,
        "Friday" => 6,
        "Saturday" => 7,
        _ => return None,
    })
}

/// "1930" ⇒ 19:30, "730" ⇒ 7:30.
fn time_from_hhmm(value: &str) -> Option<NaiveTime> {
    let digits: i64 = value.parse().ok()?;
    let (hours, minutes) = (digits / 100, digits % 100);
    NaiveTime::from_hms_opt(u32::try_from(hours).ok()?, u32::try_from(minutes).ok()?, 0)
}

pub fn validate(row: &NawsRow) -> Result<CanonicalNawsMeeting, ImportFailure> {
    let bmlt_id = get(row, "bmlt_id")
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| failure("Malformed bmlt_id", row))?;

    let name = get(row, "CommitteeName")
        .ok_or_else(|| failure("Missing required key CommitteeName", row))?
        .to_string();

    let weekday = get(row, "Day")
        .and_then(weekday_from_day_name)
        .ok_or_else(|| failure("Malformed Day", row))?;

    let start_time = get(row, "Time").and_then(time_from_hhmm);
    let latitude = get(row, "Latitude").and_then(|v| v.parse().ok());
    let longitude = get(row, "Longitude").and_then(|v| v.parse().ok());

    let mut format_world_ids = Vec::new();
    match get(row, "Closed") {
        Some("CLOSED") => format_world_ids.push("CLOSED".to_string()),
        Some("OPEN") => format_world_ids.push("OPEN".to_string()),
        _ => {}
    }
    if get(row, "WheelChr").map(|v| v.eq_ignore_ascii_case("true")) == Some(true) {
        format_world_ids.push("WCHR".to_string());
    }
    for slot in ["Format1", "Format2", "Format3", "Format4", "Format5"] {
        if let Some(world_id) = get(row, slot) {
            format_world_ids.push(world_id.to_string());
        }
    }

    Ok(CanonicalNawsMeeting {
        bmlt_id,
        world_id: optional(row, "Committee"),
        name,
        weekday,
        start_time,
        language: optional(row, "Language1"),
        latitude,
        longitude,
        service_body_world_id: optional(row, "AreaRegion"),
        format_world_ids,
        location_text: optional(row, "Place"),
        location_street: optional(row, "Address"),
        location_municipality: optional(row, "City"),
        location_neighborhood: optional(row, "LocBorough"),
        location_province: optional(row, "State"),
        location_postal_code_1: optional(row, "Zip"),
        location_nation: optional(row, "Country"),
        location_info: optional(row, "Directions"),
        deleted: get(row, "Delete") == Some("D"),
        unpublished: get(row, "unpublished") == Some("1"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> NawsRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn rejects_unknown_day_name() {
        let r = row(&[("bmlt_id", "7"), ("CommitteeName", "Noon"), ("Day", "Someday")]);
        assert!(validate(&r).is_err());
    }

    #[test]
    fn derives_weekday_and_time_from_dump_dialect() {
        let r = row(&[
            ("bmlt_id", "7"),
            ("CommitteeName", "Noon Group"),
            ("Day", "Wednesday"),
            ("Time", "1930"),
            ("unpublished", "1"),
        ]);
        let m = validate(&r).unwrap();
        assert_eq!(m.weekday, 4);
        assert_eq!(m.start_time, NaiveTime::from_hms_opt(19, 30, 0));
        assert!(m.unpublished);
        assert!(!m.deleted);
    }

    #[test]
    fn collects_flag_columns_as_format_world_ids() {
        let r = row(&[
            ("bmlt_id", "7"),
            ("CommitteeName", "Noon Group"),
            ("Day", "Monday"),
            ("Closed", "CLOSED"),
            ("WheelChr", "TRUE"),
            ("Format1", "BEG"),
        ]);
        let m = validate(&r).unwrap();
        assert_eq!(m.format_world_ids, vec!["CLOSED", "WCHR", "BEG"]);
    }

    #[test]
    fn three_digit_time_parses_as_single_digit_hour() {
        let r = row(&[("bmlt_id", "1"), ("CommitteeName", "Dawn"), ("Day", "Sunday"), ("Time", "730")]);
        let m = validate(&r).unwrap();
        assert_eq!(m.start_time, NaiveTime::from_hms_opt(7, 30, 0));
    }
}
