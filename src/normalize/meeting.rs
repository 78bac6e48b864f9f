/*
 * src/normalize/meeting.rs
 *
 * File for the Meeting Normalizer
 *
 * Purpose:
 *   Validate a single raw GetSearchResults record. Format references come
 *   as either a `format_shared_id_list` (numeric source ids) or a
 *   comma-separated `formats` key-string list; the import orchestrator
 *   resolves whichever is present against the formats already upserted for
 *   the same root server.
 */

use serde_json::Value as Json;

use super::{get_int_in, get_optional_str, get_required_str, get_time, get_timedelta_minutes, NormResult};

#[derive(Debug, Clone)]
pub enum FormatRefs {
    SharedIds(Vec<i64>),
    KeyStrings(Vec<String>),
    None,
}

#[derive(Debug, Clone)]
pub struct CanonicalMeeting {
    pub source_id: i64,
    pub service_body_source_id: i64,
    pub name: String,
    pub weekday: i16,
    pub venue_type: Option<String>,
    pub start_time: Option<chrono::NaiveTime>,
    pub duration_minutes: Option<i32>,
    pub language: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub published: bool,
    pub formats: FormatRefs,
    pub info: CanonicalMeetingInfo,
}

#[derive(Debug, Clone, Default)]
pub struct CanonicalMeetingInfo {
    pub email: Option<String>,
    pub location_text: Option<String>,
    pub location_info: Option<String>,
    pub location_street: Option<String>,
    pub location_city_subsection: Option<String>,
    pub location_neighborhood: Option<String>,
    pub location_municipality: Option<String>,
    pub location_sub_province: Option<String>,
    pub location_province: Option<String>,
    pub location_postal_code_1: Option<String>,
    pub location_nation: Option<String>,
    pub train_lines: Option<String>,
    pub bus_lines: Option<String>,
    pub world_id: Option<String>,
    pub comments: Option<String>,
    pub virtual_meeting_link: Option<String>,
    pub phone_meeting_number: Option<String>,
    pub virtual_meeting_additional_info: Option<String>,
}

pub fn validate(raw: &Json) -> NormResult<CanonicalMeeting> {
    let source_id = super::get_int(raw, "id_bigint")?;
    let service_body_source_id = super::get_int(raw, "service_body_bigint")?;
    let name = get_required_str(raw, "meeting_name")?;
    let weekday = get_int_in(raw, "weekday_tinyint", &[1, 2, 3, 4, 5, 6, 7])? as i16;

    let start_time = get_time(raw, "start_time").ok();
    let duration_minutes = get_timedelta_minutes(raw, "duration_time").ok();

    let latitude = super::get_decimal(raw, "latitude").ok();
    let longitude = super::get_decimal(raw, "longitude").ok();

    // `format_shared_id_list` arrives as either a JSON array or a
    // comma-separated string depending on the root server's version.
    let formats = match raw.get("format_shared_id_list") {
        Some(Json::Array(items)) if !items.is_empty() => FormatRefs::SharedIds(
            items
                .iter()
                .filter_map(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
                .collect(),
        ),
        Some(Json::String(list)) if !list.is_empty() => {
            FormatRefs::SharedIds(list.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        }
        _ => match get_optional_str(raw, "formats") {
            Some(list) => FormatRefs::KeyStrings(
                list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            ),
            None => FormatRefs::None,
        },
    };

    let info = CanonicalMeetingInfo {
        email: get_optional_str(raw, "email_contact"),
        location_text: get_optional_str(raw, "location_text"),
        location_info: get_optional_str(raw, "location_info"),
        location_street: get_optional_str(raw, "location_street"),
        location_city_subsection: get_optional_str(raw, "location_city_subsection"),
        location_neighborhood: get_optional_str(raw, "location_neighborhood"),
        location_municipality: get_optional_str(raw, "location_municipality"),
        location_sub_province: get_optional_str(raw, "location_sub_province"),
        location_province: get_optional_str(raw, "location_province"),
        location_postal_code_1: get_optional_str(raw, "location_postal_code_1"),
        location_nation: get_optional_str(raw, "location_nation"),
        train_lines: get_optional_str(raw, "train_lines"),
        bus_lines: get_optional_str(raw, "bus_lines"),
        world_id: get_optional_str(raw, "worldid_mixed"),
        comments: get_optional_str(raw, "comments"),
        virtual_meeting_link: get_optional_str(raw, "virtual_meeting_link"),
        phone_meeting_number: get_optional_str(raw, "phone_meeting_number"),
        virtual_meeting_additional_info: get_optional_str(raw, "virtual_meeting_additional_info"),
    };

    Ok(CanonicalMeeting {
        source_id,
        service_body_source_id,
        name,
        weekday,
        venue_type: get_optional_str(raw, "venue_type"),
        start_time,
        duration_minutes,
        language: get_optional_str(raw, "lang_enum").or_else(|| Some("en".to_string())),
        latitude,
        longitude,
        published: raw.get("published").and_then(|v| v.as_str()).unwrap_or("0") == "1",
        formats,
        info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_out_of_range_weekday() {
        let raw = json!({
            "id_bigint": "1", "service_body_bigint": "1",
            "meeting_name": "Noon", "weekday_tinyint": "8",
        });
        assert!(validate(&raw).is_err());
    }

    #[test]
    fn parses_comma_separated_format_key_strings() {
        let raw = json!({
            "id_bigint": "1", "service_body_bigint": "1",
            "meeting_name": "Noon", "weekday_tinyint": "3",
            "formats": "O,D, BT",
        });
        let m = validate(&raw).unwrap();
        match m.formats {
            FormatRefs::KeyStrings(keys) => assert_eq!(keys, vec!["O", "D", "BT"]),
            _ => panic!("expected KeyStrings"),
        }
    }

    #[test]
    fn prefers_shared_id_list_over_key_strings() {
        let raw = json!({
            "id_bigint": "1", "service_body_bigint": "1",
            "meeting_name": "Noon", "weekday_tinyint": "3",
            "format_shared_id_list": [1, 2],
            "formats": "O,D",
        });
        let m = validate(&raw).unwrap();
        match m.formats {
            FormatRefs::SharedIds(ids) => assert_eq!(ids, vec![1, 2]),
            _ => panic!("expected SharedIds"),
        }
    }

    #[test]
    fn shared_id_list_accepts_the_comma_separated_form() {
        let raw = json!({
            "id_bigint": "1", "service_body_bigint": "1",
            "meeting_name": "Noon", "weekday_tinyint": "3",
            "format_shared_id_list": "3,5",
        });
        let m = validate(&raw).unwrap();
        match m.formats {
            FormatRefs::SharedIds(ids) => assert_eq!(ids, vec![3, 5]),
            _ => panic!("expected SharedIds"),
        }
    }

    #[test]
    fn published_defaults_to_false() {
        let raw = json!({
            "id_bigint": "1", "service_body_bigint": "1",
            "meeting_name": "Noon", "weekday_tinyint": "3",
        });
        assert!(!validate(&raw).unwrap().published);
        let raw = json!({
            "id_bigint": "1", "service_body_bigint": "1",
            "meeting_name": "Noon", "weekday_tinyint": "3", "published": "1",
        });
        assert!(validate(&raw).unwrap().published);
    }

    #[test]
    fn missing_latitude_is_tolerated() {
        let raw = json!({
            "id_bigint": "1", "service_body_bigint": "1",
            "meeting_name": "Noon", "weekday_tinyint": "3",
        });
        let m = validate(&raw).unwrap();
        assert_eq!(m.latitude, None);
    }
}
