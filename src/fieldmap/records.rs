/*
 * src/fieldmap/records.rs
 *
 * File for the Field-Map Record Types
 *
 * Purpose:
 *   Flat, query-joined shapes the field maps' accessor functions read from.
 *   These are assembled by the store after a database round trip; they are
 *   not persisted and carry no `sqlx::FromRow` derive of their own.
 */

use crate::models::{Meeting, MeetingInfo, RootServer, ServiceBody};

/// The `GetServerInfo` descriptor. One synthetic row per response,
/// never persisted.
#[derive(Debug, Clone)]
pub struct ServerInfoRecord {
    pub version: String,
    pub version_int: i64,
    pub langs: Vec<String>,
    pub native_lang: String,
    pub center_longitude: f64,
    pub center_latitude: f64,
    pub center_zoom: i64,
}

#[derive(Debug, Clone)]
pub struct ServiceBodyRecord {
    pub service_body: ServiceBody,
    pub root_server: RootServer,
}

/// One format joined with its translation in the requested language.
#[derive(Debug, Clone)]
pub struct FormatRecord {
    pub id: i64,
    pub root_server_id: i64,
    pub root_server_url: String,
    pub r#type: Option<String>,
    pub world_id: Option<String>,
    pub language: String,
    pub key_string: String,
    pub name: String,
    pub description: Option<String>,
}

/// A meeting's format as seen through the translation cache: the key string
/// in the request language (English fallback) plus the format's own NAWS
/// world id, which drives the NAWS dump's computed columns.
#[derive(Debug, Clone)]
pub struct MeetingFormat {
    pub format_id: i64,
    pub key_string: String,
    pub world_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MeetingRecord {
    pub meeting: Meeting,
    pub info: MeetingInfo,
    pub service_body: ServiceBody,
    pub root_server: RootServer,
    pub formats: Vec<MeetingFormat>,
    /// Present only when the query carried a geospatial filter; the
    /// `distance_in_km`/`distance_in_miles` qualifiers key off it.
    pub distance_km: Option<f64>,
}

const NAWS_RESERVED_WORLD_IDS: &[&str] = &["OPEN", "CLOSED", "WCHR"];

impl MeetingRecord {
    pub fn format_key_strings(&self) -> Vec<String> {
        self.formats.iter().map(|f| f.key_string.clone()).collect()
    }

    pub fn format_ids(&self) -> Vec<String> {
        self.formats.iter().map(|f| f.format_id.to_string()).collect()
    }

    pub fn naws_area_region_world_id(&self) -> String {
        if self.service_body.is_area_or_region() {
            self.service_body.world_id.clone().unwrap_or_default()
        } else {
            String::new()
        }
    }

    /// The nearest area/region in the parent chain. The search row only
    /// joins the meeting's direct service body, so a deeper chain reports
    /// the direct body's name; full ancestry is resolved by the NAWS dump
    /// query, which loads each body with its parent names flattened in.
    pub fn naws_parent_name(&self) -> String {
        if self.service_body.is_area_or_region() {
            self.service_body.name.clone()
        } else {
            String::new()
        }
    }

    pub fn naws_open_or_closed(&self) -> &'static str {
        match self.formats.iter().any(|f| f.world_id.as_deref() == Some("OPEN")) {
            true => "OPEN",
            false => "CLOSED",
        }
    }

    pub fn naws_wheelchair(&self) -> &'static str {
        match self.formats.iter().any(|f| f.world_id.as_deref() == Some("WCHR")) {
            true => "TRUE",
            false => "FALSE",
        }
    }

    pub fn naws_day(&self) -> &'static str {
        weekday_name(self.meeting.weekday)
    }

    /// `HHMM` with no separator, e.g. 19:30 renders as "1930".
    pub fn naws_time(&self) -> String {
        match self.meeting.start_time {
            Some(t) => t.format("%H%M").to_string(),
            None => String::new(),
        }
    }

    pub fn naws_language(&self) -> String {
        self.formats
            .iter()
            .find(|f| f.world_id.as_deref() == Some("LANG"))
            .map(|f| f.key_string.clone())
            .unwrap_or_default()
    }

    /// NAWS format slots: every format with a world id that is not one of
    /// the dedicated OPEN/CLOSED/WCHR columns, ordered by world id.
    pub fn naws_format_slot(&self, slot: usize) -> String {
        let mut world_ids: Vec<&str> = self
            .formats
            .iter()
            .filter_map(|f| f.world_id.as_deref())
            .filter(|w| !w.is_empty() && !NAWS_RESERVED_WORLD_IDS.contains(w))
            .collect();
        world_ids.sort_unstable();
        world_ids.get(slot).map(|w| w.to_string()).unwrap_or_default()
    }

    pub fn naws_city(&self) -> String {
        for candidate in [
            &self.info.location_city_subsection,
            &self.info.location_municipality,
            &self.info.location_neighborhood,
        ] {
            if let Some(value) = candidate {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
        String::new()
    }

    pub fn naws_deleted(&self) -> &'static str {
        if self.meeting.deleted { "D" } else { "" }
    }

    pub fn naws_unpublished(&self) -> &'static str {
        if self.meeting.published { "" } else { "1" }
    }

    /// KML `address`: the location components joined with ", ", with a
    /// separator only where the component and some later component are both
    /// present.
    pub fn kml_address(&self) -> String {
        join_present(&[
            self.info.location_text.as_deref(),
            self.info.location_street.as_deref(),
            self.info.location_city_subsection.as_deref(),
            self.info.location_province.as_deref(),
            self.info.location_postal_code_1.as_deref(),
            self.info.location_nation.as_deref(),
        ])
    }

    /// KML `description`: "<Weekday>, <h:mm AM>, <address parts> (<info>)".
    pub fn kml_description(&self) -> String {
        let mut out = String::new();
        out.push_str(weekday_name(self.meeting.weekday));
        out.push_str(", ");
        if let Some(t) = self.meeting.start_time {
            out.push_str(t.format("%-I:%M %p").to_string().as_str());
        }
        out.push_str(", ");
        out.push_str(&join_present(&[
            self.info.location_street.as_deref(),
            self.info.location_city_subsection.as_deref(),
            self.info.location_province.as_deref(),
            self.info.location_postal_code_1.as_deref(),
            self.info.location_nation.as_deref(),
        ]));
        if let Some(info) = self.info.location_info.as_deref() {
            if !info.is_empty() {
                out.push_str(" (");
                out.push_str(info);
                out.push(')');
            }
        }
        out
    }

    pub fn kml_coordinates(&self) -> String {
        match (self.meeting.longitude, self.meeting.latitude) {
            (Some(lon), Some(lat)) => format!("{lon},{lat},0"),
            _ => String::new(),
        }
    }
}

pub fn weekday_name(weekday: i16) -> &'static str {
    match weekday {
        1 => "Sunday",
        2 => "Monday",
        3 => "Tuesday",
        4 => "Wednesday",
        5 => "Thursday",
        6 => "Friday",
        7 => "Saturday",
        _ => "",
    }
}

/// Comma-joins the non-empty members of `parts`, inserting ", " only
/// between a present component and a later present component.
fn join_present(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .filter_map(|p| *p)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_present_skips_missing_middles() {
        let joined = join_present(&[Some("Hall"), None, Some(""), Some("HI")]);
        assert_eq!(joined, "Hall, HI");
    }

    #[test]
    fn weekday_names_run_sunday_through_saturday() {
        assert_eq!(weekday_name(1), "Sunday");
        assert_eq!(weekday_name(7), "Saturday");
        assert_eq!(weekday_name(9), "");
    }
}
