/*
 * src/fieldmap/maps.rs
 *
 * File for the Concrete Field Maps
 *
 * Purpose:
 *   One ordered `FieldMap` per record kind. Key names and ordering follow
 *   the upstream semantic protocol exactly: external-name order is the
 *   canonical column order for the tabular renderers, and the meeting map's
 *   key set doubles as the `GetFieldKeys` catalog.
 */

use super::records::{FormatRecord, MeetingRecord, ServerInfoRecord, ServiceBodyRecord};
use super::{Accessor, FieldMap, FieldMapEntry, Value};
use crate::query::geospatial::km_to_miles;

macro_rules! entry {
    ($key:expr, $get:expr) => {
        FieldMapEntry { key: $key, accessor: Accessor::Get($get), qualifier: None }
    };
    ($key:expr, $get:expr, $qualifier:expr) => {
        FieldMapEntry { key: $key, accessor: Accessor::Get($get), qualifier: Some($qualifier) }
    };
}

/// Declared in the map but never sourced from any input; always projects as
/// the empty string (reserved outputs).
macro_rules! reserved {
    ($key:expr) => {
        FieldMapEntry { key: $key, accessor: Accessor::Reserved, qualifier: None }
    };
}

fn has_distance(r: &MeetingRecord) -> bool {
    r.distance_km.is_some()
}

static SERVER_INFO_MAP: &[FieldMapEntry<ServerInfoRecord>] = &[
    entry!("version", |r| Value::str(r.version.clone())),
    entry!("versionInt", |r| Value::Int(r.version_int)),
    entry!("langs", |r| Value::List(r.langs.clone())),
    entry!("nativeLang", |r| Value::str(r.native_lang.clone())),
    entry!("centerLongitude", |r| Value::Decimal(r.center_longitude)),
    entry!("centerLatitude", |r| Value::Decimal(r.center_latitude)),
    entry!("centerZoom", |r| Value::Int(r.center_zoom)),
    entry!("available_keys", |_| Value::List(available_field_keys())),
];

pub fn server_info_field_map() -> FieldMap<ServerInfoRecord> {
    FieldMap::new(SERVER_INFO_MAP)
}

static SERVICE_BODIES_MAP: &[FieldMapEntry<ServiceBodyRecord>] = &[
    entry!("id", |r| Value::Int(r.service_body.id)),
    entry!("parent_id", |r| Value::Int(r.service_body.calculated_parent_id())),
    entry!("name", |r| Value::str(r.service_body.name.clone())),
    entry!("description", |r| Value::opt_str(&r.service_body.description)),
    entry!("type", |r| Value::opt_str(&r.service_body.r#type)),
    entry!("url", |r| Value::opt_str(&r.service_body.url)),
    entry!("root_server_id", |r| Value::Int(r.service_body.root_server_id)),
    entry!("helpline", |r| Value::opt_str(&r.service_body.helpline)),
    entry!("world_id", |r| Value::opt_str(&r.service_body.world_id)),
    entry!("root_server_uri", |r| Value::str(r.root_server.url.clone())),
];

pub fn service_bodies_field_map() -> FieldMap<ServiceBodyRecord> {
    FieldMap::new(SERVICE_BODIES_MAP)
}

static FORMAT_MAP: &[FieldMapEntry<FormatRecord>] = &[
    entry!("key_string", |r| Value::str(r.key_string.clone())),
    entry!("name_string", |r| Value::str(r.name.clone())),
    entry!("description_string", |r| Value::opt_str(&r.description)),
    entry!("lang", |r| Value::str(r.language.clone())),
    entry!("id", |r| Value::Int(r.id)),
    entry!("root_server_id", |r| Value::Int(r.root_server_id)),
    entry!("world_id", |r| Value::opt_str(&r.world_id)),
    entry!("root_server_uri", |r| Value::str(r.root_server_url.clone())),
    entry!("format_type_enum", |r| Value::opt_str(&r.r#type), |r: &FormatRecord| r.r#type.is_some()),
];

pub fn format_field_map() -> FieldMap<FormatRecord> {
    FieldMap::new(FORMAT_MAP)
}

static MEETING_MAP: &[FieldMapEntry<MeetingRecord>] = &[
    entry!("id_bigint", |r| Value::Int(r.meeting.id)),
    entry!("worldid_mixed", |r| Value::opt_str(&r.info.world_id)),
    reserved!("shared_group_id_bigint"),
    entry!("service_body_bigint", |r| Value::Int(r.service_body.id)),
    entry!("weekday_tinyint", |r| Value::Int(r.meeting.weekday as i64)),
    entry!("venue_type", |r| Value::opt_str(&r.meeting.venue_type)),
    entry!("start_time", |r| match r.meeting.start_time {
        Some(t) => Value::str(t.format("%H:%M:%S").to_string()),
        None => Value::None,
    }),
    entry!("duration_time", |r| match r.meeting.duration_minutes {
        Some(m) => Value::DurationMinutes(m),
        None => Value::None,
    }),
    entry!("formats", |r| Value::List(r.format_key_strings())),
    entry!("lang_enum", |r| Value::opt_str(&r.meeting.language)),
    entry!("longitude", |r| match r.meeting.longitude {
        Some(v) => Value::Decimal(v),
        None => Value::None,
    }),
    entry!("latitude", |r| match r.meeting.latitude {
        Some(v) => Value::Decimal(v),
        None => Value::None,
    }),
    entry!("distance_in_km", |r| match r.distance_km {
        Some(km) => Value::Decimal(km),
        None => Value::None,
    }, has_distance),
    entry!("distance_in_miles", |r| match r.distance_km {
        Some(km) => Value::Decimal(km_to_miles(km)),
        None => Value::None,
    }, has_distance),
    entry!("email_contact", |r| Value::opt_str(&r.info.email)),
    entry!("meeting_name", |r| Value::str(r.meeting.name.clone())),
    entry!("location_text", |r| Value::opt_str(&r.info.location_text)),
    entry!("location_info", |r| Value::opt_str(&r.info.location_info)),
    entry!("location_street", |r| Value::opt_str(&r.info.location_street)),
    entry!("location_city_subsection", |r| Value::opt_str(&r.info.location_city_subsection)),
    entry!("location_neighborhood", |r| Value::opt_str(&r.info.location_neighborhood)),
    entry!("location_municipality", |r| Value::opt_str(&r.info.location_municipality)),
    entry!("location_sub_province", |r| Value::opt_str(&r.info.location_sub_province)),
    entry!("location_province", |r| Value::opt_str(&r.info.location_province)),
    entry!("location_postal_code_1", |r| Value::opt_str(&r.info.location_postal_code_1)),
    entry!("location_nation", |r| Value::opt_str(&r.info.location_nation)),
    entry!("comments", |r| Value::opt_str(&r.info.comments)),
    entry!("train_lines", |r| Value::opt_str(&r.info.train_lines)),
    entry!("bus_lines", |r| Value::opt_str(&r.info.bus_lines)),
    entry!("virtual_meeting_link", |r| Value::opt_str(&r.info.virtual_meeting_link)),
    entry!("phone_meeting_number", |r| Value::opt_str(&r.info.phone_meeting_number)),
    entry!("virtual_meeting_additional_info", |r| Value::opt_str(&r.info.virtual_meeting_additional_info)),
    reserved!("contact_phone_2"),
    reserved!("contact_email_2"),
    reserved!("contact_name_2"),
    reserved!("contact_phone_1"),
    reserved!("contact_email_1"),
    reserved!("contact_name_1"),
    entry!("published", |r| Value::Bool(r.meeting.published)),
    entry!("root_server_id", |r| Value::Int(r.meeting.root_server_id)),
    entry!("root_server_uri", |r| Value::str(r.root_server.url.clone())),
    entry!("format_shared_id_list", |r| Value::List(r.format_ids())),
];

pub fn meeting_field_map() -> FieldMap<MeetingRecord> {
    FieldMap::new(MEETING_MAP)
}

static MEETING_KML_MAP: &[FieldMapEntry<MeetingRecord>] = &[
    entry!("name", |r| Value::str(r.meeting.name.clone())),
    entry!("address", |r| Value::str(r.kml_address())),
    entry!("description", |r| Value::str(r.kml_description())),
    entry!("Point.coordinates", |r| Value::str(r.kml_coordinates())),
];

pub fn meeting_kml_field_map() -> FieldMap<MeetingRecord> {
    FieldMap::new(MEETING_KML_MAP)
}

static MEETING_POI_MAP: &[FieldMapEntry<MeetingRecord>] = &[
    entry!("lon", |r| match r.meeting.longitude {
        Some(v) => Value::Decimal(v),
        None => Value::None,
    }),
    entry!("lat", |r| match r.meeting.latitude {
        Some(v) => Value::Decimal(v),
        None => Value::None,
    }),
    entry!("name", |r| Value::str(r.meeting.name.clone())),
    entry!("desc", |r| Value::str(r.kml_description())),
];

pub fn meeting_poi_field_map() -> FieldMap<MeetingRecord> {
    FieldMap::new(MEETING_POI_MAP)
}

static NAWS_DUMP_MAP: &[FieldMapEntry<MeetingRecord>] = &[
    entry!("Committee", |r| Value::opt_str(&r.info.world_id)),
    entry!("CommitteeName", |r| Value::str(r.meeting.name.clone())),
    reserved!("AddDate"),
    entry!("AreaRegion", |r| Value::str(r.naws_area_region_world_id())),
    entry!("ParentName", |r| Value::str(r.naws_parent_name())),
    reserved!("ComemID"),
    reserved!("ContactID"),
    reserved!("ContactName"),
    reserved!("CompanyName"),
    reserved!("ContactAddrID"),
    reserved!("ContactAddress1"),
    reserved!("ContactAddress2"),
    reserved!("ContactCity"),
    reserved!("ContactState"),
    reserved!("ContactZip"),
    reserved!("ContactCountry"),
    reserved!("ContactPhone"),
    reserved!("MeetingID"),
    reserved!("Room"),
    entry!("Closed", |r| Value::str(r.naws_open_or_closed())),
    entry!("WheelChr", |r| Value::str(r.naws_wheelchair())),
    entry!("Day", |r| Value::str(r.naws_day())),
    entry!("Time", |r| Value::str(r.naws_time())),
    entry!("Language1", |r| Value::str(r.naws_language())),
    reserved!("Language2"),
    reserved!("Language3"),
    reserved!("LocationId"),
    entry!("Place", |r| Value::opt_str(&r.info.location_text)),
    entry!("Address", |r| Value::opt_str(&r.info.location_street)),
    entry!("City", |r| Value::str(r.naws_city())),
    entry!("LocBorough", |r| Value::opt_str(&r.info.location_neighborhood)),
    entry!("State", |r| Value::opt_str(&r.info.location_province)),
    entry!("Zip", |r| Value::opt_str(&r.info.location_postal_code_1)),
    entry!("Country", |r| Value::opt_str(&r.info.location_nation)),
    entry!("Directions", |r| Value::opt_str(&r.info.location_info)),
    entry!("Institutional", |_| Value::str("FALSE")),
    entry!("Format1", |r| Value::str(r.naws_format_slot(0))),
    entry!("Format2", |r| Value::str(r.naws_format_slot(1))),
    entry!("Format3", |r| Value::str(r.naws_format_slot(2))),
    entry!("Format4", |r| Value::str(r.naws_format_slot(3))),
    entry!("Format5", |r| Value::str(r.naws_format_slot(4))),
    entry!("Delete", |r| Value::str(r.naws_deleted())),
    reserved!("LastChanged"),
    entry!("Longitude", |r| match r.meeting.longitude {
        Some(v) => Value::Decimal(v),
        None => Value::None,
    }),
    entry!("Latitude", |r| match r.meeting.latitude {
        Some(v) => Value::Decimal(v),
        None => Value::None,
    }),
    reserved!("ContactGP"),
    entry!("bmlt_id", |r| Value::Int(r.meeting.id)),
    entry!("unpublished", |r| Value::str(r.naws_unpublished())),
];

pub fn naws_dump_field_map() -> FieldMap<MeetingRecord> {
    FieldMap::new(NAWS_DUMP_MAP)
}

/// `GetFieldKeys` — the catalog of queryable meeting keys with
/// human-readable descriptions, in protocol order. Also the allow-list for
/// `GetFieldValues`' `meeting_key`.
pub const FIELD_KEYS_WITH_DESCRIPTIONS: &[(&str, &str)] = &[
    ("id_bigint", "ID"),
    ("worldid_mixed", "World ID"),
    ("service_body_bigint", "Service Body ID"),
    ("weekday_tinyint", "Weekday"),
    ("venue_type", "Venue Type"),
    ("start_time", "Start Time"),
    ("duration_time", "Duration"),
    ("formats", "Formats"),
    ("lang_enum", "Language"),
    ("longitude", "Longitude"),
    ("latitude", "Latitude"),
    ("meeting_name", "Meeting Name"),
    ("location_text", "Location Name"),
    ("location_info", "Additional Location Information"),
    ("location_street", "Street Address"),
    ("location_city_subsection", "Borough"),
    ("location_neighborhood", "Neighborhood"),
    ("location_municipality", "Town"),
    ("location_sub_province", "County"),
    ("location_province", "State"),
    ("location_postal_code_1", "Zip Code"),
    ("location_nation", "Nation"),
    ("comments", "Comments"),
    ("train_lines", "Train Lines"),
    ("bus_lines", "Bus Lines"),
    ("virtual_meeting_link", "Virtual Meeting Link"),
    ("phone_meeting_number", "Phone Meeting Dial-in Number"),
    ("virtual_meeting_additional_info", "Virtual Meeting Additional Information"),
    ("root_server_id", "Root Server ID"),
    ("root_server_uri", "Root Server URI"),
    ("format_shared_id_list", "Format Shared ID List"),
];

pub fn is_searchable_field_key(key: &str) -> bool {
    FIELD_KEYS_WITH_DESCRIPTIONS.iter().any(|(k, _)| *k == key)
}

/// The full key list `GetServerInfo` advertises: the catalog plus the
/// geospatial-only distance columns.
pub fn available_field_keys() -> Vec<String> {
    FIELD_KEYS_WITH_DESCRIPTIONS
        .iter()
        .map(|(k, _)| k.to_string())
        .chain(["distance_in_miles".to_string(), "distance_in_km".to_string()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_key_exists_in_the_meeting_map() {
        let map = meeting_field_map();
        for (key, _) in FIELD_KEYS_WITH_DESCRIPTIONS {
            assert!(map.find(key).is_some(), "catalog key {key} missing from meeting map");
        }
    }

    #[test]
    fn restrict_preserves_map_order() {
        let map = meeting_field_map()
            .restrict(&["meeting_name".to_string(), "id_bigint".to_string()]);
        assert_eq!(map.keys(), vec!["id_bigint", "meeting_name"]);
    }

    #[test]
    fn naws_columns_start_and_end_at_the_protocol_boundaries() {
        let keys = naws_dump_field_map().keys();
        assert_eq!(keys.first(), Some(&"Committee"));
        assert_eq!(keys.last(), Some(&"unpublished"));
    }
}
