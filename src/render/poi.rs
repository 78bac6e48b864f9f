/*
 * src/render/poi.rs
 *
 * File for the POI CSV Renderer
 *
 * Purpose:
 *   Render meetings as `lon,lat,name,desc` rows for point-of-interest map
 *   import, ordered by weekday, using `meeting_poi_field_map`. Like KML,
 *   only reachable for `GetSearchResults&format=poi`.
 */

use crate::fieldmap::maps::meeting_poi_field_map;
use crate::fieldmap::records::MeetingRecord;

pub fn header_line() -> String {
    super::csv::keys_line(&meeting_poi_field_map().keys())
}

pub fn line(record: &MeetingRecord) -> String {
    let map = meeting_poi_field_map();
    let keys = map.keys();
    super::csv::row_line(&map, &keys, record)
}

pub fn render(records: &[MeetingRecord]) -> String {
    let mut ordered: Vec<&MeetingRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.meeting.weekday);

    let mut out = header_line();
    for record in ordered {
        out.push_str(&line(record));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Meeting, MeetingInfo, RootServer, ServiceBody};

    fn record(weekday: i16, name: &str) -> MeetingRecord {
        MeetingRecord {
            meeting: Meeting {
                id: 1,
                source_id: 1,
                root_server_id: 1,
                service_body_id: 1,
                name: name.to_string(),
                weekday,
                venue_type: None,
                start_time: None,
                duration_minutes: None,
                language: Some("en".to_string()),
                latitude: Some(1.0),
                longitude: Some(2.0),
                published: true,
                deleted: false,
            },
            info: MeetingInfo::default(),
            service_body: ServiceBody {
                id: 1,
                source_id: 1,
                root_server_id: 1,
                parent_id: None,
                name: "Area".to_string(),
                r#type: None,
                description: None,
                url: None,
                helpline: None,
                world_id: None,
                num_meetings: 0,
                num_groups: 0,
            },
            root_server: RootServer {
                id: 1,
                source_id: 1,
                url: "https://example.org/".to_string(),
                name: None,
                server_info: None,
                num_areas: 0,
                num_regions: 0,
                num_zones: 0,
                num_meetings: 0,
                num_groups: 0,
                last_successful_import: None,
            },
            formats: Vec::new(),
            distance_km: None,
        }
    }

    #[test]
    fn orders_rows_by_weekday_under_a_header() {
        let records = vec![record(5, "Wednesday Group"), record(1, "Sunday Group")];
        let body = render(&records);
        assert!(body.starts_with("\"lon\",\"lat\",\"name\",\"desc\"\n"));
        let sunday_pos = body.find("Sunday Group").unwrap();
        let wednesday_pos = body.find("Wednesday Group").unwrap();
        assert!(sunday_pos < wednesday_pos);
    }
}
