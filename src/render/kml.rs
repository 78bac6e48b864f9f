/*
 * src/render/kml.rs
 *
 * File for the KML Renderer
 *
 * Purpose:
 *   Render meetings as a KML `Document` of `Placemark`s for map clients,
 *   using `meeting_kml_field_map` (name/address/description/Point
 *   coordinates). Only reachable for `GetSearchResults&format=kml`; the
 *   controller enforces that before dispatch.
 */

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
use std::io::Cursor;

use crate::fieldmap::maps::meeting_kml_field_map;
use crate::fieldmap::records::MeetingRecord;

const WRITE_ERR: &str = "writing to an in-memory buffer cannot fail";

pub fn prologue() -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Decl(quick_xml::events::BytesDecl::new("1.0", Some("UTF-8"), None)))
        .expect(WRITE_ERR);
    let mut kml_start = BytesStart::new("kml");
    kml_start.push_attribute(("xmlns", "http://www.opengis.net/kml/2.2"));
    writer.write_event(Event::Start(kml_start)).expect(WRITE_ERR);
    writer.write_event(Event::Start(BytesStart::new("Document"))).expect(WRITE_ERR);
    String::from_utf8(writer.into_inner().into_inner()).expect("xml output is always valid utf-8")
}

pub const EPILOGUE: &str = "</Document></kml>";

pub fn placemark(record: &MeetingRecord) -> String {
    let map = meeting_kml_field_map();
    let fields = map.project(record);
    let lookup = |key: &str| fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone()).unwrap_or_default();

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Start(BytesStart::new("Placemark"))).expect(WRITE_ERR);

    write_text_element(&mut writer, "name", &lookup("name"));
    write_text_element(&mut writer, "address", &lookup("address"));
    write_text_element(&mut writer, "description", &lookup("description"));

    let coordinates = lookup("Point.coordinates");
    if !coordinates.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("Point"))).expect(WRITE_ERR);
        write_text_element(&mut writer, "coordinates", &coordinates);
        writer.write_event(Event::End(BytesEnd::new("Point"))).expect(WRITE_ERR);
    }

    writer.write_event(Event::End(BytesEnd::new("Placemark"))).expect(WRITE_ERR);
    String::from_utf8(writer.into_inner().into_inner()).expect("xml output is always valid utf-8")
}

pub fn render(records: &[MeetingRecord]) -> String {
    let mut out = prologue();
    for record in records {
        out.push_str(&placemark(record));
    }
    out.push_str(EPILOGUE);
    out
}

fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, value: &str) {
    writer.write_event(Event::Start(BytesStart::new(tag))).expect(WRITE_ERR);
    if !value.is_empty() {
        writer.write_event(Event::Text(BytesText::new(value))).expect(WRITE_ERR);
    }
    writer.write_event(Event::End(BytesEnd::new(tag))).expect(WRITE_ERR);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Meeting, MeetingInfo, RootServer, ServiceBody};

    fn sample_meeting_record() -> MeetingRecord {
        MeetingRecord {
            meeting: Meeting {
                id: 1,
                root_server_id: 1,
                source_id: 1,
                service_body_id: 1,
                name: "Friday Night Live".to_string(),
                weekday: 6,
                venue_type: Some("1".to_string()),
                start_time: chrono::NaiveTime::from_hms_opt(19, 30, 0),
                duration_minutes: Some(60),
                language: Some("en".to_string()),
                latitude: Some(21.33),
                longitude: Some(-157.70),
                published: true,
                deleted: false,
            },
            info: MeetingInfo {
                meeting_id: 1,
                location_text: Some("Community Hall".to_string()),
                location_street: Some("123 Main St".to_string()),
                location_municipality: Some("Honolulu".to_string()),
                location_province: Some("HI".to_string()),
                comments: Some("Enter through the side door".to_string()),
                ..MeetingInfo::default()
            },
            service_body: ServiceBody {
                id: 1,
                root_server_id: 1,
                source_id: 1,
                parent_id: None,
                name: "Oahu Area".to_string(),
                r#type: Some("AS".to_string()),
                description: None,
                url: None,
                helpline: None,
                world_id: None,
                num_meetings: 1,
                num_groups: 1,
            },
            root_server: RootServer {
                id: 1,
                source_id: 1,
                url: "https://example.org/main_server/".to_string(),
                name: Some("Oahu".to_string()),
                server_info: None,
                num_areas: 1,
                num_regions: 0,
                num_zones: 0,
                num_meetings: 1,
                num_groups: 1,
                last_successful_import: None,
            },
            formats: Vec::new(),
            distance_km: None,
        }
    }

    #[test]
    fn wraps_meeting_as_placemark_with_point() {
        let body = render(&[sample_meeting_record()]);
        assert!(body.contains("<Placemark>"));
        assert!(body.contains("<name>Friday Night Live</name>"));
        assert!(body.contains("<address>Community Hall, 123 Main St, HI</address>"));
        assert!(body.contains("<coordinates>-157.7,21.33,0</coordinates>"));
    }

    #[test]
    fn description_leads_with_weekday_and_time() {
        let body = render(&[sample_meeting_record()]);
        assert!(body.contains("<description>Friday, 7:30 PM, 123 Main St, HI</description>"));
    }
}
