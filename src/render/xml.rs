/*
 * src/render/xml.rs
 *
 * File for the XML Renderer
 *
 * Purpose:
 *   Render a field-map projection as `<resources><row sequence_index="i">
 *   <key>value</key>...</row></resources>`. A dotted external name nests
 *   (`Point.coordinates` becomes `<Point><coordinates>...`), empty-valued
 *   fields emit no element, and the root element optionally carries
 *   `xmlns` + `xsi:schemaLocation` attributes pointing at an XSD the
 *   surrounding deployment serves. Built with `quick-xml` rather than
 *   hand-assembled strings so field values are escaped correctly regardless
 *   of what upstream servers put in them.
 */

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
use std::io::Cursor;

use crate::fieldmap::FieldMap;

/// Schema attributes for the root element; built by the controller from the
/// deployment's configured base URL and the active switcher.
#[derive(Debug, Clone)]
pub struct XmlSchema {
    pub xmlns: String,
    pub schema_location: String,
}

impl XmlSchema {
    pub fn for_switcher(base_url: &str, switcher: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        XmlSchema {
            xmlns: base.to_string(),
            schema_location: format!("{base} {base}/{switcher}.xsd"),
        }
    }
}

const WRITE_ERR: &str = "writing to an in-memory buffer cannot fail";

/// The XML declaration plus the opened root element.
pub fn prologue(schema: Option<&XmlSchema>) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Decl(quick_xml::events::BytesDecl::new("1.0", Some("UTF-8"), None)))
        .expect(WRITE_ERR);

    let mut root = BytesStart::new("resources");
    if let Some(schema) = schema {
        root.push_attribute(("xmlns", schema.xmlns.as_str()));
        root.push_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"));
        root.push_attribute(("xsi:schemaLocation", schema.schema_location.as_str()));
    }
    writer.write_event(Event::Start(root)).expect(WRITE_ERR);
    String::from_utf8(writer.into_inner().into_inner()).expect("xml output is always valid utf-8")
}

pub const EPILOGUE: &str = "</resources>";

/// One `<row sequence_index="i">...</row>` fragment.
pub fn row_fragment<R>(map: &FieldMap<R>, index: usize, record: &R) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut row_start = BytesStart::new("row");
    row_start.push_attribute(("sequence_index", index.to_string().as_str()));
    writer.write_event(Event::Start(row_start)).expect(WRITE_ERR);
    for (key, value) in map.project(record) {
        write_nested(&mut writer, key, &value);
    }
    writer.write_event(Event::End(BytesEnd::new("row"))).expect(WRITE_ERR);
    String::from_utf8(writer.into_inner().into_inner()).expect("xml output is always valid utf-8")
}

pub fn render<R>(map: &FieldMap<R>, records: &[R], schema: Option<&XmlSchema>) -> String {
    let mut out = prologue(schema);
    for (index, record) in records.iter().enumerate() {
        out.push_str(&row_fragment(map, index, record));
    }
    out.push_str(EPILOGUE);
    out
}

/// `Point.coordinates` opens `<Point>`, then `<coordinates>`, closing in
/// reverse order; an undotted key is a single element. An empty value emits
/// no element at all — absent and reserved fields simply don't appear in
/// the row.
fn write_nested(writer: &mut Writer<Cursor<Vec<u8>>>, key: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let segments: Vec<&str> = key.split('.').collect();
    for segment in &segments {
        writer.write_event(Event::Start(BytesStart::new(*segment))).expect(WRITE_ERR);
    }
    writer.write_event(Event::Text(BytesText::new(value))).expect(WRITE_ERR);
    for segment in segments.iter().rev() {
        writer.write_event(Event::End(BytesEnd::new(*segment))).expect(WRITE_ERR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldmap::maps::server_info_field_map;
    use crate::fieldmap::records::ServerInfoRecord;

    fn sample() -> ServerInfoRecord {
        ServerInfoRecord {
            version: "5.0.0".to_string(),
            version_int: 5000000,
            langs: vec!["en".to_string()],
            native_lang: "en".to_string(),
            center_longitude: -157.7,
            center_latitude: 21.33,
            center_zoom: 6,
        }
    }

    #[test]
    fn wraps_rows_with_sequence_index() {
        let map = server_info_field_map();
        let body = render(&map, &[sample()], None);
        assert!(body.contains("<resources>"));
        assert!(body.contains("sequence_index=\"0\""));
        assert!(body.contains("<version>5.0.0</version>"));
    }

    #[test]
    fn empty_valued_fields_emit_no_element() {
        let map = server_info_field_map();
        let mut record = sample();
        record.langs = Vec::new();
        let body = render(&map, &[record], None);
        assert!(!body.contains("<langs"));
        assert!(body.contains("<nativeLang>en</nativeLang>"));
    }

    #[test]
    fn schema_attributes_land_on_the_root_element() {
        let map = server_info_field_map();
        let schema = XmlSchema::for_switcher("https://aggregator.example.org/", "GetServerInfo");
        let body = render(&map, &[sample()], Some(&schema));
        assert!(body.contains("xmlns=\"https://aggregator.example.org\""));
        assert!(body.contains("GetServerInfo.xsd"));
    }
}
