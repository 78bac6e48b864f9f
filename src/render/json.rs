/*
 * src/render/json.rs
 *
 * File for the JSON / JSONP Renderer
 *
 * Purpose:
 *   Serialize a field-map projection as a JSON array of objects in the field
 *   map's declared key order (`serde_json::Map` preserves insertion order,
 *   unlike a plain `HashMap`). Every value is a string, the same
 *   stringification the tabular renderers use.
 */

use serde_json::{Map, Value as JsonValue};

use crate::fieldmap::FieldMap;

/// One projected record as a JSON object, preserving field-map order.
pub fn row_to_json<R>(map: &FieldMap<R>, record: &R) -> JsonValue {
    let mut obj = Map::new();
    for (key, value) in map.project(record) {
        obj.insert(key.to_string(), JsonValue::String(value));
    }
    JsonValue::Object(obj)
}

/// One streaming chunk of a JSON array: the serialized object, preceded by
/// the element separator for every row after the first.
pub fn array_row_chunk<R>(map: &FieldMap<R>, index: usize, record: &R) -> String {
    let object = serde_json::to_string(&row_to_json(map, record)).unwrap_or_else(|_| "{}".to_string());
    if index == 0 {
        object
    } else {
        format!(",{object}")
    }
}

/// `debug_mode` pretty-prints with indent 2; production responses use
/// minimal separators.
pub fn render<R>(map: &FieldMap<R>, records: &[R], debug_mode: bool) -> String {
    let rows: Vec<JsonValue> = records.iter().map(|r| row_to_json(map, r)).collect();
    to_body(JsonValue::Array(rows), debug_mode)
}

/// A response composed of more than one named array (e.g. `GetSearchResults`
/// with `get_used_formats=1` attaching a `formats` sibling to `meetings`),
/// nested under top-level keys rather than flattened into one list.
pub fn render_named_arrays(named: &[(&str, JsonValue)], debug_mode: bool) -> String {
    let mut obj = Map::new();
    for (key, value) in named {
        obj.insert(key.to_string(), value.clone());
    }
    to_body(JsonValue::Object(obj), debug_mode)
}

pub fn to_body(value: JsonValue, debug_mode: bool) -> String {
    if debug_mode {
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "null".to_string())
    } else {
        serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string())
    }
}

/// Wraps a JSON payload in a callback invocation for `format=jsonp`. The
/// controller rejects requests with no `callback` parameter before reaching
/// here.
pub fn wrap_jsonp(callback: &str, json_body: &str) -> String {
    format!("{callback}({json_body});")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldmap::maps::server_info_field_map;
    use crate::fieldmap::records::ServerInfoRecord;

    fn sample_record() -> ServerInfoRecord {
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
    fn renders_minimal_array_without_indentation() {
        let map = server_info_field_map();
        let record = sample_record();
        let body = render(&map, std::slice::from_ref(&record), false);
        assert!(!body.contains('\n'));
        assert!(body.starts_with("[{\"version\":\"5.0.0\""));
    }

    #[test]
    fn debug_mode_pretty_prints() {
        let map = server_info_field_map();
        let record = sample_record();
        let body = render(&map, std::slice::from_ref(&record), true);
        assert!(body.contains('\n'));
    }

    #[test]
    fn jsonp_wraps_body_in_callback() {
        let wrapped = wrap_jsonp("cb", "[]");
        assert_eq!(wrapped, "cb([]);");
    }
}
