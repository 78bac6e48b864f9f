/*
 * src/render/csv.rs
 *
 * File for the CSV Renderer
 *
 * Purpose:
 *   Render a field-map projection as CSV with every field quoted
 *   (`QuoteStyle::Always`) and `\n` record terminators. The header row is
 *   always emitted — synthesized from the field map, qualified against the
 *   first record so conditional columns the first row omits don't appear at
 *   all; later rows are projected against that header, so every row has the
 *   same width even when a qualifier answers differently per record.
 */

use crate::fieldmap::FieldMap;

/// The column set for this render: the map's keys, qualified against the
/// first record so conditional columns the first row omits don't appear.
pub fn header_keys<R>(map: &FieldMap<R>, first: &R) -> Vec<&'static str> {
    map.project(first).into_iter().map(|(k, _)| k).collect()
}

fn write_line(fields: &[String]) -> String {
    let mut writer = ::csv::WriterBuilder::new()
        .quote_style(::csv::QuoteStyle::Always)
        .terminator(::csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields).expect("writing to an in-memory buffer cannot fail");
    writer.flush().expect("flushing an in-memory buffer cannot fail");
    String::from_utf8(writer.into_inner().expect("no csv writer error pending")).expect("csv output is always valid utf-8")
}

pub fn keys_line(keys: &[&'static str]) -> String {
    write_line(&keys.iter().map(|k| k.to_string()).collect::<Vec<_>>())
}

/// One record as a quoted CSV line, projected against `keys` so every row
/// has the same width even when a qualifier answers differently per record.
pub fn row_line<R>(map: &FieldMap<R>, keys: &[&'static str], record: &R) -> String {
    let row: Vec<String> = keys
        .iter()
        .map(|key| {
            map.find(key)
                .and_then(|entry| entry.value_for(record))
                .map(|v| v.display())
                .unwrap_or_default()
        })
        .collect();
    write_line(&row)
}

/// Renders `records` as CSV text. The header row is always emitted; an
/// empty result set is a header-only response, with the conditional
/// (qualified) columns dropped since there is no record to qualify them
/// against.
pub fn render<R>(map: &FieldMap<R>, records: &[R]) -> String {
    let keys = match records.first() {
        Some(first) => header_keys(map, first),
        None => map.base_keys(),
    };

    let mut out = keys_line(&keys);
    for record in records {
        out.push_str(&row_line(map, &keys, record));
    }
    out
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
            langs: vec!["en".to_string(), "es".to_string()],
            native_lang: "en".to_string(),
            center_longitude: -157.7,
            center_latitude: 21.33,
            center_zoom: 6,
        }
    }

    #[test]
    fn empty_result_set_renders_header_only() {
        let map = server_info_field_map();
        let records: Vec<ServerInfoRecord> = Vec::new();
        let body = render(&map, &records);
        assert!(body.starts_with("\"version\""));
        assert_eq!(body.lines().count(), 1);
    }

    #[test]
    fn every_field_is_quoted_and_langs_join_with_commas() {
        let map = server_info_field_map();
        let body = render(&map, &[sample()]);
        assert!(body.starts_with("\"version\""));
        assert!(body.contains("\"en,es\""));
    }
}
