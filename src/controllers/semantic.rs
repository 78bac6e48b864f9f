/*
 * src/controllers/semantic.rs
 *
 * File for the Semantic Query Endpoint
 *
 * Purpose:
 *   One handler dispatching on the `switcher` query parameter, the same
 *   single-view shape the upstream protocol exposes, rather than one route
 *   per report. Parameter-reject rules all return 400 with an empty body.
 */

use std::collections::BTreeMap;

use axum::body::Body;
use axum::extract::{Extension, Path, RawQuery};
use axum::http::{header, StatusCode};
use axum::response::Response;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::{ApiResult, PublicError};
use crate::fieldmap::maps::{
    self, format_field_map, meeting_field_map, naws_dump_field_map, server_info_field_map,
    service_bodies_field_map,
};
use crate::fieldmap::records::{MeetingRecord, ServerInfoRecord};
use crate::fieldmap::FieldMap;
use crate::global::DEFAULT_ADDRESS_NEAREST_N;
use crate::query::geospatial::{miles_to_km, GeoMode, GeoQuery};
use crate::query::{FilterPlan, QueryParams};
use crate::render::xml::XmlSchema;
use crate::render::{self, RenderFormat};
use crate::store;

use super::AppState;

#[utoipa::path(
    get,
    path = "/client_interface/{format}",
    params(
        ("format" = String, Path, description = "Response format: json, jsonp, csv, xml, kml, or poi"),
        ("switcher" = String, Query, description = "Query operation: GetSearchResults, GetFormats, GetServiceBodies, GetFieldKeys, GetFieldValues, GetServerInfo, or GetNAWSDump"),
    ),
    responses(
        (status = 200, description = "Rendered result set in the requested format"),
        (status = 400, description = "Unknown switcher/format or invalid parameter combination; empty body"),
    ),
)]
pub async fn handle(
    Extension(state): Extension<AppState>,
    Path(format_segment): Path<String>,
    RawQuery(raw_query): RawQuery,
) -> ApiResult<Response> {
    let raw_query = raw_query.unwrap_or_default();
    let qp = QueryParams::parse(&raw_query);

    let format = RenderFormat::from_path_segment(&format_segment)
        .ok_or_else(|| PublicError::BadRequest(format!("unknown format '{format_segment}'")))?;

    let switcher = qp
        .first("switcher")
        .ok_or_else(|| PublicError::BadRequest("missing switcher".to_string()))?
        .to_string();

    let callback = qp.first("callback").map(|s| s.to_string());
    if format == RenderFormat::Jsonp && callback.is_none() {
        return Err(PublicError::BadRequest("jsonp format requires callback".to_string()).into());
    }

    if matches!(format, RenderFormat::Kml | RenderFormat::Poi) && switcher != "GetSearchResults" {
        return Err(PublicError::BadRequest(
            "kml and poi formats are only valid for GetSearchResults".to_string(),
        )
        .into());
    }

    if switcher == "GetNAWSDump" && format != RenderFormat::Csv {
        return Err(PublicError::BadRequest("GetNAWSDump is csv-only".to_string()).into());
    }

    let latest_import = store::root_server::latest_successful_import(&state.pool).await?;
    state.translation.refresh_if_stale(&state.pool, latest_import).await?;

    let ctx = RequestContext {
        state: &state,
        format,
        switcher: &switcher,
        callback: callback.as_deref(),
        debug: state.config.debug,
    };

    match switcher.as_str() {
        "GetSearchResults" => get_search_results(&ctx, &qp).await,
        "GetFormats" => get_formats(&ctx, &qp).await,
        "GetServiceBodies" => get_service_bodies(&ctx, &qp).await,
        "GetFieldKeys" => get_field_keys(&ctx),
        "GetFieldValues" => get_field_values(&ctx, &qp).await,
        "GetServerInfo" => get_server_info(&ctx).await,
        "GetNAWSDump" => get_naws_dump(&ctx, &qp).await,
        other => Err(PublicError::BadRequest(format!("unknown switcher '{other}'")).into()),
    }
}

struct RequestContext<'a> {
    state: &'a AppState,
    format: RenderFormat,
    switcher: &'a str,
    callback: Option<&'a str>,
    debug: bool,
}

impl RequestContext<'_> {
    fn xml_schema(&self) -> Option<XmlSchema> {
        self.state
            .config
            .xml_schema_base_url
            .as_deref()
            .map(|base| XmlSchema::for_switcher(base, self.switcher))
    }

    fn finish_json(&self, body: String) -> Response {
        let body = match (self.format, self.callback) {
            (RenderFormat::Jsonp, Some(cb)) => render::json::wrap_jsonp(cb, &body),
            _ => body,
        };
        respond(self.format, body, None)
    }

    /// The three tabular formats share one code path for any map-driven
    /// record list; KML/POI never reach here (rejected before dispatch).
    fn render_mapped<R>(&self, map: &FieldMap<R>, records: &[R]) -> Response {
        match self.format {
            RenderFormat::Json | RenderFormat::Jsonp => {
                self.finish_json(render::json::render(map, records, self.debug))
            }
            RenderFormat::Csv => respond(self.format, render::csv::render(map, records), None),
            RenderFormat::Xml => {
                respond(self.format, render::xml::render(map, records, self.xml_schema().as_ref()), None)
            }
            RenderFormat::Kml | RenderFormat::Poi => unreachable!("rejected before dispatch"),
        }
    }
}

fn respond(format: RenderFormat, body: String, attachment_filename: Option<&str>) -> Response {
    let mut builder = Response::builder().status(StatusCode::OK).header(header::CONTENT_TYPE, format.content_type());
    if let Some(filename) = attachment_filename {
        builder = builder.header(header::CONTENT_DISPOSITION, format!("attachment; filename={filename}"));
    }
    builder.body(Body::from(body)).expect("response with a fixed header set cannot fail to build")
}

/// `root_server_id` and `root_server_ids` are interchangeable on the wire;
/// both feed the same include/exclude split.
fn signed_root_ids(qp: &QueryParams) -> (Vec<i64>, Vec<i64>) {
    let (mut include, mut exclude) = qp.signed_ids("root_server_ids");
    let (more_include, more_exclude) = qp.signed_ids("root_server_id");
    include.extend(more_include);
    exclude.extend(more_exclude);
    (include, exclude)
}

async fn get_search_results(ctx: &RequestContext<'_>, qp: &QueryParams) -> ApiResult<Response> {
    let state = ctx.state;
    let language = qp.first("lang_enum").unwrap_or("en").to_string();
    let mut plan = FilterPlan::from_params(qp);
    let (roots_include, roots_exclude) = signed_root_ids(qp);
    plan.roots_include = roots_include;
    plan.roots_exclude = roots_exclude;

    // `StringSearchIsAnAddress=1` resolves the search string through the
    // geocoder before it can become a geo filter. A geocoder miss
    // yields an empty result set rather than failing the request.
    let mut geocode_failed = false;
    if let Some(address) = plan.address_search_string.clone() {
        match state.geocoder.geocode(&address).await {
            Ok((latitude, longitude)) => {
                let mode = match plan.address_radius {
                    Some(radius) if radius < 0 => GeoMode::NearestN(radius.unsigned_abs() as u32),
                    Some(radius) => GeoMode::RadiusKm(miles_to_km(radius as f64)),
                    None => GeoMode::NearestN(DEFAULT_ADDRESS_NEAREST_N as u32),
                };
                plan.geo = Some(GeoQuery { latitude, longitude, mode });
                plan.sort_by_distance = true;
            }
            Err(_) => geocode_failed = true,
        }
    }

    let cache = state.translation.snapshot().await;
    let map = meeting_field_map().restrict(&plan.data_field_keys);

    let get_used_formats = qp.flag("get_used_formats");
    let get_formats_only = get_used_formats && qp.flag("get_formats_only");

    // The used-formats report and pretty-printed debug output both need the
    // full result set in hand; everything else streams row by row.
    if matches!(ctx.format, RenderFormat::Json | RenderFormat::Jsonp) && (get_used_formats || ctx.debug) {
        let rows = if geocode_failed { Vec::new() } else { store::meeting::search(&state.pool, &plan).await? };
        let records: Vec<MeetingRecord> = rows.into_iter().map(|r| r.into_record(&cache, &language)).collect();

        let body = if get_used_formats {
            let mut used_ids: Vec<i64> =
                records.iter().flat_map(|r| r.formats.iter().map(|f| f.format_id)).collect();
            used_ids.sort_unstable();
            used_ids.dedup();
            let used = store::format::list_by_ids(&state.pool, &used_ids, &language).await?;
            let format_map = format_field_map();
            let formats_json: Vec<JsonValue> =
                used.iter().map(|f| render::json::row_to_json(&format_map, f)).collect();

            let mut named: Vec<(&str, JsonValue)> = Vec::new();
            if !get_formats_only {
                let meetings_json: Vec<JsonValue> =
                    records.iter().map(|r| render::json::row_to_json(&map, r)).collect();
                named.push(("meetings", JsonValue::Array(meetings_json)));
            }
            named.push(("formats", JsonValue::Array(formats_json)));
            render::json::render_named_arrays(&named, ctx.debug)
        } else {
            render::json::render(&map, &records, ctx.debug)
        };
        return Ok(ctx.finish_json(body));
    }

    // POI output is defined as weekday-ordered; fold that into the plan so
    // the stream arrives in emit order.
    if ctx.format == RenderFormat::Poi && !plan.sort_by_distance && plan.sort_keys.is_empty() {
        plan.sort_keys = vec!["weekday_tinyint".to_string()];
    }

    // The CSV column set is fixed before the first row arrives: the
    // conditional distance columns apply exactly when the plan carries a
    // geospatial filter, and then to every row alike. This also keeps the
    // header line present on an empty result.
    let csv_keys = if plan.geo.is_some() { map.keys() } else { map.base_keys() };

    let rows = row_stream(state, plan, geocode_failed);
    Ok(stream_search_response(ctx, rows, map, csv_keys, cache, language))
}

fn row_stream(
    state: &AppState,
    plan: FilterPlan,
    geocode_failed: bool,
) -> futures::stream::BoxStream<'static, Result<store::meeting::MeetingSearchRow, sqlx::Error>> {
    use futures::StreamExt;
    if geocode_failed {
        futures::stream::empty().boxed()
    } else {
        store::meeting::search_stream(state.pool.clone(), plan).boxed()
    }
}

/// Assembles the streaming response for `GetSearchResults`: a prefix chunk,
/// one chunk per row, and a suffix. An error mid-stream is logged and ends
/// the body; the status line has already gone out.
fn stream_search_response(
    ctx: &RequestContext<'_>,
    rows: futures::stream::BoxStream<'static, Result<store::meeting::MeetingSearchRow, sqlx::Error>>,
    map: FieldMap<MeetingRecord>,
    csv_keys: Vec<&'static str>,
    cache: std::sync::Arc<crate::translation::Cache>,
    language: String,
) -> Response {
    use futures::StreamExt;

    let to_record = move |row: store::meeting::MeetingSearchRow| row.into_record(&cache, &language);

    let (prefix, suffix, attachment): (String, String, Option<&str>) = match (ctx.format, ctx.callback) {
        (RenderFormat::Jsonp, Some(cb)) => (format!("{cb}(["), "]);".to_string(), None),
        (RenderFormat::Json | RenderFormat::Jsonp, _) => ("[".to_string(), "]".to_string(), None),
        (RenderFormat::Xml, _) => {
            (render::xml::prologue(ctx.xml_schema().as_ref()), render::xml::EPILOGUE.to_string(), None)
        }
        (RenderFormat::Kml, _) => {
            (render::kml::prologue(), render::kml::EPILOGUE.to_string(), Some("SearchResults.kml"))
        }
        (RenderFormat::Poi, _) => (render::poi::header_line(), String::new(), Some("SearchResultsPOI.csv")),
        (RenderFormat::Csv, _) => (render::csv::keys_line(&csv_keys), String::new(), None),
    };

    let format = ctx.format;
    let row_chunk = move |index: usize, record: &MeetingRecord| -> String {
        match format {
            RenderFormat::Json | RenderFormat::Jsonp => render::json::array_row_chunk(&map, index, record),
            RenderFormat::Xml => render::xml::row_fragment(&map, index, record),
            RenderFormat::Kml => render::kml::placemark(record),
            RenderFormat::Poi => render::poi::line(record),
            RenderFormat::Csv => render::csv::row_line(&map, &csv_keys, record),
        }
    };

    let chunks = rows
        .take_while(|row| {
            if let Err(e) = row {
                tracing::error!("SEARCH ->> result stream ended early: {e}");
            }
            futures::future::ready(row.is_ok())
        })
        .enumerate()
        .map(move |(index, row)| {
            let record = to_record(row.expect("errors terminate the stream above"));
            row_chunk(index, &record)
        });
    let body = futures::stream::once(futures::future::ready(prefix))
        .chain(chunks)
        .chain(futures::stream::once(futures::future::ready(suffix)))
        .map(Ok::<_, std::convert::Infallible>);

    let mut builder =
        Response::builder().status(StatusCode::OK).header(header::CONTENT_TYPE, format.content_type());
    if let Some(filename) = attachment {
        builder = builder.header(header::CONTENT_DISPOSITION, format!("attachment; filename={filename}"));
    }
    builder.body(Body::from_stream(body)).expect("response with a fixed header set cannot fail to build")
}

async fn get_formats(ctx: &RequestContext<'_>, qp: &QueryParams) -> ApiResult<Response> {
    let language = qp.first("lang_enum").unwrap_or("en").to_string();
    let (root_server_ids, _) = signed_root_ids(qp);
    let key_strings = qp.csv_list("key_strings");
    let records = store::format::list_joined(&ctx.state.pool, &root_server_ids, &language, &key_strings).await?;
    Ok(ctx.render_mapped(&format_field_map(), &records))
}

async fn get_service_bodies(ctx: &RequestContext<'_>, qp: &QueryParams) -> ApiResult<Response> {
    let (root_server_ids, _) = signed_root_ids(qp);
    let (service_ids, _) = qp.signed_ids("services");
    let recursive = qp.flag("recursive");
    let parents = qp.flag("parents");
    let records =
        store::service_body::list_joined(&ctx.state.pool, &root_server_ids, &service_ids, recursive, parents).await?;
    Ok(ctx.render_mapped(&service_bodies_field_map(), &records))
}

fn get_field_keys(ctx: &RequestContext<'_>) -> ApiResult<Response> {
    let header = ["key", "description"];
    let rows: Vec<Vec<String>> = maps::FIELD_KEYS_WITH_DESCRIPTIONS
        .iter()
        .map(|(key, description)| vec![key.to_string(), description.to_string()])
        .collect();
    Ok(generic_table_response(ctx, &header, &rows))
}

async fn get_field_values(ctx: &RequestContext<'_>, qp: &QueryParams) -> ApiResult<Response> {
    let meeting_key = qp
        .first("meeting_key")
        .ok_or_else(|| PublicError::BadRequest("GetFieldValues requires meeting_key".to_string()))?
        .to_string();
    if !maps::is_searchable_field_key(&meeting_key) {
        return Err(PublicError::BadRequest(format!("'{meeting_key}' is not a searchable field")).into());
    }
    let map = meeting_field_map();
    let entry = map.find(&meeting_key).ok_or_else(|| {
        PublicError::BadRequest(format!("'{meeting_key}' is not a searchable field"))
    })?;

    let (root_server_ids, _) = signed_root_ids(qp);
    let rows = store::meeting::list_for_field_values(&ctx.state.pool, &root_server_ids).await?;
    let cache = ctx.state.translation.snapshot().await;

    // For the many-to-many keys the grouping value is the format-id array;
    // meetings sharing the same set land under one row.
    let m2m = matches!(meeting_key.as_str(), "formats" | "format_shared_id_list");

    let mut grouped: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for row in rows {
        let record = row.into_record(&cache, "en");
        let meeting_id = record.meeting.id;
        let value = if m2m {
            Some(record.format_ids().join(","))
        } else {
            entry.value_for(&record).map(|v| v.display())
        };
        if let Some(value) = value {
            grouped.entry(value).or_default().push(meeting_id);
        }
    }

    let header = [meeting_key.as_str(), "ids"];
    let rows: Vec<Vec<String>> = grouped
        .into_iter()
        .map(|(value, ids)| vec![value, ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")])
        .collect();
    Ok(generic_table_response(ctx, &header, &rows))
}

async fn get_server_info(ctx: &RequestContext<'_>) -> ApiResult<Response> {
    let state = ctx.state;
    let langs = store::format::distinct_languages(&state.pool).await?;
    let langs = if langs.is_empty() { vec!["en".to_string()] } else { langs };
    let (center_lat, center_lon) = store::meeting::centroid(&state.pool).await?.unwrap_or((0.0, 0.0));

    let record = ServerInfoRecord {
        version: "5.0.0".to_string(),
        version_int: 5_000_000,
        langs,
        native_lang: "en".to_string(),
        center_longitude: center_lon,
        center_latitude: center_lat,
        center_zoom: 6,
    };
    Ok(ctx.render_mapped(&server_info_field_map(), std::slice::from_ref(&record)))
}

async fn get_naws_dump(ctx: &RequestContext<'_>, qp: &QueryParams) -> ApiResult<Response> {
    let sb_id = qp
        .int("sb_id")
        .ok_or_else(|| PublicError::BadRequest("GetNAWSDump requires sb_id".to_string()))?;
    let ids = store::service_body::descendant_ids(&ctx.state.pool, sb_id).await?;
    let rows = store::meeting::list_for_naws_dump(&ctx.state.pool, &ids).await?;
    let cache = ctx.state.translation.snapshot().await;
    let records: Vec<MeetingRecord> = rows.into_iter().map(|r| r.into_record(&cache, "en")).collect();
    let body = render::csv::render(&naws_dump_field_map(), &records);
    Ok(respond(ctx.format, body, Some("BMLT.csv")))
}

/// Ad hoc key/value table rendering for the catalog-meta switchers
/// (`GetFieldKeys`, `GetFieldValues`) whose rows don't come from a static
/// `FieldMap` over a record type.
fn generic_table_response(ctx: &RequestContext<'_>, header: &[&str], rows: &[Vec<String>]) -> Response {
    match ctx.format {
        RenderFormat::Json | RenderFormat::Jsonp => {
            let array: Vec<JsonValue> = rows
                .iter()
                .map(|row| {
                    let mut obj = JsonMap::new();
                    for (key, value) in header.iter().zip(row.iter()) {
                        obj.insert(key.to_string(), JsonValue::String(value.clone()));
                    }
                    JsonValue::Object(obj)
                })
                .collect();
            ctx.finish_json(render::json::to_body(JsonValue::Array(array), ctx.debug))
        }
        RenderFormat::Csv => {
            let mut writer = ::csv::WriterBuilder::new()
                .quote_style(::csv::QuoteStyle::Always)
                .terminator(::csv::Terminator::Any(b'\n'))
                .from_writer(Vec::new());
            writer.write_record(header).expect("writing to an in-memory buffer cannot fail");
            for row in rows {
                writer.write_record(row).expect("writing to an in-memory buffer cannot fail");
            }
            writer.flush().expect("flushing an in-memory buffer cannot fail");
            let body = String::from_utf8(writer.into_inner().expect("no csv writer error pending"))
                .expect("csv output is always valid utf-8");
            respond(ctx.format, body, None)
        }
        RenderFormat::Xml => {
            use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
            use quick_xml::writer::Writer;
            use std::io::Cursor;

            const WRITE_ERR: &str = "writing to an in-memory buffer cannot fail";
            let mut writer = Writer::new(Cursor::new(Vec::new()));
            writer
                .write_event(Event::Decl(quick_xml::events::BytesDecl::new("1.0", Some("UTF-8"), None)))
                .expect(WRITE_ERR);
            writer.write_event(Event::Start(BytesStart::new("resources"))).expect(WRITE_ERR);
            for (index, row) in rows.iter().enumerate() {
                let mut row_start = BytesStart::new("row");
                row_start.push_attribute(("sequence_index", index.to_string().as_str()));
                writer.write_event(Event::Start(row_start)).expect(WRITE_ERR);
                for (key, value) in header.iter().zip(row.iter()) {
                    if value.is_empty() {
                        continue;
                    }
                    writer.write_event(Event::Start(BytesStart::new(*key))).expect(WRITE_ERR);
                    writer.write_event(Event::Text(BytesText::new(value))).expect(WRITE_ERR);
                    writer.write_event(Event::End(BytesEnd::new(*key))).expect(WRITE_ERR);
                }
                writer.write_event(Event::End(BytesEnd::new("row"))).expect(WRITE_ERR);
            }
            writer.write_event(Event::End(BytesEnd::new("resources"))).expect(WRITE_ERR);
            let body = String::from_utf8(writer.into_inner().into_inner()).expect("xml output is always valid utf-8");
            respond(ctx.format, body, None)
        }
        RenderFormat::Kml | RenderFormat::Poi => unreachable!("rejected before dispatch"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_root_ids_merges_singular_and_plural_forms() {
        let qp = QueryParams::parse("root_server_id=1&root_server_ids[]=2&root_server_ids[]=-3");
        let (include, exclude) = signed_root_ids(&qp);
        assert_eq!(include, vec![2, 1]);
        assert_eq!(exclude, vec![3]);
    }
}
