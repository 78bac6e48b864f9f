/*
 * src/render/mod.rs
 *
 * File for the Renderers
 *
 * Purpose:
 *   Turn a field-map projection into one of json, jsonp, csv, xml, kml, or
 *   poi-csv. Each module exposes per-row chunk functions (plus a prologue
 *   and epilogue where the format needs them) that the search path feeds
 *   into a streaming response body, and a buffered `render` over a slice
 *   for the catalog-meta switchers whose result sets are small.
 */

pub mod csv;
pub mod json;
pub mod kml;
pub mod poi;
pub mod xml;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Json,
    Jsonp,
    Csv,
    Xml,
    Kml,
    Poi,
}

impl RenderFormat {
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Some(match segment {
            "json" => RenderFormat::Json,
            "jsonp" => RenderFormat::Jsonp,
            "csv" => RenderFormat::Csv,
            "xml" => RenderFormat::Xml,
            "kml" => RenderFormat::Kml,
            "poi" => RenderFormat::Poi,
            _ => return None,
        })
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            RenderFormat::Json | RenderFormat::Jsonp => "application/json",
            RenderFormat::Csv | RenderFormat::Poi => "text/csv",
            RenderFormat::Xml | RenderFormat::Kml => "application/xml",
        }
    }
}
