/*
 * src/query/plan.rs
 *
 * File for the Filter Plan
 *
 * Purpose:
 *   Turn a parsed `QueryParams` multimap into a structured plan the store's
 *   search builds SQL from. Keeping parsing and SQL generation separate
 *   keeps the required-filter rule and the geospatial boundary cases
 *   testable without a database.
 */

use chrono::NaiveTime;

use super::fulltext::{self, TextSearch};
use super::geospatial::{GeoMode, GeoQuery};
use super::params::QueryParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatsOp {
    And,
    Or,
}

#[derive(Debug, Clone, Default)]
pub struct FilterPlan {
    pub meeting_ids: Vec<i64>,
    pub weekdays_include: Vec<i64>,
    pub weekdays_exclude: Vec<i64>,
    pub venue_types_include: Vec<String>,
    pub venue_types_exclude: Vec<String>,
    pub services_include: Vec<i64>,
    pub services_exclude: Vec<i64>,
    pub recursive: bool,
    pub formats_include: Vec<i64>,
    pub formats_exclude: Vec<i64>,
    pub formats_op: Option<FormatsOp>,
    pub roots_include: Vec<i64>,
    pub roots_exclude: Vec<i64>,
    pub meeting_key: Option<(String, String)>,
    pub starts_after: Option<NaiveTime>,
    pub starts_before: Option<NaiveTime>,
    pub ends_before: Option<NaiveTime>,
    pub min_duration_minutes: Option<i32>,
    pub max_duration_minutes: Option<i32>,
    pub geo: Option<GeoQuery>,
    pub sort_by_distance: bool,
    pub address_search_string: Option<String>,
    pub address_radius: Option<i64>,
    pub text: Option<TextSearch>,
    pub sort_keys: Vec<String>,
    pub data_field_keys: Vec<String>,
    pub page_size: i64,
    pub page_num: i64,
}

impl FilterPlan {
    pub fn from_params(qp: &QueryParams) -> Self {
        let mut plan = FilterPlan::default();

        let (meeting_ids, _) = qp.signed_ids("meeting_ids");
        plan.meeting_ids = meeting_ids;

        let (wd_in, wd_ex) = qp.signed_ids("weekdays");
        plan.weekdays_include = wd_in;
        plan.weekdays_exclude = wd_ex;

        for raw in qp.all("venue_types") {
            match raw.strip_prefix('-') {
                Some(rest) => plan.venue_types_exclude.push(rest.to_string()),
                None => plan.venue_types_include.push(raw.to_string()),
            }
        }

        let (sv_in, sv_ex) = qp.signed_ids("services");
        plan.services_include = sv_in;
        plan.services_exclude = sv_ex;
        plan.recursive = qp.flag("recursive");

        let (fmt_in, fmt_ex) = qp.signed_ids("formats");
        plan.formats_include = fmt_in;
        plan.formats_exclude = fmt_ex;
        if !plan.formats_include.is_empty() || !plan.formats_exclude.is_empty() {
            plan.formats_op = Some(match qp.first("formats_comparison_operator") {
                Some("OR") => FormatsOp::Or,
                _ => FormatsOp::And,
            });
        }

        let (root_in, root_ex) = qp.signed_ids("root_server_ids");
        plan.roots_include = root_in;
        plan.roots_exclude = root_ex;

        if let (Some(key), Some(value)) = (qp.first("meeting_key"), qp.first("meeting_key_value")) {
            plan.meeting_key = Some((key.to_string(), value.to_string()));
        }

        plan.starts_after = hm_to_time(qp.int("StartsAfterH"), qp.int("StartsAfterM"));
        plan.starts_before = hm_to_time(qp.int("StartsBeforeH"), qp.int("StartsBeforeM"));
        plan.ends_before = hm_to_time(qp.int("EndsBeforeH"), qp.int("EndsBeforeM"));
        plan.min_duration_minutes = hm_to_minutes(qp.int("MinDurationH"), qp.int("MinDurationM"));
        plan.max_duration_minutes = hm_to_minutes(qp.int("MaxDurationH"), qp.int("MaxDurationM"));

        plan.sort_by_distance = qp.flag("sort_results_by_distance");
        if let (Some(lat), Some(lon)) = (qp.float("lat_val"), qp.float("long_val")) {
            let mode = if let Some(width) = qp.float("geo_width") {
                geo_mode_from_width(width, super::geospatial::miles_to_km(1.0))
            } else if let Some(width_km) = qp.float("geo_width_km") {
                geo_mode_from_width(width_km, 1.0)
            } else {
                GeoMode::RadiusKm(0.0)
            };
            plan.geo = Some(GeoQuery { latitude: lat, longitude: lon, mode });
        }

        if qp.flag("StringSearchIsAnAddress") {
            plan.address_search_string = qp.first("SearchString").map(|s| s.to_string());
            plan.address_radius = qp.int("SearchStringRadius");
        } else if let Some(search_string) = qp.first("SearchString") {
            plan.text = Some(fulltext::build(search_string, qp.flag("SearchStringAll"), qp.flag("SearchStringExact")));
        }

        plan.sort_keys = qp.csv_list("sort_keys");
        plan.data_field_keys = qp.csv_list("data_field_key");
        plan.page_size = qp.int("page_size").unwrap_or(0).max(0);
        plan.page_num = qp.int("page_num").unwrap_or(1).max(1);

        plan
    }

    /// The required-filter rule: without at least one of these groups the
    /// engine must return an empty stream rather than scan everything.
    pub fn satisfies_required_filter_rule(&self) -> bool {
        !self.meeting_ids.is_empty()
            || !self.services_include.is_empty()
            || !self.formats_include.is_empty()
            || !self.roots_include.is_empty()
            || self.meeting_key.is_some()
            || self.text.is_some()
            || self.address_search_string.is_some()
            || self.geo.is_some()
    }
}

fn hm_to_time(hours: Option<i64>, minutes: Option<i64>) -> Option<NaiveTime> {
    if hours.is_none() && minutes.is_none() {
        return None;
    }
    NaiveTime::from_hms_opt(hours.unwrap_or(0).clamp(0, 23) as u32, minutes.unwrap_or(0).clamp(0, 59) as u32, 0)
}

fn hm_to_minutes(hours: Option<i64>, minutes: Option<i64>) -> Option<i32> {
    if hours.is_none() && minutes.is_none() {
        return None;
    }
    Some((hours.unwrap_or(0) * 60 + minutes.unwrap_or(0)) as i32)
}

/// A positive width is a radius in the unit implied by the caller
/// (`km_per_unit` converts it); a negative width selects nearest-|N|.
fn geo_mode_from_width(width: f64, km_per_unit: f64) -> GeoMode {
    if width < 0.0 {
        GeoMode::NearestN(width.abs().round() as u32)
    } else {
        GeoMode::RadiusKm(width * km_per_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekdays_seven_alone_is_a_valid_include_filter() {
        let qp = QueryParams::parse("weekdays[]=7");
        let plan = FilterPlan::from_params(&qp);
        assert_eq!(plan.weekdays_include, vec![7]);
    }

    #[test]
    fn negative_weekdays_populate_exclude() {
        let qp = QueryParams::parse("weekdays[]=-1&weekdays[]=-2");
        let plan = FilterPlan::from_params(&qp);
        assert_eq!(plan.weekdays_exclude, vec![1, 2]);
    }

    #[test]
    fn negative_geo_width_selects_nearest_n() {
        let qp = QueryParams::parse("lat_val=21.33&long_val=-157.70&geo_width=-5");
        let plan = FilterPlan::from_params(&qp);
        match plan.geo.unwrap().mode {
            GeoMode::NearestN(n) => assert_eq!(n, 5),
            _ => panic!("expected NearestN"),
        }
    }

    #[test]
    fn required_filter_rule_rejects_unscoped_queries() {
        let qp = QueryParams::parse("sort_keys=weekday_tinyint");
        let plan = FilterPlan::from_params(&qp);
        assert!(!plan.satisfies_required_filter_rule());
    }

    #[test]
    fn root_server_ids_alone_satisfies_required_filter_rule() {
        let qp = QueryParams::parse("root_server_ids[]=1");
        let plan = FilterPlan::from_params(&qp);
        assert!(plan.satisfies_required_filter_rule());
    }
}
