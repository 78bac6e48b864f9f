use std::collections::HashMap;
use std::env;
use std::time::Duration;

pub const LOG_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/logs");
pub const CRASH_LOG: &str = "crash.log";
pub const LATEST_LOG: &str = "latest.log";

/// Fixed browser-like identifier sent on every upstream fetch (client.rs) so
/// root servers see a stable, recognizable caller.
pub const UPSTREAM_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:52.0) Gecko/20100101 Firefox/52.0 +tomato";

/// Default neighbor count for an address search (`StringSearchIsAnAddress=1`)
/// when `SearchStringRadius` is not supplied.
pub const DEFAULT_ADDRESS_NEAREST_N: i64 = 10;

/// Interval between import orchestrator passes.
pub const DEFAULT_IMPORT_INTERVAL: Duration = Duration::from_secs(3600 * 6);

/// Process-wide configuration, loaded once from the environment at startup
/// and threaded explicitly into the router / orchestrator rather than read
/// ambiently.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub root_server_list_url: String,
    pub ignored_root_urls: Vec<String>,
    /// Per-root-URL service body source ids to skip during import, from
    /// `IGNORED_SERVICE_BODIES` (`url=id,id;url=id`).
    pub ignored_service_bodies: HashMap<String, Vec<i64>>,
    pub geocoder_base_url: String,
    pub geocoder_api_key: Option<String>,
    /// When set, XML responses carry `xmlns`/`xsi:schemaLocation` attributes
    /// pointing at `<base>/<switcher>.xsd` served by the deployment.
    pub xml_schema_base_url: Option<String>,
    /// Supplementary NAWS dump merge after each root's primary list.
    pub naws_sync_enabled: bool,
    pub upstream_timeout: Duration,
    pub geocoder_timeout: Duration,
    pub import_interval: Duration,
    pub debug: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let bind_address =
            env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let root_server_list_url = env::var("ROOT_SERVER_LIST_URL").unwrap_or_else(|_| {
            "https://raw.githubusercontent.com/LittleGreenViper/BMLTTally/master/rootServerList.json"
                .to_string()
        });
        let ignored_root_urls = env::var("IGNORED_ROOT_URLS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let ignored_service_bodies = env::var("IGNORED_SERVICE_BODIES")
            .ok()
            .map(|v| parse_ignored_service_bodies(&v))
            .unwrap_or_default();
        let geocoder_base_url = env::var("GEOCODER_BASE_URL")
            .unwrap_or_else(|_| "https://maps.googleapis.com/maps/api/geocode/json".to_string());
        let geocoder_api_key = env::var("GEOCODER_API_KEY").ok();
        let xml_schema_base_url = env::var("XML_SCHEMA_BASE_URL").ok().filter(|v| !v.is_empty());
        let naws_sync_enabled = env::var("NAWS_SYNC_ENABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let debug = env::var("DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Config {
            database_url,
            bind_address,
            root_server_list_url,
            ignored_root_urls,
            ignored_service_bodies,
            geocoder_base_url,
            geocoder_api_key,
            xml_schema_base_url,
            naws_sync_enabled,
            upstream_timeout: Duration::from_secs(30),
            geocoder_timeout: Duration::from_secs(10),
            import_interval: DEFAULT_IMPORT_INTERVAL,
            debug,
        }
    }
}

fn parse_ignored_service_bodies(value: &str) -> HashMap<String, Vec<i64>> {
    let mut map = HashMap::new();
    for entry in value.split(';') {
        let Some((url, ids)) = entry.split_once('=') else { continue };
        let ids: Vec<i64> = ids.split(',').filter_map(|id| id.trim().parse().ok()).collect();
        if !ids.is_empty() {
            map.insert(url.trim().to_string(), ids);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignored_service_bodies_parse_per_root() {
        let map = parse_ignored_service_bodies("https://a.example/=1,2;https://b.example/=7");
        assert_eq!(map.get("https://a.example/"), Some(&vec![1, 2]));
        assert_eq!(map.get("https://b.example/"), Some(&vec![7]));
    }
}
