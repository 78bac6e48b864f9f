/*
 * src/upstream/discovery.rs
 *
 * File for Root Server Discovery
 *
 * Purpose:
 *   Fetch the discovery document and build the per-root upstream
 *   endpoint URLs the import orchestrator drives.
 */

use crate::models::root_server::RootServerListing;
use crate::upstream::client::{Client, UpstreamError};

pub async fn fetch_root_list(
    client: &Client,
    discovery_url: &str,
) -> Result<Vec<RootServerListing>, UpstreamError> {
    client.fetch_json(discovery_url).await
}

pub struct RootEndpoints {
    pub server_info: String,
    pub service_bodies: String,
    pub search_results: String,
}

impl RootEndpoints {
    pub fn new(root_url: &str) -> Self {
        let base = format!("{}client_interface/json/", root_url);
        RootEndpoints {
            server_info: format!("{base}?switcher=GetServerInfo"),
            service_bodies: format!("{base}?switcher=GetServiceBodies"),
            search_results: format!("{base}?switcher=GetSearchResults"),
        }
    }

    pub fn formats_for_lang(root_url: &str, lang: &str) -> String {
        format!("{root_url}client_interface/json/?switcher=GetFormats&lang_enum={lang}")
    }

    /// The dump is the one CSV endpoint a root serves.
    pub fn naws_dump(root_url: &str, sb_id: i64) -> String {
        format!("{root_url}client_interface/csv/?switcher=GetNAWSDump&sb_id={sb_id}")
    }
}
