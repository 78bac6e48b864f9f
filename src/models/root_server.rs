use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An independent upstream meeting-directory server.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RootServer {
    pub id: i64,
    pub source_id: i64,
    pub url: String,
    pub name: Option<String>,
    pub server_info: Option<String>,
    pub last_successful_import: Option<DateTime<Utc>>,
    pub num_areas: i32,
    pub num_regions: i32,
    pub num_zones: i32,
    pub num_meetings: i32,
    pub num_groups: i32,
}

/// One entry in the discovery document at `ROOT_SERVER_LIST_URL`.
#[derive(Debug, Clone, Deserialize)]
pub struct RootServerListing {
    pub id: i64,
    pub name: String,
    #[serde(rename = "rootURL")]
    pub root_url: String,
}

impl RootServerListing {
    /// The discovery list's URLs are not guaranteed to end in `/`; every
    /// downstream `client_interface/json/...` join assumes they do.
    pub fn normalized_url(&self) -> String {
        if self.root_url.ends_with('/') {
            self.root_url.clone()
        } else {
            format!("{}/", self.root_url)
        }
    }
}
