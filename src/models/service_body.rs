use serde::{Deserialize, Serialize};

/// A node in a root server's service-body forest.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceBody {
    pub id: i64,
    pub source_id: i64,
    pub root_server_id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub r#type: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub helpline: Option<String>,
    pub world_id: Option<String>,
    pub num_meetings: i32,
    pub num_groups: i32,
}

impl ServiceBody {
    /// Top-level bodies report a `parent_id` of 0 at the API boundary.
    pub fn calculated_parent_id(&self) -> i64 {
        self.parent_id.unwrap_or(0)
    }

    pub const AREA: &'static str = "AS";
    pub const METRO: &'static str = "MA";
    pub const REGION: &'static str = "RS";
    pub const ZONE: &'static str = "ZF";

    pub fn is_area_or_region(&self) -> bool {
        matches!(self.r#type.as_deref(), Some(Self::AREA) | Some(Self::REGION))
    }
}
