use chrono::{DateTime, Utc};
use serde::Serialize;

/// A per-root-server record of a rejected upstream row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ImportProblem {
    pub id: i64,
    pub root_server_id: i64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub data: Option<String>,
}
