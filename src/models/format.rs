use serde::{Deserialize, Serialize};

/// A tagged attribute of a meeting, e.g. "Open" or a language tag.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Format {
    pub id: i64,
    pub source_id: i64,
    pub root_server_id: i64,
    pub r#type: Option<String>,
    pub world_id: Option<String>,
}

/// One language's translation of a [`Format`].
/// Invariant: `(format_id, language)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TranslatedFormat {
    pub id: i64,
    pub format_id: i64,
    pub language: String,
    pub key_string: String,
    pub name: String,
    pub description: Option<String>,
}
