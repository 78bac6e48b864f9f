/*
 * src/translation.rs
 *
 * File for the Translation Cache
 *
 * Purpose:
 *   Process-wide cache of `(format_id, language) -> TranslatedFormat`,
 *   rebuilt only when the max `last_successful_import` across root servers
 *   advances past the cache's own timestamp, so steady-state requests pay
 *   a timestamp comparison and nothing else.
 */

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::info;

use crate::models::TranslatedFormat;

pub struct Cache {
    built_at: Option<DateTime<Utc>>,
    by_format_and_language: HashMap<(i64, String), TranslatedFormat>,
}

impl Cache {
    fn empty() -> Self {
        Cache { built_at: None, by_format_and_language: HashMap::new() }
    }

    pub fn lookup(&self, format_id: i64, language: &str) -> Option<&TranslatedFormat> {
        self.by_format_and_language.get(&(format_id, language.to_string()))
    }

    /// Falls back to English when the requested language has no translation
    /// for this format.
    pub fn lookup_with_fallback(&self, format_id: i64, language: &str) -> Option<&TranslatedFormat> {
        self.lookup(format_id, language).or_else(|| self.lookup(format_id, "en"))
    }
}

/// Single-writer guard around an atomically-swapped cache snapshot: readers
/// never block behind a refresh, and concurrent refreshes collapse into one
/// by holding `refresh_lock` only around the rebuild itself.
pub struct TranslationCache {
    current: RwLock<Arc<Cache>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl TranslationCache {
    pub fn new() -> Self {
        TranslationCache { current: RwLock::new(Arc::new(Cache::empty())), refresh_lock: tokio::sync::Mutex::new(()) }
    }

    pub async fn snapshot(&self) -> Arc<Cache> {
        self.current.read().await.clone()
    }

    /// Rebuilds the cache if `latest_import` is newer than the cache's
    /// current `built_at`. Safe to call on every request: the common case is
    /// a no-op timestamp comparison under a shared lock.
    pub async fn refresh_if_stale(&self, pool: &PgPool, latest_import: Option<DateTime<Utc>>) -> Result<(), sqlx::Error> {
        let is_stale = {
            let current = self.current.read().await;
            match (current.built_at, latest_import) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(built_at), Some(latest)) => latest > built_at,
            }
        };
        if !is_stale {
            return Ok(());
        }

        let _guard = self.refresh_lock.lock().await;
        let still_stale = {
            let current = self.current.read().await;
            match (current.built_at, latest_import) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(built_at), Some(latest)) => latest > built_at,
            }
        };
        if !still_stale {
            return Ok(());
        }

        let rows: Vec<TranslatedFormat> = sqlx::query_as(
            "SELECT id, format_id, language, key_string, name, description FROM translated_formats",
        )
        .fetch_all(pool)
        .await?;

        let mut by_format_and_language = HashMap::with_capacity(rows.len());
        for row in rows {
            by_format_and_language.insert((row.format_id, row.language.clone()), row);
        }

        let built = Cache { built_at: latest_import, by_format_and_language };
        *self.current.write().await = Arc::new(built);
        info!("TRANSLATION ->> cache rebuilt, {} entries", self.current.read().await.by_format_and_language.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translated(format_id: i64, language: &str, key_string: &str) -> TranslatedFormat {
        TranslatedFormat {
            id: 0,
            format_id,
            language: language.to_string(),
            key_string: key_string.to_string(),
            name: key_string.to_string(),
            description: None,
        }
    }

    #[test]
    fn falls_back_to_english_when_language_is_missing() {
        let mut by_format_and_language = HashMap::new();
        by_format_and_language.insert((1, "en".to_string()), translated(1, "en", "O"));
        by_format_and_language.insert((1, "es".to_string()), translated(1, "es", "A"));
        let cache = Cache { built_at: None, by_format_and_language };

        assert_eq!(cache.lookup_with_fallback(1, "es").unwrap().key_string, "A");
        assert_eq!(cache.lookup_with_fallback(1, "fr").unwrap().key_string, "O");
        assert!(cache.lookup_with_fallback(2, "en").is_none());
    }
}
