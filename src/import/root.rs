/*
 * src/import/root.rs
 *
 * File for the Per-Root Import Pipeline
 *
 * Purpose:
 *   One root server's pass, inside one transaction: clear prior
 *   import problems, cache the server-info document, then service bodies →
 *   formats (per declared language) → meetings → supplementary NAWS merge →
 *   recounts → mark success. A rejected record becomes an ImportProblem row
 *   and its siblings continue; a save failure on one meeting rolls back a
 *   savepoint, not the pass.
 */

use serde_json::Value as Json;
use sqlx::{Acquire, PgConnection, PgPool};
use tracing::{info, warn};

use crate::global::Config;
use crate::models::RootServer;
use crate::normalize::meeting::FormatRefs;
use crate::normalize::{
    format as normalize_format, meeting as normalize_meeting, service_body as normalize_service_body, ImportFailure,
};
use crate::store;
use crate::upstream::discovery::RootEndpoints;
use crate::upstream::Client;

use super::RootImportError;

pub async fn import_root(
    pool: &PgPool,
    client: &Client,
    config: &Config,
    root: &RootServer,
) -> Result<(), RootImportError> {
    let endpoints = RootEndpoints::new(&root.url);

    let mut tx = pool.begin().await?;
    store::import_problem::clear_for_root(&mut tx, root.id).await?;

    let server_info = fetch_server_info(client, &endpoints).await?;
    let langs = declared_languages(&server_info);

    info!("IMPORT ->> {}: importing service bodies", root.url);
    import_service_bodies(&mut tx, client, config, root, &endpoints).await?;
    info!("IMPORT ->> {}: importing formats ({})", root.url, langs.join(","));
    import_formats(&mut tx, client, root, &langs).await?;
    info!("IMPORT ->> {}: importing meetings", root.url);
    import_meetings(&mut tx, client, root, &endpoints).await?;

    if config.naws_sync_enabled {
        super::naws::merge_root(&mut tx, client, root).await?;
    }

    store::service_body::recount(&mut tx, root.id).await?;
    store::root_server::recount(&mut tx, root.id).await?;
    store::root_server::mark_import_success(&mut tx, root.id, Some(server_info.to_string().as_str())).await?;
    tx.commit().await?;
    Ok(())
}

/// The cached GetServerInfo document. Upstream wraps the descriptor in a
/// one-element array; either shape is accepted.
async fn fetch_server_info(client: &Client, endpoints: &RootEndpoints) -> Result<Json, RootImportError> {
    let document: Json = client.fetch_json(&endpoints.server_info).await?;
    Ok(match document {
        Json::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    })
}

/// `langs` is a comma-separated string in the server-info document; English
/// is always imported so the translation fallback has a floor.
fn declared_languages(server_info: &Json) -> Vec<String> {
    let mut langs: Vec<String> = server_info
        .get("langs")
        .and_then(|v| v.as_str())
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    if !langs.iter().any(|l| l == "en") {
        langs.insert(0, "en".to_string());
    }
    langs
}

async fn import_service_bodies(
    conn: &mut PgConnection,
    client: &Client,
    config: &Config,
    root: &RootServer,
    endpoints: &RootEndpoints,
) -> Result<(), RootImportError> {
    let raw: Vec<Json> = client.fetch_json(&endpoints.service_bodies).await?;
    let ignored = config.ignored_service_bodies.get(&root.url).cloned().unwrap_or_default();

    let mut source_ids = Vec::with_capacity(raw.len());
    let mut parents = Vec::new();
    for record in &raw {
        match normalize_service_body::validate(record) {
            Ok(canonical) => {
                if ignored.contains(&canonical.source_id) {
                    continue;
                }
                let stored = store::service_body::upsert_pass_one(conn, root.id, &canonical).await?;
                source_ids.push(canonical.source_id);
                if let Some(parent_source_id) = canonical.parent_source_id {
                    parents.push((stored.source_id, parent_source_id));
                }
            }
            Err(failure) => {
                warn!("IMPORT ->> rejected service body from {}: {}", root.url, failure.message);
                store::import_problem::record(conn, root.id, &failure).await?;
            }
        }
    }

    // Second pass wires parents once every sibling has an id; a parent
    // pointing outside the batch (or into a cycle the upstream shipped) is
    // skipped rather than fatal.
    let id_map = store::service_body::source_id_map(conn, root.id).await?;
    for (source_id, parent_source_id) in parents {
        if source_id == parent_source_id {
            continue;
        }
        if let (Some(&id), Some(&parent_id)) = (id_map.get(&source_id), id_map.get(&parent_source_id)) {
            store::service_body::set_parent(conn, id, Some(parent_id)).await?;
        }
    }

    store::service_body::delete_missing(conn, root.id, &source_ids).await?;
    Ok(())
}

async fn import_formats(
    conn: &mut PgConnection,
    client: &Client,
    root: &RootServer,
    langs: &[String],
) -> Result<(), RootImportError> {
    let mut source_ids = Vec::new();
    for language in langs {
        let url = RootEndpoints::formats_for_lang(&root.url, language);
        let raw: Vec<Json> = match client.fetch_json(&url).await {
            Ok(raw) => raw,
            Err(e) if language != "en" => {
                // A root may declare a language and serve no formats for it.
                warn!("IMPORT ->> no {language} formats from {}: {e}", root.url);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        for record in &raw {
            match normalize_format::validate(record, language) {
                Ok(canonical) => {
                    source_ids.push(canonical.source_id);
                    store::format::upsert(conn, root.id, &canonical).await?;
                }
                Err(failure) => {
                    warn!("IMPORT ->> rejected format from {}: {}", root.url, failure.message);
                    store::import_problem::record(conn, root.id, &failure).await?;
                }
            }
        }
    }
    source_ids.sort_unstable();
    source_ids.dedup();
    store::format::delete_missing(conn, root.id, &source_ids).await?;
    Ok(())
}

async fn import_meetings(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    client: &Client,
    root: &RootServer,
    endpoints: &RootEndpoints,
) -> Result<(), RootImportError> {
    let raw: Vec<Json> = client.fetch_json(&endpoints.search_results).await?;
    let service_body_ids = store::service_body::source_id_map(&mut **tx, root.id).await?;
    let format_source_ids = store::format::source_id_map(&mut **tx, root.id).await?;
    let format_key_strings = store::format::key_string_map(&mut **tx, root.id, "en").await?;

    let mut source_ids = Vec::with_capacity(raw.len());
    for record in &raw {
        let canonical = match normalize_meeting::validate(record) {
            Ok(canonical) => canonical,
            Err(failure) => {
                warn!("IMPORT ->> rejected meeting from {}: {}", root.url, failure.message);
                store::import_problem::record(&mut **tx, root.id, &failure).await?;
                continue;
            }
        };

        let Some(&service_body_id) = service_body_ids.get(&canonical.service_body_source_id) else {
            let failure = ImportFailure::new("Invalid service_body", record);
            warn!("IMPORT ->> rejected meeting {} from {}: {}", canonical.source_id, root.url, failure.message);
            store::import_problem::record(&mut **tx, root.id, &failure).await?;
            continue;
        };

        let format_ids: Vec<i64> = match &canonical.formats {
            FormatRefs::SharedIds(ids) => ids.iter().filter_map(|id| format_source_ids.get(id).copied()).collect(),
            FormatRefs::KeyStrings(keys) => keys.iter().filter_map(|k| format_key_strings.get(k).copied()).collect(),
            FormatRefs::None => Vec::new(),
        };

        // One savepoint per meeting: a save failure rolls this meeting back
        // and records a problem without poisoning the root's transaction.
        let mut savepoint = tx.begin().await?;
        let saved: Result<(), sqlx::Error> = async {
            let stored = store::meeting::upsert(&mut *savepoint, root.id, service_body_id, &canonical).await?;
            store::meeting::upsert_info(&mut *savepoint, stored.id, &canonical.info).await?;
            store::meeting::link_formats(&mut *savepoint, stored.id, &format_ids).await?;
            store::meeting::refresh_search_vector(&mut *savepoint, stored.id).await?;
            Ok(())
        }
        .await;

        match saved {
            Ok(()) => {
                savepoint.commit().await?;
                source_ids.push(canonical.source_id);
            }
            Err(e) => {
                savepoint.rollback().await?;
                let failure = ImportFailure::new(format!("Error saving meeting: {e}"), record);
                warn!("IMPORT ->> {}", failure.message);
                store::import_problem::record(&mut **tx, root.id, &failure).await?;
            }
        }
    }

    store::meeting::mark_missing_deleted(&mut **tx, root.id, &source_ids).await?;
    Ok(())
}
