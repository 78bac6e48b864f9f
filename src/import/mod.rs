/*
 * src/import/mod.rs
 *
 * File for the Import Orchestrator
 *
 * Purpose:
 *   Drive one discover → reconcile → per-root (bodies → formats → meetings
 *   → recount) cycle. The binary in src/bin/import_root_servers.rs wraps
 *   `run_cycle` in the sleep loop; the library only runs a single pass so it
 *   can be driven by tests or by the server's own background task.
 */

pub mod naws;
pub mod root;

use sqlx::PgPool;
use tracing::{error, info};

use crate::global::Config;
use crate::upstream::client::UpstreamError;
use crate::upstream::Client;

/// What went wrong with one root's pass, split by handling policy:
/// a database error aborts the root's transaction and the pool recycles its
/// connections; an upstream error just skips the root until the next cycle.
#[derive(Debug)]
pub enum RootImportError {
    Db(sqlx::Error),
    Upstream(UpstreamError),
}

impl std::fmt::Display for RootImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RootImportError::Db(e) => write!(f, "database error: {e}"),
            RootImportError::Upstream(e) => write!(f, "upstream error: {e}"),
        }
    }
}

impl std::error::Error for RootImportError {}

impl From<sqlx::Error> for RootImportError {
    fn from(e: sqlx::Error) -> Self {
        RootImportError::Db(e)
    }
}

impl From<UpstreamError> for RootImportError {
    fn from(e: UpstreamError) -> Self {
        RootImportError::Upstream(e)
    }
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub roots_processed: usize,
    pub roots_failed: usize,
}

/// Runs exactly one import cycle across every root in the discovery list.
/// Roots run sequentially to bound connection use; per-root
/// failures are isolated — logged, recorded, and the loop proceeds to the
/// next root.
pub async fn run_cycle(pool: &PgPool, client: &Client, config: &Config) -> ImportSummary {
    let mut summary = ImportSummary::default();

    let listing = match crate::upstream::discovery::fetch_root_list(client, &config.root_server_list_url).await {
        Ok(listing) => listing,
        Err(e) => {
            error!("IMPORT ->> failed to fetch root server list: {e}");
            return summary;
        }
    };

    let active: Vec<_> = listing
        .into_iter()
        .filter(|entry| !config.ignored_root_urls.contains(&entry.normalized_url()))
        .collect();

    let mut source_ids = Vec::with_capacity(active.len());
    for entry in &active {
        if let Err(e) = crate::store::root_server::upsert(pool, entry.id, &entry.normalized_url(), &entry.name).await {
            error!("IMPORT ->> failed to upsert root server {}: {e}", entry.id);
            continue;
        }
        source_ids.push(entry.id);
    }

    match crate::store::root_server::delete_missing(pool, &source_ids).await {
        Ok(removed) if removed > 0 => info!("IMPORT ->> removed {removed} root server(s) no longer listed"),
        Ok(_) => {}
        Err(e) => error!("IMPORT ->> failed to reconcile root server set: {e}"),
    }

    let roots = match crate::store::root_server::list_all(pool).await {
        Ok(roots) => roots,
        Err(e) => {
            error!("IMPORT ->> failed to list root servers: {e}");
            return summary;
        }
    };

    for root_server in roots {
        match root::import_root(pool, client, config, &root_server).await {
            Ok(()) => summary.roots_processed += 1,
            Err(RootImportError::Db(e)) => {
                // The transaction has already rolled back by drop; its
                // connection goes back to the pool, which health-checks it
                // before the next checkout.
                summary.roots_failed += 1;
                error!("IMPORT ->> root {} aborted on database error: {e}", root_server.url);
            }
            Err(e) => {
                summary.roots_failed += 1;
                error!("IMPORT ->> root {} import failed: {e}", root_server.url);
            }
        }
    }

    summary
}
