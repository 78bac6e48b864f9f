/*
 * src/import/naws.rs
 *
 * File for the NAWS Tabular Dump Merge
 *
 * Purpose:
 *   Supplementary post-merge after a root's primary list: fetch the
 *   per-area/region NAWS CSV dump and insert the meetings the primary list
 *   does not carry — only rows that are unpublished or deleted qualify, and
 *   a bmlt_id already present always wins for the primary import ("primary
 *   wins", resolved in DESIGN.md). Service bodies and formats are resolved
 *   by NAWS world id.
 */

use std::collections::HashSet;

use sqlx::PgConnection;
use tracing::warn;

use crate::models::RootServer;
use crate::normalize::meeting::CanonicalMeetingInfo;
use crate::normalize::naws_row::{self, NawsRow};
use crate::store;
use crate::upstream::discovery::RootEndpoints;
use crate::upstream::Client;

use super::RootImportError;

pub async fn merge_root(
    conn: &mut PgConnection,
    client: &Client,
    root: &RootServer,
) -> Result<(), RootImportError> {
    let bodies = store::service_body::list_area_or_region(&mut *conn, root.id).await?;
    let body_by_world_id = store::service_body::world_id_map(&mut *conn, root.id).await?;
    let format_by_world_id = store::format::world_id_map(&mut *conn, root.id).await?;
    let existing: HashSet<i64> =
        store::meeting::source_ids_for_root(&mut *conn, root.id).await?.into_iter().collect();

    for body in bodies {
        let url = RootEndpoints::naws_dump(&root.url, body.source_id);
        let text = match client.fetch_text(&url).await {
            Ok(text) => text,
            Err(e) => {
                warn!("IMPORT ->> NAWS dump unavailable for {} sb {}: {e}", root.url, body.source_id);
                continue;
            }
        };

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
        let headers = match reader.headers() {
            Ok(headers) => headers.clone(),
            Err(e) => {
                warn!("IMPORT ->> unreadable NAWS dump from {} sb {}: {e}", root.url, body.source_id);
                continue;
            }
        };

        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!("IMPORT ->> skipping malformed NAWS row from {}: {e}", root.url);
                    continue;
                }
            };
            let row: NawsRow = headers
                .iter()
                .zip(record.iter())
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

            let canonical = match naws_row::validate(&row) {
                Ok(canonical) => canonical,
                Err(failure) => {
                    warn!("IMPORT ->> rejected NAWS row from {}: {}", root.url, failure.message);
                    store::import_problem::record(&mut *conn, root.id, &failure).await?;
                    continue;
                }
            };

            if existing.contains(&canonical.bmlt_id) {
                continue;
            }
            if !(canonical.unpublished || canonical.deleted) {
                continue;
            }
            let Some(&service_body_id) = canonical
                .service_body_world_id
                .as_ref()
                .and_then(|world_id| body_by_world_id.get(world_id))
            else {
                continue;
            };

            let Some(meeting) =
                store::meeting::insert_from_naws(&mut *conn, root.id, service_body_id, &canonical).await?
            else {
                continue;
            };

            let info = CanonicalMeetingInfo {
                world_id: canonical.world_id.clone(),
                location_text: canonical.location_text.clone(),
                location_street: canonical.location_street.clone(),
                location_municipality: canonical.location_municipality.clone(),
                location_neighborhood: canonical.location_neighborhood.clone(),
                location_province: canonical.location_province.clone(),
                location_postal_code_1: canonical.location_postal_code_1.clone(),
                location_nation: canonical.location_nation.clone(),
                location_info: canonical.location_info.clone(),
                ..CanonicalMeetingInfo::default()
            };
            store::meeting::upsert_info(&mut *conn, meeting.id, &info).await?;

            let format_ids: Vec<i64> = canonical
                .format_world_ids
                .iter()
                .filter_map(|world_id| format_by_world_id.get(world_id).copied())
                .collect();
            store::meeting::link_formats(&mut *conn, meeting.id, &format_ids).await?;
            store::meeting::refresh_search_vector(&mut *conn, meeting.id).await?;
        }
    }

    Ok(())
}
