/*
 * src/store/root_server.rs
 *
 * File for the Root Server Store
 *
 * Purpose:
 *   Upsert discovery-list entries, drop root servers no longer listed
 *  , and maintain each root's cached
 *   server-info document and catalog counters.
 */

use sqlx::{PgConnection, PgPool};

use crate::models::{RootServer, ServiceBody};

/// Upserts by `source_id`; URL/name refresh on every discovery cycle since
/// they come straight from the discovery document.
pub async fn upsert(pool: &PgPool, source_id: i64, url: &str, name: &str) -> Result<RootServer, sqlx::Error> {
    sqlx::query_as::<_, RootServer>(
        r#"
        INSERT INTO root_servers (source_id, url, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (source_id) DO UPDATE SET url = EXCLUDED.url, name = EXCLUDED.name
        RETURNING id, source_id, url, name, server_info, last_successful_import,
                  num_areas, num_regions, num_zones, num_meetings, num_groups
        "#,
    )
    .bind(source_id)
    .bind(url)
    .bind(name)
    .fetch_one(pool)
    .await
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<RootServer>, sqlx::Error> {
    sqlx::query_as::<_, RootServer>(
        "SELECT id, source_id, url, name, server_info, last_successful_import, \
         num_areas, num_regions, num_zones, num_meetings, num_groups FROM root_servers ORDER BY id",
    )
    .fetch_all(pool)
    .await
}

/// Deletes any root server whose `source_id` is absent from the current
/// discovery list; everything it owns goes with it via ON DELETE CASCADE.
pub async fn delete_missing(pool: &PgPool, current_source_ids: &[i64]) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM root_servers WHERE NOT (source_id = ANY($1))")
        .bind(current_source_ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// The most recent successful import across every root, used to decide
/// whether the translation cache needs rebuilding.
pub async fn latest_successful_import(pool: &PgPool) -> Result<Option<chrono::DateTime<chrono::Utc>>, sqlx::Error> {
    let (latest,): (Option<chrono::DateTime<chrono::Utc>>,) =
        sqlx::query_as("SELECT max(last_successful_import) FROM root_servers").fetch_one(pool).await?;
    Ok(latest)
}

/// Recomputes the root's catalog counters from the rows the import pass
/// just wrote: service bodies by type, non-deleted meetings,
/// and groups (distinct meeting world ids plus distinct names among
/// meetings without one).
pub async fn recount(conn: &mut PgConnection, root_server_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE root_servers rs
        SET num_areas = stats.areas, num_regions = stats.regions, num_zones = stats.zones,
            num_meetings = stats.meetings, num_groups = stats.groups
        FROM (
            SELECT
                (SELECT count(*) FROM service_bodies WHERE root_server_id = $1 AND type = $2) AS areas,
                (SELECT count(*) FROM service_bodies WHERE root_server_id = $1 AND type = $3) AS regions,
                (SELECT count(*) FROM service_bodies WHERE root_server_id = $1 AND type = $4) AS zones,
                (SELECT count(*) FROM meetings WHERE root_server_id = $1 AND deleted = FALSE) AS meetings,
                (SELECT count(DISTINCT mi.world_id) FILTER (WHERE mi.world_id IS NOT NULL AND mi.world_id <> '')
                      + count(DISTINCT m.name) FILTER (WHERE mi.world_id IS NULL OR mi.world_id = '')
                 FROM meetings m LEFT JOIN meeting_info mi ON mi.meeting_id = m.id
                 WHERE m.root_server_id = $1 AND m.deleted = FALSE) AS groups
        ) AS stats
        WHERE rs.id = $1
        "#,
    )
    .bind(root_server_id)
    .bind(ServiceBody::AREA)
    .bind(ServiceBody::REGION)
    .bind(ServiceBody::ZONE)
    .execute(conn)
    .await?;
    Ok(())
}

/// Stores the root's freshly fetched server-info document and stamps the
/// pass as successful.
pub async fn mark_import_success(
    conn: &mut PgConnection,
    root_server_id: i64,
    server_info: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE root_servers SET server_info = $2, last_successful_import = now() WHERE id = $1",
    )
    .bind(root_server_id)
    .bind(server_info)
    .execute(conn)
    .await?;
    Ok(())
}
