/*
 * src/store/service_body.rs
 *
 * File for the Service Body Store
 *
 * Purpose:
 *   Two-pass upsert: rows land with `parent_id = NULL` first, then a second
 *   pass wires parents once every sibling in the batch has an assigned id.
 *   Import-path functions run on the orchestrator's per-root transaction
 *   connection.
 */

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::fieldmap::records::ServiceBodyRecord;
use crate::models::{RootServer, ServiceBody};
use crate::normalize::service_body::CanonicalServiceBody;
use crate::store::Patch;

const SERVICE_BODY_COLUMNS: &str = "id, source_id, root_server_id, parent_id, name, type, description, \
     url, helpline, world_id, num_meetings, num_groups";

/// First pass of the two-pass import: scalar fields only, diffed against
/// the stored row so an unchanged body writes nothing. Parent wiring is the
/// second pass (`set_parent`), once every sibling has an id.
pub async fn upsert_pass_one(
    conn: &mut PgConnection,
    root_server_id: i64,
    body: &CanonicalServiceBody,
) -> Result<ServiceBody, sqlx::Error> {
    let existing = sqlx::query_as::<_, ServiceBody>(&format!(
        "SELECT {SERVICE_BODY_COLUMNS} FROM service_bodies WHERE root_server_id = $1 AND source_id = $2",
    ))
    .bind(root_server_id)
    .bind(body.source_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(current) = existing else {
        return sqlx::query_as::<_, ServiceBody>(&format!(
            r#"
            INSERT INTO service_bodies (source_id, root_server_id, parent_id, name, type, description, url, helpline, world_id)
            VALUES ($1, $2, NULL, $3, $4, $5, $6, $7, $8)
            RETURNING {SERVICE_BODY_COLUMNS}
            "#,
        ))
        .bind(body.source_id)
        .bind(root_server_id)
        .bind(&body.name)
        .bind(&body.r#type)
        .bind(&body.description)
        .bind(&body.url)
        .bind(&body.helpline)
        .bind(&body.world_id)
        .fetch_one(conn)
        .await;
    };

    let mut patch = Patch::new();
    let next = ServiceBody {
        name: patch.set_if_changed(&current.name, body.name.clone()),
        r#type: patch.set_if_changed(&current.r#type, body.r#type.clone()),
        description: patch.set_if_changed(&current.description, body.description.clone()),
        url: patch.set_if_changed(&current.url, body.url.clone()),
        helpline: patch.set_if_changed(&current.helpline, body.helpline.clone()),
        world_id: patch.set_if_changed(&current.world_id, body.world_id.clone()),
        ..current.clone()
    };
    if !patch.dirty() {
        return Ok(current);
    }

    sqlx::query(
        "UPDATE service_bodies SET name = $2, type = $3, description = $4, url = $5, helpline = $6, world_id = $7 WHERE id = $1",
    )
    .bind(next.id)
    .bind(&next.name)
    .bind(&next.r#type)
    .bind(&next.description)
    .bind(&next.url)
    .bind(&next.helpline)
    .bind(&next.world_id)
    .execute(conn)
    .await?;
    Ok(next)
}

/// `source_id -> id` lookup used to resolve parent links and meeting
/// service-body references within a single root server's import batch.
pub async fn source_id_map(
    conn: &mut PgConnection,
    root_server_id: i64,
) -> Result<HashMap<i64, i64>, sqlx::Error> {
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT source_id, id FROM service_bodies WHERE root_server_id = $1",
    )
    .bind(root_server_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().collect())
}

pub async fn set_parent(
    conn: &mut PgConnection,
    service_body_id: i64,
    parent_id: Option<i64>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE service_bodies SET parent_id = $2 WHERE id = $1 AND parent_id IS DISTINCT FROM $2")
        .bind(service_body_id)
        .bind(parent_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn delete_missing(
    conn: &mut PgConnection,
    root_server_id: i64,
    current_source_ids: &[i64],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM service_bodies WHERE root_server_id = $1 AND NOT (source_id = ANY($2))",
    )
    .bind(root_server_id)
    .bind(current_source_ids)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn list_area_or_region(
    conn: &mut PgConnection,
    root_server_id: i64,
) -> Result<Vec<ServiceBody>, sqlx::Error> {
    sqlx::query_as::<_, ServiceBody>(
        "SELECT id, source_id, root_server_id, parent_id, name, type, description, url, helpline, \
         world_id, num_meetings, num_groups FROM service_bodies \
         WHERE root_server_id = $1 AND type IN ($2, $3)",
    )
    .bind(root_server_id)
    .bind(ServiceBody::AREA)
    .bind(ServiceBody::REGION)
    .fetch_all(conn)
    .await
}

/// `world_id -> id` for one root, used by the NAWS merge to resolve a dump
/// row's AreaRegion column to a service body.
pub async fn world_id_map(
    conn: &mut PgConnection,
    root_server_id: i64,
) -> Result<HashMap<String, i64>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT world_id, id FROM service_bodies \
         WHERE root_server_id = $1 AND world_id IS NOT NULL AND world_id <> ''",
    )
    .bind(root_server_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().collect())
}

#[derive(Debug, sqlx::FromRow)]
struct ServiceBodyJoinRow {
    id: i64,
    source_id: i64,
    root_server_id: i64,
    parent_id: Option<i64>,
    name: String,
    r#type: Option<String>,
    description: Option<String>,
    url: Option<String>,
    helpline: Option<String>,
    world_id: Option<String>,
    num_meetings: i32,
    num_groups: i32,
    root_server_url: String,
    root_server_name: Option<String>,
}

/// `GetServiceBodies` — filterable by root server(s) and, when
/// `services[]` is given, the named bodies (their full descendant set under
/// `recursive=1`, plus their ancestor chain under `parents=1`).
pub async fn list_joined(
    pool: &PgPool,
    root_server_ids: &[i64],
    service_ids: &[i64],
    recursive: bool,
    parents: bool,
) -> Result<Vec<ServiceBodyRecord>, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        r#"
        SELECT sb.id, sb.source_id, sb.root_server_id, sb.parent_id, sb.name, sb.type,
               sb.description, sb.url, sb.helpline, sb.world_id, sb.num_meetings, sb.num_groups,
               rs.url AS root_server_url, rs.name AS root_server_name
        FROM service_bodies sb
        JOIN root_servers rs ON rs.id = sb.root_server_id
        WHERE 1 = 1
        "#,
    );

    if !root_server_ids.is_empty() {
        qb.push(" AND sb.root_server_id = ANY(");
        qb.push_bind(root_server_ids.to_vec());
        qb.push(")");
    }

    if !service_ids.is_empty() {
        qb.push(" AND (sb.id IN (");
        if recursive {
            qb.push("WITH RECURSIVE descendants AS (SELECT id FROM service_bodies WHERE id = ANY(");
            qb.push_bind(service_ids.to_vec());
            qb.push(") UNION ALL SELECT child.id FROM service_bodies child JOIN descendants d ON child.parent_id = d.id) SELECT id FROM descendants");
        } else {
            qb.push("SELECT unnest(");
            qb.push_bind(service_ids.to_vec());
            qb.push("::bigint[])");
        }
        qb.push(")");
        if parents {
            qb.push(" OR sb.id IN (WITH RECURSIVE ancestors AS (SELECT id, parent_id FROM service_bodies WHERE id = ANY(");
            qb.push_bind(service_ids.to_vec());
            qb.push(") UNION ALL SELECT p.id, p.parent_id FROM service_bodies p JOIN ancestors a ON p.id = a.parent_id) SELECT id FROM ancestors)");
        }
        qb.push(")");
    }
    qb.push(" ORDER BY sb.id");

    let rows: Vec<ServiceBodyJoinRow> = qb.build_query_as().fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|row| ServiceBodyRecord {
            service_body: ServiceBody {
                id: row.id,
                source_id: row.source_id,
                root_server_id: row.root_server_id,
                parent_id: row.parent_id,
                name: row.name,
                r#type: row.r#type,
                description: row.description,
                url: row.url,
                helpline: row.helpline,
                world_id: row.world_id,
                num_meetings: row.num_meetings,
                num_groups: row.num_groups,
            },
            root_server: RootServer {
                id: row.root_server_id,
                source_id: 0,
                url: row.root_server_url,
                name: row.root_server_name,
                server_info: None,
                last_successful_import: None,
                num_areas: 0,
                num_regions: 0,
                num_zones: 0,
                num_meetings: 0,
                num_groups: 0,
            },
        })
        .collect())
}

/// `service_body_id` plus every descendant under it, via `parent_id`.
pub async fn descendant_ids(pool: &PgPool, service_body_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        WITH RECURSIVE descendants AS (
            SELECT id FROM service_bodies WHERE id = $1
            UNION ALL
            SELECT child.id FROM service_bodies child JOIN descendants d ON child.parent_id = d.id
        )
        SELECT id FROM descendants
        "#,
    )
    .bind(service_body_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Recomputes `num_meetings`/`num_groups` over every body's descendant
/// subtree: groups are distinct meeting world ids, plus distinct names
/// among meetings with no world id, rolled up to parents.
pub async fn recount(conn: &mut PgConnection, root_server_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        WITH RECURSIVE closure AS (
            SELECT id AS ancestor, id AS descendant FROM service_bodies WHERE root_server_id = $1
            UNION ALL
            SELECT cl.ancestor, sb.id FROM service_bodies sb JOIN closure cl ON sb.parent_id = cl.descendant
        ),
        counts AS (
            SELECT cl.ancestor AS body_id,
                   count(m.id) AS meeting_count,
                   count(DISTINCT mi.world_id) FILTER (WHERE mi.world_id IS NOT NULL AND mi.world_id <> '')
                     + count(DISTINCT m.name) FILTER (WHERE mi.world_id IS NULL OR mi.world_id = '') AS group_count
            FROM closure cl
            LEFT JOIN meetings m ON m.service_body_id = cl.descendant AND m.deleted = FALSE
            LEFT JOIN meeting_info mi ON mi.meeting_id = m.id
            GROUP BY cl.ancestor
        )
        UPDATE service_bodies sb
        SET num_meetings = counts.meeting_count, num_groups = counts.group_count
        FROM counts
        WHERE sb.id = counts.body_id
          AND (sb.num_meetings <> counts.meeting_count OR sb.num_groups <> counts.group_count)
        "#,
    )
    .bind(root_server_id)
    .execute(conn)
    .await?;
    Ok(())
}
