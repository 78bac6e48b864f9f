/*
 * src/store/format.rs
 *
 * File for the Format Store
 *
 * Purpose:
 *   Upsert formats and their per-language translations. Import-path functions run on the per-root
 *   transaction connection; `list_joined` backs `GetFormats`.
 */

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::fieldmap::records::FormatRecord;
use crate::models::Format;
use crate::normalize::format::CanonicalFormat;
use crate::store::Patch;

/// Upserts the format and its translation rows with the same
/// diff-before-write discipline the other stores use; an unchanged
/// translation issues no UPDATE.
pub async fn upsert(
    conn: &mut PgConnection,
    root_server_id: i64,
    fmt: &CanonicalFormat,
) -> Result<Format, sqlx::Error> {
    let existing = sqlx::query_as::<_, Format>(
        "SELECT id, source_id, root_server_id, type, world_id FROM formats WHERE root_server_id = $1 AND source_id = $2",
    )
    .bind(root_server_id)
    .bind(fmt.source_id)
    .fetch_optional(&mut *conn)
    .await?;

    let row = match existing {
        None => {
            sqlx::query_as::<_, Format>(
                r#"
                INSERT INTO formats (source_id, root_server_id, type, world_id)
                VALUES ($1, $2, $3, $4)
                RETURNING id, source_id, root_server_id, type, world_id
                "#,
            )
            .bind(fmt.source_id)
            .bind(root_server_id)
            .bind(&fmt.r#type)
            .bind(&fmt.world_id)
            .fetch_one(&mut *conn)
            .await?
        }
        Some(current) => {
            let mut patch = Patch::new();
            let next = Format {
                r#type: patch.set_if_changed(&current.r#type, fmt.r#type.clone()),
                world_id: patch.set_if_changed(&current.world_id, fmt.world_id.clone()),
                ..current.clone()
            };
            if patch.dirty() {
                sqlx::query("UPDATE formats SET type = $2, world_id = $3 WHERE id = $1")
                    .bind(next.id)
                    .bind(&next.r#type)
                    .bind(&next.world_id)
                    .execute(&mut *conn)
                    .await?;
            }
            next
        }
    };

    for translation in &fmt.translations {
        sqlx::query(
            r#"
            INSERT INTO translated_formats (format_id, language, key_string, name, description)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (format_id, language) DO UPDATE SET
                key_string = EXCLUDED.key_string, name = EXCLUDED.name, description = EXCLUDED.description
            WHERE (translated_formats.key_string, translated_formats.name, translated_formats.description)
                  IS DISTINCT FROM (EXCLUDED.key_string, EXCLUDED.name, EXCLUDED.description)
            "#,
        )
        .bind(row.id)
        .bind(&translation.language)
        .bind(&translation.key_string)
        .bind(&translation.name)
        .bind(&translation.description)
        .execute(&mut *conn)
        .await?;
    }

    Ok(row)
}

/// `key_string -> format_id` for one language, used to resolve a meeting's
/// comma-separated `formats` field against the formats upserted for the
/// same root server.
pub async fn key_string_map(
    conn: &mut PgConnection,
    root_server_id: i64,
    language: &str,
) -> Result<HashMap<String, i64>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT tf.key_string, f.id
        FROM translated_formats tf
        JOIN formats f ON f.id = tf.format_id
        WHERE f.root_server_id = $1 AND tf.language = $2
        "#,
    )
    .bind(root_server_id)
    .bind(language)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().collect())
}

/// `world_id -> format_id` for one root, used by the NAWS merge to resolve
/// a dump row's format flags.
pub async fn world_id_map(
    conn: &mut PgConnection,
    root_server_id: i64,
) -> Result<HashMap<String, i64>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT world_id, id FROM formats WHERE root_server_id = $1 AND world_id IS NOT NULL AND world_id <> ''",
    )
    .bind(root_server_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().collect())
}

pub async fn source_id_map(
    conn: &mut PgConnection,
    root_server_id: i64,
) -> Result<HashMap<i64, i64>, sqlx::Error> {
    let rows: Vec<(i64, i64)> = sqlx::query_as("SELECT source_id, id FROM formats WHERE root_server_id = $1")
        .bind(root_server_id)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().collect())
}

pub async fn delete_missing(
    conn: &mut PgConnection,
    root_server_id: i64,
    current_source_ids: &[i64],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM formats WHERE root_server_id = $1 AND NOT (source_id = ANY($2))")
        .bind(root_server_id)
        .bind(current_source_ids)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// `GetServerInfo` — every language this deployment has a translation
/// for, used to populate the `langs` descriptor.
pub async fn distinct_languages(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT DISTINCT language FROM translated_formats ORDER BY language").fetch_all(pool).await
}

#[derive(Debug, sqlx::FromRow)]
struct FormatJoinRow {
    id: i64,
    root_server_id: i64,
    root_server_url: String,
    r#type: Option<String>,
    world_id: Option<String>,
    language: String,
    key_string: String,
    name: String,
    description: Option<String>,
}

impl FormatJoinRow {
    fn into_record(self) -> FormatRecord {
        FormatRecord {
            id: self.id,
            root_server_id: self.root_server_id,
            root_server_url: self.root_server_url,
            r#type: self.r#type,
            world_id: self.world_id,
            language: self.language,
            key_string: self.key_string,
            name: self.name,
            description: self.description,
        }
    }
}

/// `GetFormats` — filterable by root server(s), key string(s), and
/// language. Defaults to English when no `lang_enum` is given.
pub async fn list_joined(
    pool: &PgPool,
    root_server_ids: &[i64],
    language: &str,
    key_strings: &[String],
) -> Result<Vec<FormatRecord>, sqlx::Error> {
    let mut qb = joined_query(language);
    if !root_server_ids.is_empty() {
        qb.push(" AND f.root_server_id = ANY(");
        qb.push_bind(root_server_ids.to_vec());
        qb.push(")");
    }
    if !key_strings.is_empty() {
        qb.push(" AND tf.key_string = ANY(");
        qb.push_bind(key_strings.to_vec());
        qb.push(")");
    }
    qb.push(" ORDER BY f.id");

    let rows: Vec<FormatJoinRow> = qb.build_query_as().fetch_all(pool).await?;
    Ok(rows.into_iter().map(FormatJoinRow::into_record).collect())
}

/// The formats referenced by a known id set, in one language — backs
/// `GetSearchResults&get_used_formats=1`.
pub async fn list_by_ids(
    pool: &PgPool,
    format_ids: &[i64],
    language: &str,
) -> Result<Vec<FormatRecord>, sqlx::Error> {
    let mut qb = joined_query(language);
    qb.push(" AND f.id = ANY(");
    qb.push_bind(format_ids.to_vec());
    qb.push(") ORDER BY f.id");

    let rows: Vec<FormatJoinRow> = qb.build_query_as().fetch_all(pool).await?;
    Ok(rows.into_iter().map(FormatJoinRow::into_record).collect())
}

fn joined_query(language: &str) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        r#"
        SELECT f.id, f.root_server_id, rs.url AS root_server_url, f.type, f.world_id,
               tf.language, tf.key_string, tf.name, tf.description
        FROM formats f
        JOIN root_servers rs ON rs.id = f.root_server_id
        JOIN translated_formats tf ON tf.format_id = f.id
        WHERE tf.language =
        "#,
    );
    qb.push_bind(language.to_string());
    qb
}
