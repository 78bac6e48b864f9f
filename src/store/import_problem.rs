/*
 * src/store/import_problem.rs
 *
 * File for the Import Problem Store
 *
 * Purpose:
 *   Persist a rejected upstream record.
 *   `message` is truncated to fit the VARCHAR(255) column rather than
 *   failing the whole import cycle over a log row. A root's problems are
 *   cleared at the start of each pass so the table always reflects the
 *   latest fetch.
 */

use sqlx::{PgConnection, PgPool};

use crate::models::ImportProblem;
use crate::normalize::ImportFailure;

const MESSAGE_MAX_LEN: usize = 255;

pub async fn record(
    conn: &mut PgConnection,
    root_server_id: i64,
    failure: &ImportFailure,
) -> Result<ImportProblem, sqlx::Error> {
    let message: String = failure.message.chars().take(MESSAGE_MAX_LEN).collect();
    sqlx::query_as::<_, ImportProblem>(
        r#"
        INSERT INTO import_problems (root_server_id, message, data)
        VALUES ($1, $2, $3)
        RETURNING id, root_server_id, message, timestamp, data
        "#,
    )
    .bind(root_server_id)
    .bind(message)
    .bind(&failure.raw)
    .fetch_one(conn)
    .await
}

pub async fn clear_for_root(conn: &mut PgConnection, root_server_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM import_problems WHERE root_server_id = $1")
        .bind(root_server_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn list_for_root(pool: &PgPool, root_server_id: i64, limit: i64) -> Result<Vec<ImportProblem>, sqlx::Error> {
    sqlx::query_as::<_, ImportProblem>(
        "SELECT id, root_server_id, message, timestamp, data FROM import_problems \
         WHERE root_server_id = $1 ORDER BY timestamp DESC LIMIT $2",
    )
    .bind(root_server_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
