use sqlx::postgres::{PgPoolOptions, PgPool};

/// Creates the shared connection pool. A single pool is handed to the axum
/// router (request path) and to the import orchestrator (bin/import_root_servers.rs);
/// a connection poisoned by a failed import transaction is health-checked
/// and recycled by sqlx before its next checkout.
pub async fn create_pool(database_url: &str) -> PgPool {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .expect("failed to connect to database")
}

pub async fn run_migrations(pool: &PgPool) {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .expect("failed to run migrations");
}
