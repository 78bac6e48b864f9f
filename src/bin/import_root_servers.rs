/*
 * src/bin/import_root_servers.rs
 *
 * File for the Import Orchestrator CLI
 *
 * Purpose:
 *   Standalone run-forever process: connect, loop
 *   discover/reconcile/import, sleep, repeat. Useful when the importer is
 *   deployed separately from the query server (its own host, its own
 *   restart schedule) rather than as the server's background task.
 */

use tomato::db;
use tomato::global::Config;
use tomato::import;
use tomato::log;
use tomato::upstream::Client;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    log::init_panic_handler();
    log::init_logger();

    let config = Config::from_env();
    let pool = db::create_pool(&config.database_url).await;
    db::run_migrations(&pool).await;
    let client = Client::new(config.upstream_timeout);

    tracing::info!("IMPORT ->> starting run-forever loop, interval {:?}", config.import_interval);
    loop {
        let summary = import::run_cycle(&pool, &client, &config).await;
        tracing::info!(
            "IMPORT ->> cycle complete: {} processed, {} failed",
            summary.roots_processed,
            summary.roots_failed
        );
        tokio::time::sleep(config.import_interval).await;
    }
}
