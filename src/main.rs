#![allow(unexpected_cfgs)]

mod controllers;
mod db;
mod error;
mod fieldmap;
mod geocoder;
mod global;
mod import;
mod log;
mod models;
mod normalize;
mod query;
mod render;
mod store;
mod swagger;
mod translation;
mod upstream;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::Extension;
use axum::http::Method;
use tower_http::cors::CorsLayer;

use crate::controllers::AppState;
use crate::geocoder::Geocoder;
use crate::global::Config;
use crate::translation::TranslationCache;

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    log::init_panic_handler();
    log::init_logger();

    let config = Config::from_env();
    let pool = db::create_pool(&config.database_url).await;
    db::run_migrations(&pool).await;

    let geocoder =
        Geocoder::new(config.geocoder_base_url.clone(), config.geocoder_api_key.clone(), config.geocoder_timeout);
    let config = Arc::new(config);

    let state = AppState {
        pool: pool.clone(),
        translation: Arc::new(TranslationCache::new()),
        geocoder,
        config: config.clone(),
    };

    spawn_import_loop(pool.clone(), config.clone());

    // The query surface is read-only and anonymous; GET from anywhere is the
    // intended access pattern.
    let cors = CorsLayer::new().allow_origin(tower_http::cors::Any).allow_methods([Method::GET]);

    let app = swagger::merge_swagger(controllers::semantic_routes()).layer(Extension(state)).layer(cors);

    let addr = SocketAddr::from_str(&config.bind_address).expect("invalid BIND_ADDRESS format");
    tracing::info!("SERVER ->> listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Background import cycle on `config.import_interval`, so a fresh
/// deployment starts reconciling root servers without a separately scheduled
/// process. `bin/import_root_servers.rs` runs the same loop standalone for a
/// deployment that wants the importer on its own host/schedule.
fn spawn_import_loop(pool: sqlx::PgPool, config: Arc<Config>) {
    tokio::spawn(async move {
        let client = upstream::Client::new(config.upstream_timeout);
        loop {
            let summary = import::run_cycle(&pool, &client, &config).await;
            tracing::info!(
                "IMPORT ->> cycle complete: {} processed, {} failed",
                summary.roots_processed,
                summary.roots_failed
            );
            tokio::time::sleep(config.import_interval).await;
        }
    });
}
