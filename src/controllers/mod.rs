/*
 * src/controllers/mod.rs
 *
 * Purpose:
 *   The query-endpoint surface: one route, dispatching on the
 *   `switcher` parameter. The database pool and process-wide caches travel
 *   via `Extension` rather than typed `State`.
 */

pub mod semantic;

use std::sync::Arc;

use sqlx::PgPool;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::geocoder::Geocoder;
use crate::global::Config;
use crate::translation::TranslationCache;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub translation: Arc<TranslationCache>,
    pub geocoder: Geocoder,
    pub config: Arc<Config>,
}

pub fn semantic_routes() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(semantic::handle))
}
