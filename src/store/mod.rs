/*
 * src/store/mod.rs
 *
 * File for the Store
 *
 * Purpose:
 *   PgPool-backed repository. Writes are idempotent upserts keyed by
 *   (root_server_id, source_id); the "set_if_changed" discipline (see
 *   `patch`) means a cycle that sees unchanged upstream data issues no
 *   writes at all.
 */

pub mod format;
pub mod import_problem;
pub mod meeting;
pub mod patch;
pub mod root_server;
pub mod service_body;

pub use patch::Patch;
