/*
 * src/models/mod.rs
 *
 * Canonical domain types for the catalog.
 * These are the in-memory shapes the store reads/writes; they are distinct
 * from the raw upstream JSON (normalized by src/normalize) and from the
 * per-request projection records built for rendering (src/fieldmap::records).
 */

pub mod format;
pub mod import_problem;
pub mod meeting;
pub mod root_server;
pub mod service_body;

pub use format::{Format, TranslatedFormat};
pub use import_problem::ImportProblem;
pub use meeting::{Meeting, MeetingInfo};
pub use root_server::RootServer;
pub use service_body::ServiceBody;
