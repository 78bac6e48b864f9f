/*
 * src/query/mod.rs
 *
 * File for the Query Engine
 *
 * Purpose:
 *   Parse request parameters into a `FilterPlan`, then build and run the
 *   search against the store (src/store/meeting.rs::search).
 */

pub mod fulltext;
pub mod geospatial;
pub mod params;
pub mod plan;

pub use params::QueryParams;
pub use plan::FilterPlan;
