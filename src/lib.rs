#![allow(unexpected_cfgs)]

// Public modules that tests can access
pub mod controllers;
pub mod db;
pub mod error;
pub mod fieldmap;
pub mod geocoder;
pub mod import;
pub mod models;
pub mod normalize;
pub mod query;
pub mod render;
pub mod store;
pub mod swagger;
pub mod translation;
pub mod upstream;

// Public but internal modules (needed for tests and main)
pub mod global;
pub mod log;

// Re-export commonly used items
pub use error::ApiResult;
