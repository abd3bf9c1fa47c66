// Library root: re-exports all modules so integration tests and the CLI can
// access the crate's public API.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod import;
pub mod model;
pub mod store;
