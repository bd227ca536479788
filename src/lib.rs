pub mod backup;
pub mod club;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod scoring;
pub mod store;

#[cfg(feature = "server")]
pub mod api;
