pub mod api;
pub mod auth;
pub mod case;
pub mod config;
pub mod db;
pub mod delfos;
pub mod error;
pub mod models;
pub mod service;

#[cfg(test)]
mod testutils;

pub use api::{build_router, AppState};
pub use config::AppConfig;
pub use db::create_pool;
