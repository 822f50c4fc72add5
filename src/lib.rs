pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod rate_limit;
pub mod validation;

pub use db::create_pool;
pub use errors::{AppError, AppResult};
