// src/lib.rs

pub mod app_state;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mailer;
pub mod models;
pub mod query;
pub mod routes;
pub mod store;
pub mod tasks;
pub mod users;

pub use app_state::AppState;
pub use routes::configure;
