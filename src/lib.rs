pub mod accounts;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod rate_limit;
pub mod state;
pub mod users;
pub mod validation;
