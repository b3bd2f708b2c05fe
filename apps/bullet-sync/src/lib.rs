pub mod auth;
pub mod config;
pub mod errors;
pub mod evaluation;
pub mod models;
pub mod store;
pub mod sync;
