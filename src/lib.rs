pub mod auth;
pub mod configuration;
pub mod cookies;
pub mod error;
pub mod logger;
pub mod media;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod session;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod validators;
