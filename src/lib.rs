//! # scandata backend library
//!
//! REST backend that records QR-code scans against a catalog of inspection
//! units, with role-gated access and reporting.
//!
//! ## Core Components
//!
//! - [`auth`]: password hashing, session tokens, login
//! - [`config`]: layered configuration (embedded defaults, files, environment)
//! - [`db`]: schema initialization
//! - [`error`]: the `AppError` type and its JSON rendering
//! - [`export`]: xlsx rendering of scan records
//! - [`middleware`]: client ip, security log, rate limiting, access control
//! - [`recorder`]: scan submission and history
//! - [`reports`]: summary, daily and per-user aggregates
//! - [`routes`]: HTTP handlers and the router
//! - [`state`]: shared application state
//! - [`store`]: storage trait and its SQLite implementation
//! - [`types`]: domain types and request/response DTOs

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod middleware;
pub mod recorder;
pub mod reports;
pub mod routes;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
