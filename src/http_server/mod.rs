//! # pmcore HTTP Server Module
//!
//! Exposes the control surface over HTTP with Axum.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/metrics` - Coordinator counters
//! - `/power`, `/power/:name` - Attribute listing, reads and writes
//! - `/debug/suspend_stats` - Failure statistics (text and `.json`)

pub mod config;
pub mod observability_routes;
pub mod power_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use server::HttpServer;
