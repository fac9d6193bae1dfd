//! HTTP surface of the labelhub ingestion and review pipeline.
//!
//! The binary in `main.rs` and the integration tests both build the app
//! through [`router::build_app_router`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod query;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
