//! Pure domain logic for the labelhub ingestion and review pipeline.
//!
//! This crate has no internal workspace dependencies and performs no network
//! or database I/O. Everything here is either a pure function or a thin,
//! side-effect-scoped helper (chunk file writes) so it can be unit tested in
//! isolation.

pub mod assignment;
pub mod chunking;
pub mod completion;
pub mod config;
pub mod dataset;
pub mod error;
pub mod hashing;
pub mod object_key;
pub mod pagination;
pub mod retry;
pub mod types;
