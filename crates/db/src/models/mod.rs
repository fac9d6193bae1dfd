//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - Where partial updates exist, an update DTO with all `Option` fields

pub mod annotator;
pub mod dataset;
pub mod record;
pub mod status;
pub mod upload_job;
