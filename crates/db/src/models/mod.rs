//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row and a `Deserialize` create DTO for inserts.

pub mod audit;
pub mod bulk_action;
pub mod calibration;
pub mod checkpoint;
pub mod element;
pub mod plan_item;
pub mod project;
pub mod upload_queue;
