//! Transactional orchestration over the core domain and the repositories.
//!
//! Every mutating operation here opens its own transaction, takes the row
//! locks it needs, writes its audit entry, and commits. The HTTP API and
//! the upload replay worker both go through these entry points.

pub mod bulk;
pub mod calibration_store;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod upload_replay;
pub mod workflow;

pub use error::EngineError;
