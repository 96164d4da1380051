//! Domain core for site inspection tracking.
//!
//! Pure logic with no I/O: coordinate calibration math, the inspection
//! workflow state machine, audit action vocabulary, history replay, GUID
//! remap planning, bulk result accounting, and offline upload retry policy.
//! The `db`, `engine`, `api`, and `worker` crates build on these types.

pub mod audit;
pub mod bulk;
pub mod calibration;
pub mod element;
pub mod error;
pub mod geo;
pub mod history;
pub mod transform;
pub mod types;
pub mod upload_queue;
pub mod workflow;
