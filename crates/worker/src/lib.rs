//! Background replay of the offline upload queue.
//!
//! The worker claims due queue items and replays them through the engine,
//! the same entry points the HTTP API uses for online writes.

pub mod config;
pub mod replay_loop;
