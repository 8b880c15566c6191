//! Storage subsystem
//!
//! The only persistence this tool has is an append-only event log.
//!
//! Components:
//! - `storage_trait`: the `EventSink` trait and the event categories.
//! - `event_log`: file-backed sink that flushes every line.

pub mod event_log;
pub mod storage_trait;

#[cfg(test)]
pub(crate) mod memory_log;
