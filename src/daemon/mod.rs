//! Daemon subsystem: render loop, display flusher, command executor, signal
//! handling, and the orchestration that ties them together.

pub mod executor;
#[cfg(feature = "daemon")]
pub mod loop_main;
pub mod render;
#[cfg(feature = "daemon")]
pub mod signals;
