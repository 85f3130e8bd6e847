//! Activity log: JSONL append-only records written from a dedicated thread.

pub mod activity;
pub mod jsonl;
