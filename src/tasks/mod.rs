//! Background Tasks Module
//!
//! Periodic expiry sweep for the in-memory cache backend. The Redis backend
//! expires keys natively and needs no task.

mod cleanup;

pub use cleanup::{spawn_cleanup_task, spawn_memory_backend};
