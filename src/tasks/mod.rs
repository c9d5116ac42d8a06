//! Background Tasks Module
//!
//! - TTL Cleanup: removes expired in-process cache entries at a fixed interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
