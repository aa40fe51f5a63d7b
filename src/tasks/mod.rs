//! Background Tasks Module
//!
//! Contains background tasks that run periodically during proxy operation.
//!
//! # Tasks
//! - Cache sweep: expires stale cache entries at a fixed interval

mod sweep;

pub use sweep::spawn_sweep_task;
