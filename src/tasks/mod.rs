//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - GC: reclaims stale entries of the active backend at configured intervals

mod gc;

pub use gc::spawn_gc_task;
