//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is alive.
//!
//! # Tasks
//! - TTL Sweep: removes expired cache entries at configured intervals

mod sweep;

pub use sweep::spawn_sweep_task;
