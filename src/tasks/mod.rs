//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Housekeeping: sweeps idle rate limit buckets and prunes finished task records

mod housekeeping;

pub use housekeeping::{run_housekeeping, spawn_housekeeping_task, HousekeepingReport};
