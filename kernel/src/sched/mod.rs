//! Preemptive priority scheduler
//!
//! A 32-level priority scheduler with O(1) election through a ready bitmap,
//! round-robin rotation inside each level, tick-driven sleeping and quantum
//! accounting, and deferred reclamation of deleted threads.

pub mod bitmap;
pub mod scheduler;
pub mod table;
pub mod thread;

pub use scheduler::Scheduler;
pub use thread::{Thread, ThreadFlags, ThreadId, ThreadState};
