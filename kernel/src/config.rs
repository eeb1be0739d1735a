//! Kernel configuration constants
//!
//! Central place for the compile-time tunables of the scheduler and the
//! signal subsystem.

/// Highest priority number. Priority 0 is the most urgent level; this value
/// is the always-ready idle floor.
pub const MAX_PRIORITY: u8 = 31;

/// Number of priority levels (one ready list per level, one bit per level
/// in the ready bitmap).
pub const PRIORITY_LEVELS: usize = MAX_PRIORITY as usize + 1;

/// Round-robin time slice, in ticks. A fresh quantum is granted every time
/// a thread is re-queued at the tail of its priority list.
pub const DEFAULT_QUANTUM: u32 = 5;

/// Period of the scheduling timer, in milliseconds. Only used to scale the
/// CPU-usage accumulator; the core never reads a wall clock.
pub const TICK_PERIOD_MS: u32 = 10;

/// CPU-usage measurement window, in ticks. The usage ratio is recomputed
/// once per window.
pub const USAGE_WINDOW_TICKS: u32 = 100;

/// Capacity of the global signal event pool. Allocation fails closed once
/// all blocks are in use; the pool never grows.
pub const SIGEVENT_POOL_CAPACITY: usize = 32;
