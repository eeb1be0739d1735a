//! Ember kernel core
//!
//! A preemptive, priority-based thread scheduler and an asynchronous signal
//! facility that reuses the scheduler's preemption machinery to run handlers
//! in a dedicated per-thread interrupt context. The hardware is abstracted
//! behind [`hal::Hal`], so the whole kernel runs unmodified under host tests.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod hal;
pub mod runtime;
pub mod sched;
pub mod signal;

#[cfg(test)]
mod testutil;

pub use error::{KernelError, KernelResult};
pub use hal::{Hal, HwContext, IrqState};
pub use sched::{Scheduler, ThreadFlags, ThreadId, ThreadState};
pub use signal::{SigValue, SignalHandler};
