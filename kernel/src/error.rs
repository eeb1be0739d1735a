//! Kernel error handling
//!
//! Typed errors for every fallible kernel operation. Contract violations in
//! trusted kernel-adjacent code are debug assertions, not error values; the
//! variants below cover conditions a caller can legitimately trigger.

use core::fmt;

use crate::sched::ThreadId;

/// Kernel error types with context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Signal event pool is exhausted; the queue request allocated nothing
    SignalPoolExhausted { capacity: usize },

    /// Thread handle does not resolve to a registered thread
    ThreadNotFound { thread_id: ThreadId },

    /// Priority outside `[0, MAX_PRIORITY]`
    InvalidPriority { value: u8, max: u8 },

    /// `start()` called a second time
    AlreadyStarted,

    /// Operation needs a current thread but the scheduler has not started
    NotStarted,

    /// No thread is ready; the idle floor is missing
    NoReadyThread,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignalPoolExhausted { capacity } => {
                write!(f, "signal event pool exhausted ({} blocks)", capacity)
            }
            Self::ThreadNotFound { thread_id } => {
                write!(f, "thread {} not found", thread_id)
            }
            Self::InvalidPriority { value, max } => {
                write!(f, "priority {} out of range (max {})", value, max)
            }
            Self::AlreadyStarted => write!(f, "scheduler already started"),
            Self::NotStarted => write!(f, "scheduler not started"),
            Self::NoReadyThread => write!(f, "no ready thread to schedule"),
        }
    }
}

impl KernelError {
    /// Is this a runtime condition the caller can back off from?
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::SignalPoolExhausted { .. } => true,
            Self::ThreadNotFound { .. } => true,
            _ => false,
        }
    }
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;
