//! Thread record and state machine
//!
//! One control block per thread: fixed priority, scheduling state, run
//! quantum, sleep countdown, the two saved execution contexts, and the
//! per-thread signal state.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;

use crate::config::DEFAULT_QUANTUM;
use crate::hal::HwContext;
use crate::sched::table::{Link, ListTag};
use crate::signal::{EventId, HandlerEntry};

/// Thread ID type — a stable, monotonically allocated handle. Also the
/// addressing token for signal queueing.
pub type ThreadId = u64;

/// Thread scheduling state.
///
/// RUNNING is implicit: the thread the scheduler's current pointer refers
/// to. A current thread is always also present in its priority's ready
/// list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Eligible to run, queued on its priority's ready list
    Ready,

    /// On the sleep list, waiting out a tick countdown
    Sleeping,

    /// Detached from all scheduling lists, waiting for an explicit wake
    Suspended,

    /// Detached and queued for deferred destruction
    Closed,

    /// Queued ready, but running the signal dispatcher on its alternate
    /// context when next selected
    Interrupt,
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Sleeping => write!(f, "Sleeping"),
            Self::Suspended => write!(f, "Suspended"),
            Self::Closed => write!(f, "Closed"),
            Self::Interrupt => write!(f, "Interrupt"),
        }
    }
}

bitflags! {
    /// Per-thread attribute flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ThreadFlags: u8 {
        /// Idle-floor thread; excluded from CPU-usage accounting
        const IDLE = 1 << 0;
    }
}

/// Alternate execution context, present only while an interrupt-context
/// upcall is pending or in flight on this thread.
#[derive(Debug, Clone, Copy)]
pub struct InterruptContext {
    pub ctx: HwContext,
}

/// Per-thread control block. Owned by the scheduler's thread table once
/// registered; the signal subsystem only references it by handle.
pub struct Thread {
    pub(crate) id: ThreadId,
    pub(crate) name: String,

    /// Fixed at creation; there is no dynamic priority change
    pub(crate) priority: u8,
    pub(crate) state: ThreadState,
    pub(crate) flags: ThreadFlags,

    /// Granted time slice and the remainder of the current one
    pub(crate) quantum: u32,
    pub(crate) quantum_remaining: u32,

    /// Valid only while `state == Sleeping`
    pub(crate) sleep_ticks_remaining: u32,

    /// Saved context of the thread's normal flow of execution
    pub(crate) normal_ctx: HwContext,

    /// Alternate context; `Some` iff an upcall is pending or in flight
    pub(crate) interrupt_ctx: Option<InterruptContext>,

    /// Registered signal handlers, insertion order, duplicates allowed
    pub(crate) handlers: Vec<HandlerEntry>,

    /// Delivered-but-undispatched signal events targeting this thread
    pub(crate) pending: VecDeque<EventId>,

    /// Embedded scheduling-list link and the list it currently sits on
    pub(crate) link: Link,
    pub(crate) tag: ListTag,
}

impl Thread {
    /// Build an unregistered record. The thread table assigns the handle
    /// and the HAL initializes the normal context.
    pub(crate) fn new(name: &str, priority: u8, flags: ThreadFlags) -> Self {
        Self {
            id: 0,
            name: String::from(name),
            priority,
            state: ThreadState::Ready,
            flags,
            quantum: DEFAULT_QUANTUM,
            quantum_remaining: DEFAULT_QUANTUM,
            sleep_ticks_remaining: 0,
            normal_ctx: HwContext::zeroed(),
            interrupt_ctx: None,
            handlers: Vec::new(),
            pending: VecDeque::new(),
            link: Link::detached(),
            tag: ListTag::None,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.flags.contains(ThreadFlags::IDLE)
    }

    /// The context the next switch must use for this thread, per the
    /// state-dependent dispatch rule.
    pub(crate) fn active_ctx(&self) -> &HwContext {
        match (self.state, self.interrupt_ctx.as_ref()) {
            (ThreadState::Interrupt, Some(up)) => &up.ctx,
            _ => &self.normal_ctx,
        }
    }

    pub(crate) fn active_ctx_mut(&mut self) -> &mut HwContext {
        match (self.state, self.interrupt_ctx.as_mut()) {
            (ThreadState::Interrupt, Some(up)) => &mut up.ctx,
            _ => &mut self.normal_ctx,
        }
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .finish()
    }
}
