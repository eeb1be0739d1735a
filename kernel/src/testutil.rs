//! Shared test fixtures
//!
//! A recording HAL so scheduler tests can observe interrupt-mask nesting
//! and every context-switch pair without hardware, plus small builders.

use alloc::boxed::Box;
use alloc::vec::Vec;
use std::sync::{Arc, Mutex};

use crate::config::MAX_PRIORITY;
use crate::hal::{Hal, HwContext, IrqState};
use crate::sched::{Scheduler, ThreadFlags, ThreadId};
use crate::signal::{SigValue, SignalHandler};

/// Everything the trace HAL observed
#[derive(Debug, Default)]
pub(crate) struct TraceLog {
    /// Current interrupt-mask nesting depth
    pub depth: u32,
    /// Deepest nesting seen
    pub max_depth: u32,
    /// A recover did not match the innermost suspend
    pub unbalanced: bool,
    /// Context-switch pairs as (from token, to token)
    pub switches: Vec<(usize, usize)>,
    /// Bootstrap target token, if `context_switch_to` ran
    pub boot: Option<usize>,
}

/// Recording HAL. Context tokens encode the thread handle and which of the
/// two per-thread contexts was involved: `2 * id` for the normal context,
/// `2 * id + 1` for the interrupt context.
pub(crate) struct TraceHal {
    log: Arc<Mutex<TraceLog>>,
}

impl TraceHal {
    pub fn new() -> (Self, Arc<Mutex<TraceLog>>) {
        let log = Arc::new(Mutex::new(TraceLog::default()));
        (Self { log: log.clone() }, log)
    }
}

impl Hal for TraceHal {
    fn interrupt_suspend(&mut self) -> IrqState {
        let mut log = self.log.lock().unwrap();
        let prior = log.depth;
        log.depth += 1;
        log.max_depth = log.max_depth.max(log.depth);
        IrqState(prior)
    }

    fn interrupt_recover(&mut self, prior: IrqState) {
        let mut log = self.log.lock().unwrap();
        log.depth -= 1;
        if prior.0 != log.depth {
            log.unbalanced = true;
        }
    }

    fn context_switch(&mut self, from: &mut HwContext, to: &HwContext) {
        self.log.lock().unwrap().switches.push((from.sp, to.sp));
    }

    fn context_switch_to(&mut self, to: &HwContext) {
        self.log.lock().unwrap().boot = Some(to.sp);
    }

    fn init_thread_context(&mut self, ctx: &mut HwContext, thread: ThreadId) {
        ctx.sp = norm_token(thread);
    }

    fn init_upcall_context(&mut self, ctx: &mut HwContext, thread: ThreadId) {
        ctx.sp = int_token(thread);
    }
}

/// Token of a thread's normal context in the trace log
pub(crate) fn norm_token(thread: ThreadId) -> usize {
    thread as usize * 2
}

/// Token of a thread's interrupt context in the trace log
pub(crate) fn int_token(thread: ThreadId) -> usize {
    thread as usize * 2 + 1
}

/// Scheduler with a trace HAL and the mandatory idle floor installed.
pub(crate) fn sched_with_idle() -> (Scheduler, Arc<Mutex<TraceLog>>, ThreadId) {
    let (hal, log) = TraceHal::new();
    let mut sched = Scheduler::new(Box::new(hal));
    let idle = sched
        .insert_thread("idle", MAX_PRIORITY, ThreadFlags::IDLE)
        .expect("idle thread");
    (sched, log, idle)
}

/// Signal handler that records every value it is invoked with.
pub(crate) fn recorder() -> (Box<dyn SignalHandler>, Arc<Mutex<Vec<SigValue>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let handler = move |value: SigValue| sink.lock().unwrap().push(value);
    (Box::new(handler), calls)
}
