//! Hardware abstraction boundary
//!
//! The scheduler drives context switches and interrupt masking through this
//! trait and never interprets the saved contexts itself. A port supplies the
//! real routines; tests inject a recording implementation.

use crate::sched::ThreadId;

/// Saved hardware execution context.
///
/// Opaque to the kernel core: only the HAL writes or reads the token. A
/// thread carries one of these for its normal flow of execution and a second
/// one while an interrupt-context upcall is pending (see the signal
/// subsystem).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct HwContext {
    /// Saved stack pointer / context token, HAL-defined
    pub sp: usize,
}

impl HwContext {
    /// A context that has not been initialized by the HAL yet
    pub const fn zeroed() -> Self {
        Self { sp: 0 }
    }
}

/// Captured interrupt mask state, returned by [`Hal::interrupt_suspend`].
///
/// Opaque; must be handed back verbatim to [`Hal::interrupt_recover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqState(pub u32);

/// Hardware primitives the kernel core consumes.
///
/// Contracts:
/// - `interrupt_suspend`/`interrupt_recover` must nest: recover restores
///   exactly the previously captured mask, not merely "enable".
/// - `context_switch` saves the running context into `from` and resumes
///   `to`. `context_switch_to` discards the "from" side and is used once,
///   at bootstrap.
/// - `init_thread_context` prepares a fresh context so the thread begins
///   execution at its entry point when first switched to.
/// - `init_upcall_context` prepares a context that enters the signal
///   dispatcher for `thread` when switched to; it must leave the thread's
///   normal context untouched.
pub trait Hal: Send {
    fn interrupt_suspend(&mut self) -> IrqState;
    fn interrupt_recover(&mut self, prior: IrqState);

    fn context_switch(&mut self, from: &mut HwContext, to: &HwContext);
    fn context_switch_to(&mut self, to: &HwContext);

    fn init_thread_context(&mut self, ctx: &mut HwContext, thread: ThreadId);
    fn init_upcall_context(&mut self, ctx: &mut HwContext, thread: ThreadId);
}
