//! Asynchronous signal delivery
//!
//! Signals ride on the scheduler's preemption machinery: queueing a signal
//! appends an event block from a bounded global pool to the target thread's
//! pending list and requests an interrupt-context upcall. The dispatcher
//! then runs *as* the target thread, at the target's own priority, so
//! handler invocation never borrows the caller's execution context.

use alloc::boxed::Box;

use crate::config::SIGEVENT_POOL_CAPACITY;
use crate::error::{KernelError, KernelResult};
use crate::hal::HwContext;
use crate::sched::thread::InterruptContext;
use crate::sched::{Scheduler, ThreadId, ThreadState};

/// Opaque value attached to a queued signal, handed to every matching
/// handler at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigValue(pub usize);

/// A registered signal handler, invoked on the owning thread's interrupt
/// context.
pub trait SignalHandler: Send {
    fn handle(&self, value: SigValue);
}

impl<F> SignalHandler for F
where
    F: Fn(SigValue) + Send,
{
    fn handle(&self, value: SigValue) {
        self(value)
    }
}

/// One registered (signal number, handler) pair. Insertion order is kept
/// and duplicates by signal number are allowed; every match fires.
pub struct HandlerEntry {
    pub(crate) signo: i32,
    pub(crate) handler: Box<dyn SignalHandler>,
}

/// Handle of an allocated block in the event pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventId(pub(crate) usize);

#[derive(Debug, Clone, Copy)]
struct EventSlot {
    signo: i32,
    value: SigValue,
    in_use: bool,
}

impl EventSlot {
    const FREE: EventSlot = EventSlot {
        signo: 0,
        value: SigValue(0),
        in_use: false,
    };
}

/// Bounded global pool of signal event blocks. Fixed capacity; allocation
/// fails closed instead of growing.
pub struct EventPool {
    slots: [EventSlot; SIGEVENT_POOL_CAPACITY],
}

impl EventPool {
    pub(crate) fn new() -> Self {
        Self {
            slots: [EventSlot::FREE; SIGEVENT_POOL_CAPACITY],
        }
    }

    fn alloc(&mut self, signo: i32, value: SigValue) -> Option<EventId> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if !slot.in_use {
                *slot = EventSlot {
                    signo,
                    value,
                    in_use: true,
                };
                return Some(EventId(i));
            }
        }
        None
    }

    pub(crate) fn free(&mut self, id: EventId) {
        debug_assert!(self.slots[id.0].in_use, "double free of event block");
        self.slots[id.0].in_use = false;
    }

    fn get(&self, id: EventId) -> (i32, SigValue) {
        let slot = &self.slots[id.0];
        debug_assert!(slot.in_use);
        (slot.signo, slot.value)
    }

    pub(crate) fn free_blocks(&self) -> usize {
        self.slots.iter().filter(|s| !s.in_use).count()
    }
}

impl Scheduler {
    /// Register a handler for `signo` on the *calling* (current) thread.
    ///
    /// One-shot registration: nothing is replaced and no previous handler
    /// is looked up; duplicates simply stack in insertion order.
    pub fn register_handler(
        &mut self,
        signo: i32,
        handler: Box<dyn SignalHandler>,
    ) -> KernelResult<()> {
        let slot = self.current.ok_or(KernelError::NotStarted)?;

        let irq = self.hal.interrupt_suspend();
        self.table
            .get_mut(slot)
            .handlers
            .push(HandlerEntry { signo, handler });
        self.hal.interrupt_recover(irq);
        Ok(())
    }

    /// Queue an asynchronous signal for `target`, carrying `value`.
    ///
    /// Allocates a block from the global pool (failing closed on
    /// exhaustion), appends it to the target's pending list and requests an
    /// interrupt-context upcall. Delivery piggybacks on ordinary priority
    /// scheduling: the dispatcher runs when the target is next selected.
    pub fn queue_signal(
        &mut self,
        target: ThreadId,
        signo: i32,
        value: SigValue,
    ) -> KernelResult<()> {
        let slot = self
            .table
            .slot_of(target)
            .ok_or(KernelError::ThreadNotFound { thread_id: target })?;

        let Some(event) = self.events.alloc(signo, value) else {
            log::warn!("signal {} to thread {} dropped: event pool exhausted", signo, target);
            return Err(KernelError::SignalPoolExhausted {
                capacity: SIGEVENT_POOL_CAPACITY,
            });
        };

        let irq = self.hal.interrupt_suspend();
        self.table.get_mut(slot).pending.push_back(event);
        self.report_signal(slot);
        self.hal.interrupt_recover(irq);

        log::trace!("signal {} queued for thread {}", signo, target);
        Ok(())
    }

    /// Request that the target run the signal dispatcher on its interrupt
    /// context.
    ///
    /// Dropped if the thread is already mid-dispatch: a thread has at most
    /// one upcall cycle in flight, and the pending list carries any events
    /// queued meanwhile. Returns whether the upcall was scheduled.
    pub(crate) fn report_signal(&mut self, slot: usize) -> bool {
        if self.table.get(slot).state() == ThreadState::Interrupt {
            return false;
        }

        let irq = self.hal.interrupt_suspend();
        let id = self.table.get(slot).id();
        let mut ctx = HwContext::zeroed();
        self.hal.init_upcall_context(&mut ctx, id);
        self.table.get_mut(slot).interrupt_ctx = Some(InterruptContext { ctx });
        self.mark_interrupt(slot);
        self.run();
        self.hal.interrupt_recover(irq);
        true
    }

    /// Dispatcher entry point, run as `thread` on its interrupt context.
    ///
    /// Drains the pending list in FIFO order, invoking every registered
    /// handler whose signal number matches and returning each block to the
    /// pool. When the list is empty the interrupt context retires and the
    /// thread falls back to READY. Returns the number of handler
    /// invocations.
    pub fn dispatch_pending(&mut self, thread: ThreadId) -> KernelResult<usize> {
        let slot = self
            .table
            .slot_of(thread)
            .ok_or(KernelError::ThreadNotFound { thread_id: thread })?;

        let mut handled = 0;
        loop {
            let Some(event) = self.table.get_mut(slot).pending.pop_front() else {
                break;
            };
            let (signo, value) = self.events.get(event);

            let target = self.table.get(slot);
            for entry in target.handlers.iter() {
                if entry.signo == signo {
                    entry.handler.handle(value);
                    handled += 1;
                }
            }
            self.events.free(event);
        }

        // Pending list drained: retire the interrupt context and resume
        // ordinary scheduling of the thread.
        if self.table.get(slot).state() == ThreadState::Interrupt {
            let irq = self.hal.interrupt_suspend();
            self.table.get_mut(slot).interrupt_ctx = None;
            self.mark_ready(slot);
            self.run();
            self.hal.interrupt_recover(irq);
        }

        log::trace!("thread {} drained its signal queue ({} invocations)", thread, handled);
        Ok(handled)
    }

    /// Undispatched events currently pending on `thread`
    pub fn pending_events(&self, thread: ThreadId) -> KernelResult<usize> {
        let slot = self
            .table
            .slot_of(thread)
            .ok_or(KernelError::ThreadNotFound { thread_id: thread })?;
        Ok(self.table.get(slot).pending.len())
    }

    /// Free blocks left in the global signal event pool
    pub fn free_event_blocks(&self) -> usize {
        self.events.free_blocks()
    }
}
