//! Scheduler core
//!
//! Owns the ready bitmap, one ready list per priority, the sleep and
//! delete lists, the thread table, the current-thread pointer, the
//! scheduler lock flag and the CPU-usage accounting. Every mutation of
//! this state happens under interrupt masking; the lock flag is a coarser
//! mechanism that only gates the tick handler.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::config::{MAX_PRIORITY, PRIORITY_LEVELS, TICK_PERIOD_MS, USAGE_WINDOW_TICKS};
use crate::error::{KernelError, KernelResult};
use crate::hal::Hal;
use crate::sched::bitmap::ReadyBitmap;
use crate::sched::table::{ListTag, SlotList, ThreadTable};
use crate::sched::thread::{Thread, ThreadFlags, ThreadId, ThreadState};
use crate::signal::EventPool;

/// CPU-usage accounting over a fixed tick window
#[derive(Debug, Clone, Copy)]
struct CpuUsage {
    window_ticks: u32,
    cur_ticks: u32,
    run_count: u32,
    usage: u16,
}

impl CpuUsage {
    const fn new() -> Self {
        Self {
            window_ticks: USAGE_WINDOW_TICKS,
            cur_ticks: 0,
            run_count: 0,
            usage: 0,
        }
    }
}

/// The scheduler context object. Single instance per core, owned by the
/// runtime root; no hidden global state.
pub struct Scheduler {
    pub(crate) bitmap: ReadyBitmap,
    pub(crate) ready: [SlotList; PRIORITY_LEVELS],

    pub(crate) sleep_list: SlotList,
    pub(crate) delete_list: SlotList,

    pub(crate) table: ThreadTable,
    pub(crate) current: Option<usize>,

    pub(crate) locked: bool,
    usage: CpuUsage,

    pub(crate) events: EventPool,
    pub(crate) hal: Box<dyn Hal>,
}

impl Scheduler {
    pub fn new(hal: Box<dyn Hal>) -> Self {
        Self {
            bitmap: ReadyBitmap::new(),
            ready: [SlotList::EMPTY; PRIORITY_LEVELS],
            sleep_list: SlotList::EMPTY,
            delete_list: SlotList::EMPTY,
            table: ThreadTable::new(),
            current: None,
            locked: false,
            usage: CpuUsage::new(),
            events: EventPool::new(),
            hal,
        }
    }

    /// Register a new thread and mark it ready at its fixed priority.
    pub fn insert_thread(
        &mut self,
        name: &str,
        priority: u8,
        flags: ThreadFlags,
    ) -> KernelResult<ThreadId> {
        if priority > MAX_PRIORITY {
            return Err(KernelError::InvalidPriority {
                value: priority,
                max: MAX_PRIORITY,
            });
        }

        let irq = self.hal.interrupt_suspend();
        let (id, slot) = self.table.register(Thread::new(name, priority, flags));
        self.hal
            .init_thread_context(&mut self.table.get_mut(slot).normal_ctx, id);
        self.mark_ready(slot);
        self.hal.interrupt_recover(irq);

        log::debug!("thread {} '{}' inserted at priority {}", id, name, priority);
        Ok(id)
    }

    fn resolve(&self, thread: ThreadId) -> KernelResult<usize> {
        self.table
            .slot_of(thread)
            .ok_or(KernelError::ThreadNotFound { thread_id: thread })
    }

    /// Detach and re-queue at the tail of the thread's ready list.
    pub fn set_ready(&mut self, thread: ThreadId) -> KernelResult<()> {
        let slot = self.resolve(thread)?;
        let irq = self.hal.interrupt_suspend();
        self.mark_ready(slot);
        self.hal.interrupt_recover(irq);
        Ok(())
    }

    /// Like [`set_ready`](Self::set_ready) but leaves the thread in the
    /// interrupt-dispatch state at its existing priority.
    pub fn set_interrupt(&mut self, thread: ThreadId) -> KernelResult<()> {
        let slot = self.resolve(thread)?;
        let irq = self.hal.interrupt_suspend();
        self.mark_interrupt(slot);
        self.hal.interrupt_recover(irq);
        Ok(())
    }

    /// Detach from all scheduling lists until an explicit wake.
    pub fn set_suspend(&mut self, thread: ThreadId) -> KernelResult<()> {
        let slot = self.resolve(thread)?;
        let irq = self.hal.interrupt_suspend();
        self.mark_suspend(slot);
        self.hal.interrupt_recover(irq);
        Ok(())
    }

    /// Move to the sleep list for `ticks` ticks. A zero request behaves as
    /// one tick.
    pub fn set_sleep(&mut self, thread: ThreadId, ticks: u32) -> KernelResult<()> {
        let slot = self.resolve(thread)?;
        let irq = self.hal.interrupt_suspend();
        self.mark_sleep(slot, ticks.max(1));
        self.hal.interrupt_recover(irq);
        Ok(())
    }

    /// Detach and close; the record stays registered until reclaimed.
    pub fn set_close(&mut self, thread: ThreadId) -> KernelResult<()> {
        let slot = self.resolve(thread)?;
        let irq = self.hal.interrupt_suspend();
        self.mark_close(slot);
        self.hal.interrupt_recover(irq);
        Ok(())
    }

    /// Close and queue for deferred destruction on the delete list.
    pub fn reclaim(&mut self, thread: ThreadId) -> KernelResult<()> {
        let slot = self.resolve(thread)?;
        let irq = self.hal.interrupt_suspend();
        self.mark_reclaim(slot);
        self.hal.interrupt_recover(irq);
        Ok(())
    }

    /// Close, unregister and queue the thread for destruction, then
    /// re-dispatch: the victim may have been the current thread.
    ///
    /// Signal events still pending on the victim are purged back to the
    /// event pool so no block leaks.
    pub fn delete_thread(&mut self, thread: ThreadId) -> KernelResult<()> {
        let slot = self.resolve(thread)?;

        let irq = self.hal.interrupt_suspend();
        self.mark_close(slot);
        while let Some(ev) = self.table.get_mut(slot).pending.pop_front() {
            self.events.free(ev);
        }
        self.table.unregister(slot);
        self.mark_reclaim(slot);
        self.hal.interrupt_recover(irq);

        log::debug!("thread {} deleted", thread);
        self.run();
        Ok(())
    }

    /// Drain the delete list, freeing the arena slots and handing the
    /// records back to the memory-owning caller.
    pub fn reap_closed(&mut self) -> Vec<Thread> {
        let irq = self.hal.interrupt_suspend();
        let mut reaped = Vec::new();
        while let Some(slot) = self.delete_list.head() {
            debug_assert_ne!(self.current, Some(slot), "reaping the running thread");
            self.delete_list.remove(&mut self.table, slot);
            reaped.push(self.table.release(slot));
        }
        self.hal.interrupt_recover(irq);
        reaped
    }

    /// Re-queue the current thread at the tail of its own priority list
    /// and re-dispatch: cooperative round robin.
    pub fn yield_current(&mut self) {
        let Some(slot) = self.current else {
            return;
        };
        let irq = self.hal.interrupt_suspend();
        self.mark_ready(slot);
        self.hal.interrupt_recover(irq);
        self.run();
    }

    /// Periodic timer entry point.
    ///
    /// A no-op while the scheduler lock flag is held; interrupt masking is
    /// a separate, stricter mechanism.
    pub fn tick(&mut self) {
        if self.locked {
            return;
        }

        let irq = self.hal.interrupt_suspend();
        self.wake_sleepers();
        self.charge_quantum();
        self.run();
        self.account_usage();
        self.hal.interrupt_recover(irq);
    }

    /// Select the highest-priority ready thread and context-switch to it
    /// if it differs from the current one.
    pub fn run(&mut self) {
        let irq = self.hal.interrupt_suspend();

        if self.bitmap.is_empty() {
            debug_assert!(false, "run() with no ready thread");
            self.hal.interrupt_recover(irq);
            return;
        }
        let prio = self.bitmap.highest_ready();
        let Some(next) = self.ready[prio as usize].head() else {
            debug_assert!(false, "ready bitmap desynchronized at priority {}", prio);
            self.hal.interrupt_recover(irq);
            return;
        };
        let Some(from) = self.current else {
            debug_assert!(false, "run() before start()");
            self.hal.interrupt_recover(irq);
            return;
        };

        if from != next {
            self.current = Some(next);

            // State-dependent dispatch: each side switches on its own
            // active context, interrupt or normal.
            let (from_t, to_t) = self.table.pair_mut(from, next);
            log::trace!("context switch: {} -> {}", from_t.id(), to_t.id());
            let to_ctx = *to_t.active_ctx();
            self.hal.context_switch(from_t.active_ctx_mut(), &to_ctx);
        }

        self.hal.interrupt_recover(irq);
    }

    /// One-time bootstrap: transfer control to the highest-priority ready
    /// thread without saving any "from" context.
    pub fn start(&mut self) -> KernelResult<ThreadId> {
        if self.current.is_some() {
            return Err(KernelError::AlreadyStarted);
        }
        if self.bitmap.is_empty() {
            return Err(KernelError::NoReadyThread);
        }

        let prio = self.bitmap.highest_ready();
        let slot = self
            .ready[prio as usize]
            .head()
            .ok_or(KernelError::NoReadyThread)?;
        self.current = Some(slot);

        let id = self.table.get(slot).id();
        log::info!("scheduler started, thread {} running", id);
        self.hal.context_switch_to(self.table.get(slot).active_ctx());
        Ok(id)
    }

    /// Set the scheduler lock flag, returning the prior state. While the
    /// flag is held the tick handler does not preempt, but the caller
    /// stays interruptible.
    pub fn suspend_scheduling(&mut self) -> bool {
        let irq = self.hal.interrupt_suspend();
        let prior = self.locked;
        self.locked = true;
        self.hal.interrupt_recover(irq);
        prior
    }

    /// Restore the lock flag captured by
    /// [`suspend_scheduling`](Self::suspend_scheduling).
    pub fn resume_scheduling(&mut self, prior: bool) {
        let irq = self.hal.interrupt_suspend();
        self.locked = prior;
        self.hal.interrupt_recover(irq);
    }

    pub fn current_thread(&self) -> Option<ThreadId> {
        self.current.map(|slot| self.table.get(slot).id())
    }

    pub fn thread_state(&self, thread: ThreadId) -> KernelResult<ThreadState> {
        Ok(self.table.get(self.resolve(thread)?).state())
    }

    /// CPU usage over the last complete measurement window, in percent.
    pub fn current_usage(&self) -> u16 {
        self.usage.usage
    }

    pub fn thread_count(&self) -> usize {
        self.table.len()
    }

    /// Log the current thread's name, or its handle for anonymous threads.
    pub fn status_report(&self) {
        let Some(slot) = self.current else {
            log::info!("scheduler not started");
            return;
        };
        let thread = self.table.get(slot);
        if thread.name().is_empty() {
            log::info!("current thread id is {}", thread.id());
        } else {
            log::info!("current thread name is {}", thread.name());
        }
    }

    // ── internal transitions (caller holds the interrupt mask) ──────────

    /// Detach from whichever list the thread sits on, clearing the ready
    /// bit when a vacated priority list becomes empty.
    fn detach(&mut self, slot: usize) {
        match self.table.get(slot).tag {
            ListTag::None => {}
            ListTag::Ready(p) => {
                self.ready[p as usize].remove(&mut self.table, slot);
                if self.ready[p as usize].is_empty() {
                    self.bitmap.clear(p);
                }
            }
            ListTag::Sleep => self.sleep_list.remove(&mut self.table, slot),
            ListTag::Delete => self.delete_list.remove(&mut self.table, slot),
        }
    }

    fn enqueue_ready(&mut self, slot: usize, state: ThreadState) {
        self.detach(slot);
        let prio = self.table.get(slot).priority();
        self.ready[prio as usize].push_back(&mut self.table, slot, ListTag::Ready(prio));
        self.bitmap.set(prio);
        self.table.get_mut(slot).state = state;
    }

    pub(crate) fn mark_ready(&mut self, slot: usize) {
        self.enqueue_ready(slot, ThreadState::Ready);
    }

    pub(crate) fn mark_interrupt(&mut self, slot: usize) {
        self.enqueue_ready(slot, ThreadState::Interrupt);
    }

    fn mark_suspend(&mut self, slot: usize) {
        self.detach(slot);
        self.table.get_mut(slot).state = ThreadState::Suspended;
    }

    fn mark_sleep(&mut self, slot: usize, ticks: u32) {
        self.detach(slot);
        self.sleep_list.push_back(&mut self.table, slot, ListTag::Sleep);
        let thread = self.table.get_mut(slot);
        thread.state = ThreadState::Sleeping;
        thread.sleep_ticks_remaining = ticks;
    }

    fn mark_close(&mut self, slot: usize) {
        self.detach(slot);
        self.table.get_mut(slot).state = ThreadState::Closed;
    }

    fn mark_reclaim(&mut self, slot: usize) {
        if self.table.get(slot).state() != ThreadState::Closed {
            self.mark_close(slot);
        }
        self.delete_list.push_back(&mut self.table, slot, ListTag::Delete);
    }

    // ── tick helpers ────────────────────────────────────────────────────

    /// Count down every sleeper; expired ones go back to their ready list.
    fn wake_sleepers(&mut self) {
        let mut cursor = self.sleep_list.head();
        while let Some(slot) = cursor {
            cursor = self.table.get(slot).link.next;

            let thread = self.table.get_mut(slot);
            thread.sleep_ticks_remaining = thread.sleep_ticks_remaining.saturating_sub(1);
            if thread.sleep_ticks_remaining == 0 {
                self.mark_ready(slot);
            }
        }
    }

    /// Charge one tick against the current thread's quantum; at zero,
    /// grant a fresh slice and rotate it to the tail of its priority list.
    fn charge_quantum(&mut self) {
        let Some(slot) = self.current else {
            return;
        };

        let thread = self.table.get_mut(slot);
        thread.quantum_remaining = thread.quantum_remaining.saturating_sub(1);
        if thread.quantum_remaining > 0 {
            return;
        }
        thread.quantum_remaining = thread.quantum;

        // Rotation must not demote an in-flight interrupt dispatch back to
        // the normal context.
        match thread.state() {
            ThreadState::Interrupt => self.mark_interrupt(slot),
            _ => self.mark_ready(slot),
        }
    }

    fn account_usage(&mut self) {
        let Some(slot) = self.current else {
            return;
        };

        self.usage.cur_ticks += 1;
        if !self.table.get(slot).is_idle() {
            self.usage.run_count += 1000 / TICK_PERIOD_MS;
        }
        if self.usage.cur_ticks >= self.usage.window_ticks {
            self.usage.usage = (self.usage.run_count / self.usage.window_ticks) as u16;
            self.usage.run_count = 0;
            self.usage.cur_ticks = 0;
        }
    }

    /// Invariant: bit `p` is set iff ready list `p` is non-empty.
    #[cfg(test)]
    pub(crate) fn assert_bitmap_sync(&self) {
        for p in 0..PRIORITY_LEVELS {
            assert_eq!(
                self.bitmap.is_set(p as u8),
                !self.ready[p].is_empty(),
                "bitmap desync at priority {}",
                p
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_QUANTUM;
    use crate::testutil::{norm_token, sched_with_idle};
    use proptest::prelude::*;

    #[test]
    fn test_start_picks_highest_priority() {
        let (mut sched, log, _idle) = sched_with_idle();
        let low = sched.insert_thread("low", 9, ThreadFlags::empty()).unwrap();
        let high = sched.insert_thread("high", 2, ThreadFlags::empty()).unwrap();

        assert_eq!(sched.start(), Ok(high));
        assert_eq!(sched.current_thread(), Some(high));
        assert_eq!(log.lock().unwrap().boot, Some(norm_token(high)));
        assert_ne!(sched.current_thread(), Some(low));

        // Second bootstrap is rejected.
        assert_eq!(sched.start(), Err(KernelError::AlreadyStarted));
    }

    #[test]
    fn test_start_requires_a_ready_thread() {
        let (hal, _log) = crate::testutil::TraceHal::new();
        let mut sched = Scheduler::new(Box::new(hal));
        assert_eq!(sched.start(), Err(KernelError::NoReadyThread));
    }

    #[test]
    fn test_invalid_priority_rejected() {
        let (mut sched, _log, _idle) = sched_with_idle();
        let err = sched.insert_thread("bad", MAX_PRIORITY + 1, ThreadFlags::empty());
        assert_eq!(
            err,
            Err(KernelError::InvalidPriority {
                value: MAX_PRIORITY + 1,
                max: MAX_PRIORITY
            })
        );
    }

    #[test]
    fn test_stale_handle_reports_not_found() {
        let (mut sched, _log, _idle) = sched_with_idle();
        let t = sched.insert_thread("t", 3, ThreadFlags::empty()).unwrap();
        sched.start().unwrap();
        sched.delete_thread(t).unwrap();
        assert_eq!(
            sched.set_ready(t),
            Err(KernelError::ThreadNotFound { thread_id: t })
        );
    }

    #[test]
    fn test_priority_scenario_two_two_five() {
        // Three threads at priorities 2, 2 and 5; the priority-5 thread is
        // never selected while any priority-2 thread is ready.
        let (mut sched, _log, _idle) = sched_with_idle();
        let a = sched.insert_thread("a", 2, ThreadFlags::empty()).unwrap();
        let b = sched.insert_thread("b", 2, ThreadFlags::empty()).unwrap();
        let c = sched.insert_thread("c", 5, ThreadFlags::empty()).unwrap();

        assert_eq!(sched.start(), Ok(a));

        // Run a's whole quantum out; the other priority-2 thread takes over.
        for _ in 0..DEFAULT_QUANTUM {
            assert_ne!(sched.current_thread(), Some(c));
            sched.tick();
        }
        assert_eq!(sched.current_thread(), Some(b));

        for _ in 0..DEFAULT_QUANTUM {
            assert_ne!(sched.current_thread(), Some(c));
            sched.tick();
        }
        assert_eq!(sched.current_thread(), Some(a));
    }

    #[test]
    fn test_round_robin_visits_insertion_order() {
        let (mut sched, _log, _idle) = sched_with_idle();
        let ids = [
            sched.insert_thread("t0", 4, ThreadFlags::empty()).unwrap(),
            sched.insert_thread("t1", 4, ThreadFlags::empty()).unwrap(),
            sched.insert_thread("t2", 4, ThreadFlags::empty()).unwrap(),
        ];
        sched.start().unwrap();

        // Two full cycles: quantum expiry walks the threads in insertion
        // order with no skips or repeats.
        let mut visited = alloc::vec::Vec::new();
        for _ in 0..6 {
            visited.push(sched.current_thread().unwrap());
            for _ in 0..DEFAULT_QUANTUM {
                sched.tick();
            }
        }
        assert_eq!(
            visited,
            alloc::vec![ids[0], ids[1], ids[2], ids[0], ids[1], ids[2]]
        );
    }

    #[test]
    fn test_yield_rotates_same_priority() {
        let (mut sched, _log, _idle) = sched_with_idle();
        let a = sched.insert_thread("a", 3, ThreadFlags::empty()).unwrap();
        let b = sched.insert_thread("b", 3, ThreadFlags::empty()).unwrap();
        sched.start().unwrap();

        assert_eq!(sched.current_thread(), Some(a));
        sched.yield_current();
        assert_eq!(sched.current_thread(), Some(b));
        sched.yield_current();
        assert_eq!(sched.current_thread(), Some(a));
    }

    #[test]
    fn test_sleep_wakes_on_exact_tick() {
        let (mut sched, _log, idle) = sched_with_idle();
        let t = sched.insert_thread("t", 3, ThreadFlags::empty()).unwrap();
        sched.start().unwrap();

        // The thread puts itself to sleep; the idle floor takes over.
        sched.set_sleep(t, 4).unwrap();
        sched.run();
        assert_eq!(sched.current_thread(), Some(idle));

        // Not eligible before the 4th subsequent tick.
        for _ in 0..3 {
            sched.tick();
            assert_eq!(sched.current_thread(), Some(idle));
        }
        sched.tick();
        assert_eq!(sched.current_thread(), Some(t));
    }

    #[test]
    fn test_locked_tick_is_noop() {
        let (mut sched, _log, idle) = sched_with_idle();
        let t = sched.insert_thread("t", 3, ThreadFlags::empty()).unwrap();
        sched.start().unwrap();
        sched.set_sleep(t, 1).unwrap();
        sched.run();
        assert_eq!(sched.current_thread(), Some(idle));

        let prior = sched.suspend_scheduling();
        assert!(!prior);

        // While locked the sleeper is not even counted down.
        for _ in 0..5 {
            sched.tick();
        }
        assert_eq!(sched.current_thread(), Some(idle));

        sched.resume_scheduling(prior);
        sched.tick();
        assert_eq!(sched.current_thread(), Some(t));
    }

    #[test]
    fn test_suspend_excludes_thread_until_ready() {
        let (mut sched, _log, idle) = sched_with_idle();
        let t = sched.insert_thread("t", 3, ThreadFlags::empty()).unwrap();
        sched.start().unwrap();

        sched.set_suspend(t).unwrap();
        sched.run();
        assert_eq!(sched.current_thread(), Some(idle));
        for _ in 0..3 {
            sched.tick();
            assert_eq!(sched.current_thread(), Some(idle));
        }

        sched.set_ready(t).unwrap();
        sched.run();
        assert_eq!(sched.current_thread(), Some(t));
    }

    #[test]
    fn test_delete_current_switches_away_and_reaps() {
        let (mut sched, _log, idle) = sched_with_idle();
        let t = sched.insert_thread("victim", 3, ThreadFlags::empty()).unwrap();
        sched.start().unwrap();
        assert_eq!(sched.current_thread(), Some(t));

        sched.delete_thread(t).unwrap();
        assert_eq!(sched.current_thread(), Some(idle));
        assert_eq!(sched.thread_count(), 1);

        let reaped = sched.reap_closed();
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].name(), "victim");
        assert_eq!(reaped[0].state(), ThreadState::Closed);

        // Nothing left to reap.
        assert!(sched.reap_closed().is_empty());
    }

    #[test]
    fn test_close_then_reclaim_defers_destruction() {
        let (mut sched, _log, _idle) = sched_with_idle();
        let t = sched.insert_thread("t", 3, ThreadFlags::empty()).unwrap();
        let u = sched.insert_thread("u", 4, ThreadFlags::empty()).unwrap();
        sched.start().unwrap();
        assert_eq!(sched.current_thread(), Some(t));

        // Closing detaches u but keeps its record registered.
        sched.set_close(u).unwrap();
        assert_eq!(sched.thread_state(u).unwrap(), ThreadState::Closed);
        assert!(sched.reap_closed().is_empty());

        // Reclaim queues it for destruction; reap hands the record back.
        sched.reclaim(u).unwrap();
        let reaped = sched.reap_closed();
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].id(), u);
    }

    #[test]
    fn test_set_interrupt_keeps_priority() {
        let (mut sched, _log, _idle) = sched_with_idle();
        let hot = sched.insert_thread("hot", 2, ThreadFlags::empty()).unwrap();
        let cold = sched.insert_thread("cold", 5, ThreadFlags::empty()).unwrap();
        sched.start().unwrap();
        assert_eq!(sched.current_thread(), Some(hot));

        // Requeueing in the interrupt-dispatch state is not an elevation;
        // the thread waits its ordinary priority turn.
        sched.set_interrupt(cold).unwrap();
        assert_eq!(sched.thread_state(cold).unwrap(), ThreadState::Interrupt);
        sched.run();
        assert_eq!(sched.current_thread(), Some(hot));
    }

    #[test]
    fn test_context_pair_selection_normal_to_normal() {
        let (mut sched, log, _idle) = sched_with_idle();
        let a = sched.insert_thread("a", 3, ThreadFlags::empty()).unwrap();
        let b = sched.insert_thread("b", 3, ThreadFlags::empty()).unwrap();
        sched.start().unwrap();

        sched.yield_current();
        let switches = log.lock().unwrap().switches.clone();
        assert_eq!(switches, alloc::vec![(norm_token(a), norm_token(b))]);
    }

    #[test]
    fn test_usage_window_tracks_active_ticks() {
        let (mut sched, _log, _idle) = sched_with_idle();
        let _t = sched.insert_thread("busy", 3, ThreadFlags::empty()).unwrap();
        sched.start().unwrap();

        // One full window with a non-idle current thread: 100 percent.
        for _ in 0..USAGE_WINDOW_TICKS {
            sched.tick();
        }
        assert_eq!(sched.current_usage(), 100);
    }

    #[test]
    fn test_usage_idle_window_is_zero() {
        let (mut sched, _log, idle) = sched_with_idle();
        sched.start().unwrap();
        assert_eq!(sched.current_thread(), Some(idle));

        for _ in 0..USAGE_WINDOW_TICKS {
            sched.tick();
        }
        assert_eq!(sched.current_usage(), 0);
    }

    #[test]
    fn test_irq_mask_balanced() {
        let (mut sched, log, _idle) = sched_with_idle();
        let t = sched.insert_thread("t", 3, ThreadFlags::empty()).unwrap();
        sched.start().unwrap();

        for _ in 0..17 {
            sched.tick();
        }
        sched.yield_current();
        sched.set_sleep(t, 2).unwrap();
        sched.run();
        sched.tick();
        sched.tick();

        let log = log.lock().unwrap();
        assert_eq!(log.depth, 0, "unbalanced interrupt mask");
        assert!(!log.unbalanced, "recover out of order");
        assert!(log.max_depth >= 2, "tick must nest run() under its own mask");
    }

    proptest! {
        // Random ready/suspend churn never desynchronizes the bitmap from
        // the ready lists.
        #[test]
        fn prop_bitmap_tracks_ready_lists(ops in proptest::collection::vec((0usize..6, prop::bool::ANY), 1..64)) {
            let (mut sched, _log, _idle) = sched_with_idle();
            let mut ids = alloc::vec::Vec::new();
            for (i, prio) in [(0u8, 1u8), (1, 1), (2, 7), (3, 7), (4, 30), (5, 12)] {
                let name = alloc::format!("t{}", i);
                ids.push(sched.insert_thread(&name, prio, ThreadFlags::empty()).unwrap());
            }

            for (idx, make_ready) in ops {
                if make_ready {
                    sched.set_ready(ids[idx]).unwrap();
                } else {
                    sched.set_suspend(ids[idx]).unwrap();
                }
                sched.assert_bitmap_sync();
            }
        }
    }
}
