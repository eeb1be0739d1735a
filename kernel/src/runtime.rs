//! Kernel runtime access point
//!
//! Owns the one scheduler instance behind a spin lock. Board bring-up hands
//! the HAL to [`init`] once; everything afterwards goes through [`with`].

use alloc::boxed::Box;

use spin::{Mutex, Once};

use crate::error::{KernelError, KernelResult};
use crate::hal::Hal;
use crate::sched::{Scheduler, ThreadId};

/// Top-level kernel state.
pub struct Kernel {
    pub sched: Scheduler,
}

static KERNEL: Once<Mutex<Kernel>> = Once::new();

/// Install the scheduler with the given HAL. Returns `false` if the kernel
/// was already initialized, in which case the HAL is dropped.
pub fn init(hal: Box<dyn Hal>) -> bool {
    let mut fresh = false;
    KERNEL.call_once(|| {
        fresh = true;
        Mutex::new(Kernel {
            sched: Scheduler::new(hal),
        })
    });
    if fresh {
        log::info!("kernel runtime initialized");
    }
    fresh
}

/// Run `f` against the kernel. Returns `None` before [`init`].
pub fn with<R>(f: impl FnOnce(&mut Kernel) -> R) -> Option<R> {
    KERNEL.get().map(|kernel| f(&mut *kernel.lock()))
}

/// Hand the CPU to the highest-priority ready thread. Does not return on
/// real hardware; the result only surfaces setup errors.
pub fn start() -> KernelResult<ThreadId> {
    with(|kernel| kernel.sched.start()).unwrap_or(Err(KernelError::NotStarted))
}
