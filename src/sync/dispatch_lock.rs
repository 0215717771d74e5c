/*
 * Dispatch Lock
 *
 * The only way into SchedulerCore. `lock()` masks interrupts on the calling
 * processor, then takes the spinlock; the returned guard dereferences to the
 * core and undoes both, in reverse order, when dropped.
 *
 * Without the "smp" feature there is only one processor, so with
 * interrupts masked nobody else can hold the lock. Finding it taken means
 * the scheduler was re-entered from inside itself, which is fatal.
 */

use core::ops::{Deref, DerefMut};

use spin::{Mutex, MutexGuard};

use super::{InterruptControl, IrqGuard};
use crate::scheduler::{SchedConfig, SchedError, Scheduler, SchedulerCore};

pub struct DispatchLock<P: Scheduler, I: InterruptControl> {
    core: Mutex<SchedulerCore<P>>,
    irq: I,
}

impl<P: Scheduler, I: InterruptControl> DispatchLock<P, I> {
    /// Build the scheduler core behind its lock
    ///
    /// # Arguments
    /// - `policy`: The scheduling policy
    /// - `config`: Validated before use
    /// - `cpu_count`: Processors in the scheduling pool
    /// - `irq`: Interrupt flag control for the processors using this lock
    pub fn new(
        policy: P,
        config: SchedConfig,
        cpu_count: usize,
        irq: I,
    ) -> Result<Self, SchedError> {
        let core = SchedulerCore::new(policy, config, cpu_count)?;
        Ok(Self {
            core: Mutex::new(core),
            irq,
        })
    }

    /// Acquire the dispatch lock
    pub fn lock(&self) -> DispatchGuard<'_, P, I> {
        let irq = IrqGuard::new(&self.irq);

        #[cfg(feature = "smp")]
        let core = self.core.lock();

        #[cfg(not(feature = "smp"))]
        let core = match self.core.try_lock() {
            Some(core) => core,
            None => {
                log::error!("dispatch lock re-entered with interrupts masked");
                panic!("dispatch lock re-entered on a uniprocessor build");
            }
        };

        DispatchGuard { core, _irq: irq }
    }

    /// Run `f` with the dispatch lock held
    pub fn with<R>(&self, f: impl FnOnce(&mut SchedulerCore<P>) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    pub fn is_locked(&self) -> bool {
        self.core.is_locked()
    }

    pub fn interrupts(&self) -> &I {
        &self.irq
    }
}

/// Proof that the dispatch lock is held
///
/// Field order matters: the spinlock is released before interrupts are
/// restored.
pub struct DispatchGuard<'a, P: Scheduler, I: InterruptControl> {
    core: MutexGuard<'a, SchedulerCore<P>>,
    _irq: IrqGuard<'a, I>,
}

impl<P: Scheduler, I: InterruptControl> Deref for DispatchGuard<'_, P, I> {
    type Target = SchedulerCore<P>;

    fn deref(&self) -> &SchedulerCore<P> {
        &self.core
    }
}

impl<P: Scheduler, I: InterruptControl> DerefMut for DispatchGuard<'_, P, I> {
    fn deref_mut(&mut self) -> &mut SchedulerCore<P> {
        &mut self.core
    }
}
