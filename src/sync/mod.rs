/*
 * Synchronization for the Dispatcher
 *
 * The scheduler has exactly one lock. Taking it means:
 * 1. mask interrupts on the calling processor (so a timer or device
 *    interrupt cannot re-enter the scheduler on this processor)
 * 2. on SMP builds, spin on the global dispatch spinlock
 *
 * Release happens in reverse order when the guard drops.
 */

pub mod dispatch_lock;

pub use dispatch_lock::{DispatchGuard, DispatchLock};

/// Processor interrupt flag control
///
/// Implemented by the architecture layer. `disable` returns whatever is
/// needed to put the flag back the way it was; nested critical sections
/// therefore restore correctly.
pub trait InterruptControl: Sync {
    type Prior: Copy;

    /// Mask interrupts, returning the previous state
    fn disable(&self) -> Self::Prior;

    /// Restore the state returned by `disable`
    fn restore(&self, prior: Self::Prior);

    fn are_enabled(&self) -> bool;
}

/// RAII interrupt mask
///
/// # Example
/// ```
/// use cluu_dispatch::arch::sim::SoftInterrupts;
/// use cluu_dispatch::sync::{InterruptControl, IrqGuard};
///
/// let irq = SoftInterrupts::new();
/// {
///     let _guard = IrqGuard::new(&irq);
///     assert!(!irq.are_enabled());
/// }
/// assert!(irq.are_enabled());
/// ```
pub struct IrqGuard<'a, I: InterruptControl> {
    irq: &'a I,
    prior: I::Prior,
}

impl<'a, I: InterruptControl> IrqGuard<'a, I> {
    pub fn new(irq: &'a I) -> Self {
        let prior = irq.disable();
        Self { irq, prior }
    }
}

impl<I: InterruptControl> Drop for IrqGuard<'_, I> {
    fn drop(&mut self) {
        self.irq.restore(self.prior);
    }
}
