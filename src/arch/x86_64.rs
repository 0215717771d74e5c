/*
 * x86_64 Interrupt Control
 *
 * Drives the IF flag through the x86_64 crate. Only meaningful in ring 0;
 * `cli`/`sti` fault in a hosted process, so this is only constructed by
 * the kernel.
 */

use ::x86_64::instructions::interrupts;

use crate::sync::InterruptControl;

/// The local processor's interrupt flag
///
/// # Example
/// ```ignore
/// let lock = DispatchLock::new(RoundRobinScheduler::new(), config, cpus, CpuInterrupts)?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuInterrupts;

impl InterruptControl for CpuInterrupts {
    /// Whether interrupts were enabled before `disable`
    type Prior = bool;

    fn disable(&self) -> bool {
        let were_enabled = interrupts::are_enabled();
        if were_enabled {
            interrupts::disable();
        }
        were_enabled
    }

    fn restore(&self, were_enabled: bool) {
        // Only re-enable if they were enabled before
        if were_enabled {
            interrupts::enable();
        }
    }

    fn are_enabled(&self) -> bool {
        interrupts::are_enabled()
    }
}
