/*
 * Architecture Support
 *
 * - x86_64: interrupt flag control for the real processor
 * - sim: a simulated clock, timer and interrupt flag for hosted builds
 *   and tests
 */

pub mod sim;

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

/// Run `f` with interrupts masked on bare metal
///
/// Hosted builds cannot touch the interrupt flag, so `f` just runs.
pub fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    {
        ::x86_64::instructions::interrupts::without_interrupts(f)
    }

    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    {
        f()
    }
}
