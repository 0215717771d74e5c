/*
 * Simulated Platform
 *
 * A stand-in for one processor's clock, one-shot timer and interrupt flag.
 * The scheduler core is driven against it in hosted builds: tests advance
 * the clock by hand and read back the timer the scheduler armed.
 */

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use core::time::Duration;

use crate::scheduler::{CpuId, KernelSchedCtx, Timestamp};
use crate::sync::InterruptControl;

/// Clock and timer of one simulated processor
#[derive(Debug, Clone)]
pub struct SimPlatform {
    now: Timestamp,
    cpu: CpuId,
    armed: Option<Timestamp>,
    arm_count: usize,
}

impl SimPlatform {
    /// Clock at zero, no timer armed
    pub fn new(cpu: CpuId) -> Self {
        Self {
            now: Timestamp::MIN,
            cpu,
            armed: None,
            arm_count: 0,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn advance(&mut self, by: Duration) {
        self.now = self.now.saturating_add(by);
    }

    /// Jump the clock; it never runs backwards
    pub fn set_now(&mut self, now: Timestamp) {
        assert!(now >= self.now, "clock moved backwards: {} -> {}", self.now, now);
        self.now = now;
    }

    /// The last deadline handed to `arm_timer`
    pub fn armed(&self) -> Option<Timestamp> {
        self.armed
    }

    pub fn arm_count(&self) -> usize {
        self.arm_count
    }

    /// Whether the armed timer would have fired by now
    pub fn timer_due(&self) -> bool {
        self.armed.is_some_and(|at| at <= self.now)
    }

    /// Act as another processor sharing this clock
    pub fn set_cpu(&mut self, cpu: CpuId) {
        self.cpu = cpu;
    }
}

impl KernelSchedCtx for SimPlatform {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn current_cpu(&self) -> CpuId {
        self.cpu
    }

    fn arm_timer(&mut self, deadline: Timestamp) {
        self.armed = Some(deadline);
        self.arm_count += 1;
    }
}

/// A software interrupt flag
#[derive(Debug)]
pub struct SoftInterrupts {
    enabled: AtomicBool,
    disables: AtomicUsize,
}

impl SoftInterrupts {
    /// Interrupts start enabled
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            disables: AtomicUsize::new(0),
        }
    }

    /// Number of times `disable` was called
    pub fn disable_count(&self) -> usize {
        self.disables.load(Ordering::Relaxed)
    }
}

impl Default for SoftInterrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptControl for SoftInterrupts {
    type Prior = bool;

    fn disable(&self) -> bool {
        self.disables.fetch_add(1, Ordering::Relaxed);
        self.enabled.swap(false, Ordering::AcqRel)
    }

    fn restore(&self, were_enabled: bool) {
        if were_enabled {
            self.enabled.store(true, Ordering::Release);
        }
    }

    fn are_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}
