/*
 * Scheduler Trait Definitions
 *
 * This module defines the traits that separate scheduling policy from mechanism:
 *
 * - Scheduler: The policy interface that different algorithms implement
 * - KernelSchedCtx: The platform interface policies use for time and the timer
 *
 * This separation allows:
 * 1. Swapping scheduling algorithms at build time without changing kernel code
 * 2. Testing policies in isolation against a simulated platform
 * 3. Clear ownership boundaries (policies touch only the scheduling records)
 */

use super::{
    config::SchedConfig,
    queue::{QueueKind, ThreadQueue},
    thread::{ThreadId, ThreadTable},
    types::{CpuId, Timestamp},
};

/// Scheduling policy trait
///
/// Every method is one atomic transition, called by SchedulerCore with the
/// dispatch lock held and interrupts masked. Methods that return a thread
/// are choosing what the calling processor runs next; `None` means idle.
///
/// A policy owns its queues; the per-thread records (including the schedule
/// entry that links a thread into those queues) live in the ThreadTable the
/// core passes in. Policies must never block or allocate.
///
/// The core takes care of marking the returned thread Running on the
/// calling processor. Policies take care of everything a thread leaving
/// the processor implies: clearing `active_processor`, choosing its queue,
/// honouring a freeze requested while it ran.
pub trait Scheduler: Send {
    /// Adopt the configuration; called once by SchedulerCore::new
    fn configure(&mut self, config: &SchedConfig);

    /// A newly created thread becomes eligible to run
    fn on_thread_start(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    );

    /// The running thread waits until `deadline`
    ///
    /// A deadline at or before `ctx.now()` resolves the wait as timed out
    /// without queueing; the caller keeps running.
    fn on_thread_blocked(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
        deadline: Timestamp,
    ) -> Option<ThreadId>;

    /// A waiting (or frozen) thread's wait was satisfied
    fn on_thread_unblocked(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    );

    /// The running thread gives up its turn if anything else can run
    fn on_thread_yield(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    ) -> Option<ThreadId>;

    /// The running thread terminates
    fn on_thread_stop(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    ) -> Option<ThreadId>;

    fn on_freeze_increment(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    );

    fn on_freeze_decrement(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    );

    /// The armed timer fired on the calling processor
    fn on_timer_interrupt(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        running: Option<ThreadId>,
        now: Timestamp,
    ) -> Option<ThreadId>;

    /// A device interrupt fired on the calling processor
    fn on_io_interrupt(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        running: Option<ThreadId>,
    ) -> Option<ThreadId>;

    /// The calling processor leaves the pool; its thread must be requeued
    fn on_processor_shutdown(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        running: Option<ThreadId>,
    );

    /// Access a policy queue for inspection, if the policy keeps one of
    /// that kind
    fn queue(&self, kind: QueueKind) -> Option<&ThreadQueue>;

    /// Get the policy name for debugging
    fn name(&self) -> &'static str;
}

/// Platform interface for scheduling policies
///
/// Implemented by the architecture layer for the calling processor: the
/// monotonic clock and the per-processor one-shot timer.
pub trait KernelSchedCtx {
    /// Monotonic clock read
    fn now(&self) -> Timestamp;

    /// Processor executing the current scheduler entry point
    fn current_cpu(&self) -> CpuId;

    /// Schedule the next timer interrupt on the calling processor
    ///
    /// Write-only; the last call wins.
    fn arm_timer(&mut self, deadline: Timestamp);
}
