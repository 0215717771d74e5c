/*
 * Round-Robin Thread Scheduler
 *
 * This module implements the CLUU thread scheduler: the state machine that
 * runs at every blocking event, timer tick and hardware interrupt and
 * returns the thread the calling processor should run next (or None: idle).
 *
 * THREAD LIFECYCLE:
 * ================
 *
 *   Unstarted --start--> Runnable --dispatch--> Running --stop--> Stopped
 *                          ^   ^                  |  |
 *                          |   +--yield/preempt---+  |
 *                          |                         | block
 *                          +--unblock / timeout-- Blocked
 *
 *   Any state except Stopped can be frozen; a frozen thread is never
 *   dispatched. Frozen while queued: moved to the frozen queue at once.
 *   Frozen while running: moved when it next leaves the processor.
 *
 * QUEUES:
 * =======
 *
 * - recently-unblocked: woken this quantum, drained first (hand-off)
 * - runnable: round-robin order
 * - blocked: ascending by wake deadline
 * - frozen: held until the freeze count drops to zero
 *
 * LOCKING:
 * ========
 *
 * Every entry point runs under the dispatch lock (interrupts masked, then a
 * spinlock on SMP builds). SchedulerCore is only reachable through the
 * guard, and nothing in here blocks or allocates.
 *
 * STRUCTURE:
 * ==========
 *
 * - types: CpuId, Timestamp, ThreadState, WaitState, SchedError
 * - config: SchedConfig and TraceFlags
 * - thread: ThreadId and the fixed-size ThreadTable arena
 * - queue: index-linked ThreadQueue over the arena
 * - events: SchedEvent, one variant per entry point
 * - traits: Scheduler (policy) and KernelSchedCtx (platform)
 * - sched_core: SchedulerCore (mechanism)
 * - policies: RoundRobinScheduler
 */

pub mod config;
pub mod events;
pub mod policies;
pub mod queue;
pub mod sched_core;
pub mod thread;
pub mod traits;
pub mod types;

pub use config::{SchedConfig, TraceFlags};
pub use events::SchedEvent;
pub use policies::RoundRobinScheduler;
pub use queue::{QueueKind, ThreadQueue};
pub use sched_core::{PerCpuSchedState, SchedulerCore};
pub use thread::{ThreadId, ThreadRecord, ThreadTable};
pub use traits::{KernelSchedCtx, Scheduler};
pub use types::{CpuId, SchedError, ThreadState, Timestamp, WaitState};

/// Maximum number of threads
pub const MAX_THREADS: usize = 64;

/// Maximum number of processors in the scheduling pool
pub const MAX_CPUS: usize = 16;
