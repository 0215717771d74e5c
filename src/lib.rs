/*
 * CLUU Dispatch - Thread Scheduler Core
 *
 * This crate is the part of the CLUU kernel that decides, at every blocking
 * event, timer tick and hardware interrupt, which thread runs next on each
 * processor. It does not create threads, switch stacks or talk to devices:
 * the thread subsystem, the context-switch path and the interrupt handlers
 * call into it and act on the thread it hands back.
 *
 * Why this is important:
 * - Every scheduling decision in the kernel funnels through one state machine
 * - It runs with interrupts masked under a single dispatch lock, so it must
 *   never block, never allocate and never take unbounded time
 * - It owns the timer: every decision re-arms the next quantum or wake-up
 *
 * Layout:
 * - scheduler: thread arena, intrusive queues, events, policy trait,
 *   mechanism core and the round-robin policy
 * - sync: interrupt control and the dispatch lock
 * - arch: x86_64 interrupt flag control and a simulated platform
 * - utils: IRQ-safe ring-buffer logger
 */

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod scheduler;
pub mod sync;
pub mod utils;

pub use scheduler::{
    CpuId, KernelSchedCtx, MAX_CPUS, MAX_THREADS, QueueKind, RoundRobinScheduler, SchedConfig,
    SchedError, SchedEvent, Scheduler, SchedulerCore, ThreadId, ThreadState, Timestamp,
    TraceFlags, WaitState,
};
pub use sync::{DispatchGuard, DispatchLock, InterruptControl};
