/*
 * Scheduling Policies
 *
 * This module contains the scheduling policies that implement the Scheduler
 * trait. The kernel picks one at build time; each is a separate
 * implementation of the same event interface.
 *
 * Available policies:
 * - RoundRobinScheduler: round-robin with a hand-off lane for woken threads
 *   (default)
 *
 * Future policies might include:
 * - Priority: fixed-priority preemptive
 * - Lottery: proportional share
 */

pub mod round_robin;

pub use round_robin::RoundRobinScheduler;
