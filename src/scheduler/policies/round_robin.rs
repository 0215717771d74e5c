/*
 * Round-Robin Scheduling Policy
 *
 * This module implements the kernel's default policy: plain round-robin with
 * a hand-off lane for freshly woken threads.
 *
 * Queues:
 * - recently-unblocked: threads made runnable during the current quantum
 *   (woken by the running thread or by an interrupt). Always drained before
 *   the runnable queue, so a producer that wakes a consumer hands off to it
 *   without waiting for the next tick.
 * - runnable: everything else that can run, including the thread whose
 *   quantum just expired.
 * - blocked: waiting threads, ascending by deadline, so the next timeout is
 *   always the head.
 * - frozen: threads with a non-zero freeze count, in no particular order.
 *
 * Timer policy:
 * Each timer interrupt folds the recently-unblocked queue and the preempted
 * thread into the runnable queue, times out expired waits, then arms the
 * next interrupt: one quantum away if the runnable queue already held work
 * before any waits expired, the idle interval otherwise, clamped to the
 * earliest remaining blocked deadline.
 *
 * Freeze:
 * A thread frozen while queued moves to the frozen queue at once. A thread
 * frozen while executing keeps running until it leaves the processor; every
 * path that takes a thread off a processor checks the freeze count before
 * deciding where it goes.
 */

use core::time::Duration;

use super::super::{
    config::{DEFAULT_IDLE_INTERVAL, DEFAULT_QUANTUM, SchedConfig},
    queue::{QueueKind, ThreadQueue},
    thread::{ThreadId, ThreadTable},
    traits::{KernelSchedCtx, Scheduler},
    types::{ThreadState, Timestamp, WaitState},
};

/// Round-Robin scheduling policy
pub struct RoundRobinScheduler {
    unblocked: ThreadQueue,
    runnable: ThreadQueue,
    blocked: ThreadQueue,
    frozen: ThreadQueue,

    quantum: Duration,
    idle_interval: Duration,

    /// Last deadline handed to the timer; `MAX` when nothing is armed
    armed: Timestamp,
}

impl RoundRobinScheduler {
    pub const fn new() -> Self {
        Self {
            unblocked: ThreadQueue::new(QueueKind::RecentlyUnblocked),
            runnable: ThreadQueue::new(QueueKind::Runnable),
            blocked: ThreadQueue::new(QueueKind::Blocked),
            frozen: ThreadQueue::new(QueueKind::Frozen),
            quantum: DEFAULT_QUANTUM,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            armed: Timestamp::MAX,
        }
    }

    /// Deadline most recently armed by this policy
    pub fn armed_deadline(&self) -> Timestamp {
        self.armed
    }

    fn queue_mut(&mut self, kind: QueueKind) -> &mut ThreadQueue {
        match kind {
            QueueKind::RecentlyUnblocked => &mut self.unblocked,
            QueueKind::Runnable => &mut self.runnable,
            QueueKind::Blocked => &mut self.blocked,
            QueueKind::Frozen => &mut self.frozen,
        }
    }

    /// Next thread for the calling processor, hand-off lane first
    fn take_next(&mut self, threads: &mut ThreadTable) -> Option<ThreadId> {
        self.unblocked
            .dequeue_head(threads)
            .or_else(|| self.runnable.dequeue_head(threads))
    }

    fn make_runnable(&mut self, threads: &mut ThreadTable, tid: ThreadId, lane: QueueKind) {
        self.queue_mut(lane).enqueue_tail(threads, tid);
        threads.record_mut(tid).state = ThreadState::Runnable;
    }

    fn park_frozen(&mut self, threads: &mut ThreadTable, tid: ThreadId) {
        self.frozen.enqueue_tail(threads, tid);
        threads.record_mut(tid).state = ThreadState::Frozen;
        log::debug!("[RR Policy] {} parked in frozen queue", tid);
    }

    /// Queue a thread with a pending wait
    fn enter_wait(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    ) {
        if threads.record(tid).is_frozen() {
            self.park_frozen(threads, tid);
            return;
        }

        self.blocked.insert_by_deadline(threads, tid);
        threads.record_mut(tid).state = ThreadState::Blocked;

        // A new earliest deadline must not wait for a timer armed further out.
        if self.blocked.peek_head(threads) == Some(tid) {
            let deadline = threads.record(tid).blocked_until;
            if deadline < self.armed {
                self.arm(ctx, deadline);
            }
        }
    }

    /// A thread leaves its processor and goes back into circulation
    ///
    /// A freeze requested while it was executing takes effect here.
    fn requeue_descheduled(&mut self, threads: &mut ThreadTable, tid: ThreadId, lane: QueueKind) {
        let rec = threads.record_mut(tid);
        rec.active_processor = None;
        if rec.is_frozen() {
            self.park_frozen(threads, tid);
        } else {
            self.make_runnable(threads, tid, lane);
        }
    }

    /// Bound how long new runnable work can sit behind an idle timer
    fn ensure_quantum_armed(&mut self, ctx: &mut dyn KernelSchedCtx) {
        let deadline = ctx.now().saturating_add(self.quantum);
        if deadline < self.armed {
            self.arm(ctx, deadline);
        }
    }

    fn arm(&mut self, ctx: &mut dyn KernelSchedCtx, deadline: Timestamp) {
        ctx.arm_timer(deadline);
        self.armed = deadline;
    }

    fn expect_running(threads: &ThreadTable, tid: ThreadId, what: &str) {
        let rec = threads.record(tid);
        if rec.state != ThreadState::Running || rec.queue().is_some() {
            log::error!("[RR Policy] {} on {} in state {:?}", what, tid, rec.state);
            panic!("{} called for {} which is not running ({:?})", what, tid, rec.state);
        }
    }
}

impl Scheduler for RoundRobinScheduler {
    fn configure(&mut self, config: &SchedConfig) {
        self.quantum = config.quantum;
        self.idle_interval = config.idle_interval;
    }

    fn on_thread_start(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    ) {
        let rec = threads.record(tid);
        assert_eq!(
            rec.state,
            ThreadState::Unstarted,
            "{} started twice",
            tid
        );

        // Frozen before it ever ran: hold it until thawed.
        if rec.is_frozen() {
            self.park_frozen(threads, tid);
            return;
        }

        self.make_runnable(threads, tid, QueueKind::RecentlyUnblocked);
        self.ensure_quantum_armed(ctx);
    }

    fn on_thread_blocked(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
        deadline: Timestamp,
    ) -> Option<ThreadId> {
        Self::expect_running(threads, tid, "block");

        let now = ctx.now();
        let rec = threads.record_mut(tid);

        if deadline <= now {
            // The wait is over before it starts: report a timeout and keep
            // running, unless a freeze is waiting for this thread to yield.
            rec.wait = WaitState::TimedOut;
            rec.blocked_until = Timestamp::MAX;
            if !rec.is_frozen() {
                return Some(tid);
            }
            rec.active_processor = None;
            self.park_frozen(threads, tid);
            return self.take_next(threads);
        }

        rec.wait = WaitState::Pending;
        rec.blocked_until = deadline;
        rec.active_processor = None;
        self.enter_wait(ctx, threads, tid);

        self.take_next(threads)
    }

    fn on_thread_unblocked(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    ) {
        let rec = threads.record(tid);
        match rec.queue() {
            Some(QueueKind::Blocked) => {
                debug_assert!(rec.wait.is_pending());
                self.blocked.remove(threads, tid);

                let rec = threads.record_mut(tid);
                rec.wait = WaitState::Signaled;
                rec.blocked_until = Timestamp::MAX;
                self.make_runnable(threads, tid, QueueKind::RecentlyUnblocked);
                self.ensure_quantum_armed(ctx);
            }
            Some(QueueKind::Frozen) if rec.wait.is_pending() => {
                // Resolve the wait but keep it parked; thaw makes it runnable.
                let rec = threads.record_mut(tid);
                rec.wait = WaitState::Signaled;
                rec.blocked_until = Timestamp::MAX;
                log::debug!("[RR Policy] {} signaled while frozen", tid);
            }
            queue => {
                log::error!(
                    "[RR Policy] unblock of {} (state {:?}, queue {:?})",
                    tid,
                    rec.state,
                    queue
                );
                panic!("unblock of {} which is not waiting", tid);
            }
        }
    }

    fn on_thread_yield(
        &mut self,
        _ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    ) -> Option<ThreadId> {
        Self::expect_running(threads, tid, "yield");

        if threads.record(tid).is_frozen() {
            threads.record_mut(tid).active_processor = None;
            self.park_frozen(threads, tid);
            return self.take_next(threads);
        }

        match self.take_next(threads) {
            Some(next) => {
                self.requeue_descheduled(threads, tid, QueueKind::Runnable);
                Some(next)
            }
            None => Some(tid),
        }
    }

    fn on_thread_stop(
        &mut self,
        _ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    ) -> Option<ThreadId> {
        Self::expect_running(threads, tid, "stop");

        let rec = threads.record_mut(tid);
        rec.state = ThreadState::Stopped;
        rec.wait = WaitState::None;
        rec.blocked_until = Timestamp::MAX;
        rec.active_processor = None;

        self.take_next(threads)
    }

    fn on_freeze_increment(
        &mut self,
        _ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    ) {
        let rec = threads.record_mut(tid);
        rec.freeze_count = match rec.freeze_count.checked_add(1) {
            Some(n) => n,
            None => panic!("freeze count overflow on {}", tid),
        };

        // Already parked, or executing (deferred until it leaves the CPU).
        if rec.freeze_count > 1 || rec.is_executing() {
            return;
        }

        match rec.queue() {
            Some(QueueKind::Frozen) => unreachable!("{} frozen with a zero count", tid),
            Some(kind) => {
                self.queue_mut(kind).remove(threads, tid);
                self.park_frozen(threads, tid);
            }
            // Unstarted or stopped: nothing to move.
            None => {}
        }
    }

    fn on_freeze_decrement(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        tid: ThreadId,
    ) {
        let rec = threads.record_mut(tid);
        if rec.freeze_count == 0 {
            log::error!("[RR Policy] thaw of unfrozen {}", tid);
            panic!("freeze count underflow on {}", tid);
        }
        rec.freeze_count -= 1;

        if rec.freeze_count > 0 || rec.queue() != Some(QueueKind::Frozen) {
            return;
        }

        let waiting = rec.wait.is_pending();
        self.frozen.remove(threads, tid);
        log::debug!("[RR Policy] {} thawed (waiting: {})", tid, waiting);

        if waiting {
            self.enter_wait(ctx, threads, tid);
        } else {
            self.make_runnable(threads, tid, QueueKind::Runnable);
            self.ensure_quantum_armed(ctx);
        }
    }

    fn on_timer_interrupt(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        running: Option<ThreadId>,
        now: Timestamp,
    ) -> Option<ThreadId> {
        // The hand-off lane only lives for one quantum.
        while let Some(tid) = self.unblocked.dequeue_head(threads) {
            self.runnable.enqueue_tail(threads, tid);
        }

        if let Some(tid) = running {
            Self::expect_running(threads, tid, "preempt");
            self.requeue_descheduled(threads, tid, QueueKind::Runnable);
        }

        // Contention is judged before expired waiters join the queue.
        let contended = !self.runnable.is_empty();

        while let Some(tid) = self.blocked.peek_head(threads) {
            if threads.record(tid).blocked_until > now {
                break;
            }
            self.blocked.dequeue_head(threads);
            let rec = threads.record_mut(tid);
            rec.wait = WaitState::TimedOut;
            rec.blocked_until = Timestamp::MAX;
            log::debug!("[RR Policy] {} wait timed out", tid);
            self.make_runnable(threads, tid, QueueKind::Runnable);
        }

        let interval = if contended {
            self.quantum
        } else {
            self.idle_interval
        };
        let mut next_timer = now.saturating_add(interval);
        if let Some(head) = self.blocked.peek_head(threads) {
            next_timer = next_timer.min(threads.record(head).blocked_until);
        }
        self.arm(ctx, next_timer);

        self.runnable.dequeue_head(threads)
    }

    fn on_io_interrupt(
        &mut self,
        _ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        running: Option<ThreadId>,
    ) -> Option<ThreadId> {
        // The interrupted thread keeps hand-off priority over the runnable
        // queue, behind anything the interrupt just woke.
        if let Some(tid) = running {
            Self::expect_running(threads, tid, "interrupt");
            self.requeue_descheduled(threads, tid, QueueKind::RecentlyUnblocked);
        }

        self.unblocked.dequeue_head(threads)
    }

    fn on_processor_shutdown(
        &mut self,
        _ctx: &mut dyn KernelSchedCtx,
        threads: &mut ThreadTable,
        running: Option<ThreadId>,
    ) {
        if let Some(tid) = running {
            Self::expect_running(threads, tid, "shutdown");
            self.requeue_descheduled(threads, tid, QueueKind::RecentlyUnblocked);
        }
    }

    fn queue(&self, kind: QueueKind) -> Option<&ThreadQueue> {
        Some(match kind {
            QueueKind::RecentlyUnblocked => &self.unblocked,
            QueueKind::Runnable => &self.runnable,
            QueueKind::Blocked => &self.blocked,
            QueueKind::Frozen => &self.frozen,
        })
    }

    fn name(&self) -> &'static str {
        "Round-Robin"
    }
}

impl Default for RoundRobinScheduler {
    fn default() -> Self {
        Self::new()
    }
}
