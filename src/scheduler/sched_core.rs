/*
 * Scheduler Core - Mechanism Layer
 *
 * This module implements SchedulerCore, the stable mechanism layer that:
 * 1. Holds the active scheduling policy (chosen at build time)
 * 2. Owns the thread table the policy's queues link through
 * 3. Manages per-CPU scheduling state
 * 4. Provides the stable external API that the rest of the kernel uses
 * 5. Records each dispatch decision (who runs where) and checks that
 *    callers report the running thread consistently
 *
 * SchedulerCore is only reachable through a DispatchGuard, so every entry
 * point runs with the dispatch lock held and interrupts masked.
 */

use heapless::Vec;

use super::{
    MAX_CPUS, MAX_THREADS,
    config::SchedConfig,
    events::SchedEvent,
    queue::QueueKind,
    thread::{ThreadId, ThreadRecord, ThreadTable},
    traits::{KernelSchedCtx, Scheduler},
    types::{CpuId, SchedError, ThreadState, Timestamp, WaitState},
};

/// Per-CPU scheduling state
#[derive(Debug)]
pub struct PerCpuSchedState {
    /// Which CPU this state belongs to
    pub cpu_id: CpuId,

    /// Thread last dispatched on this CPU (None = idle)
    pub current_thread: Option<ThreadId>,

    /// Whether this CPU takes part in scheduling
    pub online: bool,

    /// Timer interrupts handled on this CPU
    pub timer_interrupts: u64,

    /// Number of context switches performed
    pub context_switches: u64,
}

impl PerCpuSchedState {
    /// Create new per-CPU state
    pub fn new(cpu_id: CpuId) -> Self {
        Self {
            cpu_id,
            current_thread: None,
            online: true,
            timer_interrupts: 0,
            context_switches: 0,
        }
    }
}

/// Scheduler Core - The Mechanism Layer
///
/// External code calls the `on_*` entry points; SchedulerCore checks the
/// calling processor's bookkeeping, forwards the event to the policy and
/// records the thread the policy picked.
pub struct SchedulerCore<P: Scheduler> {
    policy: P,
    threads: ThreadTable,
    config: SchedConfig,
    per_cpu: Vec<PerCpuSchedState, MAX_CPUS>,
}

impl<P: Scheduler> SchedulerCore<P> {
    /// Create a new SchedulerCore with the given policy
    ///
    /// # Arguments
    /// - `policy`: The scheduling policy to use
    /// - `config`: Quantum, idle interval and tracing
    /// - `cpu_count`: Number of CPUs in the scheduling pool (1..=MAX_CPUS)
    pub(crate) fn new(
        mut policy: P,
        config: SchedConfig,
        cpu_count: usize,
    ) -> Result<Self, SchedError> {
        config.validate()?;
        if cpu_count == 0 || cpu_count > MAX_CPUS {
            return Err(SchedError::CpuOutOfRange(CpuId(cpu_count as u32)));
        }

        policy.configure(&config);
        let per_cpu = (0..cpu_count)
            .map(|i| PerCpuSchedState::new(CpuId(i as u32)))
            .collect();

        log::info!("SchedulerCore initialized with policy: {}", policy.name());
        log::info!(
            "Managing {} CPU(s), quantum {:?}, {} thread slots",
            cpu_count,
            config.quantum,
            MAX_THREADS
        );

        Ok(Self {
            policy,
            threads: ThreadTable::new(),
            config,
            per_cpu,
        })
    }

    /// Get the name of the active policy
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    // ========================================================================
    // THREAD REGISTRATION - called by the thread subsystem
    // ========================================================================

    /// Allocate a scheduling record for a newly created thread
    pub fn spawn_thread(&mut self) -> Result<ThreadId, SchedError> {
        self.threads.spawn()
    }

    /// Release the record of a stopped thread
    pub fn reap_thread(&mut self, tid: ThreadId) -> Result<(), SchedError> {
        self.threads.reap(tid)
    }

    // ========================================================================
    // EXTERNAL API - What the rest of the kernel calls
    // ========================================================================

    /// A newly created thread becomes eligible to run
    pub fn on_thread_start(&mut self, ctx: &mut dyn KernelSchedCtx, tid: ThreadId) {
        self.enter(ctx, &SchedEvent::ThreadStart { tid });
        self.policy.on_thread_start(ctx, &mut self.threads, tid);
    }

    /// The running thread waits until `deadline` (`Timestamp::MAX` = forever)
    ///
    /// # Returns
    /// The thread the calling CPU runs next. This is `tid` itself when the
    /// deadline has already passed; the wait then reads as timed out.
    pub fn on_thread_blocked(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        tid: ThreadId,
        deadline: Timestamp,
    ) -> Option<ThreadId> {
        let cpu = self.enter(ctx, &SchedEvent::ThreadBlocked { tid, deadline });
        self.expect_current(cpu, Some(tid));
        let next = self
            .policy
            .on_thread_blocked(ctx, &mut self.threads, tid, deadline);
        self.dispatched(cpu, next)
    }

    /// A waiting thread's condition was satisfied
    pub fn on_thread_unblocked(&mut self, ctx: &mut dyn KernelSchedCtx, tid: ThreadId) {
        self.enter(ctx, &SchedEvent::ThreadUnblocked { tid });
        self.policy.on_thread_unblocked(ctx, &mut self.threads, tid);
    }

    /// The running thread gives up its turn
    pub fn on_thread_yield(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        tid: ThreadId,
    ) -> Option<ThreadId> {
        let cpu = self.enter(ctx, &SchedEvent::ThreadYield { tid });
        self.expect_current(cpu, Some(tid));
        let next = self.policy.on_thread_yield(ctx, &mut self.threads, tid);
        self.dispatched(cpu, next)
    }

    /// The running thread terminates
    pub fn on_thread_stop(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        tid: ThreadId,
    ) -> Option<ThreadId> {
        let cpu = self.enter(ctx, &SchedEvent::ThreadStop { tid });
        self.expect_current(cpu, Some(tid));
        let next = self.policy.on_thread_stop(ctx, &mut self.threads, tid);
        self.dispatched(cpu, next)
    }

    pub fn on_freeze_increment(&mut self, ctx: &mut dyn KernelSchedCtx, tid: ThreadId) {
        self.enter(ctx, &SchedEvent::FreezeIncrement { tid });
        self.policy.on_freeze_increment(ctx, &mut self.threads, tid);
    }

    pub fn on_freeze_decrement(&mut self, ctx: &mut dyn KernelSchedCtx, tid: ThreadId) {
        self.enter(ctx, &SchedEvent::FreezeDecrement { tid });
        self.policy.on_freeze_decrement(ctx, &mut self.threads, tid);
    }

    /// Handle the armed timer firing on the calling CPU
    ///
    /// # Returns
    /// - Some(ThreadId): Switch to this thread
    /// - None: No runnable threads, CPU should idle
    pub fn on_timer_interrupt(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        running: Option<ThreadId>,
        now: Timestamp,
    ) -> Option<ThreadId> {
        let cpu = self.enter(ctx, &SchedEvent::TimerInterrupt { running, now });
        self.expect_current(cpu, running);
        self.per_cpu[cpu.as_usize()].timer_interrupts += 1;
        let next = self
            .policy
            .on_timer_interrupt(ctx, &mut self.threads, running, now);
        self.dispatched(cpu, next)
    }

    /// Handle a device interrupt on the calling CPU
    pub fn on_io_interrupt(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        running: Option<ThreadId>,
    ) -> Option<ThreadId> {
        let cpu = self.enter(ctx, &SchedEvent::IoInterrupt { running });
        self.expect_current(cpu, running);
        let next = self.policy.on_io_interrupt(ctx, &mut self.threads, running);
        self.dispatched(cpu, next)
    }

    /// Take the calling CPU out of the scheduling pool
    pub fn on_processor_shutdown(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        running: Option<ThreadId>,
    ) {
        let cpu = self.enter(ctx, &SchedEvent::ProcessorShutdown { running });
        self.expect_current(cpu, running);
        self.policy
            .on_processor_shutdown(ctx, &mut self.threads, running);
        self.dispatched(cpu, None);
        self.per_cpu[cpu.as_usize()].online = false;
        log::info!("{} left the scheduling pool", cpu);
    }

    /// Bring the calling CPU (back) into the scheduling pool
    pub fn on_processor_start(&mut self, ctx: &mut dyn KernelSchedCtx) {
        let cpu = ctx.current_cpu();
        self.trace(&SchedEvent::ProcessorStart { cpu }, cpu);
        let state = match self.per_cpu.get_mut(cpu.as_usize()) {
            Some(s) => s,
            None => panic!("{} is outside the scheduling pool", cpu),
        };
        state.online = true;
        state.current_thread = None;
        log::info!("{} joined the scheduling pool", cpu);
    }

    /// Route an event to its entry point
    ///
    /// Returns the next thread for events that dispatch, `None` otherwise.
    pub fn dispatch(
        &mut self,
        ctx: &mut dyn KernelSchedCtx,
        event: SchedEvent,
    ) -> Option<ThreadId> {
        match event {
            SchedEvent::ThreadStart { tid } => {
                self.on_thread_start(ctx, tid);
                None
            }
            SchedEvent::ThreadBlocked { tid, deadline } => self.on_thread_blocked(ctx, tid, deadline),
            SchedEvent::ThreadUnblocked { tid } => {
                self.on_thread_unblocked(ctx, tid);
                None
            }
            SchedEvent::ThreadYield { tid } => self.on_thread_yield(ctx, tid),
            SchedEvent::ThreadStop { tid } => self.on_thread_stop(ctx, tid),
            SchedEvent::FreezeIncrement { tid } => {
                self.on_freeze_increment(ctx, tid);
                None
            }
            SchedEvent::FreezeDecrement { tid } => {
                self.on_freeze_decrement(ctx, tid);
                None
            }
            SchedEvent::TimerInterrupt { running, now } => {
                self.on_timer_interrupt(ctx, running, now)
            }
            SchedEvent::IoInterrupt { running } => self.on_io_interrupt(ctx, running),
            SchedEvent::ProcessorShutdown { running } => {
                self.on_processor_shutdown(ctx, running);
                None
            }
            SchedEvent::ProcessorStart { cpu } => {
                assert_eq!(cpu, ctx.current_cpu(), "ProcessorStart replayed on another CPU");
                self.on_processor_start(ctx);
                None
            }
        }
    }

    // ========================================================================
    // DISPATCH BOOKKEEPING
    // ========================================================================

    /// Common prologue: trace the event, check the calling CPU
    fn enter(&self, ctx: &dyn KernelSchedCtx, event: &SchedEvent) -> CpuId {
        let cpu = ctx.current_cpu();
        self.trace(event, cpu);
        match self.per_cpu.get(cpu.as_usize()) {
            Some(state) if state.online => cpu,
            Some(_) => {
                log::error!("{} on offline {}", event.name(), cpu);
                panic!("scheduler entered on offline {}", cpu);
            }
            None => panic!("{} is outside the scheduling pool", cpu),
        }
    }

    fn trace(&self, event: &SchedEvent, cpu: CpuId) {
        if self.config.trace.contains(event.trace_flag()) {
            log::trace!("[sched] {} {:?} on {}", event.name(), event, cpu);
        }
    }

    /// The caller's idea of the running thread must match the last dispatch
    fn expect_current(&self, cpu: CpuId, running: Option<ThreadId>) {
        let current = self.per_cpu[cpu.as_usize()].current_thread;
        if current != running {
            log::error!(
                "{} reports {:?} running, last dispatched {:?}",
                cpu,
                running,
                current
            );
            panic!("running thread mismatch on {}", cpu);
        }
    }

    /// Record the policy's choice for `cpu`
    fn dispatched(&mut self, cpu: CpuId, next: Option<ThreadId>) -> Option<ThreadId> {
        if let Some(tid) = next {
            let rec = self.threads.record_mut(tid);
            assert!(
                rec.queue().is_none(),
                "{} dispatched while still queued on {:?}",
                tid,
                rec.queue()
            );
            assert!(
                rec.active_processor.is_none() || rec.active_processor == Some(cpu),
                "{} dispatched on {} while active on {:?}",
                tid,
                cpu,
                rec.active_processor
            );
            rec.state = ThreadState::Running;
            rec.active_processor = Some(cpu);
        }

        let state = &mut self.per_cpu[cpu.as_usize()];
        if state.current_thread != next {
            state.context_switches += 1;
        }
        state.current_thread = next;
        next
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Get the current thread running on a CPU
    pub fn current_thread(&self, cpu: CpuId) -> Option<ThreadId> {
        self.per_cpu.get(cpu.as_usize())?.current_thread
    }

    pub fn is_online(&self, cpu: CpuId) -> bool {
        self.per_cpu.get(cpu.as_usize()).is_some_and(|s| s.online)
    }

    pub fn cpu_count(&self) -> usize {
        self.per_cpu.len()
    }

    /// Get total context switches performed
    pub fn context_switch_count(&self, cpu: CpuId) -> u64 {
        self.per_cpu[cpu.as_usize()].context_switches
    }

    pub fn timer_interrupt_count(&self, cpu: CpuId) -> u64 {
        self.per_cpu[cpu.as_usize()].timer_interrupts
    }

    pub fn threads(&self) -> &ThreadTable {
        &self.threads
    }

    pub fn record(&self, tid: ThreadId) -> Option<&ThreadRecord> {
        self.threads.get(tid)
    }

    pub fn thread_state(&self, tid: ThreadId) -> Option<ThreadState> {
        self.threads.get(tid).map(|r| r.state)
    }

    pub fn queue_of(&self, tid: ThreadId) -> Option<QueueKind> {
        self.threads.get(tid)?.queue()
    }

    pub fn wait_state(&self, tid: ThreadId) -> Option<WaitState> {
        self.threads.get(tid).map(|r| r.wait)
    }

    /// Threads on one policy queue, head first
    pub fn queued(&self, kind: QueueKind) -> Vec<ThreadId, MAX_THREADS> {
        match self.policy.queue(kind) {
            Some(q) => q.iter(&self.threads).collect(),
            None => Vec::new(),
        }
    }

    /// Verify every scheduler invariant; panics on the first violation
    ///
    /// - each entry sits in at most one queue, and queue links are intact
    /// - queue membership matches the thread's state
    /// - a frozen thread that is not executing is in the frozen queue
    /// - the blocked queue is ascending by deadline
    /// - running threads are exactly the per-CPU current threads
    pub fn check_invariants(&self) {
        let mut queued = 0;
        for kind in QueueKind::ALL {
            if let Some(q) = self.policy.queue(kind) {
                queued += q.verify(&self.threads);
            }
        }

        let mut linked = 0;
        for (tid, rec) in self.threads.iter() {
            let expected = match rec.queue() {
                Some(QueueKind::RecentlyUnblocked) | Some(QueueKind::Runnable) => {
                    Some(ThreadState::Runnable)
                }
                Some(QueueKind::Blocked) => Some(ThreadState::Blocked),
                Some(QueueKind::Frozen) => Some(ThreadState::Frozen),
                None => None,
            };
            if let Some(state) = expected {
                linked += 1;
                assert_eq!(rec.state, state, "{} state disagrees with its queue", tid);
                assert!(rec.active_processor.is_none(), "{} queued while executing", tid);
            }

            match rec.state {
                ThreadState::Running => {
                    let cpu = match rec.active_processor {
                        Some(cpu) => cpu,
                        None => panic!("{} running without a processor", tid),
                    };
                    assert_eq!(
                        self.current_thread(cpu),
                        Some(tid),
                        "{} not current on {}",
                        tid,
                        cpu
                    );
                }
                ThreadState::Runnable | ThreadState::Blocked | ThreadState::Frozen => {
                    assert!(rec.queue().is_some(), "{} {:?} but in no queue", tid, rec.state);
                }
                ThreadState::Unstarted | ThreadState::Stopped => {
                    assert!(rec.queue().is_none(), "{} {:?} but queued", tid, rec.state);
                }
            }

            if rec.is_frozen() && !rec.is_executing() && rec.queue().is_some() {
                assert_eq!(
                    rec.queue(),
                    Some(QueueKind::Frozen),
                    "frozen {} outside the frozen queue",
                    tid
                );
            }
            if rec.queue() == Some(QueueKind::Blocked) {
                assert!(rec.wait.is_pending(), "{} blocked without a pending wait", tid);
            }
        }
        assert_eq!(queued, linked, "queue lengths disagree with entry back-pointers");

        if let Some(q) = self.policy.queue(QueueKind::Blocked) {
            let mut last = Timestamp::MIN;
            for tid in q.iter(&self.threads) {
                let deadline = self.threads.record(tid).blocked_until;
                assert!(deadline >= last, "blocked queue out of order at {}", tid);
                last = deadline;
            }
        }

        for state in self.per_cpu.iter() {
            if let Some(tid) = state.current_thread {
                let rec = self.threads.record(tid);
                assert_eq!(rec.state, ThreadState::Running, "{} current but not running", tid);
                assert_eq!(rec.active_processor, Some(state.cpu_id));
            }
        }
    }
}

// ============================================================================
// DEBUG IMPLEMENTATION
// ============================================================================

impl<P: Scheduler> core::fmt::Debug for SchedulerCore<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SchedulerCore")
            .field("policy", &self.policy.name())
            .field("threads", &self.threads)
            .field("cpu_count", &self.per_cpu.len())
            .field("per_cpu", &self.per_cpu)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::SimPlatform;
    use crate::scheduler::{RoundRobinScheduler, TraceFlags};

    fn core(cpus: usize) -> SchedulerCore<RoundRobinScheduler> {
        SchedulerCore::new(RoundRobinScheduler::new(), SchedConfig::default(), cpus).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_cpu_count() {
        let err = SchedulerCore::new(RoundRobinScheduler::new(), SchedConfig::default(), 0);
        assert!(matches!(err, Err(SchedError::CpuOutOfRange(_))));
        let err = SchedulerCore::new(
            RoundRobinScheduler::new(),
            SchedConfig::default(),
            MAX_CPUS + 1,
        );
        assert!(matches!(err, Err(SchedError::CpuOutOfRange(_))));
    }

    #[test]
    fn test_dispatch_marks_running() {
        let mut core = core(1);
        let mut ctx = SimPlatform::new(CpuId::BSP);
        let t = core.spawn_thread().unwrap();
        core.on_thread_start(&mut ctx, t);
        core.check_invariants();

        let now = ctx.now();
        let next = core.on_timer_interrupt(&mut ctx, None, now);
        assert_eq!(next, Some(t));
        assert_eq!(core.thread_state(t), Some(ThreadState::Running));
        assert_eq!(core.current_thread(CpuId::BSP), Some(t));
        assert_eq!(core.context_switch_count(CpuId::BSP), 1);
        assert_eq!(core.timer_interrupt_count(CpuId::BSP), 1);
        core.check_invariants();
    }

    #[test]
    fn test_two_cpus_share_queues() {
        let mut core = core(2);
        let mut cpu0 = SimPlatform::new(CpuId(0));
        let mut cpu1 = SimPlatform::new(CpuId(1));
        let a = core.spawn_thread().unwrap();
        let b = core.spawn_thread().unwrap();
        core.on_thread_start(&mut cpu0, a);
        core.on_thread_start(&mut cpu0, b);

        let now = cpu0.now();
        assert_eq!(core.on_timer_interrupt(&mut cpu0, None, now), Some(a));
        assert_eq!(core.on_timer_interrupt(&mut cpu1, None, now), Some(b));
        assert_eq!(core.record(a).unwrap().active_processor, Some(CpuId(0)));
        assert_eq!(core.record(b).unwrap().active_processor, Some(CpuId(1)));
        core.check_invariants();

        // cpu1 leaves; its thread goes to the hand-off lane for cpu0.
        core.on_processor_shutdown(&mut cpu1, Some(b));
        assert!(!core.is_online(CpuId(1)));
        assert_eq!(core.queued(QueueKind::RecentlyUnblocked).as_slice(), &[b]);
        assert_eq!(core.on_io_interrupt(&mut cpu0, Some(a)), Some(b));
        core.check_invariants();

        core.on_processor_start(&mut cpu1);
        assert!(core.is_online(CpuId(1)));
        assert_eq!(core.current_thread(CpuId(1)), None);
    }

    #[test]
    #[should_panic(expected = "running thread mismatch")]
    fn test_wrong_running_thread_is_fatal() {
        let mut core = core(1);
        let mut ctx = SimPlatform::new(CpuId::BSP);
        let t = core.spawn_thread().unwrap();
        core.on_thread_start(&mut ctx, t);
        core.on_thread_yield(&mut ctx, t);
    }

    #[test]
    #[should_panic(expected = "offline")]
    fn test_offline_cpu_is_fatal() {
        let mut core = core(1);
        let mut ctx = SimPlatform::new(CpuId::BSP);
        core.on_processor_shutdown(&mut ctx, None);
        core.on_io_interrupt(&mut ctx, None);
    }

    #[test]
    fn test_dispatch_routes_events() {
        let mut core = core(1);
        let mut ctx = SimPlatform::new(CpuId::BSP);
        let t = core.spawn_thread().unwrap();

        assert_eq!(core.dispatch(&mut ctx, SchedEvent::ThreadStart { tid: t }), None);
        let now = ctx.now();
        let next = core.dispatch(&mut ctx, SchedEvent::TimerInterrupt { running: None, now });
        assert_eq!(next, Some(t));
        let next = core.dispatch(
            &mut ctx,
            SchedEvent::ThreadBlocked {
                tid: t,
                deadline: Timestamp::MAX,
            },
        );
        assert_eq!(next, None);
        assert_eq!(core.queue_of(t), Some(QueueKind::Blocked));
        core.dispatch(&mut ctx, SchedEvent::ThreadUnblocked { tid: t });
        assert_eq!(core.wait_state(t), Some(WaitState::Signaled));
        core.check_invariants();
    }

    #[test]
    fn test_stopped_thread_can_be_reaped() {
        let mut core = SchedulerCore::new(
            RoundRobinScheduler::new(),
            SchedConfig::new().with_trace(TraceFlags::all()),
            1,
        )
        .unwrap();
        let mut ctx = SimPlatform::new(CpuId::BSP);
        let t = core.spawn_thread().unwrap();
        core.on_thread_start(&mut ctx, t);
        let now = ctx.now();
        core.on_timer_interrupt(&mut ctx, None, now);

        assert_eq!(core.reap_thread(t), Err(SchedError::NotStopped(t)));
        assert_eq!(core.on_thread_stop(&mut ctx, t), None);
        core.reap_thread(t).unwrap();
        assert_eq!(core.thread_state(t), None);
        core.check_invariants();
    }
}
