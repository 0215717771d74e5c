//! Property tests: random event streams against the dispatcher.
//!
//! Each generated `SchedOp` is turned into a scheduler call only when the
//! call's preconditions hold (the thread is running, the wait is pending,
//! the freeze count is non-zero, ...); otherwise it is skipped, the same way
//! a kernel would never issue it. After every applied operation the full
//! invariant check runs, plus the properties below.
//!
//! # Weighted Generation
//!
//! - Thread lifecycle (Start, Block, Unblock, Yield, Tick): weight 3
//! - Freeze/Thaw, I/O interrupts: weight 2
//! - Stop/Reap: weight 1
//! - Processor shutdown/start: weight 1

mod common;

use cluu_dispatch::{CpuId, QueueKind, ThreadId, ThreadState, Timestamp, WaitState};
use common::Machine;
use proptest::prelude::*;

const THREADS: usize = 6;
const CPUS: usize = 2;

/// Index into the harness's thread slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ThreadSel(usize);

/// Index of a processor in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuSel(usize);

#[derive(Debug, Clone)]
enum SchedOp {
    Start(ThreadSel),
    Block { cpu: CpuSel, after_ms: Option<u64> },
    Unblock(ThreadSel),
    Yield(CpuSel),
    Stop(CpuSel),
    Reap(ThreadSel),
    Freeze(ThreadSel),
    Thaw(ThreadSel),
    Tick { cpu: CpuSel, advance_ms: u64 },
    Io(CpuSel),
    Shutdown(CpuSel),
    Online(CpuSel),
}

fn arb_thread() -> impl Strategy<Value = ThreadSel> {
    (0..THREADS).prop_map(ThreadSel)
}

fn arb_cpu() -> impl Strategy<Value = CpuSel> {
    (0..CPUS).prop_map(CpuSel)
}

fn arb_op() -> impl Strategy<Value = SchedOp> {
    prop_oneof![
        3 => arb_thread().prop_map(SchedOp::Start),
        3 => (arb_cpu(), proptest::option::of(0u64..200))
            .prop_map(|(cpu, after_ms)| SchedOp::Block { cpu, after_ms }),
        3 => arb_thread().prop_map(SchedOp::Unblock),
        3 => arb_cpu().prop_map(SchedOp::Yield),
        1 => arb_cpu().prop_map(SchedOp::Stop),
        1 => arb_thread().prop_map(SchedOp::Reap),
        2 => arb_thread().prop_map(SchedOp::Freeze),
        2 => arb_thread().prop_map(SchedOp::Thaw),
        3 => (arb_cpu(), 0u64..30).prop_map(|(cpu, advance_ms)| SchedOp::Tick { cpu, advance_ms }),
        2 => arb_cpu().prop_map(SchedOp::Io),
        1 => arb_cpu().prop_map(SchedOp::Shutdown),
        1 => arb_cpu().prop_map(SchedOp::Online),
    ]
}

/// The dispatcher plus what the test expects of it
struct Harness {
    m: Machine,
    threads: Vec<ThreadId>,
    freeze: Vec<u32>,
}

impl Harness {
    fn new() -> Self {
        let m = Machine::new(CPUS);
        let threads = {
            let mut core = m.core();
            (0..THREADS).map(|_| core.spawn_thread().unwrap()).collect()
        };
        Self {
            m,
            threads,
            freeze: vec![0; THREADS],
        }
    }

    fn on(&mut self, cpu: CpuSel) -> Option<CpuId> {
        let cpu = CpuId(cpu.0 as u32);
        self.m.clock.set_cpu(cpu);
        self.m.core().is_online(cpu).then_some(cpu)
    }

    /// Act on any processor still in the pool
    fn any_online(&mut self) -> bool {
        let cpu = (0..CPUS as u32)
            .map(CpuId)
            .find(|&cpu| self.m.core().is_online(cpu));
        match cpu {
            Some(cpu) => {
                self.m.clock.set_cpu(cpu);
                true
            }
            None => false,
        }
    }

    fn running(&self, cpu: CpuId) -> Option<ThreadId> {
        self.m.core().current_thread(cpu)
    }

    fn apply(&mut self, op: &SchedOp) {
        match *op {
            SchedOp::Start(ThreadSel(i)) => {
                let tid = self.threads[i];
                let unstarted = self.m.core().thread_state(tid) == Some(ThreadState::Unstarted);
                if unstarted && self.any_online() {
                    self.m.lock.lock().on_thread_start(&mut self.m.clock, tid);
                }
            }
            SchedOp::Block { cpu, after_ms } => {
                let Some(cpu) = self.on(cpu) else { return };
                let Some(tid) = self.running(cpu) else { return };
                let deadline = match after_ms {
                    Some(ms) => self.m.later_ms(ms),
                    None => Timestamp::MAX,
                };
                self.m.block(tid, deadline);
            }
            SchedOp::Unblock(ThreadSel(i)) => {
                let tid = self.threads[i];
                let pending = self.m.core().wait_state(tid) == Some(WaitState::Pending);
                if pending && self.any_online() {
                    self.m.unblock(tid);
                }
            }
            SchedOp::Yield(cpu) => {
                let Some(cpu) = self.on(cpu) else { return };
                if let Some(tid) = self.running(cpu) {
                    self.m.yield_now(tid);
                }
            }
            SchedOp::Stop(cpu) => {
                let Some(cpu) = self.on(cpu) else { return };
                if let Some(tid) = self.running(cpu) {
                    self.m.stop(tid);
                }
            }
            SchedOp::Reap(ThreadSel(i)) => {
                let tid = self.threads[i];
                let mut core = self.m.core();
                if core.thread_state(tid) == Some(ThreadState::Stopped) {
                    core.reap_thread(tid).unwrap();
                    self.threads[i] = core.spawn_thread().unwrap();
                    self.freeze[i] = 0;
                }
            }
            SchedOp::Freeze(ThreadSel(i)) => {
                if !self.any_online() {
                    return;
                }
                self.m.freeze(self.threads[i]);
                self.freeze[i] += 1;
            }
            SchedOp::Thaw(ThreadSel(i)) => {
                if self.freeze[i] > 0 && self.any_online() {
                    self.m.thaw(self.threads[i]);
                    self.freeze[i] -= 1;
                }
            }
            SchedOp::Tick { cpu, advance_ms } => {
                let Some(cpu) = self.on(cpu) else { return };
                self.m.advance_ms(advance_ms);
                let running = self.running(cpu);
                let now = self.m.now();
                let mut core = self.m.lock.lock();
                core.on_timer_interrupt(&mut self.m.clock, running, now);
                assert!(
                    core.queued(QueueKind::RecentlyUnblocked).is_empty(),
                    "hand-off lane survived a timer interrupt"
                );
            }
            SchedOp::Io(cpu) => {
                let Some(cpu) = self.on(cpu) else { return };
                let running = self.running(cpu);
                self.m.io(running);
            }
            SchedOp::Shutdown(cpu) => {
                let Some(cpu) = self.on(cpu) else { return };
                let running = self.running(cpu);
                self.m
                    .lock
                    .lock()
                    .on_processor_shutdown(&mut self.m.clock, running);
            }
            SchedOp::Online(cpu) => {
                if self.on(cpu).is_none() {
                    self.m.lock.lock().on_processor_start(&mut self.m.clock);
                }
            }
        }
    }

    fn check(&self) {
        let core = self.m.core();
        core.check_invariants();

        for (i, &tid) in self.threads.iter().enumerate() {
            let rec = core.record(tid).unwrap();
            assert_eq!(rec.freeze_count, self.freeze[i], "{} freeze count drifted", tid);

            let schedulable = !matches!(rec.state, ThreadState::Unstarted | ThreadState::Stopped);
            if schedulable && rec.freeze_count > 0 && rec.active_processor.is_none() {
                assert_eq!(rec.queue(), Some(QueueKind::Frozen), "{} frozen but loose", tid);
            }
            if rec.queue() == Some(QueueKind::Frozen) {
                assert!(rec.freeze_count > 0, "{} parked with a zero count", tid);
            }
        }

        let mut seen = Vec::new();
        for kind in QueueKind::ALL {
            for tid in core.queued(kind) {
                assert!(!seen.contains(&tid), "{} on two queues", tid);
                seen.push(tid);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn test_random_events_keep_invariants(ops in proptest::collection::vec(arb_op(), 1..120)) {
        let mut h = Harness::new();
        for op in &ops {
            h.apply(op);
            h.check();
        }
    }

    #[test]
    fn test_freeze_thaw_is_idempotent(
        prefix in proptest::collection::vec(arb_op(), 0..40),
        victim in arb_thread(),
        depth in 1u32..5,
    ) {
        let mut h = Harness::new();
        for op in &prefix {
            h.apply(op);
        }

        let tid = h.threads[victim.0];
        let before = {
            let core = h.m.core();
            let rec = core.record(tid).unwrap();
            (rec.queue(), rec.wait, rec.active_processor, rec.freeze_count)
        };
        // A thread that is already frozen stays frozen; a running one is
        // untouched because the freeze never gets a chance to take effect.
        for _ in 0..depth {
            h.apply(&SchedOp::Freeze(victim));
        }
        for _ in 0..depth {
            h.apply(&SchedOp::Thaw(victim));
        }
        h.check();

        let core = h.m.core();
        let rec = core.record(tid).unwrap();
        prop_assert_eq!(rec.freeze_count, before.3);
        prop_assert_eq!(rec.wait, before.1);
        prop_assert_eq!(rec.active_processor, before.2);
        // Runnable threads come back through the runnable queue, whichever
        // lane they were taken from.
        let expected = match before.0 {
            Some(QueueKind::RecentlyUnblocked) if before.3 == 0 => Some(QueueKind::Runnable),
            other => other,
        };
        prop_assert_eq!(rec.queue(), expected);
    }
}
