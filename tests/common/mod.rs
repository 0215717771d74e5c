//! Shared harness: a dispatch lock over the round-robin policy, driven by a
//! simulated clock from the outside the way a kernel would drive it.

#![allow(dead_code)]

use core::time::Duration;

use cluu_dispatch::arch::sim::{SimPlatform, SoftInterrupts};
use cluu_dispatch::{
    CpuId, DispatchGuard, DispatchLock, RoundRobinScheduler, SchedConfig, ThreadId, Timestamp,
};

pub type Lock = DispatchLock<RoundRobinScheduler, SoftInterrupts>;

pub struct Machine {
    pub lock: Lock,
    pub clock: SimPlatform,
}

impl Machine {
    pub fn new(cpus: usize) -> Self {
        Self::with_config(cpus, SchedConfig::default())
    }

    pub fn with_config(cpus: usize, config: SchedConfig) -> Self {
        Self {
            lock: DispatchLock::new(
                RoundRobinScheduler::new(),
                config,
                cpus,
                SoftInterrupts::new(),
            )
            .unwrap(),
            clock: SimPlatform::new(CpuId::BSP),
        }
    }

    pub fn core(&self) -> DispatchGuard<'_, RoundRobinScheduler, SoftInterrupts> {
        self.lock.lock()
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn advance_ms(&mut self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }

    pub fn later_ms(&self, ms: u64) -> Timestamp {
        self.now().saturating_add(Duration::from_millis(ms))
    }

    /// Create and start a thread
    pub fn start(&mut self) -> ThreadId {
        let mut core = self.lock.lock();
        let tid = core.spawn_thread().unwrap();
        core.on_thread_start(&mut self.clock, tid);
        tid
    }

    /// Fire the timer on the boot processor
    pub fn tick(&mut self) -> Option<ThreadId> {
        let mut core = self.lock.lock();
        let running = core.current_thread(CpuId::BSP);
        let now = self.clock.now();
        core.on_timer_interrupt(&mut self.clock, running, now)
    }

    pub fn block(&mut self, tid: ThreadId, deadline: Timestamp) -> Option<ThreadId> {
        self.lock
            .lock()
            .on_thread_blocked(&mut self.clock, tid, deadline)
    }

    pub fn unblock(&mut self, tid: ThreadId) {
        self.lock.lock().on_thread_unblocked(&mut self.clock, tid);
    }

    pub fn yield_now(&mut self, tid: ThreadId) -> Option<ThreadId> {
        self.lock.lock().on_thread_yield(&mut self.clock, tid)
    }

    pub fn stop(&mut self, tid: ThreadId) -> Option<ThreadId> {
        self.lock.lock().on_thread_stop(&mut self.clock, tid)
    }

    pub fn freeze(&mut self, tid: ThreadId) {
        self.lock.lock().on_freeze_increment(&mut self.clock, tid);
    }

    pub fn thaw(&mut self, tid: ThreadId) {
        self.lock.lock().on_freeze_decrement(&mut self.clock, tid);
    }

    pub fn io(&mut self, running: Option<ThreadId>) -> Option<ThreadId> {
        self.lock.lock().on_io_interrupt(&mut self.clock, running)
    }

    pub fn running(&self) -> Option<ThreadId> {
        self.lock.lock().current_thread(CpuId::BSP)
    }

    pub fn check(&self) {
        self.lock.lock().check_invariants();
    }
}
