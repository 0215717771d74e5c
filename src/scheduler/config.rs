/*
 * Scheduler Configuration
 *
 * Runtime knobs for the dispatcher. Everything else (arena size, processor
 * count limit, SMP locking) is fixed at compile time.
 */

use core::time::Duration;

use bitflags::bitflags;

use super::types::SchedError;

bitflags! {
    /// Scheduler events emitted at trace level
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TraceFlags: u16 {
        const START     = 1 << 0;
        const BLOCK     = 1 << 1;
        const UNBLOCK   = 1 << 2;
        const YIELD     = 1 << 3;
        const STOP      = 1 << 4;
        const FREEZE    = 1 << 5;
        const TIMER     = 1 << 6;
        const IO        = 1 << 7;
        const PROCESSOR = 1 << 8;
    }
}

/// Default time slice when threads compete for a processor
pub const DEFAULT_QUANTUM: Duration = Duration::from_millis(10);

/// Timer interval when nothing is waiting to run (30 days)
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    /// Time slice before a contended processor is preempted
    pub quantum: Duration,

    /// Timer interval when the runnable queue is empty
    pub idle_interval: Duration,

    /// Events logged at trace level
    pub trace: TraceFlags,
}

impl SchedConfig {
    pub const fn new() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            trace: TraceFlags::empty(),
        }
    }

    pub const fn with_quantum(mut self, quantum: Duration) -> Self {
        self.quantum = quantum;
        self
    }

    pub const fn with_idle_interval(mut self, idle: Duration) -> Self {
        self.idle_interval = idle;
        self
    }

    pub const fn with_trace(mut self, trace: TraceFlags) -> Self {
        self.trace = trace;
        self
    }

    pub fn validate(&self) -> Result<(), SchedError> {
        if self.quantum.is_zero() {
            return Err(SchedError::InvalidConfig("quantum must be non-zero"));
        }
        if self.idle_interval < self.quantum {
            return Err(SchedError::InvalidConfig(
                "idle interval shorter than quantum",
            ));
        }
        Ok(())
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::new()
    }
}
