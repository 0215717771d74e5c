/*
 * Scheduler Type Definitions
 *
 * This module defines the core types used throughout the scheduler subsystem.
 * These types are designed to be lightweight, Copy-able, and suitable for
 * use in both policy and mechanism layers.
 */

use core::fmt;
use core::time::Duration;

use super::thread::ThreadId;

/// CPU identifier
///
/// Represents a logical processor. Indexes the per-CPU state held by the
/// scheduler core.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuId(pub u32);

impl CpuId {
    /// Bootstrap processor (CPU 0)
    pub const BSP: CpuId = CpuId(0);

    /// Get the CPU ID as a usize for indexing
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

/// Monotonic timestamp in nanoseconds since boot
///
/// Supplied by the platform clock. `Timestamp::MAX` doubles as the
/// "wait forever" deadline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Earliest representable instant
    pub const MIN: Timestamp = Timestamp(0);

    /// Latest representable instant; used as "block until explicitly woken"
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    pub const fn from_nanos(nanos: u64) -> Self {
        Timestamp(nanos)
    }

    pub const fn from_millis(ms: u64) -> Self {
        Timestamp(ms.saturating_mul(1_000_000))
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn is_forever(self) -> bool {
        self == Timestamp::MAX
    }

    /// Add a duration, clamping at `Timestamp::MAX`
    pub fn saturating_add(self, d: Duration) -> Timestamp {
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(nanos))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_forever() {
            write!(f, "forever")
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}

/// Scheduling state of a thread
///
/// Always consistent with which queue (if any) holds the thread's schedule
/// entry; the transition functions update both together.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ThreadState {
    /// Registered but never started
    Unstarted,
    /// Queued on the recently-unblocked or runnable queue
    Runnable,
    /// Executing on a processor (in no queue)
    Running,
    /// Waiting in the blocked queue
    Blocked,
    /// Parked in the frozen queue
    Frozen,
    /// Terminated; never scheduled again
    Stopped,
}

/// Outcome of the thread's most recent wait
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum WaitState {
    /// No wait has been started
    #[default]
    None,
    /// Waiting; resolved by an unblock or by the deadline elapsing
    Pending,
    /// Woken explicitly by an unblock
    Signaled,
    /// Deadline elapsed before anyone woke the thread
    TimedOut,
}

impl WaitState {
    pub fn is_pending(self) -> bool {
        self == WaitState::Pending
    }

    /// True when the wait was resolved by its deadline
    pub fn failed(self) -> bool {
        self == WaitState::TimedOut
    }
}

/// Errors reported to the thread subsystem
///
/// Everything inside the scheduler handlers is a fatal assertion; these are
/// the only conditions a caller is expected to handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// The thread arena has no free slot
    TableFull,
    /// Thread handle refers to a reaped (or never allocated) slot
    StaleThread(ThreadId),
    /// Only stopped threads can be reaped
    NotStopped(ThreadId),
    /// Configuration rejected by `SchedConfig::validate`
    InvalidConfig(&'static str),
    /// Processor index beyond the configured processor count
    CpuOutOfRange(CpuId),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::TableFull => write!(f, "Thread table full"),
            SchedError::StaleThread(tid) => write!(f, "Stale thread handle {}", tid),
            SchedError::NotStopped(tid) => write!(f, "{} has not stopped", tid),
            SchedError::InvalidConfig(why) => write!(f, "Invalid scheduler config: {}", why),
            SchedError::CpuOutOfRange(cpu) => write!(f, "{} out of range", cpu),
        }
    }
}
