/*
 * Scheduler Event Definitions
 *
 * One variant per scheduler entry point. The SchedulerCore handlers are the
 * primary API; SchedEvent lets the same transitions be driven from a
 * recorded or generated event stream (replay, simulation, property tests)
 * and gives each event a name and trace bit for logging.
 */

use super::{
    config::TraceFlags,
    thread::ThreadId,
    types::{CpuId, Timestamp},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedEvent {
    /// A newly created thread becomes eligible to run
    ThreadStart { tid: ThreadId },

    /// The running thread waits until `deadline` (`Timestamp::MAX` = forever)
    ThreadBlocked { tid: ThreadId, deadline: Timestamp },

    /// A waiting thread's condition was satisfied
    ThreadUnblocked { tid: ThreadId },

    /// The running thread gives up the rest of its turn
    ThreadYield { tid: ThreadId },

    /// The running thread terminates
    ThreadStop { tid: ThreadId },

    /// Debug suspend requested
    FreezeIncrement { tid: ThreadId },

    /// Debug suspend released
    FreezeDecrement { tid: ThreadId },

    /// The armed timer deadline elapsed
    TimerInterrupt {
        running: Option<ThreadId>,
        now: Timestamp,
    },

    /// A device interrupt fired
    IoInterrupt { running: Option<ThreadId> },

    /// A processor leaves the scheduling pool
    ProcessorShutdown { running: Option<ThreadId> },

    /// A processor joins (or rejoins) the scheduling pool
    ProcessorStart { cpu: CpuId },
}

impl SchedEvent {
    /// Get a short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            SchedEvent::ThreadStart { .. } => "ThreadStart",
            SchedEvent::ThreadBlocked { .. } => "ThreadBlocked",
            SchedEvent::ThreadUnblocked { .. } => "ThreadUnblocked",
            SchedEvent::ThreadYield { .. } => "ThreadYield",
            SchedEvent::ThreadStop { .. } => "ThreadStop",
            SchedEvent::FreezeIncrement { .. } => "FreezeIncrement",
            SchedEvent::FreezeDecrement { .. } => "FreezeDecrement",
            SchedEvent::TimerInterrupt { .. } => "TimerInterrupt",
            SchedEvent::IoInterrupt { .. } => "IoInterrupt",
            SchedEvent::ProcessorShutdown { .. } => "ProcessorShutdown",
            SchedEvent::ProcessorStart { .. } => "ProcessorStart",
        }
    }

    /// Trace bit that enables logging of this event
    pub fn trace_flag(&self) -> TraceFlags {
        match self {
            SchedEvent::ThreadStart { .. } => TraceFlags::START,
            SchedEvent::ThreadBlocked { .. } => TraceFlags::BLOCK,
            SchedEvent::ThreadUnblocked { .. } => TraceFlags::UNBLOCK,
            SchedEvent::ThreadYield { .. } => TraceFlags::YIELD,
            SchedEvent::ThreadStop { .. } => TraceFlags::STOP,
            SchedEvent::FreezeIncrement { .. } | SchedEvent::FreezeDecrement { .. } => {
                TraceFlags::FREEZE
            }
            SchedEvent::TimerInterrupt { .. } => TraceFlags::TIMER,
            SchedEvent::IoInterrupt { .. } => TraceFlags::IO,
            SchedEvent::ProcessorShutdown { .. } | SchedEvent::ProcessorStart { .. } => {
                TraceFlags::PROCESSOR
            }
        }
    }
}
