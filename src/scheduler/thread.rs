/*
 * Thread Scheduling Records
 *
 * This module defines the per-thread scheduling record and the fixed-size
 * arena that stores them.
 *
 * The thread subsystem owns everything else about a thread (stack, register
 * context, process membership). The scheduler only needs the fields below,
 * so they live in their own table indexed by a generational ThreadId:
 *
 * - slots are pre-allocated (heapless::Vec, MAX_THREADS entries), so no
 *   scheduler path ever allocates
 * - a reaped slot bumps its generation, so a stale ThreadId held somewhere
 *   in the kernel is caught instead of silently naming a new thread
 * - each record embeds its ScheduleEntry, the intrusive node that links it
 *   into exactly one scheduler queue
 */

use core::fmt;

use heapless::Vec;

use super::{
    MAX_THREADS,
    queue::{QueueKind, ScheduleEntry},
    types::{CpuId, SchedError, ThreadState, Timestamp, WaitState},
};

/// Thread identifier
///
/// Generational handle into the ThreadTable. `index` selects the slot,
/// `generation` must match the slot's current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId {
    index: u16,
    generation: u16,
}

impl ThreadId {
    pub(crate) const fn new(index: u16, generation: u16) -> Self {
        Self { index, generation }
    }

    /// Slot index in the thread table
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u16 {
        self.generation
    }

    pub(crate) fn slot(self) -> u16 {
        self.index
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread({}.{})", self.index, self.generation)
    }
}

/// Scheduler-owned fields of one thread
#[derive(Debug, Clone)]
pub struct ThreadRecord {
    pub state: ThreadState,

    /// Wake deadline; meaningful only while a wait is pending
    pub blocked_until: Timestamp,

    /// Non-zero means the thread must not be scheduled
    pub freeze_count: u32,

    pub wait: WaitState,

    /// Processor currently executing the thread
    pub active_processor: Option<CpuId>,

    pub(crate) entry: ScheduleEntry,
}

impl ThreadRecord {
    fn new() -> Self {
        Self {
            state: ThreadState::Unstarted,
            blocked_until: Timestamp::MAX,
            freeze_count: 0,
            wait: WaitState::None,
            active_processor: None,
            entry: ScheduleEntry::detached(),
        }
    }

    /// Queue currently holding this thread, if any
    pub fn queue(&self) -> Option<QueueKind> {
        self.entry.queue
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze_count > 0
    }

    pub fn is_executing(&self) -> bool {
        self.active_processor.is_some()
    }
}

struct Slot {
    generation: u16,
    occupied: bool,
    record: ThreadRecord,
}

/// Fixed-capacity arena of thread records
pub struct ThreadTable {
    slots: Vec<Slot, MAX_THREADS>,
    free: Vec<u16, MAX_THREADS>,
    live: usize,
}

impl ThreadTable {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Register a new thread
    ///
    /// Called by the thread subsystem when it creates a thread object.
    /// The record starts Unstarted and in no queue.
    pub fn spawn(&mut self) -> Result<ThreadId, SchedError> {
        let tid = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.occupied = true;
            slot.record = ThreadRecord::new();
            ThreadId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u16;
            self.slots
                .push(Slot {
                    generation: 0,
                    occupied: true,
                    record: ThreadRecord::new(),
                })
                .map_err(|_| SchedError::TableFull)?;
            ThreadId::new(index, 0)
        };

        self.live += 1;
        Ok(tid)
    }

    /// Release a stopped thread's slot for reuse
    pub fn reap(&mut self, tid: ThreadId) -> Result<(), SchedError> {
        let state = self.get(tid).ok_or(SchedError::StaleThread(tid))?.state;
        if !matches!(state, ThreadState::Stopped | ThreadState::Unstarted) {
            return Err(SchedError::NotStopped(tid));
        }

        let slot = &mut self.slots[tid.index()];
        debug_assert!(slot.record.entry.queue.is_none());
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        // Capacity equals slot capacity, so this cannot overflow.
        let _ = self.free.push(tid.slot());
        self.live -= 1;
        Ok(())
    }

    pub fn get(&self, tid: ThreadId) -> Option<&ThreadRecord> {
        self.slots
            .get(tid.index())
            .filter(|s| s.occupied && s.generation == tid.generation)
            .map(|s| &s.record)
    }

    pub fn get_mut(&mut self, tid: ThreadId) -> Option<&mut ThreadRecord> {
        self.slots
            .get_mut(tid.index())
            .filter(|s| s.occupied && s.generation == tid.generation)
            .map(|s| &mut s.record)
    }

    /// Record lookup inside a scheduler handler; a stale handle is fatal
    pub fn record(&self, tid: ThreadId) -> &ThreadRecord {
        match self.get(tid) {
            Some(r) => r,
            None => stale(tid),
        }
    }

    pub fn record_mut(&mut self, tid: ThreadId) -> &mut ThreadRecord {
        if self.get(tid).is_none() {
            stale(tid);
        }
        &mut self.slots[tid.index()].record
    }

    /// Number of registered threads
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate over live threads
    pub fn iter(&self) -> impl Iterator<Item = (ThreadId, &ThreadRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.occupied)
            .map(|(i, s)| (ThreadId::new(i as u16, s.generation), &s.record))
    }

    // Raw slot access for queue links, which store bare indices.

    pub(crate) fn id_at(&self, index: u16) -> ThreadId {
        ThreadId::new(index, self.slots[index as usize].generation)
    }

    pub(crate) fn entry(&self, index: u16) -> &ScheduleEntry {
        &self.slots[index as usize].record.entry
    }

    pub(crate) fn entry_mut(&mut self, index: u16) -> &mut ScheduleEntry {
        &mut self.slots[index as usize].record.entry
    }

    pub(crate) fn record_at(&self, index: u16) -> &ThreadRecord {
        &self.slots[index as usize].record
    }
}

impl Default for ThreadTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ThreadTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadTable")
            .field("live", &self.live)
            .field("capacity", &MAX_THREADS)
            .finish()
    }
}

#[cold]
fn stale(tid: ThreadId) -> ! {
    log::error!("scheduler handed stale handle {}", tid);
    panic!("stale thread handle {}", tid);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_starts_unstarted() {
        let mut table = ThreadTable::new();
        let tid = table.spawn().unwrap();
        let rec = table.record(tid);
        assert_eq!(rec.state, ThreadState::Unstarted);
        assert_eq!(rec.freeze_count, 0);
        assert_eq!(rec.queue(), None);
        assert!(!rec.is_executing());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_reap_bumps_generation() {
        let mut table = ThreadTable::new();
        let a = table.spawn().unwrap();
        table.record_mut(a).state = ThreadState::Stopped;
        table.reap(a).unwrap();
        assert!(table.get(a).is_none());

        let b = table.spawn().unwrap();
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(table.get(b).is_some());
        assert_eq!(table.reap(a), Err(SchedError::StaleThread(a)));
    }

    #[test]
    fn test_reap_rejects_live_thread() {
        let mut table = ThreadTable::new();
        let tid = table.spawn().unwrap();
        table.record_mut(tid).state = ThreadState::Runnable;
        assert_eq!(table.reap(tid), Err(SchedError::NotStopped(tid)));
    }

    #[test]
    fn test_table_full() {
        let mut table = ThreadTable::new();
        for _ in 0..MAX_THREADS {
            table.spawn().unwrap();
        }
        assert_eq!(table.spawn(), Err(SchedError::TableFull));
        assert_eq!(table.iter().count(), MAX_THREADS);
    }

    #[test]
    #[should_panic(expected = "stale thread handle")]
    fn test_stale_record_is_fatal() {
        let mut table = ThreadTable::new();
        let tid = table.spawn().unwrap();
        table.reap(tid).unwrap();
        let _ = table.record(tid);
    }
}
