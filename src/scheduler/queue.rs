/*
 * Scheduler Thread Queues
 *
 * Index-linked doubly linked lists over the thread table.
 *
 * Every ThreadRecord embeds one ScheduleEntry with prev/next slot indices
 * and a back-pointer naming the queue that holds it. A queue is just a
 * head/tail pair plus its kind, so:
 *
 * - enqueue, dequeue and remove-from-middle are O(1)
 * - sorted insert (blocked queue) is a linear scan for the first later deadline
 * - nothing allocates; the nodes already exist inside the thread table
 * - an entry can be in at most one queue, checked on every insert
 */

use core::fmt;

use super::thread::{ThreadId, ThreadTable};

/// Which scheduler queue holds an entry
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Threads made runnable during the current quantum; drained first
    RecentlyUnblocked,
    /// All other runnable threads, round-robin order
    Runnable,
    /// Waiting threads, ascending by deadline
    Blocked,
    /// Threads with a non-zero freeze count
    Frozen,
}

impl QueueKind {
    pub const ALL: [QueueKind; 4] = [
        QueueKind::RecentlyUnblocked,
        QueueKind::Runnable,
        QueueKind::Blocked,
        QueueKind::Frozen,
    ];
}

/// Intrusive queue node embedded in each thread record
///
/// `prev`/`next` are meaningful only while `queue` is set; removal clears
/// all three.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub(crate) prev: Option<u16>,
    pub(crate) next: Option<u16>,
    pub(crate) queue: Option<QueueKind>,
}

impl ScheduleEntry {
    pub(crate) const fn detached() -> Self {
        Self {
            prev: None,
            next: None,
            queue: None,
        }
    }
}

/// An ordered sequence of schedule entries
pub struct ThreadQueue {
    kind: QueueKind,
    head: Option<u16>,
    tail: Option<u16>,
    len: usize,
}

impl ThreadQueue {
    pub const fn new(kind: QueueKind) -> Self {
        Self {
            kind,
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn peek_head(&self, threads: &ThreadTable) -> Option<ThreadId> {
        self.head.map(|i| threads.id_at(i))
    }

    /// Append at the tail
    pub fn enqueue_tail(&mut self, threads: &mut ThreadTable, tid: ThreadId) {
        self.claim(threads, tid);
        let index = tid.slot();

        {
            let entry = threads.entry_mut(index);
            entry.prev = self.tail;
            entry.next = None;
        }
        match self.tail {
            Some(t) => threads.entry_mut(t).next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
    }

    /// Pop the head entry
    pub fn dequeue_head(&mut self, threads: &mut ThreadTable) -> Option<ThreadId> {
        let tid = self.peek_head(threads)?;
        self.unlink(threads, tid.slot());
        Some(tid)
    }

    /// Remove an entry from anywhere in the queue
    pub fn remove(&mut self, threads: &mut ThreadTable, tid: ThreadId) {
        let owner = threads.record(tid).entry.queue;
        if owner != Some(self.kind) {
            log::error!("{} expected on {:?}, found on {:?}", tid, self.kind, owner);
            panic!("{} is not on the {:?} queue", tid, self.kind);
        }
        self.unlink(threads, tid.slot());
    }

    /// Link `tid` immediately before `target`, which must be on this queue
    pub fn insert_before(&mut self, threads: &mut ThreadTable, target: ThreadId, tid: ThreadId) {
        assert_eq!(
            threads.record(target).entry.queue,
            Some(self.kind),
            "insert_before target {} is not on the {:?} queue",
            target,
            self.kind
        );
        self.claim(threads, tid);

        let index = tid.slot();
        let at = target.slot();
        let before = threads.entry(at).prev;

        {
            let entry = threads.entry_mut(index);
            entry.prev = before;
            entry.next = Some(at);
        }
        threads.entry_mut(at).prev = Some(index);
        match before {
            Some(p) => threads.entry_mut(p).next = Some(index),
            None => self.head = Some(index),
        }
        self.len += 1;
    }

    /// Insert keeping the queue ascending by `blocked_until`
    ///
    /// Entries with equal deadlines keep insertion order: the new entry goes
    /// before the first strictly later one.
    pub fn insert_by_deadline(&mut self, threads: &mut ThreadTable, tid: ThreadId) {
        let deadline = threads.record(tid).blocked_until;

        let mut cursor = self.head;
        while let Some(i) = cursor {
            if threads.record_at(i).blocked_until > deadline {
                let target = threads.id_at(i);
                self.insert_before(threads, target, tid);
                return;
            }
            cursor = threads.entry(i).next;
        }
        self.enqueue_tail(threads, tid);
    }

    /// Walk the queue head to tail
    pub fn iter<'a>(&self, threads: &'a ThreadTable) -> QueueIter<'a> {
        QueueIter {
            threads,
            cursor: self.head,
        }
    }

    fn claim(&self, threads: &mut ThreadTable, tid: ThreadId) {
        let entry = &mut threads.record_mut(tid).entry;
        if let Some(owner) = entry.queue {
            log::error!("{} already on {:?}, cannot join {:?}", tid, owner, self.kind);
            panic!("{} is already enqueued on {:?}", tid, owner);
        }
        entry.queue = Some(self.kind);
    }

    fn unlink(&mut self, threads: &mut ThreadTable, index: u16) {
        let ScheduleEntry { prev, next, .. } = *threads.entry(index);

        match prev {
            Some(p) => threads.entry_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => threads.entry_mut(n).prev = prev,
            None => self.tail = prev,
        }

        *threads.entry_mut(index) = ScheduleEntry::detached();
        self.len -= 1;
    }

    /// Check link consistency against the thread table
    ///
    /// Returns the number of entries walked. Panics on a broken link.
    pub(crate) fn verify(&self, threads: &ThreadTable) -> usize {
        let mut count = 0;
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(i) = cursor {
            let entry = threads.entry(i);
            assert_eq!(entry.queue, Some(self.kind), "slot {} linked into wrong queue", i);
            assert_eq!(entry.prev, prev, "slot {} has a broken prev link", i);
            count += 1;
            assert!(count <= self.len, "{:?} queue longer than its length", self.kind);
            prev = cursor;
            cursor = entry.next;
        }
        assert_eq!(self.tail, prev, "{:?} queue tail out of sync", self.kind);
        assert_eq!(count, self.len, "{:?} queue length out of sync", self.kind);
        count
    }
}

impl fmt::Debug for ThreadQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadQueue")
            .field("kind", &self.kind)
            .field("len", &self.len)
            .finish()
    }
}

pub struct QueueIter<'a> {
    threads: &'a ThreadTable,
    cursor: Option<u16>,
}

impl Iterator for QueueIter<'_> {
    type Item = ThreadId;

    fn next(&mut self) -> Option<ThreadId> {
        let i = self.cursor?;
        self.cursor = self.threads.entry(i).next;
        Some(self.threads.id_at(i))
    }
}
