//! Threads and the cooperative scheduler.
//!
//! All fibers run on one host thread. The scheduler owns a FIFO runnable
//! queue, a wake-time min-heap of sleepers, and a per-handle table of blocked
//! threads; the interpreter drives it tick by tick. A single `step()` is
//! indivisible, so every scheduler boundary is a state-tree node boundary and
//! snapshots never observe a torn state.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use crate::host::HostHandle;
use crate::interpreter::step::{Abrupt, StateFrame};
use crate::prelude::FxHashMap;
use crate::value::Value;

/// Thread identifier, unique for the life of an interpreter (and across
/// snapshot round-trips).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Runnable,
    Sleeping,
    Blocked,
    Done,
}

impl ThreadStatus {
    pub fn name(self) -> &'static str {
        match self {
            ThreadStatus::Runnable => "runnable",
            ThreadStatus::Sleeping => "sleeping",
            ThreadStatus::Blocked => "blocked",
            ThreadStatus::Done => "done",
        }
    }
}

/// What a blocked thread is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocker {
    Io(HostHandle),
}

/// One cooperative fiber: its suspended continuation plus scheduling state.
#[derive(Debug)]
pub struct Thread {
    pub id: ThreadId,
    pub status: ThreadStatus,
    /// Monotonic ms at which a sleeping thread becomes runnable.
    pub wake_at: Option<f64>,
    pub blocker: Option<Blocker>,
    /// The state tree, root first; the top of the stack is the state being
    /// stepped.
    pub frames: Vec<StateFrame>,
    /// In-flight abrupt completion being threaded up the state tree.
    pub pending: Option<Abrupt>,
    /// Completion value: the last expression-statement value.
    pub result: Value,
    /// Kill requested; honored at the thread's next scheduling point.
    pub killed: bool,
}

impl Thread {
    pub fn new(id: ThreadId, frames: Vec<StateFrame>) -> Self {
        Self {
            id,
            status: ThreadStatus::Runnable,
            wake_at: None,
            blocker: None,
            frames,
            pending: None,
            result: Value::Undefined,
            killed: false,
        }
    }

    pub fn stack_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_done(&self) -> bool {
        self.status == ThreadStatus::Done
    }
}

/// Wake-heap entry ordered by time then id, so equal deadlines pop in spawn
/// order.
#[derive(Debug, PartialEq)]
struct Sleeper {
    wake_at: f64,
    id: ThreadId,
}

impl Eq for Sleeper {}

impl PartialOrd for Sleeper {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sleeper {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.wake_at
            .total_cmp(&other.wake_at)
            .then(self.id.cmp(&other.id))
    }
}

/// The fiber scheduler. Passive: the interpreter pops a thread, steps it,
/// and parks it back according to the outcome.
#[derive(Debug, Default)]
pub struct Scheduler {
    threads: FxHashMap<u64, Thread>,
    runnable: VecDeque<ThreadId>,
    sleeping: BinaryHeap<Reverse<Sleeper>>,
    blocked: FxHashMap<HostHandle, Vec<ThreadId>>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new runnable thread built from `frames`.
    pub fn add_thread(&mut self, frames: Vec<StateFrame>) -> ThreadId {
        let id = ThreadId(self.next_id);
        self.next_id += 1;
        self.threads.insert(id.0, Thread::new(id, frames));
        self.runnable.push_back(id);
        log::debug!("thread {} spawned", id.0);
        id
    }

    /// Re-insert a thread restored from a snapshot, preserving its recorded
    /// id and status. Queue membership is rebuilt by `requeue_restored`.
    pub fn restore_thread(&mut self, thread: Thread) {
        self.next_id = self.next_id.max(thread.id.0 + 1);
        self.threads.insert(thread.id.0, thread);
    }

    /// Rebuild the runnable/sleeping/blocked queues from thread statuses,
    /// with runnable threads enqueued in the order given.
    pub fn requeue_restored(&mut self, runnable_order: &[ThreadId]) {
        self.runnable.clear();
        self.sleeping.clear();
        self.blocked.clear();
        for &id in runnable_order {
            if let Some(t) = self.threads.get(&id.0) {
                if t.status == ThreadStatus::Runnable {
                    self.runnable.push_back(id);
                }
            }
        }
        let mut parked: Vec<(ThreadId, ThreadStatus, Option<f64>, Option<Blocker>)> = self
            .threads
            .values()
            .map(|t| (t.id, t.status, t.wake_at, t.blocker))
            .collect();
        parked.sort_by_key(|(id, ..)| *id);
        for (id, status, wake_at, blocker) in parked {
            match status {
                ThreadStatus::Sleeping => {
                    let wake_at = wake_at.unwrap_or(0.0);
                    self.sleeping.push(Reverse(Sleeper { wake_at, id }));
                }
                ThreadStatus::Blocked => {
                    if let Some(Blocker::Io(handle)) = blocker {
                        self.blocked.entry(handle).or_default().push(id);
                    }
                }
                _ => {}
            }
        }
    }

    pub fn get(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(&id.0)
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.get_mut(&id.0)
    }

    /// Threads in id (creation) order, so snapshot traversal is stable.
    pub fn threads(&self) -> Vec<&Thread> {
        let mut all: Vec<&Thread> = self.threads.values().collect();
        all.sort_by_key(|t| t.id);
        all
    }

    /// Runnable queue contents, front first.
    pub fn runnable_order(&self) -> Vec<ThreadId> {
        self.runnable.iter().copied().collect()
    }

    pub fn has_runnable(&self) -> bool {
        !self.runnable.is_empty()
    }

    /// Whether any thread could still make progress (now or later).
    pub fn has_live_threads(&self) -> bool {
        self.threads.values().any(|t| !t.is_done())
    }

    /// Earliest wake deadline among sleepers, if any.
    pub fn next_wake(&self) -> Option<f64> {
        self.sleeping.peek().map(|Reverse(s)| s.wake_at)
    }

    /// Take the next runnable thread out for stepping. The caller must hand
    /// it back through one of the park/requeue calls (or drop it as done).
    pub fn take_next_runnable(&mut self) -> Option<Thread> {
        while let Some(id) = self.runnable.pop_front() {
            if let Some(t) = self.threads.remove(&id.0) {
                return Some(t);
            }
        }
        None
    }

    fn put_back(&mut self, thread: Thread) {
        self.threads.insert(thread.id.0, thread);
    }

    /// Return a thread to the back of the runnable queue.
    pub fn requeue(&mut self, thread: Thread) {
        let id = thread.id;
        self.put_back(thread);
        self.runnable.push_back(id);
    }

    /// Park a thread until `wake_at`.
    pub fn park_sleeping(&mut self, mut thread: Thread, wake_at: f64) {
        thread.status = ThreadStatus::Sleeping;
        thread.wake_at = Some(wake_at);
        thread.blocker = None;
        let id = thread.id;
        self.put_back(thread);
        self.sleeping.push(Reverse(Sleeper { wake_at, id }));
    }

    /// Park a thread until the host reports `handle` ready.
    pub fn park_blocked(&mut self, mut thread: Thread, handle: HostHandle) {
        thread.status = ThreadStatus::Blocked;
        thread.wake_at = None;
        thread.blocker = Some(Blocker::Io(handle));
        let id = thread.id;
        self.put_back(thread);
        self.blocked.entry(handle).or_default().push(id);
    }

    /// Retire a finished thread.
    pub fn finish(&mut self, mut thread: Thread) {
        thread.status = ThreadStatus::Done;
        thread.frames.clear();
        thread.pending = None;
        thread.wake_at = None;
        thread.blocker = None;
        log::debug!("thread {} done", thread.id.0);
        self.put_back(thread);
    }

    /// Promote sleepers whose deadline has passed. Called at tick boundaries.
    pub fn wake_sleepers(&mut self, now: f64) {
        while let Some(Reverse(s)) = self.sleeping.peek() {
            if s.wake_at > now {
                break;
            }
            let Some(Reverse(s)) = self.sleeping.pop() else { break };
            if let Some(t) = self.threads.get_mut(&s.id.0) {
                if t.status == ThreadStatus::Sleeping {
                    t.status = ThreadStatus::Runnable;
                    t.wake_at = None;
                    self.runnable.push_back(s.id);
                }
            }
        }
    }

    /// Unblock every thread waiting on `handle`, in blocking order.
    pub fn io_ready(&mut self, handle: HostHandle) {
        let Some(waiters) = self.blocked.remove(&handle) else {
            return;
        };
        for id in waiters {
            if let Some(t) = self.threads.get_mut(&id.0) {
                if t.status == ThreadStatus::Blocked {
                    t.status = ThreadStatus::Runnable;
                    t.blocker = None;
                    self.runnable.push_back(id);
                }
            }
        }
    }

    /// Request a kill. The thread's state tree is discarded the next time the
    /// scheduler touches it; finally blocks do not run (checkpoint restores
    /// stay simple that way). Parked threads are retired immediately since
    /// they hold no step in progress.
    pub fn kill(&mut self, id: ThreadId) {
        let Some(t) = self.threads.get_mut(&id.0) else {
            return;
        };
        match t.status {
            ThreadStatus::Done => {}
            ThreadStatus::Runnable => {
                t.killed = true;
            }
            ThreadStatus::Sleeping | ThreadStatus::Blocked => {
                t.killed = true;
                t.status = ThreadStatus::Done;
                t.frames.clear();
                t.pending = None;
                t.wake_at = None;
                t.blocker = None;
                log::warn!("thread {} killed while parked", id.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(sched: &mut Scheduler) -> ThreadId {
        sched.add_thread(Vec::new())
    }

    #[test]
    fn round_robin_order() {
        let mut sched = Scheduler::new();
        let a = spawn(&mut sched);
        let b = spawn(&mut sched);
        let t = sched.take_next_runnable().unwrap();
        assert_eq!(t.id, a);
        sched.requeue(t);
        let t = sched.take_next_runnable().unwrap();
        assert_eq!(t.id, b);
        sched.requeue(t);
        let t = sched.take_next_runnable().unwrap();
        assert_eq!(t.id, a);
        sched.requeue(t);
    }

    #[test]
    fn sleepers_wake_in_deadline_order() {
        let mut sched = Scheduler::new();
        let a = spawn(&mut sched);
        let b = spawn(&mut sched);
        let ta = sched.take_next_runnable().unwrap();
        sched.park_sleeping(ta, 20.0);
        let tb = sched.take_next_runnable().unwrap();
        sched.park_sleeping(tb, 10.0);

        sched.wake_sleepers(5.0);
        assert!(!sched.has_runnable());
        sched.wake_sleepers(15.0);
        assert_eq!(sched.runnable_order(), vec![b]);
        sched.wake_sleepers(25.0);
        assert_eq!(sched.runnable_order(), vec![b, a]);
    }

    #[test]
    fn io_unblocks_in_block_order() {
        let mut sched = Scheduler::new();
        let a = spawn(&mut sched);
        let b = spawn(&mut sched);
        let handle = HostHandle(7);
        let ta = sched.take_next_runnable().unwrap();
        sched.park_blocked(ta, handle);
        let tb = sched.take_next_runnable().unwrap();
        sched.park_blocked(tb, handle);

        sched.io_ready(HostHandle(9));
        assert!(!sched.has_runnable());
        sched.io_ready(handle);
        assert_eq!(sched.runnable_order(), vec![a, b]);
    }

    #[test]
    fn kill_parked_thread_is_immediate() {
        let mut sched = Scheduler::new();
        let a = spawn(&mut sched);
        let t = sched.take_next_runnable().unwrap();
        sched.park_sleeping(t, 1000.0);
        sched.kill(a);
        assert_eq!(sched.get(a).unwrap().status, ThreadStatus::Done);
        sched.wake_sleepers(2000.0);
        assert!(!sched.has_runnable());
    }
}
