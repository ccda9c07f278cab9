//! Context switch trace
use arrayvec::ArrayVec;
use core::fmt;

use crate::{Kernel, KernelTraits, TaskId};

/// The number of [`SwitchRecord`]s a [`SwitchTrace`] can hold.
pub const TRACE_LEN: usize = 64;

/// A context switch made by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchRecord<Tick> {
    /// The tick count at the time of the switch.
    pub at: Tick,
    /// The previously running task. `None` for the switch made by
    /// [`Kernel::start`].
    pub from: Option<TaskId>,
    pub to: TaskId,
    pub to_priority: usize,
}

/// Records the first [`TRACE_LEN`] context switches and counts all of them.
pub struct SwitchTrace<Tick> {
    records: ArrayVec<SwitchRecord<Tick>, TRACE_LEN>,
    selections: usize,
    switches: usize,
}

impl<Tick> SwitchTrace<Tick> {
    pub(crate) const fn new() -> Self {
        Self {
            records: ArrayVec::new_const(),
            selections: 0,
            switches: 0,
        }
    }

    pub(crate) fn count_selection(&mut self) {
        self.selections += 1;
    }

    pub(crate) fn record(&mut self, record: SwitchRecord<Tick>) {
        self.switches += 1;
        // Recording stops when full
        let _ = self.records.try_push(record);
    }

    /// Get the recorded switches, oldest first.
    pub fn records(&self) -> &[SwitchRecord<Tick>] {
        &self.records
    }

    /// Get the number of times the scheduler chose a task, including the
    /// times it chose the running task again.
    pub fn selections(&self) -> usize {
        self.selections
    }

    /// Get the number of times the running task changed.
    pub fn switches(&self) -> usize {
        self.switches
    }

    /// Return a flag indicating whether switches have been dropped because
    /// the trace is full.
    pub fn is_truncated(&self) -> bool {
        self.switches > self.records.len()
    }

    fn clear(&mut self) {
        self.records.clear();
        self.selections = 0;
        self.switches = 0;
    }
}

impl<Tick: fmt::Debug> fmt::Debug for SwitchTrace<Tick> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SwitchTrace")
            .field("records", &self.records.len())
            .field("selections", &self.selections)
            .field("switches", &self.switches)
            .finish()
    }
}

impl<Traits: KernelTraits> Kernel<Traits> {
    /// Get the context switch trace.
    pub fn trace(&self) -> &SwitchTrace<Traits::Tick> {
        &self.trace
    }

    /// Discard the recorded switches and reset the counters.
    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }
}
