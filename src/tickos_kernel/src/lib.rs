#![doc = include_str!("./lib.md")]
#![cfg_attr(not(test), no_std)] // Link `std` only when building a test (`cfg(test)`)
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![allow(clippy::len_without_is_empty)]
extern crate alloc;

use alloc::vec::Vec;
use core::fmt;
use num_traits::{PrimInt, Unsigned, WrappingAdd, WrappingSub};

pub mod utils;

mod cfg;
mod error;
mod klock;
mod task;
mod timeout;
mod trace;

pub use self::{
    cfg::*,
    error::*,
    task::{readyqueue::ReadyQueue, TaskAttr, TaskCb, TaskSt},
    trace::{SwitchRecord, SwitchTrace, TRACE_LEN},
};

use self::{
    klock::CpuLockState,
    task::SchedulerSuspendState,
    timeout::TimeoutState,
    utils::{
        intrusive_list::{ListArena, ListId},
        PrioBitmap,
    },
};

/// Numeric types usable as the tick counter. The counter wraps around on
/// overflow.
pub trait TickInt:
    PrimInt + Unsigned + WrappingAdd + WrappingSub + Default + fmt::Debug + Send + Sync + 'static
{
}

impl<T> TickInt for T where
    T: PrimInt + Unsigned + WrappingAdd + WrappingSub + Default + fmt::Debug + Send + Sync + 'static
{
}

/// Associates compile-time parameters with a kernel instance.
pub trait KernelTraits: Sized + 'static {
    /// The port providing CPU Lock and context switching.
    type Port: PortThreading;

    /// The tick counter type.
    type Tick: TickInt;

    /// The bitmap type used to track the non-empty ready lists. It must be
    /// able to store [`CfgBuilder::num_task_priority_levels`] bits.
    type ReadyBitmap: PrioBitmap;
}

/// Implemented by a port. Provides mutual exclusion between the tick handler
/// and task-context kernel calls, and switches the processor between tasks.
pub trait PortThreading {
    /// Try to enter a CPU Lock state. Returns `false` if CPU Lock is already
    /// active, in which case the kernel reports [`BadContext`].
    ///
    /// [`BadContext`]: ResultCode::BadContext
    fn try_enter_cpu_lock(&mut self) -> bool;

    /// Leave the CPU Lock state.
    ///
    /// Precondition: CPU Lock active
    fn leave_cpu_lock(&mut self);

    /// Return a flag indicating whether a CPU Lock state is active.
    fn is_cpu_lock_active(&self) -> bool;

    /// Switch the processor to `next`. Called outside of CPU Lock whenever
    /// the scheduler has chosen a task different from the one previously
    /// dispatched (`prev`, or `None` on the first dispatch).
    fn dispatch(&mut self, prev: Option<TaskId>, next: TaskId);
}

/// Identifies a task in a [`Kernel`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(usize);

impl TaskId {
    /// The idle task, which is created by [`Kernel::new`] and always exists.
    pub const IDLE: Self = Self(0);

    /// Get the raw index of the task.
    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

/// A scheduler instance.
pub struct Kernel<Traits: KernelTraits> {
    port: Traits::Port,
    cfg: Cfg<Traits>,

    /// Storage for the ready, delayed, and suspended lists and the nodes of
    /// all tasks.
    arena: ListArena<Traits::Tick, TaskId>,

    tasks: Vec<TaskCb>,

    ready_queue: ReadyQueue<Traits::ReadyBitmap>,

    /// The list of Suspended tasks, in suspension order.
    suspended_list: ListId,

    timeout: TimeoutState<Traits::Tick>,

    /// The task chosen by the scheduler.
    ///
    /// Invariant: `None` iff the scheduler hasn't been started
    running_task: Option<TaskId>,

    /// The task the port was last asked to run. Lags behind `running_task`
    /// while CPU Lock is active.
    dispatched_task: Option<TaskId>,

    lock: CpuLockState,

    sched_suspend: SchedulerSuspendState,

    trace: SwitchTrace<Traits::Tick>,
}

impl<Traits: KernelTraits> Kernel<Traits> {
    /// Construct a kernel. The idle task is created at priority `0` and is
    /// Ready.
    pub fn new(port: Traits::Port, cfg: Cfg<Traits>) -> Self {
        let num_priorities = cfg.num_task_priority_levels();
        let max_tasks = cfg.max_tasks();

        // One ready list per priority, two delayed lists, the suspended list
        let mut arena = ListArena::with_capacity(num_priorities + 3, max_tasks);
        let ready_queue = ReadyQueue::new(&mut arena, num_priorities);
        let timeout = TimeoutState::new(&mut arena, cfg.initial_tick_count());
        let suspended_list = arena.new_list();

        let mut this = Self {
            port,
            arena,
            tasks: Vec::with_capacity(max_tasks),
            ready_queue,
            suspended_list,
            timeout,
            running_task: None,
            dispatched_task: None,
            lock: CpuLockState::new(),
            sched_suspend: SchedulerSuspendState::new(),
            trace: SwitchTrace::new(),
            cfg,
        };

        let idle = this.add_task(this.cfg.idle_task_name(), 0);
        debug_assert_eq!(idle, TaskId::IDLE);

        log::debug!("kernel created: {:?}", this.cfg);

        this
    }

    /// Get a reference to the port.
    pub fn port(&self) -> &Traits::Port {
        &self.port
    }

    /// Get a mutable reference to the port.
    pub fn port_mut(&mut self) -> &mut Traits::Port {
        &mut self.port
    }

    /// Get the configuration the kernel was created with.
    pub fn cfg(&self) -> &Cfg<Traits> {
        &self.cfg
    }

    /// Get the ready queue set.
    pub fn ready_queue(&self) -> &ReadyQueue<Traits::ReadyBitmap> {
        &self.ready_queue
    }

    /// Get the list storage. Useful for inspecting the ready, delayed, and
    /// suspended lists.
    pub fn lists(&self) -> &ListArena<Traits::Tick, TaskId> {
        &self.arena
    }

    /// Get the list of Suspended tasks.
    pub fn suspended_list(&self) -> ListId {
        self.suspended_list
    }
}

impl<Traits: KernelTraits> fmt::Debug for Kernel<Traits> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("cfg", &self.cfg)
            .field("tasks", &self.tasks)
            .field("ready_queue", &self.ready_queue)
            .field("timeout", &self.timeout)
            .field("running_task", &self.running_task)
            .field("dispatched_task", &self.dispatched_task)
            .field("lock", &self.lock)
            .field("sched_suspend", &self.sched_suspend)
            .finish_non_exhaustive()
    }
}
