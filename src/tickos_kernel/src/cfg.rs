//! Configuration mechanism for the kernel
use core::{fmt, marker::PhantomData};
use num_traits::Zero;

use crate::{error::CfgError, utils::PrioBitmap, KernelTraits};

mod task;
pub use self::task::*;

/// The default value of [`CfgBuilder::num_task_priority_levels`].
pub const DEFAULT_NUM_TASK_PRIORITY_LEVELS: usize = 5;

/// The default value of [`CfgBuilder::max_tasks`].
pub const DEFAULT_MAX_TASKS: usize = 16;

/// Collects kernel parameters and produces a validated [`Cfg`].
///
/// # Examples
///
/// ```
/// use tickos_kernel::{CfgBuilder, KernelTraits, PortThreading, TaskId, utils::PrioBitmap8};
///
/// struct NullPort;
/// impl PortThreading for NullPort {
///     fn try_enter_cpu_lock(&mut self) -> bool { true }
///     fn leave_cpu_lock(&mut self) {}
///     fn is_cpu_lock_active(&self) -> bool { false }
///     fn dispatch(&mut self, _: Option<TaskId>, _: TaskId) {}
/// }
///
/// struct Traits;
/// impl KernelTraits for Traits {
///     type Port = NullPort;
///     type Tick = u32;
///     type ReadyBitmap = PrioBitmap8;
/// }
///
/// let cfg = CfgBuilder::<Traits>::new()
///     .num_task_priority_levels(4)
///     .time_slicing(false)
///     .finish()
///     .unwrap();
/// assert_eq!(cfg.num_task_priority_levels(), 4);
///
/// // `PrioBitmap8` can't track more than 8 levels
/// assert!(CfgBuilder::<Traits>::new().num_task_priority_levels(9).finish().is_err());
/// ```
pub struct CfgBuilder<Traits: KernelTraits> {
    inner: Cfg<Traits>,
}

/// Validated kernel parameters. Created by [`CfgBuilder::finish`].
pub struct Cfg<Traits: KernelTraits> {
    num_task_priority_levels: usize,
    max_tasks: usize,
    preemption: bool,
    time_slicing: bool,
    initial_tick_count: Traits::Tick,
    idle_task_name: &'static str,
    _phantom: PhantomData<fn() -> Traits>,
}

impl<Traits: KernelTraits> Clone for Cfg<Traits> {
    fn clone(&self) -> Self {
        Self {
            num_task_priority_levels: self.num_task_priority_levels,
            max_tasks: self.max_tasks,
            preemption: self.preemption,
            time_slicing: self.time_slicing,
            initial_tick_count: self.initial_tick_count,
            idle_task_name: self.idle_task_name,
            _phantom: PhantomData,
        }
    }
}

impl<Traits: KernelTraits> fmt::Debug for Cfg<Traits> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Cfg")
            .field("num_task_priority_levels", &self.num_task_priority_levels)
            .field("max_tasks", &self.max_tasks)
            .field("preemption", &self.preemption)
            .field("time_slicing", &self.time_slicing)
            .field("initial_tick_count", &self.initial_tick_count)
            .field("idle_task_name", &self.idle_task_name)
            .finish()
    }
}

impl<Traits: KernelTraits> Default for CfgBuilder<Traits> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Traits: KernelTraits> CfgBuilder<Traits> {
    pub fn new() -> Self {
        Self {
            inner: Cfg {
                num_task_priority_levels: DEFAULT_NUM_TASK_PRIORITY_LEVELS,
                max_tasks: DEFAULT_MAX_TASKS,
                preemption: true,
                time_slicing: true,
                initial_tick_count: Traits::Tick::zero(),
                idle_task_name: "IDLE",
                _phantom: PhantomData,
            },
        }
    }

    /// Specify the number of task priority levels. The valid priorities are
    /// `0..new_value`, a larger number meaning a higher urgency. Priority `0`
    /// is shared with the idle task.
    pub fn num_task_priority_levels(&mut self, new_value: usize) -> &mut Self {
        self.inner.num_task_priority_levels = new_value;
        self
    }

    /// Specify the maximum number of tasks, including the idle task.
    pub fn max_tasks(&mut self, new_value: usize) -> &mut Self {
        self.inner.max_tasks = new_value;
        self
    }

    /// Specify whether a task becoming Ready preempts a less urgent running
    /// task. When disabled, a context switch happens only when the running
    /// task yields, blocks, or suspends itself.
    pub fn preemption(&mut self, new_value: bool) -> &mut Self {
        self.inner.preemption = new_value;
        self
    }

    /// Specify whether tasks of equal priority are rotated on every tick.
    /// Has no effect if preemption is disabled.
    pub fn time_slicing(&mut self, new_value: bool) -> &mut Self {
        self.inner.time_slicing = new_value;
        self
    }

    /// Specify the initial value of the tick counter.
    pub fn initial_tick_count(&mut self, new_value: Traits::Tick) -> &mut Self {
        self.inner.initial_tick_count = new_value;
        self
    }

    /// Specify the name of the idle task.
    pub fn idle_task_name(&mut self, new_value: &'static str) -> &mut Self {
        self.inner.idle_task_name = new_value;
        self
    }

    /// Validate the parameters.
    pub fn finish(&self) -> Result<Cfg<Traits>, CfgError> {
        let cfg = &self.inner;

        if cfg.num_task_priority_levels == 0 {
            log::warn!("`num_task_priority_levels` must be greater than zero");
            return Err(CfgError::BadParam);
        }

        if cfg.num_task_priority_levels > Traits::ReadyBitmap::LEN {
            log::warn!(
                "`num_task_priority_levels` ({}) exceeds the capacity of the ready bitmap ({})",
                cfg.num_task_priority_levels,
                Traits::ReadyBitmap::LEN,
            );
            return Err(CfgError::BadParam);
        }

        if cfg.max_tasks == 0 {
            log::warn!("`max_tasks` must make room for the idle task");
            return Err(CfgError::BadParam);
        }

        Ok(cfg.clone())
    }
}

impl<Traits: KernelTraits> Cfg<Traits> {
    #[inline]
    pub fn num_task_priority_levels(&self) -> usize {
        self.num_task_priority_levels
    }

    #[inline]
    pub fn max_tasks(&self) -> usize {
        self.max_tasks
    }

    #[inline]
    pub fn preemption(&self) -> bool {
        self.preemption
    }

    #[inline]
    pub fn time_slicing(&self) -> bool {
        self.time_slicing
    }

    #[inline]
    pub fn initial_tick_count(&self) -> Traits::Tick {
        self.initial_tick_count
    }

    #[inline]
    pub fn idle_task_name(&self) -> &'static str {
        self.idle_task_name
    }
}
