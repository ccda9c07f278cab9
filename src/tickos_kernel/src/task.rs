//! Tasks
use core::fmt;
use num_traits::Bounded;

use crate::{
    error::{
        BadContextError, BadIdError, BadObjectStateError, BadParamError, CreateTaskError,
        PriorityError, ResumeTaskError, SchedulerSuspendError, StartError, SuspendTaskError,
        TaskQueryError, YieldError,
    },
    trace::SwitchRecord,
    utils::intrusive_list::NodeId,
    Kernel, KernelTraits, TaskId,
};

pub mod readyqueue;

/// Task state machine
///
/// These don't exactly align with the task states defined in FreeRTOS's
/// `eTaskState`. There's no `Deleted` state because tasks can't be deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskSt {
    /// The task is in a ready list and is not the running task.
    Ready,

    /// The task is in a ready list and is the running task.
    Running,

    /// The task is in one of the delayed lists.
    Blocked,

    /// The task is in the suspended list and won't be scheduled until it's
    /// resumed.
    Suspended,
}

/// The attributes of a task, given to [`Kernel::create_task`].
#[derive(Debug, Clone, Copy)]
pub struct TaskAttr {
    pub name: &'static str,
    /// The task's priority. A larger value means a higher urgency.
    pub priority: usize,
}

/// *Task control block* - the state data of a task.
pub struct TaskCb {
    name: &'static str,
    priority: usize,
    /// The node linking the task into exactly one ready, delayed, or
    /// suspended list at any time.
    node: NodeId,
    st: TaskSt,
}

impl TaskCb {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn priority(&self) -> usize {
        self.priority
    }

    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn st(&self) -> TaskSt {
        self.st
    }

    #[inline]
    pub(crate) fn set_st(&mut self, st: TaskSt) {
        self.st = st;
    }
}

impl fmt::Debug for TaskCb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TaskCb")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("st", &self.st)
            .finish()
    }
}

/// A request to reconsider which task should be running.
///
/// Ordered by strength; deferred requests are merged by taking the maximum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Reselect {
    /// Keep the running task.
    Keep,
    /// Choose a new task if the running task is no longer Running, or if
    /// preemption is enabled and a more urgent task is Ready.
    IfPreempted,
    /// Unconditionally advance the round-robin cursor of the most urgent
    /// non-empty ready list.
    Rotate,
}

/// The state of [`Kernel::suspend_all`].
#[derive(Debug)]
pub(crate) struct SchedulerSuspendState {
    /// The number of unmatched `suspend_all` calls.
    pub(crate) depth: usize,
    /// The number of ticks that arrived while suspended.
    pub(crate) pended_ticks: usize,
    /// The reselection deferred while suspended.
    pub(crate) pending: Reselect,
}

impl SchedulerSuspendState {
    pub(crate) const fn new() -> Self {
        Self {
            depth: 0,
            pended_ticks: 0,
            pending: Reselect::Keep,
        }
    }
}

impl<Traits: KernelTraits> Kernel<Traits> {
    /// Get the control block of `task`.
    pub fn task_cb(&self, task: TaskId) -> Result<&TaskCb, BadIdError> {
        self.tasks.get(task.0).ok_or(BadIdError::BadId)
    }

    /// Create a task and make it Ready. Returns the new task's ID.
    ///
    /// If the scheduler is running and the new task is more urgent than the
    /// running task, it preempts the running task (unless preemption is
    /// disabled).
    pub fn create_task(&mut self, attr: TaskAttr) -> Result<TaskId, CreateTaskError> {
        self.with_cpu_lock(|this| {
            if this.tasks.len() >= this.cfg.max_tasks() {
                log::warn!("can't create {:?}: the task limit has been reached", attr.name);
                return Err(CreateTaskError::QueueOverflow);
            }

            if attr.priority >= this.cfg.num_task_priority_levels() {
                return Err(BadParamError::BadParam.into());
            }

            let task = this.add_task(attr.name, attr.priority);
            log::debug!("created {task:?} ({:?}, priority {})", attr.name, attr.priority);

            this.reselect(Reselect::IfPreempted);
            Ok(task)
        })
    }

    /// Allocate a task control block and make the task Ready.
    pub(crate) fn add_task(&mut self, name: &'static str, priority: usize) -> TaskId {
        let task = TaskId(self.tasks.len());
        let node = self.arena.new_node(task);
        // Ready lists are unsorted, so the key is informational
        let key = num_traits::cast(priority).unwrap_or_else(Traits::Tick::max_value);
        self.arena.set_key(node, key);

        self.tasks.push(TaskCb {
            name,
            priority,
            node,
            st: TaskSt::Ready,
        });

        self.make_ready(task);
        task
    }

    /// Link `task`'s detached node into its ready list and mark the priority
    /// ready.
    pub(crate) fn make_ready(&mut self, task: TaskId) {
        let task_cb = &mut self.tasks[task.0];
        task_cb.st = TaskSt::Ready;
        let (node, priority) = (task_cb.node, task_cb.priority);

        // The caller has just detached the node
        self.ready_queue
            .push_back(&mut self.arena, priority, node)
            .unwrap();
    }

    /// Start the scheduler by choosing the first task to run. Returns the
    /// task.
    pub fn start(&mut self) -> Result<TaskId, StartError> {
        self.with_cpu_lock(|this| {
            if this.running_task.is_some() {
                log::warn!("the scheduler is already running");
                return Err(BadContextError::BadContext.into());
            }

            let task = this.choose_next_running_task();
            log::debug!("scheduler started with {task:?}");
            Ok(task)
        })
    }

    /// Return a flag indicating whether [`Self::start`] has been called.
    pub fn is_started(&self) -> bool {
        self.running_task.is_some()
    }

    /// Yield the processor to the next task of the most urgent ready priority.
    /// Tasks of equal priority are chosen in round-robin order.
    pub fn yield_now(&mut self) -> Result<(), YieldError> {
        self.with_cpu_lock(|this| {
            if this.running_task.is_none() || this.sched_suspend.depth != 0 {
                return Err(BadContextError::BadContext.into());
            }

            this.reselect(Reselect::Rotate);
            Ok(())
        })
    }

    /// Get the running task. Returns `None` if the scheduler hasn't been
    /// started.
    #[inline]
    pub fn current_task(&self) -> Option<TaskId> {
        self.running_task
    }

    /// Get the state of `task`.
    pub fn task_state(&self, task: TaskId) -> Result<TaskSt, TaskQueryError> {
        Ok(self.task_cb(task)?.st)
    }

    /// Get the priority of `task`.
    pub fn task_priority(&self, task: TaskId) -> Result<usize, TaskQueryError> {
        Ok(self.task_cb(task)?.priority)
    }

    /// Get the name of `task`.
    pub fn task_name(&self, task: TaskId) -> Result<&'static str, TaskQueryError> {
        Ok(self.task_cb(task)?.name)
    }

    /// Get the number of tasks, including the idle task.
    #[inline]
    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Iterate over all task IDs in creation order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        (0..self.tasks.len()).map(TaskId)
    }

    /// Set bit `priority` of the ready bitmap.
    ///
    /// For components that link tasks into ready lists on their own; the
    /// kernel's own operations keep the bitmap up to date.
    pub fn register_priority_ready(&mut self, priority: usize) -> Result<(), PriorityError> {
        if priority >= self.ready_queue.num_priorities() {
            return Err(BadParamError::BadParam.into());
        }
        self.ready_queue.mark_ready(priority);
        Ok(())
    }

    /// Clear bit `priority` of the ready bitmap if that priority's ready list
    /// is empty.
    pub fn clear_if_empty(&mut self, priority: usize) -> Result<(), PriorityError> {
        if priority >= self.ready_queue.num_priorities() {
            return Err(BadParamError::BadParam.into());
        }
        self.ready_queue.clear_ready_if_empty(&self.arena, priority);
        Ok(())
    }

    /// Move `task` to the Suspended state. A Blocked task's pending delay is
    /// cancelled.
    pub fn suspend_task(&mut self, task: TaskId) -> Result<(), SuspendTaskError> {
        self.with_cpu_lock(|this| {
            let task_cb = this.task_cb(task)?;

            if task == TaskId::IDLE || task_cb.st == TaskSt::Suspended {
                return Err(BadObjectStateError::BadObjectState.into());
            }

            if this.running_task == Some(task) && this.sched_suspend.depth != 0 {
                log::warn!("can't suspend the running task while the scheduler is suspended");
                return Err(BadContextError::BadContext.into());
            }

            let (st, node, priority) = (task_cb.st, task_cb.node, task_cb.priority);
            match st {
                TaskSt::Ready | TaskSt::Running => {
                    // The task is Ready, so its node is in a ready list
                    this.ready_queue
                        .remove(&mut this.arena, priority, node)
                        .unwrap();
                }
                TaskSt::Blocked => {
                    // The task is Blocked, so its node is in a delayed list
                    this.arena.remove(node).unwrap();
                    this.update_next_unblock_time();
                }
                TaskSt::Suspended => unreachable!(),
            }

            this.arena.insert_end(this.suspended_list, node).unwrap();
            this.tasks[task.0].st = TaskSt::Suspended;
            log::debug!("suspended {task:?}");

            this.reselect(Reselect::IfPreempted);
            Ok(())
        })
    }

    /// Move a Suspended `task` back to the Ready state.
    pub fn resume_task(&mut self, task: TaskId) -> Result<(), ResumeTaskError> {
        self.with_cpu_lock(|this| {
            let task_cb = this.task_cb(task)?;

            if task_cb.st != TaskSt::Suspended {
                return Err(BadObjectStateError::BadObjectState.into());
            }

            // The task is Suspended, so its node is in the suspended list
            this.arena.remove(task_cb.node).unwrap();
            this.make_ready(task);
            log::debug!("resumed {task:?}");

            this.reselect(Reselect::IfPreempted);
            Ok(())
        })
    }

    /// Suspend the scheduler. While suspended, ticks are counted but not
    /// processed, and no context switch takes place. Calls nest.
    pub fn suspend_all(&mut self) -> Result<(), SchedulerSuspendError> {
        self.with_cpu_lock(|this| {
            this.sched_suspend.depth += 1;
            log::trace!("suspend_all (depth = {})", this.sched_suspend.depth);
            Ok(())
        })
    }

    /// Undo one [`Self::suspend_all`] call. When the outermost suspension
    /// ends, the pended ticks are processed and the deferred reselection is
    /// performed.
    ///
    /// Returns `true` if the running task has changed.
    pub fn resume_all(&mut self) -> Result<bool, SchedulerSuspendError> {
        self.with_cpu_lock(|this| {
            if this.sched_suspend.depth == 0 {
                log::warn!("`resume_all` without a matching `suspend_all`");
                return Err(BadContextError::BadContext.into());
            }

            this.sched_suspend.depth -= 1;
            log::trace!("resume_all (depth = {})", this.sched_suspend.depth);
            if this.sched_suspend.depth != 0 {
                return Ok(false);
            }

            let pended_ticks = core::mem::take(&mut this.sched_suspend.pended_ticks);
            let mut request = core::mem::replace(&mut this.sched_suspend.pending, Reselect::Keep);
            if pended_ticks != 0 {
                log::trace!("processing {pended_ticks} pended tick(s)");
            }
            for _ in 0..pended_ticks {
                request = request.max(this.advance_tick());
            }

            let prev = this.running_task;
            this.reselect(request);
            Ok(this.running_task != prev)
        })
    }

    /// Return a flag indicating whether the scheduler is suspended.
    pub fn is_scheduler_suspended(&self) -> bool {
        self.sched_suspend.depth != 0
    }

    /// Get the number of ticks that arrived while the scheduler was
    /// suspended and haven't been processed yet.
    pub fn pended_ticks(&self) -> usize {
        self.sched_suspend.pended_ticks
    }

    /// Act on a reselection request. The request is deferred while the
    /// scheduler is suspended and ignored before the scheduler is started.
    pub(crate) fn reselect(&mut self, request: Reselect) {
        if request == Reselect::Keep || self.running_task.is_none() {
            return;
        }

        if self.sched_suspend.depth != 0 {
            self.sched_suspend.pending = self.sched_suspend.pending.max(request);
            return;
        }

        let switch = match request {
            Reselect::Keep => false,
            Reselect::IfPreempted => self.is_preempted(),
            Reselect::Rotate => true,
        };

        if switch {
            self.choose_next_running_task();
        }
    }

    /// Return a flag indicating whether the running task should give way.
    fn is_preempted(&self) -> bool {
        let Some(running_task) = self.running_task else {
            return true;
        };
        let task_cb = &self.tasks[running_task.0];

        if task_cb.st != TaskSt::Running {
            return true;
        }

        self.cfg.preemption()
            && self
                .ready_queue
                .highest_ready_priority()
                .map_or(false, |priority| priority > task_cb.priority)
    }

    /// Choose the next task by [`ReadyQueue::select_next`] and make it
    /// Running.
    ///
    /// [`ReadyQueue::select_next`]: readyqueue::ReadyQueue::select_next
    ///
    /// # Panics
    ///
    /// Panics if no task is Ready. The idle task is always Ready, so this
    /// indicates corrupted scheduler state.
    pub(crate) fn choose_next_running_task(&mut self) -> TaskId {
        let next = match self.ready_queue.select_next(&mut self.arena) {
            Ok(task) => task,
            Err(e) => panic!("the ready queue is corrupted: {e:?}"),
        };
        self.trace.count_selection();

        let prev = self.running_task;
        if prev != Some(next) {
            if let Some(prev) = prev {
                let prev_cb = &mut self.tasks[prev.0];
                if prev_cb.st == TaskSt::Running {
                    prev_cb.st = TaskSt::Ready;
                }
            }

            let to_priority = self.tasks[next.0].priority;
            log::trace!("switching {prev:?} -> {next:?} (priority {to_priority})");
            self.trace.record(SwitchRecord {
                at: self.timeout.tick_count,
                from: prev,
                to: next,
                to_priority,
            });
        }

        self.tasks[next.0].st = TaskSt::Running;
        self.running_task = Some(next);
        next
    }
}
