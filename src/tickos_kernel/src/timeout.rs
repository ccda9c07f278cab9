//! Tick counting and delays
//!
//! Blocked tasks wait in one of two delayed lists, each sorted by wake-up
//! time. Wake-up times that don't wrap around go to the current delayed list.
//! The rest go to the overflow delayed list. When the tick counter wraps
//! around to zero, the two lists trade roles.
//!
//! ```text
//!   tick_count            wake-up time
//!   ─────┬────────────────────┬──────────────────── ─┐
//!        │   current delayed  │                      │ wraps
//!   ─────┼────────────────────┴──────────────────── ─┘
//!   0 ───┴── overflow delayed ──────────── tick_count
//! ```
use core::fmt;
use num_traits::{Bounded, One, WrappingAdd, WrappingSub, Zero};

use crate::{
    error::{BadContextError, BadObjectStateError, DelayError, TickError},
    task::{Reselect, TaskSt},
    utils::intrusive_list::{ListArena, ListId},
    Kernel, KernelTraits, TaskId, TickInt,
};

/// The tick counter and the delayed lists.
pub(crate) struct TimeoutState<Tick> {
    /// The number of ticks since the kernel was created, plus the initial
    /// value. Wraps around.
    pub(crate) tick_count: Tick,

    /// A lower bound of the earliest wake-up time in the current delayed
    /// list. `Tick::max_value()` if nothing is waiting.
    next_unblock_time: Tick,

    /// Tasks whose wake-up time is reached before `tick_count` wraps around.
    delayed: ListId,

    /// Tasks whose wake-up time is reached after `tick_count` wraps around.
    overflow_delayed: ListId,
}

impl<Tick: TickInt> TimeoutState<Tick> {
    pub(crate) fn new<Owner: Copy>(arena: &mut ListArena<Tick, Owner>, tick_count: Tick) -> Self {
        Self {
            tick_count,
            next_unblock_time: Tick::max_value(),
            delayed: arena.new_list(),
            overflow_delayed: arena.new_list(),
        }
    }
}

impl<Tick: fmt::Debug> fmt::Debug for TimeoutState<Tick> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TimeoutState")
            .field("tick_count", &self.tick_count)
            .field("next_unblock_time", &self.next_unblock_time)
            .finish_non_exhaustive()
    }
}

impl<Traits: KernelTraits> Kernel<Traits> {
    /// Get the current tick count.
    #[inline]
    pub fn tick_count(&self) -> Traits::Tick {
        self.timeout.tick_count
    }

    /// Get the tick count at which the delayed lists will be examined next.
    #[inline]
    pub fn next_unblock_time(&self) -> Traits::Tick {
        self.timeout.next_unblock_time
    }

    /// Get the delayed list for wake-up times reached before the tick count
    /// wraps around.
    #[inline]
    pub fn delayed_list(&self) -> ListId {
        self.timeout.delayed
    }

    /// Get the delayed list for wake-up times reached after the tick count
    /// wraps around.
    #[inline]
    pub fn overflow_delayed_list(&self) -> ListId {
        self.timeout.overflow_delayed
    }

    /// Block `task` for `ticks` ticks.
    ///
    /// The task becomes Ready again in the tick handler invocation that makes
    /// the tick count reach `tick_count() + ticks` (modulo wrap-around). A
    /// zero delay therefore lasts until the next tick.
    pub fn request_delay(&mut self, task: TaskId, ticks: Traits::Tick) -> Result<(), DelayError> {
        self.with_cpu_lock(|this| {
            this.check_delayable(task)?;
            this.delay_task(task, ticks);
            Ok(())
        })
    }

    /// Block the running task until `*last_wake_time + period`, for producing
    /// a fixed-frequency cadence. `*last_wake_time` is advanced by `period`.
    ///
    /// The delay is skipped if the target time has already passed, which is
    /// decided with wrap-around of both the tick count and the target in
    /// mind. Returns `true` if the task was blocked.
    pub fn delay_periodic(
        &mut self,
        last_wake_time: &mut Traits::Tick,
        period: Traits::Tick,
    ) -> Result<bool, DelayError> {
        self.with_cpu_lock(|this| {
            let task = this.running_task.ok_or(BadContextError::BadContext)?;
            this.check_delayable(task)?;

            let now = this.timeout.tick_count;
            let last = *last_wake_time;
            let next = last.wrapping_add(&period);

            let should_delay = if now < last {
                // The tick count has wrapped since `last`. The target is in
                // the future only if it has wrapped as well and is still
                // ahead of the tick count.
                next < last && next > now
            } else {
                next < last || next > now
            };

            *last_wake_time = next;

            if should_delay {
                this.delay_task(task, next.wrapping_sub(&now));
            }
            Ok(should_delay)
        })
    }

    fn check_delayable(&self, task: TaskId) -> Result<(), DelayError> {
        let task_cb = self.task_cb(task)?;

        if self.sched_suspend.depth != 0 {
            log::warn!("can't delay {task:?} while the scheduler is suspended");
            return Err(BadContextError::BadContext.into());
        }

        if task == TaskId::IDLE || !matches!(task_cb.st(), TaskSt::Ready | TaskSt::Running) {
            return Err(BadObjectStateError::BadObjectState.into());
        }

        Ok(())
    }

    /// Move a Ready or Running `task` to a delayed list.
    fn delay_task(&mut self, task: TaskId, ticks: Traits::Tick) {
        let (node, priority) = {
            let task_cb = &self.tasks[task.0];
            (task_cb.node(), task_cb.priority())
        };

        // The task is Ready, so its node is in a ready list
        self.ready_queue
            .remove(&mut self.arena, priority, node)
            .unwrap();

        let now = self.timeout.tick_count;
        let wake_time = now.wrapping_add(&ticks);
        self.arena.set_key(node, wake_time);

        if wake_time < now {
            // The wake-up time has wrapped
            self.arena
                .insert_sorted(self.timeout.overflow_delayed, node)
                .unwrap();
        } else {
            self.arena.insert_sorted(self.timeout.delayed, node).unwrap();
            if wake_time < self.timeout.next_unblock_time {
                self.timeout.next_unblock_time = wake_time;
            }
        }

        self.tasks[task.0].set_st(TaskSt::Blocked);
        log::trace!("{task:?} delayed until {wake_time:?}");

        self.reselect(Reselect::IfPreempted);
    }

    /// Advance the tick count by one and wake up the tasks whose wake-up time
    /// has come. Called by the port's timer interrupt handler.
    ///
    /// While the scheduler is suspended, the tick is only counted and is
    /// processed by the matching [`Self::resume_all`].
    pub fn on_tick(&mut self) -> Result<(), TickError> {
        self.with_cpu_lock(|this| {
            if this.running_task.is_none() {
                return Err(BadContextError::BadContext.into());
            }

            if this.sched_suspend.depth != 0 {
                this.sched_suspend.pended_ticks += 1;
                return Ok(());
            }

            let request = this.advance_tick();
            this.reselect(request);
            Ok(())
        })
    }

    /// The body of the tick handler. Returns the reselection to perform.
    pub(crate) fn advance_tick(&mut self) -> Reselect {
        let tick = self.timeout.tick_count.wrapping_add(&Traits::Tick::one());
        self.timeout.tick_count = tick;

        let mut woke_any = false;

        if tick.is_zero() {
            // Entries left in the current list belong to the epoch that has
            // just ended
            woke_any |= self.wake_due_tasks(Traits::Tick::max_value());

            let timeout = &mut self.timeout;
            core::mem::swap(&mut timeout.delayed, &mut timeout.overflow_delayed);
            log::trace!("tick count wrapped around; swapped the delayed lists");
            self.update_next_unblock_time();
        }

        if tick >= self.timeout.next_unblock_time {
            woke_any |= self.wake_due_tasks(tick);
        }

        if self.cfg.preemption() && self.cfg.time_slicing() {
            Reselect::Rotate
        } else if woke_any {
            Reselect::IfPreempted
        } else {
            Reselect::Keep
        }
    }

    /// Make Ready every task at the head of the current delayed list whose
    /// wake-up time is not later than `until`. Returns `true` if any task was
    /// woken up.
    fn wake_due_tasks(&mut self, until: Traits::Tick) -> bool {
        let mut woke_any = false;

        while let Some(node) = self.arena.first(self.timeout.delayed) {
            if self.arena[node].key() > until {
                break;
            }

            // Every node in a delayed list represents a task
            let task = self.arena[node].owner().unwrap();
            self.arena.remove(node).unwrap();
            self.make_ready(task);
            log::trace!("{task:?} woke up at {:?}", self.timeout.tick_count);
            woke_any = true;
        }

        self.update_next_unblock_time();
        woke_any
    }

    /// Recalculate `next_unblock_time` from the heads of the delayed lists.
    pub(crate) fn update_next_unblock_time(&mut self) {
        let timeout = &mut self.timeout;
        timeout.next_unblock_time = if !self.arena.is_empty(timeout.delayed) {
            self.arena.key_at(self.arena.head(timeout.delayed))
        } else {
            // `Tick::max_value()` if both are empty
            self.arena.key_at(self.arena.head(timeout.overflow_delayed))
        };
    }
}
