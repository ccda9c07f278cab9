//! Executes task bodies on top of a [`Kernel`]
use std::time::Duration;
use tickos_kernel::{
    Cfg, CreateTaskError, Kernel, KernelTraits, StartError, TaskAttr, TaskId, TickError,
};

use crate::{timer::Ticker, StdPort};

/// The body of a simulated task.
///
/// A body is called once per simulation step while its task is running. It
/// models a bounded amount of work and may call kernel operations, e.g.,
/// [`Kernel::request_delay`] or [`Kernel::yield_now`], before returning.
pub type TaskBody<Traits> = Box<dyn FnMut(&mut Kernel<Traits>, TaskId)>;

/// Drives a kernel in discrete steps. Every step runs the body of the running
/// task once; ticks are delivered between steps.
pub struct Simulator<Traits: KernelTraits<Port = StdPort>> {
    kernel: Kernel<Traits>,
    /// Indexed by [`TaskId::get`]. The idle task has no body.
    bodies: Vec<Option<TaskBody<Traits>>>,
    /// The task that ran in each step, with the tick count at the time.
    timeline: Vec<(Traits::Tick, TaskId)>,
}

impl<Traits: KernelTraits<Port = StdPort>> Simulator<Traits> {
    /// Construct a simulator with a fresh kernel. Initializes the logger.
    pub fn new(cfg: Cfg<Traits>) -> Self {
        crate::init_logger();
        Self {
            kernel: Kernel::new(StdPort::new(), cfg),
            bodies: Vec::new(),
            timeline: Vec::new(),
        }
    }

    #[inline]
    pub fn kernel(&self) -> &Kernel<Traits> {
        &self.kernel
    }

    #[inline]
    pub fn kernel_mut(&mut self) -> &mut Kernel<Traits> {
        &mut self.kernel
    }

    /// Get the task that ran in each step so far, with the tick count at the
    /// time.
    pub fn timeline(&self) -> &[(Traits::Tick, TaskId)] {
        &self.timeline
    }

    /// Count the steps in which `task` ran.
    pub fn num_steps_run(&self, task: TaskId) -> usize {
        self.timeline.iter().filter(|&&(_, t)| t == task).count()
    }

    /// Create a task that executes `body`.
    pub fn spawn(
        &mut self,
        attr: TaskAttr,
        body: impl FnMut(&mut Kernel<Traits>, TaskId) + 'static,
    ) -> Result<TaskId, CreateTaskError> {
        let task = self.kernel.create_task(attr)?;

        let i = task.get();
        if self.bodies.len() <= i {
            self.bodies.resize_with(i + 1, || None);
        }
        self.bodies[i] = Some(Box::new(body));
        Ok(task)
    }

    /// Start the scheduler.
    pub fn start(&mut self) -> Result<TaskId, StartError> {
        self.kernel.start()
    }

    /// Run the body of the running task once. Returns the task, or `None` if
    /// the scheduler hasn't been started.
    pub fn step(&mut self) -> Option<TaskId> {
        let task = self.kernel.current_task()?;
        self.timeline.push((self.kernel.tick_count(), task));

        if let Some(body) = self.bodies.get_mut(task.get()).and_then(Option::as_mut) {
            body(&mut self.kernel, task);
        }
        Some(task)
    }

    /// Deliver a tick.
    pub fn tick(&mut self) -> Result<(), TickError> {
        self.kernel.on_tick()
    }

    /// Run `num_ticks` rounds of [`Self::step`] followed by [`Self::tick`].
    pub fn run_ticks(&mut self, num_ticks: usize) -> Result<(), TickError> {
        for _ in 0..num_ticks {
            self.step();
            self.tick()?;
        }
        Ok(())
    }

    /// Like [`Self::run_ticks`], but deliver the ticks in real time, one every
    /// `period`.
    pub fn run_realtime(&mut self, period: Duration, num_ticks: usize) -> Result<(), TickError> {
        let ticker = Ticker::new(period);
        for _ in 0..num_ticks {
            self.step();
            ticker.wait();
            self.tick()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StdTraits;
    use tickos_kernel::CfgBuilder;

    fn sim() -> Simulator<StdTraits> {
        Simulator::new(CfgBuilder::new().finish().unwrap())
    }

    #[test]
    fn step_before_start() {
        let mut sim = sim();
        assert_eq!(sim.step(), None);
        assert_eq!(sim.tick(), Err(TickError::BadContext));
    }

    #[test]
    fn idle_only() {
        let mut sim = sim();
        assert_eq!(sim.start(), Ok(TaskId::IDLE));
        sim.run_ticks(3).unwrap();
        assert_eq!(sim.num_steps_run(TaskId::IDLE), 3);
        assert_eq!(sim.kernel().tick_count(), 3);
    }

    #[test]
    fn realtime() {
        let mut sim = sim();
        let a = sim
            .spawn(TaskAttr { name: "a", priority: 1 }, |k, t| {
                k.request_delay(t, 2).unwrap();
            })
            .unwrap();
        sim.start().unwrap();
        sim.run_realtime(Duration::from_millis(1), 4).unwrap();

        // `a` runs every other step
        assert_eq!(
            sim.timeline().iter().map(|&(_, t)| t).collect::<Vec<_>>(),
            [a, TaskId::IDLE, a, TaskId::IDLE]
        );
    }
}
