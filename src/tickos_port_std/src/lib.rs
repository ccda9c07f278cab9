#![doc = include_str!("./lib.md")]
#![deny(unsafe_op_in_unsafe_fn)]
use tickos_kernel::{PortThreading, TaskId};

mod sim;
mod timer;

pub use self::sim::{Simulator, TaskBody};

/// Used by `use_port!`
#[doc(hidden)]
pub extern crate tickos_kernel;
/// Used by `use_port!`
#[doc(hidden)]
pub extern crate env_logger;

/// A context switch performed by [`StdPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// The task that was running. `None` for the first dispatch.
    pub prev: Option<TaskId>,
    pub next: TaskId,
}

/// The port of the simulation environment.
///
/// There's no real concurrency in the simulation, so CPU Lock is a flag. The
/// context switches the kernel requests are logged and recorded; the
/// [`Simulator`] picks up the running task from the kernel.
#[derive(Debug, Default)]
pub struct StdPort {
    cpu_lock: bool,
    dispatches: Vec<Dispatch>,
}

impl StdPort {
    pub const fn new() -> Self {
        Self {
            cpu_lock: false,
            dispatches: Vec::new(),
        }
    }

    /// Get the context switches performed so far, oldest first.
    pub fn dispatches(&self) -> &[Dispatch] {
        &self.dispatches
    }
}

impl PortThreading for StdPort {
    fn try_enter_cpu_lock(&mut self) -> bool {
        !std::mem::replace(&mut self.cpu_lock, true)
    }

    fn leave_cpu_lock(&mut self) {
        assert!(self.cpu_lock, "CPU Lock is inactive");
        self.cpu_lock = false;
    }

    fn is_cpu_lock_active(&self) -> bool {
        self.cpu_lock
    }

    fn dispatch(&mut self, prev: Option<TaskId>, next: TaskId) {
        assert!(!self.cpu_lock);
        log::debug!("task {next:?} is now running");
        self.dispatches.push(Dispatch { prev, next });
    }
}

/// Define a kernel trait type that uses [`StdPort`].
///
/// ```
/// tickos_port_std::use_port!(
///     struct SystemTraits {
///         tick: u16,
///         ready_bitmap: tickos_kernel::utils::PrioBitmap8,
///     }
/// );
///
/// let cfg = tickos_kernel::CfgBuilder::<SystemTraits>::new().finish().unwrap();
/// let sim = tickos_port_std::Simulator::new(cfg);
/// assert_eq!(sim.kernel().num_tasks(), 1);
/// ```
#[macro_export]
macro_rules! use_port {
    (
        $vis:vis struct $SystemTraits:ident {
            tick: $Tick:ty,
            ready_bitmap: $ReadyBitmap:ty $(,)?
        }
    ) => {
        $vis struct $SystemTraits;

        impl $crate::tickos_kernel::KernelTraits for $SystemTraits {
            type Port = $crate::StdPort;
            type Tick = $Tick;
            type ReadyBitmap = $ReadyBitmap;
        }
    };
}

// A 32-bit tick counter and up to 32 priority levels
use_port!(
    pub struct StdTraits {
        tick: u32,
        ready_bitmap: tickos_kernel::utils::PrioBitmap32,
    }
);

/// Initialize the logger. The verbosity is controlled by `RUST_LOG`.
///
/// Does nothing if a logger has already been installed.
pub fn init_logger() {
    let _ = env_logger::builder().format_timestamp(None).try_init();
}
