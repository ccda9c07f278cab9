//! Kernel state locking mechanism
//!
//! Every kernel operation runs inside a CPU Lock section provided by the
//! port. Application code can open its own, nestable section with
//! [`Kernel::enter_critical`]. The port is asked to dispatch a newly chosen
//! task only when the outermost section is left.
use crate::{
    error::{BadContextError, CpuLockError},
    Kernel, KernelTraits, PortThreading,
};

/// The nesting state of CPU Lock.
#[derive(Debug)]
pub(crate) struct CpuLockState {
    /// The number of active CPU Lock sections, including the ones opened
    /// internally by the kernel.
    nesting: usize,
    /// The number of sections opened by `enter_critical`.
    ///
    /// Invariant: `critical_nesting <= nesting`
    critical_nesting: usize,
}

impl CpuLockState {
    pub(crate) const fn new() -> Self {
        Self {
            nesting: 0,
            critical_nesting: 0,
        }
    }
}

/// Proof of an active CPU Lock section, to be returned to
/// [`Kernel::unlock_cpu`].
#[must_use = "CPU Lock must be released by `unlock_cpu`"]
pub(crate) struct CpuLockToken {
    _private: (),
}

impl<Traits: KernelTraits> Kernel<Traits> {
    /// Enter a CPU Lock section.
    pub(crate) fn lock_cpu(&mut self) -> Result<CpuLockToken, BadContextError> {
        if self.lock.nesting == 0 {
            if !self.port.try_enter_cpu_lock() {
                log::warn!("the port refused to enter CPU Lock");
                return Err(BadContextError::BadContext);
            }
            log::trace!("enter_cpu_lock");
        }
        self.lock.nesting += 1;
        Ok(CpuLockToken { _private: () })
    }

    /// Leave a CPU Lock section. When the outermost section is left, the port
    /// is told to dispatch the running task if it has changed.
    pub(crate) fn unlock_cpu(&mut self, token: CpuLockToken) {
        let CpuLockToken { _private: () } = token;
        debug_assert_ne!(self.lock.nesting, 0);
        self.lock.nesting -= 1;
        if self.lock.nesting == 0 {
            log::trace!("leave_cpu_lock");
            self.port.leave_cpu_lock();
            self.dispatch_if_changed();
        }
    }

    /// Run `f` inside a CPU Lock section. CPU Lock is released even if `f`
    /// fails.
    pub(crate) fn with_cpu_lock<R, E>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<BadContextError>,
    {
        let lock = self.lock_cpu()?;
        let result = f(self);
        self.unlock_cpu(lock);
        result
    }

    fn dispatch_if_changed(&mut self) {
        if let Some(next) = self.running_task {
            if self.dispatched_task != Some(next) {
                let prev = self.dispatched_task.replace(next);
                log::trace!("dispatching {prev:?} -> {next:?}");
                self.port.dispatch(prev, next);
            }
        }
    }

    /// Enter a critical section. Critical sections nest; CPU Lock is held
    /// until the outermost one is exited.
    ///
    /// Context switches decided inside a critical section take effect when
    /// it's exited.
    pub fn enter_critical(&mut self) -> Result<(), CpuLockError> {
        let CpuLockToken { _private: () } = self.lock_cpu()?;
        self.lock.critical_nesting += 1;
        Ok(())
    }

    /// Exit a critical section entered by [`Self::enter_critical`].
    pub fn exit_critical(&mut self) -> Result<(), CpuLockError> {
        if self.lock.critical_nesting == 0 {
            log::warn!("`exit_critical` without a matching `enter_critical`");
            return Err(CpuLockError::BadContext);
        }
        self.lock.critical_nesting -= 1;
        self.unlock_cpu(CpuLockToken { _private: () });
        Ok(())
    }

    /// Get the nesting depth of critical sections.
    pub fn critical_nesting(&self) -> usize {
        self.lock.critical_nesting
    }

    /// Return a flag indicating whether CPU Lock is active.
    pub fn is_cpu_lock_active(&self) -> bool {
        self.lock.nesting != 0
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::{kernel, TestPort};

    #[test]
    fn nesting() {
        let mut kernel = kernel(|_| {});
        assert!(!kernel.is_cpu_lock_active());

        kernel.enter_critical().unwrap();
        kernel.enter_critical().unwrap();
        assert_eq!(kernel.critical_nesting(), 2);
        assert_eq!(kernel.port().lock_count, 1);

        kernel.exit_critical().unwrap();
        assert!(kernel.port().cpu_lock);
        kernel.exit_critical().unwrap();
        assert!(!kernel.port().cpu_lock);
        assert_eq!(kernel.critical_nesting(), 0);

        assert_eq!(
            kernel.exit_critical(),
            Err(crate::CpuLockError::BadContext)
        );
    }

    #[test]
    fn refused_by_port() {
        let mut kernel = kernel(|_| {});
        kernel.port_mut().cpu_lock = true;
        assert_eq!(
            kernel.enter_critical(),
            Err(crate::CpuLockError::BadContext)
        );
        assert_eq!(kernel.critical_nesting(), 0);
        let _: &TestPort = kernel.port();
    }

    #[test]
    fn dispatch_deferred_until_exit() {
        let mut kernel = kernel(|_| {});
        let low = kernel.create_task(crate::TaskAttr { name: "low", priority: 1 }).unwrap();
        kernel.start().unwrap();
        assert_eq!(kernel.port().dispatched, [(None, low)]);

        kernel.enter_critical().unwrap();
        let high = kernel.create_task(crate::TaskAttr { name: "high", priority: 3 }).unwrap();

        // The scheduler has chosen `high`, but the port hasn't been told yet
        assert_eq!(kernel.current_task(), Some(high));
        assert_eq!(kernel.port().dispatched.len(), 1);

        kernel.exit_critical().unwrap();
        assert_eq!(kernel.port().dispatched, [(None, low), (Some(low), high)]);
    }
}
