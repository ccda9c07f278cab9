use crate::{error::CreateTaskError, Kernel, KernelTraits, TaskAttr, TaskId};

/// Defines a task and registers it to a [`Kernel`].
///
/// ```rust,ignore
/// let led = CfgTaskBuilder::new()
///     .name("led")
///     .priority(2)
///     .finish(&mut kernel)?;
/// ```
#[must_use = "must register the task by calling `finish`"]
#[derive(Debug, Clone, Copy)]
pub struct CfgTaskBuilder {
    name: &'static str,
    priority: usize,
}

impl Default for CfgTaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CfgTaskBuilder {
    pub const fn new() -> Self {
        Self {
            name: "",
            priority: 0,
        }
    }

    /// Specify the task's name.
    pub const fn name(self, name: &'static str) -> Self {
        Self { name, ..self }
    }

    /// Specify the task's priority. Tasks with higher priority values execute
    /// first. The value must be in range `0..`[`num_task_priority_levels`].
    ///
    /// [`num_task_priority_levels`]: crate::CfgBuilder::num_task_priority_levels
    pub const fn priority(self, priority: usize) -> Self {
        Self { priority, ..self }
    }

    /// Get the attributes for [`Kernel::create_task`].
    pub const fn to_attr(&self) -> TaskAttr {
        TaskAttr {
            name: self.name,
            priority: self.priority,
        }
    }

    /// Complete the definition of a task and create it in `kernel`. The task
    /// starts in the Ready state.
    pub fn finish<Traits: KernelTraits>(
        self,
        kernel: &mut Kernel<Traits>,
    ) -> Result<TaskId, CreateTaskError> {
        kernel.create_task(self.to_attr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tests::kernel, TaskSt};

    #[test]
    fn define_task() {
        let mut kernel = kernel(|_| {});
        let led = CfgTaskBuilder::new()
            .name("led")
            .priority(2)
            .finish(&mut kernel)
            .unwrap();
        assert_eq!(kernel.task_name(led), Ok("led"));
        assert_eq!(kernel.task_priority(led), Ok(2));
        assert_eq!(kernel.task_state(led), Ok(TaskSt::Ready));

        assert_eq!(
            CfgTaskBuilder::new().priority(100).finish(&mut kernel),
            Err(CreateTaskError::BadParam)
        );
    }
}
