//! Result codes and error types
use core::{fmt, mem::transmute};

/// The macro to define [`ResultCode`].
macro_rules! define_result_code {
    (
        $( #[$meta:meta] )*
        pub enum ResultCode {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident = $vd:expr
            ),* $(,)*
        }
    ) => {
        $( #[$meta] )*
        pub enum ResultCode {
            $(
                $( #[$vmeta] )*
                $vname = $vd
            ),*
        }

        impl ResultCode {
            /// Get the short name of the result code.
            ///
            /// # Examples
            ///
            /// ```
            /// use tickos_kernel::ResultCode;
            /// assert_eq!(ResultCode::NotInContainer.as_str(), "NotInContainer");
            /// ```
            pub fn as_str(self) -> &'static str {
                match self {
                    $(
                        Self::$vname => stringify!($vname),
                    )*
                }
            }

            fn fmt(self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl fmt::Debug for ResultCode {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                (*self).fmt(f)
            }
        }
    };
}

define_result_code! {
    /// All result codes (including success) that the kernel can return.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[repr(i8)]
    pub enum ResultCode {
        /// The operation was successful. No additional information is available.
        Success = 0,
        /// A parameter is invalid in a way that is no covered by any other error
        /// codes.
        BadParam = -17,
        /// The specified object identifier is invalid.
        BadId = -18,
        /// The current context disallows the operation.
        BadContext = -25,
        /// A target object is in a state that disallows the operation.
        BadObjectState = -41,
        /// An object couldn't be created or enqueued because there are too many
        /// of such things.
        QueueOverflow = -43,
        /// A node was to be removed from a list, but it's not linked into any
        /// list.
        NotInContainer = -60,
        /// A node was to be inserted into a list, but it's already linked into
        /// one.
        AlreadyLinked = -61,
        /// There is no Ready task at any priority level.
        NoReadyTask = -62,
    }
}

impl ResultCode {
    /// Get a flag indicating whether the code represents a failure.
    ///
    /// Failure codes have negative values.
    #[inline]
    pub fn is_err(self) -> bool {
        (self as i8) < 0
    }

    /// Get a flag indicating whether the code represents a success.
    ///
    /// Success codes have non-negative values.
    #[inline]
    pub fn is_ok(self) -> bool {
        !self.is_err()
    }
}

macro_rules! define_error {
    (
        mod $mod_name:ident {}
        $( #[$meta:meta] )*
        $vis:vis enum $name:ident $(: $($subty:ident),* $(,)*)? {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident
            ),* $(,)*
        }
    ) => {
        $( #[$meta] )*
        ///
        /// See [`ResultCode`] for all result codes and generic descriptions.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(i8)]
        $vis enum $name {
            $(
                $( #[$vmeta] )*
                // Use the same discriminants as `ResultCode` for cost-free
                // conversion
                $vname = ResultCode::$vname as i8
            ),*
        }

        impl fmt::Debug for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                ResultCode::from(*self).fmt(f)
            }
        }

        impl From<Result<(), $name>> for ResultCode {
            #[inline]
            fn from(x: Result<(), $name>) -> Self {
                match x {
                    Ok(()) => Self::Success,
                    Err(e) => Self::from(e),
                }
            }
        }

        impl From<$name> for ResultCode {
            #[inline]
            fn from(x: $name) -> Self {
                // Safety: `ResultCode` and `$name` has the same representation
                //         type, and the representation of `ResultCode` is a
                //         superset of `x`.
                unsafe { transmute(x) }
            }
        }

        #[cfg(test)]
        mod $mod_name {
            use super::*;

            #[test]
            fn to_result_code() {
                $(
                    assert_eq!(
                        ResultCode::$vname,
                        ResultCode::from($name::$vname),
                    );
                )*
            }

            #[test]
            fn result_to_result_code() {
                $(
                    assert_eq!(
                        ResultCode::$vname,
                        ResultCode::from(Err($name::$vname)),
                    );
                )*
                assert_eq!(
                    ResultCode::Success,
                    ResultCode::from(Result::<(), $name>::Ok(())),
                );
            }
        }

        $($(
            $subty!(impl From<_> for $name);
        )*)?

        #[allow(unused_macros)]
        macro_rules! $name {
            (impl From<_> for $dest_ty:ty) => {
                impl From<$name> for $dest_ty {
                    #[inline]
                    fn from(x: $name) -> Self {
                        match x {
                            $(
                                $name::$vname => Self::$vname,
                            )*
                        }
                    }
                }
            };
        }
    };
}

define_error! {
    mod insert_error {}
    /// Error type for [`ListArena::insert_sorted`] and
    /// [`ListArena::insert_end`].
    ///
    /// [`ListArena::insert_sorted`]: crate::utils::intrusive_list::ListArena::insert_sorted
    /// [`ListArena::insert_end`]: crate::utils::intrusive_list::ListArena::insert_end
    pub enum InsertError {
        /// The node is already linked into a list.
        AlreadyLinked,
    }
}

define_error! {
    mod remove_error {}
    /// Error type for [`ListArena::remove`].
    ///
    /// [`ListArena::remove`]: crate::utils::intrusive_list::ListArena::remove
    pub enum RemoveError {
        /// The node is not linked into any list. Removing a node twice is a
        /// caller bug.
        NotInContainer,
    }
}

define_error! {
    mod select_error {}
    /// Error type for [`ReadyQueue::highest_ready_priority`] and
    /// [`ReadyQueue::select_next`].
    ///
    /// [`ReadyQueue::highest_ready_priority`]: crate::task::readyqueue::ReadyQueue::highest_ready_priority
    /// [`ReadyQueue::select_next`]: crate::task::readyqueue::ReadyQueue::select_next
    pub enum SelectError {
        /// No priority level has a Ready task.
        NoReadyTask,
    }
}

define_error! {
    mod priority_error {}
    /// Error type for [`Kernel::register_priority_ready`] and
    /// [`Kernel::clear_if_empty`].
    ///
    /// [`Kernel::register_priority_ready`]: crate::Kernel::register_priority_ready
    /// [`Kernel::clear_if_empty`]: crate::Kernel::clear_if_empty
    pub enum PriorityError {
        /// The priority is out of range.
        BadParam,
    }
}

define_error! {
    mod cfg_error {}
    /// Error type for [`CfgBuilder::finish`].
    ///
    /// [`CfgBuilder::finish`]: crate::CfgBuilder::finish
    pub enum CfgError {
        /// The number of priority levels is zero or exceeds the capacity of
        /// the ready bitmap, or the task limit is zero.
        BadParam,
    }
}

define_error! {
    mod create_task_error {}
    /// Error type for [`Kernel::create_task`].
    ///
    /// [`Kernel::create_task`]: crate::Kernel::create_task
    pub enum CreateTaskError {
        /// CPU Lock couldn't be acquired.
        BadContext,
        /// The priority is out of range.
        BadParam,
        /// The configured task limit has been reached.
        QueueOverflow,
    }
}

define_error! {
    mod start_error {}
    /// Error type for [`Kernel::start`].
    ///
    /// [`Kernel::start`]: crate::Kernel::start
    pub enum StartError {
        /// CPU Lock couldn't be acquired, or the scheduler is already running.
        BadContext,
    }
}

define_error! {
    mod delay_error {}
    /// Error type for [`Kernel::request_delay`] and
    /// [`Kernel::delay_periodic`].
    ///
    /// [`Kernel::request_delay`]: crate::Kernel::request_delay
    /// [`Kernel::delay_periodic`]: crate::Kernel::delay_periodic
    pub enum DelayError {
        /// The task ID is invalid.
        BadId,
        /// CPU Lock couldn't be acquired, the scheduler is suspended, or
        /// (for `delay_periodic`) there's no running task.
        BadContext,
        /// The task is the idle task, or it's not in the Ready or Running
        /// state.
        BadObjectState,
    }
}

define_error! {
    mod yield_error {}
    /// Error type for [`Kernel::yield_now`].
    ///
    /// [`Kernel::yield_now`]: crate::Kernel::yield_now
    pub enum YieldError {
        /// CPU Lock couldn't be acquired, the scheduler hasn't been started,
        /// or the scheduler is suspended.
        BadContext,
    }
}

define_error! {
    mod tick_error {}
    /// Error type for [`Kernel::on_tick`].
    ///
    /// [`Kernel::on_tick`]: crate::Kernel::on_tick
    pub enum TickError {
        /// CPU Lock couldn't be acquired, or the scheduler hasn't been
        /// started.
        BadContext,
    }
}

define_error! {
    mod suspend_task_error {}
    /// Error type for [`Kernel::suspend_task`].
    ///
    /// [`Kernel::suspend_task`]: crate::Kernel::suspend_task
    pub enum SuspendTaskError {
        /// The task ID is invalid.
        BadId,
        /// CPU Lock couldn't be acquired, or the target is the running task
        /// while the scheduler is suspended.
        BadContext,
        /// The task is the idle task or is already suspended.
        BadObjectState,
    }
}

define_error! {
    mod resume_task_error {}
    /// Error type for [`Kernel::resume_task`].
    ///
    /// [`Kernel::resume_task`]: crate::Kernel::resume_task
    pub enum ResumeTaskError {
        /// The task ID is invalid.
        BadId,
        /// CPU Lock couldn't be acquired.
        BadContext,
        /// The task is not in the Suspended state.
        BadObjectState,
    }
}

define_error! {
    mod scheduler_suspend_error {}
    /// Error type for [`Kernel::suspend_all`] and [`Kernel::resume_all`].
    ///
    /// [`Kernel::suspend_all`]: crate::Kernel::suspend_all
    /// [`Kernel::resume_all`]: crate::Kernel::resume_all
    pub enum SchedulerSuspendError {
        /// CPU Lock couldn't be acquired, or `resume_all` was called without a
        /// matching `suspend_all`.
        BadContext,
    }
}

define_error! {
    mod cpu_lock_error {}
    /// Error type for [`Kernel::enter_critical`] and
    /// [`Kernel::exit_critical`].
    ///
    /// [`Kernel::enter_critical`]: crate::Kernel::enter_critical
    /// [`Kernel::exit_critical`]: crate::Kernel::exit_critical
    pub enum CpuLockError {
        /// The port refused to enter CPU Lock, or `exit_critical` was called
        /// without a matching `enter_critical`.
        BadContext,
    }
}

define_error! {
    mod task_query_error {}
    /// Error type for the task query methods such as
    /// [`Kernel::task_state`].
    ///
    /// [`Kernel::task_state`]: crate::Kernel::task_state
    pub enum TaskQueryError {
        /// The task ID is invalid.
        BadId,
    }
}

macro_rules! define_suberror {
    (
        $( #[doc $( $doc:tt )*] )*
        $( #[into( $Supererror:path )] )*
        $vis:vis enum $Name:ident {
            $( $Variant:ident, )*
        }
    ) => {
        $( #[doc $( $doc )*] )*
        #[repr(i8)]
        #[derive(PartialEq, Eq, Copy, Clone)]
        $vis enum $Name {
            $( $Variant = ResultCode::$Variant as _ ),*
        }

        impl fmt::Debug for $Name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                ResultCode::from(*self).fmt(f)
            }
        }

        define_suberror! {
            @into
            #[into(ResultCode)]
            $( #[into( $Supererror )] )*
            enum $Name {
                $( $Variant, )*
            }
        }
    };

    (
        @into
        #[into( $Supererror0:path )]
        $( #[into( $Supererror:path )] )*
        enum $Name:ident {
            $( $Variant:ident, )*
        }
    ) => {
        impl From<$Name> for $Supererror0 {
            #[inline]
            fn from(x: $Name) -> Self {
                match x {
                    $( $Name::$Variant => Self::$Variant ),*
                }
            }
        }

        define_suberror! {
            @into
            $( #[into( $Supererror )] )*
            enum $Name {
                $( $Variant, )*
            }
        }
    };

    ( @into enum $($_:tt)* ) => {};
}

define_suberror! {
    /// `BadContext`
    #[into(CpuLockError)]
    #[into(CreateTaskError)]
    #[into(DelayError)]
    #[into(ResumeTaskError)]
    #[into(SchedulerSuspendError)]
    #[into(StartError)]
    #[into(SuspendTaskError)]
    #[into(TickError)]
    #[into(YieldError)]
    pub enum BadContextError {
        BadContext,
    }
}

define_suberror! {
    /// `BadId`
    #[into(DelayError)]
    #[into(ResumeTaskError)]
    #[into(SuspendTaskError)]
    #[into(TaskQueryError)]
    pub enum BadIdError {
        BadId,
    }
}

define_suberror! {
    /// `BadParam`
    #[into(CfgError)]
    #[into(CreateTaskError)]
    #[into(PriorityError)]
    pub enum BadParamError {
        BadParam,
    }
}

define_suberror! {
    /// `BadObjectState`
    #[into(DelayError)]
    #[into(ResumeTaskError)]
    #[into(SuspendTaskError)]
    pub enum BadObjectStateError {
        BadObjectState,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suberror_conversion() {
        assert_eq!(
            DelayError::from(BadContextError::BadContext),
            DelayError::BadContext
        );
        assert_eq!(DelayError::from(BadIdError::BadId), DelayError::BadId);
        assert_eq!(
            ResultCode::from(BadObjectStateError::BadObjectState),
            ResultCode::BadObjectState
        );
        assert_eq!(format!("{:?}", BadParamError::BadParam), "BadParam");
    }

    #[test]
    fn is_err() {
        assert!(ResultCode::Success.is_ok());
        assert!(ResultCode::NotInContainer.is_err());
        assert!(ResultCode::NoReadyTask.is_err());
        assert_eq!(ResultCode::AlreadyLinked.as_str(), "AlreadyLinked");
    }
}
