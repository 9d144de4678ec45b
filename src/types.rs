/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] Base types shared by the kernel, the port layer and the typed
 * wrappers. Handles are plain indices into kernel-owned arenas instead of
 * opaque pointers.
 */

//! Kernel Base Types
//!
//! - [`TickType`] - Tick counter type (32-bit, wraps)
//! - [`StackType`] - Stack element type
//! - [`Priority`] - Task priority, 0 is the lowest
//! - [`TaskId`], [`QueueId`], [`SemaphoreId`], [`MutexId`], [`TimerId`] -
//!   handles into the kernel arenas
//! - [`TaskState`], [`Wait`], [`WakeReason`]

use core::fmt;

// =============================================================================
// Scalar types
// =============================================================================

/// Tick counter type. The counter wraps; every comparison on wake ticks is
/// done with modular arithmetic.
pub type TickType = u32;

/// Stack element type (one machine word on a 32-bit target).
pub type StackType = u32;

/// Task priority. Higher numbers are more important; 0 is the idle priority.
pub type Priority = u8;

/// Block indefinitely.
pub const MAX_DELAY: TickType = TickType::MAX;

/// Largest finite timeout. Longer finite timeouts are clamped to this value so
/// that wrap-aware comparisons of wake ticks stay unambiguous.
pub const MAX_FINITE_DELAY: TickType = i32::MAX as TickType;

/// Priority of the idle task.
pub const IDLE_PRIORITY: Priority = 0;

/// Task entry point. The argument is an application-defined word.
pub type TaskFn = fn(usize);

/// `true` once `now` has reached or passed `wake`, tolerating counter wrap.
#[inline(always)]
pub const fn tick_reached(now: TickType, wake: TickType) -> bool {
    (now.wrapping_sub(wake) as i32) >= 0
}

/// Clamp a relative timeout into the range the delayed list can order.
#[inline(always)]
pub const fn clamp_timeout(ticks: TickType) -> TickType {
    if ticks == MAX_DELAY || ticks <= MAX_FINITE_DELAY {
        ticks
    } else {
        MAX_FINITE_DELAY
    }
}

// =============================================================================
// Handles
// =============================================================================

/// Stable identity of a task.
///
/// `index` is the slot in the task arena and stays fixed for the lifetime of
/// the task. `generation` changes every time a slot is reused, so an id kept
/// after its task was reclaimed is rejected instead of aliasing a new task.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    index: u16,
    generation: u16,
}

impl TaskId {
    pub(crate) const fn new(index: u16, generation: u16) -> Self {
        TaskId { index, generation }
    }

    /// Slot number of the task (a small integer, unique among live tasks).
    pub const fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) const fn generation(self) -> u16 {
        self.generation
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({}#{})", self.index, self.generation)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task{}", self.index)
    }
}

macro_rules! object_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u16);

        impl $name {
            /// Slot number of the object.
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

object_id!(
    /// Handle to a kernel queue.
    QueueId
);
object_id!(
    /// Handle to a binary or counting semaphore.
    SemaphoreId
);
object_id!(
    /// Handle to a (possibly recursive) mutex.
    MutexId
);
object_id!(
    /// Handle to a software timer.
    TimerId
);

// =============================================================================
// Task state
// =============================================================================

/// Task states as reported by `Kernel::task_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Task is executing.
    Running,
    /// Task is ready to run.
    Ready,
    /// Task is waiting for an event or a delay.
    Blocked,
    /// Task is suspended and ignored by the scheduler.
    Suspended,
    /// Task deleted itself and waits for its TCB to be reclaimed.
    Deleted,
}

impl TaskState {
    /// Single character used in task listings.
    pub const fn as_char(self) -> char {
        match self {
            TaskState::Running => 'X',
            TaskState::Ready => 'R',
            TaskState::Blocked => 'B',
            TaskState::Suspended => 'S',
            TaskState::Deleted => 'D',
        }
    }
}

/// Result of a call that may suspend the calling task.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait<T> {
    /// The call completed without blocking.
    Done(T),
    /// The caller is now Blocked. When it runs again its outcome is collected
    /// with `Kernel::take_wake_outcome`.
    Blocked,
}

impl<T> Wait<T> {
    /// `true` if the call suspended the caller.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Wait::Blocked)
    }

    /// The value of a completed call.
    pub fn done(self) -> Option<T> {
        match self {
            Wait::Done(value) => Some(value),
            Wait::Blocked => None,
        }
    }
}

/// Why a blocked task became ready again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// The awaited event happened (item, token, ownership, notification).
    Signaled,
    /// The timeout elapsed first.
    Timeout,
    /// `Kernel::abort_delay` forced the task awake.
    Aborted,
}

impl WakeReason {
    /// `Ok` for a signaled wait, the matching error otherwise.
    pub const fn into_result(self) -> crate::error::KernelResult<()> {
        match self {
            WakeReason::Signaled => Ok(()),
            WakeReason::Timeout => Err(crate::error::KernelError::Timeout),
            WakeReason::Aborted => Err(crate::error::KernelError::Aborted),
        }
    }
}

/// What to do to the notification word of the target task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyAction {
    /// Only mark the notification pending.
    NoAction,
    /// OR the value into the notification word.
    SetBits,
    /// Increment the notification word.
    Increment,
    /// Overwrite the notification word.
    SetValueWithOverwrite,
    /// Write the word only if no notification is pending.
    SetValueWithoutOverwrite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_reached_wraps() {
        assert!(tick_reached(10, 10));
        assert!(tick_reached(11, 10));
        assert!(!tick_reached(9, 10));
        // Wake tick just past the wrap point.
        assert!(!tick_reached(u32::MAX, 2));
        assert!(tick_reached(3, u32::MAX - 1));
    }

    #[test]
    fn test_clamp_timeout() {
        assert_eq!(clamp_timeout(0), 0);
        assert_eq!(clamp_timeout(MAX_DELAY), MAX_DELAY);
        assert_eq!(clamp_timeout(MAX_FINITE_DELAY + 5), MAX_FINITE_DELAY);
    }

    #[test]
    fn test_wait_accessors() {
        let w: Wait<u8> = Wait::Done(3);
        assert!(!w.is_blocked());
        assert_eq!(w.done(), Some(3));
        assert!(Wait::<u8>::Blocked.is_blocked());
    }

    #[test]
    fn test_state_chars() {
        assert_eq!(TaskState::Running.as_char(), 'X');
        assert_eq!(TaskState::Deleted.as_char(), 'D');
    }
}
