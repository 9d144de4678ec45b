//! Task handle wrapper
//!
//! Provides a typed handle around kernel task creation and management.
//!
//! # Task Creation
//!
//! Every task gets its stack from the kernel's task arena. The entry
//! function receives one `usize` argument chosen at spawn time.

use crate::error::{KernelError, KernelResult};
use crate::kernel::{Kernel, TaskInfo};
use crate::port::Port;
use crate::types::*;

/// A handle to a kernel task.
///
/// This handle can be used to suspend, resume, or delete the task.
/// The handle is `Copy` and can be freely duplicated; once the task is
/// deleted and reclaimed every copy is rejected by the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    id: TaskId,
}

impl TaskHandle {
    // =========================================================================
    // Creation
    // =========================================================================

    /// Spawns a new task.
    ///
    /// # Arguments
    ///
    /// * `name` - Task name, truncated to the configured maximum length
    /// * `stack_words` - Stack size in words (not bytes)
    /// * `priority` - Task priority (higher = more important)
    /// * `entry` - The task function to run
    pub fn spawn<P: Port>(
        kernel: &mut Kernel<P>,
        name: &str,
        stack_words: usize,
        priority: Priority,
        entry: TaskFn,
    ) -> KernelResult<Self> {
        Self::spawn_with_param(kernel, name, stack_words, priority, entry, 0)
    }

    /// Spawns a new task with a parameter passed to its entry function.
    pub fn spawn_with_param<P: Port>(
        kernel: &mut Kernel<P>,
        name: &str,
        stack_words: usize,
        priority: Priority,
        entry: TaskFn,
        param: usize,
    ) -> KernelResult<Self> {
        let id = kernel.create_task(name, priority, stack_words, entry, param)?;
        Ok(Self { id })
    }

    /// Wraps an existing task id.
    pub fn from_id(id: TaskId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    // =========================================================================
    // Task Control
    // =========================================================================

    /// Suspends this task.
    ///
    /// A suspended task will not run until `resume()` is called.
    pub fn suspend<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<()> {
        kernel.suspend_task(self.id)
    }

    /// Resumes a suspended task.
    pub fn resume<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<()> {
        kernel.resume_task(self.id)
    }

    /// Resumes a suspended task from an ISR. Returns whether the resumed
    /// task should preempt the interrupted one.
    pub fn resume_from_isr<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<bool> {
        kernel.resume_task_from_isr(self.id)
    }

    /// Deletes this task.
    ///
    /// This takes `self` by value to discourage (but not prevent)
    /// using the handle after deletion.
    pub fn delete<P: Port>(self, kernel: &mut Kernel<P>) -> KernelResult<()> {
        kernel.delete_task(self.id)
    }

    /// Forces the task out of a delay or a blocking call.
    pub fn abort_delay<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<()> {
        kernel.abort_delay(self.id)
    }

    // =========================================================================
    // Priority
    // =========================================================================

    /// Gets this task's effective priority, including any inherited boost.
    pub fn priority<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<Priority> {
        kernel.priority(self.id)
    }

    /// Sets this task's base priority.
    pub fn set_priority<P: Port>(&self, kernel: &mut Kernel<P>, priority: Priority) -> KernelResult<()> {
        kernel.set_priority(self.id, priority)
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub fn notify<P: Port>(
        &self,
        kernel: &mut Kernel<P>,
        value: u32,
        action: NotifyAction,
    ) -> KernelResult<()> {
        kernel.notify(self.id, value, action)
    }

    /// Increments the notification word, the lightweight counting
    /// semaphore give.
    pub fn notify_give<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<()> {
        kernel.notify_give(self.id)
    }

    // =========================================================================
    // Query
    // =========================================================================

    pub fn state<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<TaskState> {
        kernel.task_state(self.id)
    }

    pub fn name<'k, P: Port>(&self, kernel: &'k Kernel<P>) -> KernelResult<&'k str> {
        kernel.task_name(self.id)
    }

    /// Minimum free stack, in words, seen so far.
    pub fn stack_high_water_mark<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<usize> {
        kernel.stack_high_water_mark(self.id)
    }

    pub fn info<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<TaskInfo> {
        kernel.task_info(self.id)
    }

    /// Gets the handle of the currently running task.
    pub fn current<P: Port>(kernel: &Kernel<P>) -> KernelResult<Self> {
        kernel
            .current()
            .map(Self::from_id)
            .ok_or(KernelError::InvalidState("scheduler not running"))
    }
}

impl From<TaskId> for TaskHandle {
    fn from(id: TaskId) -> Self {
        Self { id }
    }
}
