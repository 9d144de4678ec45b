//! Software timer wrapper
//!
//! Provides a handle around kernel software timers.
//! Timers run callbacks in the timer service task context.

use crate::error::KernelResult;
use crate::kernel::{Kernel, TimerCallback};
use crate::port::Port;
use crate::types::*;

/// A software timer that executes a callback after a specified period.
///
/// Timers can be one-shot (fire once) or auto-reload (periodic).
/// Commands are queued for the timer service task, which applies them
/// and runs callbacks in task context, not in interrupt context.
///
/// # Example
///
/// ```ignore
/// use rtkernel::sync::Timer;
///
/// fn my_callback(kernel: &mut Kernel<MyPort>, _timer: TimerId) {
///     // Called every 1000 ticks
/// }
///
/// let timer = Timer::new_periodic(&mut kernel, "MyTimer", 1000, my_callback)?;
/// timer.start(&mut kernel, 0)?;
/// ```
///
/// # Callback Context
///
/// Callbacks run inside a critical section of the service task, so they
/// must not block. Zero-timeout sends and gives are fine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timer {
    id: TimerId,
}

impl Timer {
    /// Creates a new periodic (auto-reload) timer.
    ///
    /// The callback will be called every `period_ticks` ticks until stopped.
    pub fn new_periodic<P: Port>(
        kernel: &mut Kernel<P>,
        name: &str,
        period_ticks: TickType,
        callback: TimerCallback<P>,
    ) -> KernelResult<Self> {
        Self::with_reload(kernel, name, period_ticks, true, callback)
    }

    /// Creates a new one-shot timer.
    ///
    /// The callback will be called once after `period_ticks`, then the timer
    /// stops automatically. Call `start()` or `reset()` to fire again.
    pub fn new_oneshot<P: Port>(
        kernel: &mut Kernel<P>,
        name: &str,
        period_ticks: TickType,
        callback: TimerCallback<P>,
    ) -> KernelResult<Self> {
        Self::with_reload(kernel, name, period_ticks, false, callback)
    }

    fn with_reload<P: Port>(
        kernel: &mut Kernel<P>,
        name: &str,
        period_ticks: TickType,
        auto_reload: bool,
        callback: TimerCallback<P>,
    ) -> KernelResult<Self> {
        let id = kernel.timer_create(name, period_ticks, auto_reload, 0, callback)?;
        Ok(Self { id })
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Starts the timer, waiting up to `ticks` for room in the command
    /// queue.
    ///
    /// For periodic timers, the callback will fire every period.
    /// For one-shot timers, the callback will fire once after the period.
    pub fn start<P: Port>(&self, kernel: &mut Kernel<P>, ticks: TickType) -> KernelResult<Wait<()>> {
        kernel.timer_start(self.id, ticks)
    }

    /// Stops the timer.
    ///
    /// The callback will not fire until the timer is started again.
    pub fn stop<P: Port>(&self, kernel: &mut Kernel<P>, ticks: TickType) -> KernelResult<Wait<()>> {
        kernel.timer_stop(self.id, ticks)
    }

    /// Resets the timer, restarting its period from now.
    ///
    /// If the timer was stopped, this also starts it.
    pub fn reset<P: Port>(&self, kernel: &mut Kernel<P>, ticks: TickType) -> KernelResult<Wait<()>> {
        kernel.timer_reset(self.id, ticks)
    }

    /// Changes the timer's period and starts it with the new period.
    pub fn set_period<P: Port>(
        &self,
        kernel: &mut Kernel<P>,
        period_ticks: TickType,
        ticks: TickType,
    ) -> KernelResult<Wait<()>> {
        kernel.timer_change_period(self.id, period_ticks, ticks)
    }

    pub fn start_from_isr<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<bool> {
        kernel.timer_start_from_isr(self.id)
    }

    pub fn stop_from_isr<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<bool> {
        kernel.timer_stop_from_isr(self.id)
    }

    /// Returns `true` if the timer is currently running.
    ///
    /// Reflects commands already processed by the service task.
    pub fn is_active<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<bool> {
        kernel.timer_is_active(self.id)
    }

    /// Returns the timer's current period in ticks.
    pub fn period<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<TickType> {
        kernel.timer_period(self.id)
    }

    /// Returns the tick count at which the timer will next expire.
    ///
    /// Only meaningful if the timer is active.
    pub fn expiry_time<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<TickType> {
        kernel.timer_expiry(self.id)
    }

    /// Queues the timer's deletion.
    pub fn delete<P: Port>(self, kernel: &mut Kernel<P>, ticks: TickType) -> KernelResult<Wait<()>> {
        kernel.timer_delete(self.id, ticks)
    }

    /// Returns the timer service task.
    ///
    /// Useful for checking if the current context is the service task.
    pub fn daemon_task<P: Port>(kernel: &Kernel<P>) -> Option<TaskId> {
        kernel.timer_task()
    }
}
