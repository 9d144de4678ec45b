/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] The scheduler globals of tasks.c (pxCurrentTCB, the ready and
 * delayed lists, xTickCount, uxCriticalNesting, xYieldPendings, ...) are the
 * fields of a single owned `Kernel`. Every API function is a method on it and
 * runs on behalf of the current task.
 */

//! Kernel
//!
//! This module contains the scheduler core shared by the object modules:
//!
//! - `tasks` - Task creation, deletion, delays, priorities, notifications
//! - `list` - Ready, delayed and event wait lists
//! - `queue` - Queues
//! - `semaphore` - Binary and counting semaphores
//! - `mutex` - Mutexes with priority inheritance
//! - `timers` - Software timer service
//! - `cell` - Init-once global kernel instance
//!
//! ## Execution model
//!
//! The kernel is a deterministic state machine. Calls that may suspend the
//! caller return [`Wait`]; once the caller is switched out, later calls are
//! made on behalf of the task that is now [`Kernel::current`]. When a blocked
//! task runs again, [`Kernel::take_wake_outcome`] tells why it woke.
//!
//! Switch requests raised inside a critical section or between
//! [`Kernel::enter_isr`] and [`Kernel::exit_isr`] are latched and performed
//! when the outermost section is left.

pub mod cell;
pub(crate) mod list;
pub mod mutex;
pub mod queue;
pub mod semaphore;
pub mod tasks;
#[cfg(feature = "timers")]
pub mod timers;

use alloc::vec::Vec;

use crate::config::*;
use crate::error::{KernelError, KernelResult};
use crate::port::Port;
use crate::trace::*;
use crate::types::*;

use list::{DelayedList, ReadyLists};
use mutex::MutexObject;
use queue::QueueObject;
use semaphore::SemaphoreObject;
use tasks::{BlockedOn, NotifyState, TaskSlot};

pub use cell::KernelCell;
pub use tasks::TaskInfo;
#[cfg(feature = "timers")]
pub use timers::TimerCallback;

/// The kernel.
pub struct Kernel<P: Port> {
    config: Config,
    port: P,

    /* Task registry */
    tasks: Vec<TaskSlot>,
    current: Option<TaskId>,
    idle_task: Option<TaskId>,
    /// Self-deleted tasks already switched away from, waiting for the idle task.
    terminated: Vec<TaskId>,

    /* Scheduler lists */
    ready: ReadyLists,
    delayed: DelayedList,

    /* Scheduler state */
    tick_count: TickType,
    critical_nesting: u32,
    isr_nesting: u32,
    yield_pending: bool,
    scheduler_running: bool,
    halted: Option<KernelError>,
    switch_count: u32,

    /* Objects */
    queues: Vec<Option<QueueObject>>,
    semaphores: Vec<Option<SemaphoreObject>>,
    mutexes: Vec<Option<MutexObject>>,
    #[cfg(feature = "timers")]
    timer_service: timers::TimerService<P>,
}

impl<P: Port> Kernel<P> {
    /// Create a kernel with no tasks. Nothing runs until [`Kernel::start`].
    pub fn new(config: Config, port: P) -> KernelResult<Self> {
        config.validate()?;
        Ok(Kernel {
            port,
            tasks: Vec::with_capacity(config.max_tasks),
            current: None,
            idle_task: None,
            terminated: Vec::new(),
            ready: ReadyLists::new(config.max_priorities),
            delayed: DelayedList::new(),
            tick_count: config.initial_tick_count,
            critical_nesting: 0,
            isr_nesting: 0,
            yield_pending: false,
            scheduler_running: false,
            halted: None,
            switch_count: 0,
            queues: Vec::new(),
            semaphores: Vec::new(),
            mutexes: Vec::new(),
            #[cfg(feature = "timers")]
            timer_service: timers::TimerService::new(),
            config,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Task the kernel is currently acting for. `None` before [`Kernel::start`].
    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    pub fn tick_count(&self) -> TickType {
        self.tick_count
    }

    pub fn is_running(&self) -> bool {
        self.scheduler_running
    }

    /// The fatal error that stopped the kernel, if any.
    pub fn halted(&self) -> Option<KernelError> {
        self.halted
    }

    /// Number of context switches performed so far.
    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }

    pub fn idle_task(&self) -> Option<TaskId> {
        self.idle_task
    }

    pub fn in_isr(&self) -> bool {
        self.isr_nesting > 0
    }

    pub fn critical_nesting(&self) -> u32 {
        self.critical_nesting
    }

    /// A switch was requested and is held back by a critical section or ISR.
    pub fn yield_pending(&self) -> bool {
        self.yield_pending
    }

    // =========================================================================
    // Scheduler start
    // =========================================================================

    /// Create the idle task (and the timer service), set up the tick interrupt
    /// and switch to the highest-priority ready task.
    pub fn start(&mut self) -> KernelResult<()> {
        self.check_alive()?;
        if self.scheduler_running {
            return Err(KernelError::InvalidState("scheduler already running"));
        }

        let idle = self.create_task(
            "IDLE",
            IDLE_PRIORITY,
            self.config.minimal_stack_size,
            tasks::idle_task_entry,
            0,
        )?;
        self.idle_task = Some(idle);

        #[cfg(feature = "timers")]
        self.create_timer_task()?;

        let first = match self.ready.highest() {
            Some(task) => task,
            None => return Err(self.fatal(KernelError::AssertionFailure("no task to start"))),
        };
        self.tcb_mut(first)?.state = TaskState::Running;
        self.current = Some(first);
        self.scheduler_running = true;

        self.port.setup_tick_interrupt(self.config.tick_rate_hz);
        traceSCHEDULER_START(first, self.config.tick_rate_hz);
        let ctx = self.tcb(first)?.context.clone();
        self.port.restore_context(first, &ctx);
        traceTASK_SWITCHED_IN(first);
        Ok(())
    }

    // =========================================================================
    // Critical sections and interrupts
    // =========================================================================

    /// Enter a (nestable) critical section. Interrupts are masked by the
    /// outermost entry.
    pub fn enter_critical(&mut self) {
        if self.critical_nesting == 0 {
            self.port.disable_interrupts();
        }
        self.critical_nesting += 1;
    }

    /// Leave a critical section. The outermost exit unmasks interrupts and
    /// performs a switch latched meanwhile.
    pub fn exit_critical(&mut self) {
        if self.critical_nesting == 0 {
            self.fatal(KernelError::AssertionFailure(
                "critical section exit without entry",
            ));
            return;
        }
        self.critical_nesting -= 1;
        if self.critical_nesting == 0 {
            self.port.enable_interrupts();
            if self.isr_nesting == 0 {
                self.apply_pending_switch();
            }
        }
    }

    /// Run `f` inside a critical section.
    pub(crate) fn critical<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.enter_critical();
        let result = f(self);
        self.exit_critical();
        result
    }

    /// Mark entry into an interrupt handler.
    pub fn enter_isr(&mut self) {
        self.isr_nesting += 1;
    }

    /// Mark exit from an interrupt handler. Leaving the outermost handler
    /// performs a switch requested during it (portYIELD_FROM_ISR).
    pub fn exit_isr(&mut self) {
        if self.isr_nesting == 0 {
            self.fatal(KernelError::AssertionFailure("interrupt exit without entry"));
            return;
        }
        self.isr_nesting -= 1;
        if self.isr_nesting == 0 && self.critical_nesting == 0 {
            self.apply_pending_switch();
        }
    }

    /// Tick interrupt handler body: `enter_isr`, `tick_advance`, `exit_isr`.
    /// Returns whether a switch was requested.
    pub fn tick_interrupt(&mut self) -> KernelResult<bool> {
        self.enter_isr();
        let result = self.tick_advance();
        self.exit_isr();
        result
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Advance the tick count by one: wake every delayed task whose wake tick
    /// has been reached, charge the tick to the running task and apply time
    /// slicing. Returns whether a switch was requested.
    pub fn tick_advance(&mut self) -> KernelResult<bool> {
        self.check_alive()?;
        if !self.scheduler_running {
            return Err(KernelError::InvalidState("scheduler not running"));
        }
        Ok(self.critical(|k| k.increment_tick()))
    }

    fn increment_tick(&mut self) -> bool {
        let now = self.tick_count.wrapping_add(1);
        self.tick_count = now;
        traceTASK_INCREMENT_TICK(now);

        if let Some(id) = self.current {
            if let Ok(tcb) = self.tcb_mut(id) {
                tcb.run_ticks = tcb.run_ticks.wrapping_add(1);
            }
        }

        let mut switch_required = false;
        while let Some(task) = self.delayed.pop_expired(now) {
            if self.wake_task(task, WakeReason::Timeout) {
                switch_required = true;
            }
        }

        if self.config.use_preemption && self.config.use_time_slicing {
            if let Some((cur, priority)) = self.running_task() {
                let higher_ready = self
                    .ready
                    .highest_priority()
                    .is_some_and(|top| top > priority);
                if !higher_ready && self.ready.len(priority) > 1 {
                    self.ready.remove(priority, cur);
                    self.ready.push_back(priority, cur);
                    self.request_reschedule();
                    switch_required = true;
                }
            }
        }
        switch_required
    }

    // =========================================================================
    // Context switching
    // =========================================================================

    /// The current task and its effective priority, if it is Running.
    pub(crate) fn running_task(&self) -> Option<(TaskId, Priority)> {
        let id = self.current?;
        let tcb = self.tcb(id).ok()?;
        (tcb.state == TaskState::Running).then_some((id, tcb.priority))
    }

    /// Ask for a switch at the next opportunity. Always latched; the outermost
    /// critical section exit or interrupt exit carries it out.
    pub(crate) fn request_reschedule(&mut self) {
        if self.scheduler_running {
            self.yield_pending = true;
        }
    }

    /// Request a switch if `task` outranks the running task.
    pub(crate) fn preempt_if_higher(&mut self, task: TaskId) -> bool {
        if !self.scheduler_running || !self.config.use_preemption {
            return false;
        }
        let priority = match self.tcb(task) {
            Ok(tcb) => tcb.priority,
            Err(_) => return false,
        };
        match self.running_task() {
            Some((_, running)) if priority <= running => false,
            _ => {
                self.request_reschedule();
                true
            }
        }
    }

    fn apply_pending_switch(&mut self) {
        if self.yield_pending && self.scheduler_running && self.halted.is_none() {
            self.yield_pending = false;
            self.switch_context();
        }
    }

    /// Hand the CPU to the head of the highest-priority ready sub-list.
    pub(crate) fn switch_context(&mut self) {
        let next = match self.ready.highest() {
            Some(task) => task,
            None => {
                self.fatal(KernelError::AssertionFailure("ready list empty"));
                return;
            }
        };
        let outgoing = self.current;
        if outgoing == Some(next) {
            return;
        }

        self.port.trigger_switch();

        if let Some(out) = outgoing {
            let check = self.config.check_for_stack_overflow;
            let mut overflowed = false;
            let mut deleted = false;
            if let Some(tcb) = tasks::slot_mut(&mut self.tasks, out) {
                self.port.save_context(out, &mut tcb.context, &mut tcb.stack);
                overflowed = check && !tcb.canary_intact();
                deleted = tcb.state == TaskState::Deleted;
                if tcb.state == TaskState::Running {
                    tcb.state = TaskState::Ready;
                }
            }
            traceTASK_SWITCHED_OUT(out);
            if overflowed {
                self.fatal(KernelError::StackOverflow(out));
                return;
            }
            if deleted {
                self.terminated.push(out);
            }
        }

        let ctx = match self.tcb_mut(next) {
            Ok(tcb) => {
                tcb.state = TaskState::Running;
                tcb.context.clone()
            }
            Err(_) => {
                self.fatal(KernelError::AssertionFailure("stale task in ready list"));
                return;
            }
        };
        self.current = Some(next);
        self.port.restore_context(next, &ctx);
        self.switch_count = self.switch_count.wrapping_add(1);
        traceTASK_SWITCHED_IN(next);
    }

    // =========================================================================
    // Blocking and waking
    // =========================================================================

    /// Reject a wait that cannot be honoured in the current context. A zero
    /// timeout never blocks and is always accepted.
    pub(crate) fn check_block_context(&self, timeout: TickType) -> KernelResult<()> {
        if timeout == 0 {
            return Ok(());
        }
        if self.isr_nesting > 0 {
            return Err(KernelError::InvalidState("blocking call from interrupt"));
        }
        if self.critical_nesting > 0 {
            return Err(KernelError::InvalidState(
                "blocking call inside critical section",
            ));
        }
        Ok(())
    }

    /// Move the running task out of the ready list into the Blocked state.
    /// The caller registers it with the object it waits on.
    pub(crate) fn block_current(
        &mut self,
        on: BlockedOn,
        timeout: TickType,
    ) -> KernelResult<TaskId> {
        let (task, priority) = self
            .running_task()
            .ok_or(KernelError::InvalidState("no running task to block"))?;
        if self.idle_task == Some(task) {
            return Err(KernelError::InvalidState("the idle task cannot block"));
        }
        let timeout = clamp_timeout(timeout);
        let wake = self.tick_count.wrapping_add(timeout);

        self.ready.remove(priority, task);
        let tcb = self.tcb_mut(task)?;
        tcb.state = TaskState::Blocked;
        tcb.blocked_on = Some(on);
        tcb.wake_outcome = None;
        if timeout == MAX_DELAY {
            tcb.wake_tick = None;
        } else {
            tcb.wake_tick = Some(wake);
            self.delayed.insert(self.tick_count, wake, task);
        }
        traceBLOCKING_ON(task, timeout);
        self.request_reschedule();
        Ok(task)
    }

    /// Make a Blocked task ready, retracting whatever registration is left.
    /// Returns whether this requested a preemption.
    pub(crate) fn wake_task(&mut self, task: TaskId, reason: WakeReason) -> bool {
        let on = match self.tcb_mut(task) {
            Ok(tcb) if tcb.state == TaskState::Blocked => {
                tcb.wake_outcome = Some(reason);
                tcb.wake_tick = None;
                tcb.blocked_on.take()
            }
            _ => return false,
        };
        self.delayed.remove(task);
        if let Some(on) = on {
            self.retract_wait(task, on, reason);
        }
        traceTASK_WAKE(task, reason);
        self.add_to_ready(task);
        self.preempt_if_higher(task)
    }

    /// Leave the wait list of `on`. A waiter leaving a mutex without getting
    /// it no longer lends its priority to the owner.
    fn retract_wait(&mut self, task: TaskId, on: BlockedOn, reason: WakeReason) {
        match on {
            BlockedOn::Delay => {}
            BlockedOn::QueueSend { queue, .. } => {
                if let Some(q) = self.queue_slot(queue) {
                    q.senders.remove(task);
                }
                if reason != WakeReason::Signaled {
                    if let Ok(tcb) = self.tcb_mut(task) {
                        tcb.transfer = None;
                    }
                }
            }
            BlockedOn::QueueReceive { queue, .. } => {
                if let Some(q) = self.queue_slot(queue) {
                    q.receivers.remove(task);
                }
            }
            BlockedOn::Semaphore(sem) => {
                if let Some(s) = self.semaphore_slot(sem) {
                    s.waiters.remove(task);
                }
            }
            BlockedOn::Mutex(mutex) => {
                let owner = self.mutex_slot(mutex).and_then(|m| {
                    m.waiters.remove(task);
                    m.owner
                });
                if reason != WakeReason::Signaled {
                    if let Some(owner) = owner {
                        self.recompute_priority(owner);
                    }
                }
            }
            BlockedOn::Notify(_) => {
                if let Ok(tcb) = self.tcb_mut(task) {
                    if reason != WakeReason::Signaled {
                        tcb.notify_state = NotifyState::NotWaiting;
                    }
                }
            }
        }
    }

    /// Append a task to the tail of its ready sub-list.
    pub(crate) fn add_to_ready(&mut self, task: TaskId) {
        if let Ok(tcb) = self.tcb_mut(task) {
            tcb.state = TaskState::Ready;
            let priority = tcb.priority;
            self.ready.push_back(priority, task);
        }
    }

    /// Why `task` last left the Blocked state. Consumes the outcome.
    pub fn take_wake_outcome(&mut self, task: TaskId) -> KernelResult<WakeReason> {
        self.check_alive()?;
        self.tcb_mut(task)?
            .wake_outcome
            .take()
            .ok_or(KernelError::InvalidState("no wait outcome pending"))
    }

    /// Copy out the item a queue handed to `task` while it was blocked
    /// receiving or peeking.
    pub fn take_received(&mut self, task: TaskId, buf: &mut [u8]) -> KernelResult<()> {
        self.check_alive()?;
        let tcb = self.tcb_mut(task)?;
        match tcb.transfer.take() {
            Some(item) if item.len() == buf.len() => {
                buf.copy_from_slice(&item);
                Ok(())
            }
            Some(item) => {
                tcb.transfer = Some(item);
                Err(KernelError::InvalidState("item size mismatch"))
            }
            None => Err(KernelError::InvalidState("no item received")),
        }
    }

    // =========================================================================
    // Faults
    // =========================================================================

    /// Fail with the halting error once the kernel has stopped.
    pub(crate) fn check_alive(&self) -> KernelResult<()> {
        match self.halted {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Report a fatal error and halt scheduling. Returns the error so callers
    /// can `return Err(self.fatal(..))`.
    pub(crate) fn fatal(&mut self, err: KernelError) -> KernelError {
        if self.halted.is_none() {
            traceFAULT(&err);
            self.port.fault(&err);
            self.halted = Some(err);
            self.yield_pending = false;
        }
        err
    }

    /// configASSERT: a violated internal invariant halts the kernel.
    pub(crate) fn kassert(&mut self, cond: bool, what: &'static str) -> KernelResult<()> {
        if cond {
            Ok(())
        } else {
            Err(self.fatal(KernelError::AssertionFailure(what)))
        }
    }

    /// Check the task lists against the task states, and that the running
    /// task heads the highest-priority non-empty ready sub-list. The latter
    /// holds after every switch when preemption is enabled.
    pub fn check_invariants(&mut self) -> KernelResult<()> {
        self.check_alive()?;
        let consistent = self.lists_consistent();
        self.kassert(consistent, "task lists out of step with task states")?;
        if !self.scheduler_running || self.yield_pending {
            return Ok(());
        }
        let running = self.running_task().map(|(id, _)| id);
        let head = self.ready.highest();
        let ok = !self.config.use_preemption || (running.is_some() && running == head);
        self.kassert(ok, "running task is not the highest-priority ready task")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::dummy::{DummyPort, PortEvent};

    fn body(_: usize) {}

    /// Start the scheduler and let the timer service block on its queue.
    fn start(k: &mut Kernel<DummyPort>) {
        k.start().unwrap();
        #[cfg(feature = "timers")]
        if k.current() == k.timer_task() {
            assert!(k.run_timer_service().unwrap().is_blocked());
        }
    }

    fn kernel() -> Kernel<DummyPort> {
        let config = Config {
            max_tasks: 8,
            ..Config::DEFAULT
        };
        Kernel::new(config, DummyPort::new()).unwrap()
    }

    #[test]
    fn test_start_runs_highest_priority() {
        let mut k = kernel();
        let low = k.create_task("low", 1, 64, body, 0).unwrap();
        let high = k.create_task("high", 3, 64, body, 0).unwrap();
        assert_eq!(k.current(), None);
        start(&mut k);
        assert_eq!(k.current(), Some(high));
        assert_eq!(k.task_state(low), Ok(TaskState::Ready));
        assert!(k.idle_task().is_some());
        assert!(k.port().events().contains(&PortEvent::SetupTick(1000)));
        assert_eq!(k.start(), Err(KernelError::InvalidState("scheduler already running")));
    }

    #[test]
    fn test_switch_latched_in_critical_section() {
        let mut k = kernel();
        let low = k.create_task("low", 1, 64, body, 0).unwrap();
        start(&mut k);
        assert_eq!(k.current(), Some(low));

        k.enter_critical();
        let high = k.create_task("high", 2, 64, body, 0).unwrap();
        assert_eq!(k.current(), Some(low));
        assert!(k.yield_pending());
        k.exit_critical();
        assert_eq!(k.current(), Some(high));
        assert!(!k.yield_pending());
    }

    #[test]
    fn test_switch_deferred_to_isr_exit() {
        let mut k = kernel();
        let low = k.create_task("low", 1, 64, body, 0).unwrap();
        start(&mut k);
        k.enter_isr();
        let high = k.create_task("high", 2, 64, body, 0).unwrap();
        assert_eq!(k.current(), Some(low));
        k.exit_isr();
        assert_eq!(k.current(), Some(high));
    }

    #[test]
    fn test_blocking_rejected_inside_critical_section() {
        let mut k = kernel();
        k.create_task("t", 1, 64, body, 0).unwrap();
        start(&mut k);
        k.enter_critical();
        assert_eq!(
            k.delay(5),
            Err(KernelError::InvalidState("blocking call inside critical section"))
        );
        k.exit_critical();
        k.enter_isr();
        assert_eq!(
            k.delay(5),
            Err(KernelError::InvalidState("blocking call from interrupt"))
        );
        k.exit_isr();
    }

    #[test]
    fn test_unbalanced_exit_is_fatal() {
        let mut k = kernel();
        k.exit_critical();
        let err = KernelError::AssertionFailure("critical section exit without entry");
        assert_eq!(k.halted(), Some(err));
        assert_eq!(k.port().faults(), &[err]);
        assert_eq!(k.create_task("t", 1, 64, body, 0), Err(err));
    }

    #[test]
    fn test_tick_before_start_rejected() {
        let mut k = kernel();
        assert!(k.tick_advance().is_err());
        assert_eq!(k.tick_count(), 0);
    }

    #[test]
    fn test_stack_overflow_halts() {
        let mut k = kernel();
        let a = k.create_task("a", 1, 32, body, 0).unwrap();
        let b = k.create_task("b", 1, 32, body, 0).unwrap();
        start(&mut k);
        assert_eq!(k.current(), Some(a));
        k.port_mut().simulate_stack_usage(a, 32);
        let switched = k.tick_interrupt();
        assert_eq!(switched, Ok(true));
        assert_eq!(k.halted(), Some(KernelError::StackOverflow(a)));
        assert_eq!(k.current(), Some(a));
        assert_eq!(k.tick_advance(), Err(KernelError::StackOverflow(a)));
        assert_ne!(k.current(), Some(b));
    }
}
