/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] Task management from tasks.c: creation, deletion, delays,
 * suspension, priorities with mutex inheritance and direct-to-task
 * notifications. TCBs live in a generational arena owned by the kernel; the
 * TCB memory of a self-deleted task is reclaimed by the idle task.
 */

//! Task Management

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::mem::size_of;

use super::Kernel;
use crate::config::*;
use crate::error::{KernelError, KernelResult};
use crate::port::{Context, Port};
use crate::trace::*;
use crate::types::*;

const STALE_TASK: KernelError = KernelError::InvalidState("unknown or deleted task");

/// Entry point recorded for the idle task. Its body is [`Kernel::run_idle`].
pub(crate) fn idle_task_entry(_: usize) {}

// =============================================================================
// Task Control Block
// =============================================================================

/// What a Blocked task is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockedOn {
    Delay,
    QueueSend { queue: QueueId, front: bool },
    QueueReceive { queue: QueueId, peek: bool },
    Semaphore(SemaphoreId),
    Mutex(MutexId),
    Notify(NotifyWait),
}

/// Notification wait in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NotifyWait {
    Take { clear_on_exit: bool },
    Wait { clear_on_exit: u32 },
}

/// taskNOT_WAITING_NOTIFICATION / taskWAITING_NOTIFICATION /
/// taskNOTIFICATION_RECEIVED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NotifyState {
    NotWaiting,
    Waiting,
    Received,
}

pub(crate) struct Tcb {
    pub(crate) name: String,
    pub(crate) base_priority: Priority,
    /// Effective priority: base raised by mutex inheritance.
    pub(crate) priority: Priority,
    pub(crate) state: TaskState,
    pub(crate) context: Context,
    /// Lowest address first; the canary is at the low end.
    pub(crate) stack: Vec<StackType>,
    pub(crate) wake_tick: Option<TickType>,
    pub(crate) blocked_on: Option<BlockedOn>,
    pub(crate) mutexes_held: Vec<MutexId>,
    pub(crate) notify_value: u32,
    pub(crate) notify_state: NotifyState,
    pub(crate) notify_result: Option<u32>,
    pub(crate) wake_outcome: Option<WakeReason>,
    /// Item parked by a blocked sender or handed to a blocked receiver.
    pub(crate) transfer: Option<Vec<u8>>,
    pub(crate) run_ticks: u32,
}

impl Tcb {
    /// taskCHECK_FOR_STACK_OVERFLOW, method 2: the lowest words still hold the
    /// fill pattern.
    pub(crate) fn canary_intact(&self) -> bool {
        self.stack
            .iter()
            .take(STACK_CANARY_WORDS)
            .all(|w| *w == STACK_FILL_WORD)
    }

    /// Words at the low end of the stack never written.
    pub(crate) fn stack_high_water_mark(&self) -> usize {
        self.stack
            .iter()
            .take_while(|w| **w == STACK_FILL_WORD)
            .count()
    }
}

/// One arena slot. The generation is bumped whenever the slot is freed.
pub(crate) struct TaskSlot {
    generation: u16,
    tcb: Option<Tcb>,
}

pub(crate) fn slot(tasks: &[TaskSlot], id: TaskId) -> Option<&Tcb> {
    let slot = tasks.get(id.index())?;
    if slot.generation != id.generation() {
        return None;
    }
    slot.tcb.as_ref()
}

pub(crate) fn slot_mut(tasks: &mut [TaskSlot], id: TaskId) -> Option<&mut Tcb> {
    let slot = tasks.get_mut(id.index())?;
    if slot.generation != id.generation() {
        return None;
    }
    slot.tcb.as_mut()
}

/// Snapshot of one task (vTaskGetInfo / TaskStatus_t).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    pub base_priority: Priority,
    pub priority: Priority,
    pub stack_depth: usize,
    pub stack_high_water_mark: usize,
    pub run_ticks: u32,
}

/// One row of a task listing: name, state, priority, free stack, number.
impl fmt::Display for TaskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16}\t{}\t{}\t{}\t{}",
            self.name,
            self.state.as_char(),
            self.priority,
            self.stack_high_water_mark,
            self.id.index()
        )
    }
}

/// Truncate to at most `max` bytes on a char boundary.
fn task_name(name: &str, max: usize) -> String {
    let mut end = name.len().min(max);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    String::from(&name[..end])
}

impl<P: Port> Kernel<P> {
    pub(crate) fn tcb(&self, id: TaskId) -> KernelResult<&Tcb> {
        slot(&self.tasks, id).ok_or(STALE_TASK)
    }

    pub(crate) fn tcb_mut(&mut self, id: TaskId) -> KernelResult<&mut Tcb> {
        slot_mut(&mut self.tasks, id).ok_or(STALE_TASK)
    }

    // =========================================================================
    // Creation and deletion
    // =========================================================================

    /// Create a task. It joins the tail of its ready sub-list and preempts the
    /// caller at once if it has a higher priority.
    pub fn create_task(
        &mut self,
        name: &str,
        priority: Priority,
        stack_words: usize,
        entry: TaskFn,
        arg: usize,
    ) -> KernelResult<TaskId> {
        self.check_alive()?;
        if priority >= self.config.max_priorities {
            return Err(KernelError::InvalidState("priority out of range"));
        }
        if stack_words <= STACK_CANARY_WORDS {
            return Err(KernelError::InvalidState("stack smaller than canary region"));
        }

        let index = match self.free_task_slot() {
            Some(index) => index,
            None => {
                traceTASK_CREATE_FAILED(name);
                return Err(KernelError::ResourceExhausted);
            }
        };

        let stack = vec![STACK_FILL_WORD; stack_words];
        let stack_top = stack.as_ptr() as usize + stack_words * size_of::<StackType>();
        let mut context = Context::default();
        self.port.init_context(&mut context, stack_top, entry, arg);

        let tcb = Tcb {
            name: task_name(name, self.config.max_task_name_len),
            base_priority: priority,
            priority,
            state: TaskState::Ready,
            context,
            stack,
            wake_tick: None,
            blocked_on: None,
            mutexes_held: Vec::new(),
            notify_value: 0,
            notify_state: NotifyState::NotWaiting,
            notify_result: None,
            wake_outcome: None,
            transfer: None,
            run_ticks: 0,
        };
        let slot = &mut self.tasks[index];
        slot.tcb = Some(tcb);
        let id = TaskId::new(index as u16, slot.generation);
        traceTASK_CREATE(id, name, priority);

        self.critical(|k| {
            k.add_to_ready(id);
            k.preempt_if_higher(id);
        });
        Ok(id)
    }

    fn free_task_slot(&mut self) -> Option<usize> {
        if let Some(index) = self.tasks.iter().position(|s| s.tcb.is_none()) {
            return Some(index);
        }
        if self.tasks.len() < self.config.max_tasks {
            self.tasks.push(TaskSlot {
                generation: 0,
                tcb: None,
            });
            return Some(self.tasks.len() - 1);
        }
        if self.reclaim_terminated() > 0 {
            return self.tasks.iter().position(|s| s.tcb.is_none());
        }
        None
    }

    fn free_slot(&mut self, id: TaskId) {
        if let Some(slot) = self.tasks.get_mut(id.index()) {
            if slot.generation == id.generation() {
                slot.tcb = None;
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
    }

    /// Delete a task. A task deleting itself is parked in the Deleted state
    /// until the switch away from it and reclaimed by the idle task; any other
    /// task is removed from every list and its slot freed immediately. Mutexes
    /// the task holds are passed on to their waiters.
    pub fn delete_task(&mut self, task: TaskId) -> KernelResult<()> {
        self.check_alive()?;
        if self.tcb(task)?.state == TaskState::Deleted {
            return Err(KernelError::InvalidState("task already deleted"));
        }
        if self.is_system_task(task) {
            return Err(KernelError::InvalidState("cannot delete a system task"));
        }
        self.critical(|k| k.delete_locked(task))
    }

    fn delete_locked(&mut self, task: TaskId) -> KernelResult<()> {
        self.detach(task, WakeReason::Aborted)?;

        let held = core::mem::take(&mut self.tcb_mut(task)?.mutexes_held);
        for mutex in held {
            self.release_mutex(mutex);
        }
        traceTASK_DELETE(task);

        if self.current == Some(task) {
            self.tcb_mut(task)?.state = TaskState::Deleted;
            self.request_reschedule();
        } else {
            self.free_slot(task);
        }
        Ok(())
    }

    /// Take a task out of the ready list, the delayed list and any wait list.
    /// A wait in progress ends with `reason`.
    fn detach(&mut self, task: TaskId, reason: WakeReason) -> KernelResult<()> {
        let tcb = self.tcb_mut(task)?;
        let (state, priority) = (tcb.state, tcb.priority);
        match state {
            TaskState::Running | TaskState::Ready => {
                self.ready.remove(priority, task);
            }
            TaskState::Blocked => {
                tcb.wake_tick = None;
                tcb.wake_outcome = Some(reason);
                let on = tcb.blocked_on.take();
                self.delayed.remove(task);
                if let Some(on) = on {
                    self.retract_wait(task, on, reason);
                }
            }
            TaskState::Suspended | TaskState::Deleted => {}
        }
        Ok(())
    }

    fn is_system_task(&self, task: TaskId) -> bool {
        if self.idle_task == Some(task) {
            return true;
        }
        #[cfg(feature = "timers")]
        if self.timer_task() == Some(task) {
            return true;
        }
        false
    }

    fn reclaim_terminated(&mut self) -> usize {
        let terminated = core::mem::take(&mut self.terminated);
        let count = terminated.len();
        for task in terminated {
            traceTASK_RECLAIM(task);
            self.free_slot(task);
        }
        count
    }

    /// Free the TCBs of self-deleted tasks that have been switched away from.
    /// Returns how many were freed.
    pub fn reclaim_deleted(&mut self) -> KernelResult<usize> {
        self.check_alive()?;
        Ok(self.critical(|k| k.reclaim_terminated()))
    }

    /// Idle task body: reclaim deleted tasks and give way to other tasks of
    /// idle priority (configIDLE_SHOULD_YIELD).
    pub fn run_idle(&mut self) -> KernelResult<usize> {
        let reclaimed = self.reclaim_deleted()?;
        let idle_running = matches!(
            (self.idle_task, self.running_task()),
            (Some(idle), Some((running, _))) if idle == running
        );
        if idle_running && self.ready.len(IDLE_PRIORITY) > 1 {
            self.yield_now()?;
        }
        Ok(reclaimed)
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Move the running task behind the other ready tasks of its priority and
    /// reschedule.
    pub fn yield_now(&mut self) -> KernelResult<()> {
        self.check_alive()?;
        let (task, priority) = self
            .running_task()
            .ok_or(KernelError::InvalidState("scheduler not running"))?;
        self.critical(|k| {
            k.ready.remove(priority, task);
            k.ready.push_back(priority, task);
            k.request_reschedule();
        });
        Ok(())
    }

    /// The task a switch would run now: head of the highest-priority non-empty
    /// ready sub-list.
    pub fn select_next_task(&mut self) -> Option<TaskId> {
        self.ready.highest()
    }

    /// Every task sits in exactly the lists its state calls for, and every
    /// wait list holds only tasks blocked on that object.
    pub(crate) fn lists_consistent(&self) -> bool {
        let mut timed = 0;
        for (index, entry) in self.tasks.iter().enumerate() {
            let Some(tcb) = entry.tcb.as_ref() else {
                continue;
            };
            let id = TaskId::new(index as u16, entry.generation);
            let ready = matches!(tcb.state, TaskState::Ready | TaskState::Running);
            if ready != self.ready.contains(tcb.priority, id) {
                return false;
            }
            if tcb.wake_tick.is_some() {
                if tcb.state != TaskState::Blocked || !self.delayed.contains(id) {
                    return false;
                }
                timed += 1;
            }
            let owns_all = tcb.mutexes_held.iter().all(|m| {
                self.mutexes
                    .get(m.index())
                    .and_then(Option::as_ref)
                    .is_some_and(|mutex| mutex.owner == Some(id))
            });
            if !owns_all {
                return false;
            }
        }
        if timed != self.delayed.len() {
            return false;
        }

        let ready_entries_live = (0..self.config.max_priorities).all(|priority| {
            self.ready
                .iter(priority)
                .all(|task| slot(&self.tasks, task).is_some_and(|tcb| tcb.priority == priority))
        });

        let queue_waiters = self.queues.iter().enumerate().all(|(index, q)| {
            let Some(q) = q else {
                return true;
            };
            let queue = QueueId(index as u16);
            q.senders.iter().all(|t| {
                self.waits_on(t, |on| matches!(on, BlockedOn::QueueSend { queue: w, .. } if w == queue))
            }) && q.receivers.iter().all(|t| {
                self.waits_on(t, |on| matches!(on, BlockedOn::QueueReceive { queue: w, .. } if w == queue))
            })
        });
        let semaphore_waiters = self.semaphores.iter().enumerate().all(|(index, s)| {
            let sem = SemaphoreId(index as u16);
            s.as_ref().map_or(true, |s| {
                s.waiters
                    .iter()
                    .all(|t| self.waits_on(t, |on| on == BlockedOn::Semaphore(sem)))
            })
        });
        let mutex_waiters = self.mutexes.iter().enumerate().all(|(index, m)| {
            let mutex = MutexId(index as u16);
            m.as_ref().map_or(true, |m| {
                m.waiters
                    .iter()
                    .all(|t| self.waits_on(t, |on| on == BlockedOn::Mutex(mutex)))
            })
        });

        ready_entries_live && queue_waiters && semaphore_waiters && mutex_waiters
    }

    fn waits_on(&self, task: TaskId, on: impl Fn(BlockedOn) -> bool) -> bool {
        slot(&self.tasks, task).is_some_and(|tcb| {
            tcb.state == TaskState::Blocked && tcb.blocked_on.is_some_and(&on)
        })
    }

    /// Suspend a task. A wait in progress ends with `Timeout`.
    pub fn suspend_task(&mut self, task: TaskId) -> KernelResult<()> {
        self.check_alive()?;
        match self.tcb(task)?.state {
            TaskState::Deleted => return Err(KernelError::InvalidState("task already deleted")),
            TaskState::Suspended => return Ok(()),
            _ => {}
        }
        if self.idle_task == Some(task) {
            return Err(KernelError::InvalidState("cannot suspend the idle task"));
        }
        self.critical(|k| {
            k.detach(task, WakeReason::Timeout)?;
            k.tcb_mut(task)?.state = TaskState::Suspended;
            traceTASK_SUSPEND(task);
            if k.current == Some(task) {
                k.request_reschedule();
            }
            Ok(())
        })
    }

    /// Resume a suspended task at the tail of its ready sub-list. Resuming a
    /// task that is not suspended does nothing.
    pub fn resume_task(&mut self, task: TaskId) -> KernelResult<()> {
        self.resume_task_from_isr(task).map(|_| ())
    }

    /// Resume from an interrupt. Returns whether a higher-priority task was
    /// readied.
    pub fn resume_task_from_isr(&mut self, task: TaskId) -> KernelResult<bool> {
        self.check_alive()?;
        if self.tcb(task)?.state != TaskState::Suspended {
            return Ok(false);
        }
        Ok(self.critical(|k| {
            traceTASK_RESUME(task);
            k.add_to_ready(task);
            k.preempt_if_higher(task)
        }))
    }

    // =========================================================================
    // Priorities
    // =========================================================================

    /// Change the base priority of a task. The effective priority never drops
    /// below what waiters on its mutexes lend it.
    pub fn set_priority(&mut self, task: TaskId, priority: Priority) -> KernelResult<()> {
        self.check_alive()?;
        if priority >= self.config.max_priorities {
            return Err(KernelError::InvalidState("priority out of range"));
        }
        if self.tcb(task)?.state == TaskState::Deleted {
            return Err(KernelError::InvalidState("task already deleted"));
        }
        self.critical(|k| {
            k.tcb_mut(task)?.base_priority = priority;
            traceTASK_PRIORITY_SET(task, priority);
            k.recompute_priority(task);
            Ok(())
        })
    }

    /// Effective priority.
    pub fn priority(&self, task: TaskId) -> KernelResult<Priority> {
        self.check_alive()?;
        Ok(self.tcb(task)?.priority)
    }

    pub fn base_priority(&self, task: TaskId) -> KernelResult<Priority> {
        self.check_alive()?;
        Ok(self.tcb(task)?.base_priority)
    }

    /// Base priority raised to the effective priority of every task waiting
    /// on a mutex `task` holds.
    fn inherited_priority(&self, task: TaskId) -> Option<Priority> {
        let tcb = self.tcb(task).ok()?;
        let mut priority = tcb.base_priority;
        for mutex in &tcb.mutexes_held {
            let Some(m) = self.mutex_ref(*mutex) else {
                continue;
            };
            for waiter in m.waiters.iter() {
                if let Ok(w) = self.tcb(waiter) {
                    priority = priority.max(w.priority);
                }
            }
        }
        Some(priority)
    }

    /// Bring the effective priority of `task` in line with its obligations
    /// and push the change along the chain of mutex owners it waits on.
    pub(crate) fn recompute_priority(&mut self, task: TaskId) {
        let mut task = task;
        // A chain cannot be longer than the number of tasks.
        for _ in 0..self.config.max_tasks {
            let Some(target) = self.inherited_priority(task) else {
                return;
            };
            let Ok(tcb) = self.tcb(task) else {
                return;
            };
            if tcb.priority == target {
                return;
            }
            let waits_on = match tcb.blocked_on {
                Some(BlockedOn::Mutex(m)) => Some(m),
                _ => None,
            };
            self.set_effective_priority(task, target);
            match waits_on.and_then(|m| self.mutex_ref(m)).and_then(|m| m.owner) {
                Some(owner) => task = owner,
                None => return,
            }
        }
    }

    fn set_effective_priority(&mut self, task: TaskId, priority: Priority) {
        let Ok(tcb) = self.tcb_mut(task) else {
            return;
        };
        let old = tcb.priority;
        let state = tcb.state;
        let base = tcb.base_priority;
        tcb.priority = priority;

        if priority > base && priority > old {
            traceTASK_PRIORITY_INHERIT(task, priority);
        } else {
            traceTASK_PRIORITY_DISINHERIT(task, priority);
        }

        match state {
            TaskState::Running => {
                self.ready.remove(old, task);
                if priority > old {
                    self.ready.push_front(priority, task);
                } else {
                    self.ready.push_back(priority, task);
                    if self.config.use_preemption {
                        self.request_reschedule();
                    }
                }
            }
            TaskState::Ready => {
                self.ready.remove(old, task);
                self.ready.push_back(priority, task);
                self.preempt_if_higher(task);
            }
            _ => {}
        }
    }

    // =========================================================================
    // Delays
    // =========================================================================

    /// Block the running task for `ticks` ticks. Zero only yields;
    /// `MAX_DELAY` blocks until `abort_delay`. The wait ends with `Timeout`.
    pub fn delay(&mut self, ticks: TickType) -> KernelResult<()> {
        self.check_alive()?;
        if ticks == 0 {
            return self.yield_now();
        }
        self.check_block_context(ticks)?;
        self.critical(|k| {
            let task = k.block_current(BlockedOn::Delay, ticks)?;
            traceTASK_DELAY_UNTIL(task, k.tick_count.wrapping_add(ticks));
            Ok(())
        })
    }

    /// Block a Running or Ready task until the absolute tick `wake`. Returns
    /// `false`, leaving the task ready, if `wake` has already been reached.
    pub fn delay_until(&mut self, task: TaskId, wake: TickType) -> KernelResult<bool> {
        self.check_alive()?;
        let state = self.tcb(task)?.state;
        if self.idle_task == Some(task) {
            return Err(KernelError::InvalidState("the idle task cannot block"));
        }
        let now = self.tick_count;
        if tick_reached(now, wake) {
            return Ok(false);
        }
        let ticks = wake.wrapping_sub(now);
        match state {
            TaskState::Running if self.current == Some(task) => {
                self.check_block_context(ticks)?;
                self.critical(|k| k.block_current(BlockedOn::Delay, ticks))?;
            }
            TaskState::Ready => self.critical(|k| {
                let tcb = k.tcb_mut(task)?;
                let priority = tcb.priority;
                tcb.state = TaskState::Blocked;
                tcb.blocked_on = Some(BlockedOn::Delay);
                tcb.wake_outcome = None;
                tcb.wake_tick = Some(wake);
                k.ready.remove(priority, task);
                k.delayed.insert(now, wake, task);
                Ok::<(), KernelError>(())
            })?,
            _ => return Err(KernelError::InvalidState("task is not ready")),
        }
        traceTASK_DELAY_UNTIL(task, wake);
        Ok(true)
    }

    /// Periodic delay (xTaskDelayUntil): block the running task until
    /// `*previous_wake + period` and advance `*previous_wake` to that tick.
    /// Returns `false` if the deadline had already passed.
    pub fn delay_until_next(
        &mut self,
        previous_wake: &mut TickType,
        period: TickType,
    ) -> KernelResult<bool> {
        let task = self
            .current
            .ok_or(KernelError::InvalidState("scheduler not running"))?;
        let wake = previous_wake.wrapping_add(period);
        let delayed = self.delay_until(task, wake)?;
        *previous_wake = wake;
        Ok(delayed)
    }

    /// Force a Blocked task awake. Its wait ends with `Aborted`.
    pub fn abort_delay(&mut self, task: TaskId) -> KernelResult<()> {
        self.check_alive()?;
        if self.tcb(task)?.state != TaskState::Blocked {
            return Err(KernelError::InvalidState("task is not blocked"));
        }
        traceTASK_ABORT_DELAY(task);
        self.critical(|k| {
            k.wake_task(task, WakeReason::Aborted);
        });
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn task_state(&self, task: TaskId) -> KernelResult<TaskState> {
        self.check_alive()?;
        Ok(self.tcb(task)?.state)
    }

    pub fn task_name(&self, task: TaskId) -> KernelResult<&str> {
        self.check_alive()?;
        Ok(self.tcb(task)?.name.as_str())
    }

    /// Number of live tasks, Deleted ones awaiting reclaim included.
    pub fn task_count(&self) -> usize {
        self.tasks.iter().filter(|s| s.tcb.is_some()).count()
    }

    /// Minimum free stack space, in words, since the task was created.
    pub fn stack_high_water_mark(&self, task: TaskId) -> KernelResult<usize> {
        self.check_alive()?;
        Ok(self.tcb(task)?.stack_high_water_mark())
    }

    pub fn task_info(&self, task: TaskId) -> KernelResult<TaskInfo> {
        self.check_alive()?;
        let tcb = self.tcb(task)?;
        Ok(TaskInfo {
            id: task,
            name: tcb.name.clone(),
            state: tcb.state,
            base_priority: tcb.base_priority,
            priority: tcb.priority,
            stack_depth: tcb.stack.len(),
            stack_high_water_mark: tcb.stack_high_water_mark(),
            run_ticks: tcb.run_ticks,
        })
    }

    /// Snapshot of every task (uxTaskGetSystemState), by slot.
    pub fn task_list(&self) -> Vec<TaskInfo> {
        self.tasks
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.tcb.as_ref()?;
                self.task_info(TaskId::new(index as u16, slot.generation)).ok()
            })
            .collect()
    }

    // =========================================================================
    // Task notifications
    // =========================================================================

    /// Send a notification to `task`, updating its notification word.
    /// `SetValueWithoutOverwrite` on a pending notification fails with
    /// `ResourceExhausted`.
    pub fn notify(&mut self, task: TaskId, value: u32, action: NotifyAction) -> KernelResult<()> {
        self.notify_from_isr(task, value, action).map(|_| ())
    }

    /// Interrupt form of [`Kernel::notify`]. Returns whether a higher-priority
    /// task was woken.
    pub fn notify_from_isr(
        &mut self,
        task: TaskId,
        value: u32,
        action: NotifyAction,
    ) -> KernelResult<bool> {
        self.check_alive()?;
        if self.tcb(task)?.state == TaskState::Deleted {
            return Err(KernelError::InvalidState("task already deleted"));
        }
        self.critical(|k| k.notify_locked(task, value, action))
    }

    /// Increment the notification word (xTaskNotifyGive).
    pub fn notify_give(&mut self, task: TaskId) -> KernelResult<()> {
        self.notify(task, 0, NotifyAction::Increment)
    }

    pub fn notify_give_from_isr(&mut self, task: TaskId) -> KernelResult<bool> {
        self.notify_from_isr(task, 0, NotifyAction::Increment)
    }

    fn notify_locked(
        &mut self,
        task: TaskId,
        value: u32,
        action: NotifyAction,
    ) -> KernelResult<bool> {
        let tcb = self.tcb_mut(task)?;
        let original = tcb.notify_state;
        if action == NotifyAction::SetValueWithoutOverwrite
            && original == NotifyState::Received
        {
            return Err(KernelError::ResourceExhausted);
        }
        tcb.notify_state = NotifyState::Received;
        match action {
            NotifyAction::NoAction => {}
            NotifyAction::SetBits => tcb.notify_value |= value,
            NotifyAction::Increment => tcb.notify_value = tcb.notify_value.wrapping_add(1),
            NotifyAction::SetValueWithOverwrite | NotifyAction::SetValueWithoutOverwrite => {
                tcb.notify_value = value
            }
        }
        traceTASK_NOTIFY(task, action);

        let wait = match (original, tcb.blocked_on) {
            (NotifyState::Waiting, Some(BlockedOn::Notify(wait))) => wait,
            _ => return Ok(false),
        };
        let result = tcb.notify_value;
        match wait {
            NotifyWait::Take { clear_on_exit } => {
                if result != 0 {
                    tcb.notify_value = if clear_on_exit { 0 } else { result - 1 };
                }
            }
            NotifyWait::Wait { clear_on_exit } => tcb.notify_value &= !clear_on_exit,
        }
        tcb.notify_state = NotifyState::NotWaiting;
        tcb.notify_result = Some(result);
        Ok(self.wake_task(task, WakeReason::Signaled))
    }

    /// Counting-semaphore style wait (ulTaskNotifyTake). Returns the word as
    /// it was before it was decremented or cleared.
    pub fn notify_take(&mut self, clear_on_exit: bool, timeout: TickType) -> KernelResult<Wait<u32>> {
        self.check_alive()?;
        self.check_block_context(timeout)?;
        self.critical(|k| {
            let (task, _) = k
                .running_task()
                .ok_or(KernelError::InvalidState("scheduler not running"))?;
            let tcb = k.tcb_mut(task)?;
            let value = tcb.notify_value;
            if value != 0 {
                tcb.notify_value = if clear_on_exit { 0 } else { value - 1 };
                tcb.notify_state = NotifyState::NotWaiting;
                return Ok(Wait::Done(value));
            }
            if timeout == 0 {
                return Err(KernelError::Timeout);
            }
            tcb.notify_state = NotifyState::Waiting;
            traceTASK_NOTIFY_WAIT_BLOCK(task);
            k.block_current(BlockedOn::Notify(NotifyWait::Take { clear_on_exit }), timeout)?;
            Ok(Wait::Blocked)
        })
    }

    /// Wait for a notification (xTaskNotifyWait). Bits in `clear_on_entry`
    /// are cleared if none is pending; bits in `clear_on_exit` are cleared
    /// after the value is read.
    pub fn notify_wait(
        &mut self,
        clear_on_entry: u32,
        clear_on_exit: u32,
        timeout: TickType,
    ) -> KernelResult<Wait<u32>> {
        self.check_alive()?;
        self.check_block_context(timeout)?;
        self.critical(|k| {
            let (task, _) = k
                .running_task()
                .ok_or(KernelError::InvalidState("scheduler not running"))?;
            let tcb = k.tcb_mut(task)?;
            if tcb.notify_state == NotifyState::Received {
                let value = tcb.notify_value;
                tcb.notify_value &= !clear_on_exit;
                tcb.notify_state = NotifyState::NotWaiting;
                return Ok(Wait::Done(value));
            }
            tcb.notify_value &= !clear_on_entry;
            if timeout == 0 {
                return Err(KernelError::Timeout);
            }
            tcb.notify_state = NotifyState::Waiting;
            traceTASK_NOTIFY_WAIT_BLOCK(task);
            k.block_current(BlockedOn::Notify(NotifyWait::Wait { clear_on_exit }), timeout)?;
            Ok(Wait::Blocked)
        })
    }

    /// Value delivered to a notification wait that blocked.
    pub fn take_notify_value(&mut self, task: TaskId) -> KernelResult<u32> {
        self.check_alive()?;
        self.tcb_mut(task)?
            .notify_result
            .take()
            .ok_or(KernelError::InvalidState("no notification received"))
    }

    /// Current notification word of `task`.
    pub fn notify_value(&self, task: TaskId) -> KernelResult<u32> {
        self.check_alive()?;
        Ok(self.tcb(task)?.notify_value)
    }

    /// Drop a pending notification (xTaskNotifyStateClear). Returns whether one
    /// was pending.
    pub fn notify_state_clear(&mut self, task: TaskId) -> KernelResult<bool> {
        self.check_alive()?;
        let tcb = self.tcb_mut(task)?;
        let pending = tcb.notify_state == NotifyState::Received;
        if pending {
            tcb.notify_state = NotifyState::NotWaiting;
        }
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::dummy::DummyPort;

    fn body(_: usize) {}

    fn kernel(config: Config) -> Kernel<DummyPort> {
        Kernel::new(config, DummyPort::new()).unwrap()
    }

    fn start(k: &mut Kernel<DummyPort>) {
        k.start().unwrap();
        #[cfg(feature = "timers")]
        if k.current() == k.timer_task() {
            assert!(k.run_timer_service().unwrap().is_blocked());
        }
    }

    fn tick(k: &mut Kernel<DummyPort>, n: u32) {
        for _ in 0..n {
            k.tick_interrupt().unwrap();
        }
    }

    #[test]
    fn test_create_validates_arguments() {
        let mut k = kernel(Config::DEFAULT);
        assert_eq!(
            k.create_task("p", 5, 64, body, 0),
            Err(KernelError::InvalidState("priority out of range"))
        );
        assert_eq!(
            k.create_task("s", 1, STACK_CANARY_WORDS, body, 0),
            Err(KernelError::InvalidState("stack smaller than canary region"))
        );
    }

    #[test]
    fn test_arena_exhaustion() {
        let mut k = kernel(Config {
            max_tasks: 3,
            ..Config::DEFAULT
        });
        for i in 0..3 {
            k.create_task("t", 1, 32, body, i).unwrap();
        }
        assert_eq!(
            k.create_task("t", 1, 32, body, 9),
            Err(KernelError::ResourceExhausted)
        );
    }

    #[test]
    fn test_name_truncated() {
        let mut k = kernel(Config::DEFAULT);
        let t = k
            .create_task("a-very-long-task-name", 1, 32, body, 0)
            .unwrap();
        assert_eq!(k.task_name(t), Ok("a-very-long-task"));
    }

    #[test]
    fn test_external_delete_frees_slot_and_rejects_stale_id() {
        let mut k = kernel(Config::DEFAULT);
        let a = k.create_task("a", 1, 32, body, 0).unwrap();
        let b = k.create_task("b", 2, 32, body, 0).unwrap();
        start(&mut k);
        assert_eq!(k.current(), Some(b));
        k.delete_task(a).unwrap();
        assert_eq!(k.task_state(a), Err(STALE_TASK));
        assert_eq!(k.delete_task(a), Err(STALE_TASK));
        let c = k.create_task("c", 1, 32, body, 0).unwrap();
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
    }

    #[test]
    fn test_self_delete_reclaimed_by_idle() {
        let mut k = kernel(Config::DEFAULT);
        let a = k.create_task("a", 1, 32, body, 0).unwrap();
        start(&mut k);
        assert_eq!(k.current(), Some(a));
        k.delete_task(a).unwrap();
        assert_eq!(k.current(), k.idle_task());
        assert_eq!(k.task_state(a), Ok(TaskState::Deleted));
        assert_eq!(k.delete_task(a), Err(KernelError::InvalidState("task already deleted")));
        assert_eq!(k.run_idle(), Ok(1));
        assert_eq!(k.task_state(a), Err(STALE_TASK));
    }

    #[test]
    fn test_system_tasks_protected() {
        let mut k = kernel(Config::DEFAULT);
        start(&mut k);
        let idle = k.idle_task().unwrap();
        assert!(k.delete_task(idle).is_err());
        assert!(k.suspend_task(idle).is_err());
        assert_eq!(k.current(), Some(idle));
        assert_eq!(
            k.delay(5),
            Err(KernelError::InvalidState("the idle task cannot block"))
        );
        assert_eq!(k.task_state(idle), Ok(TaskState::Running));
    }

    #[test]
    fn test_yield_rotates_equal_priority() {
        let mut k = kernel(Config::DEFAULT);
        let a = k.create_task("a", 2, 32, body, 0).unwrap();
        let b = k.create_task("b", 2, 32, body, 0).unwrap();
        start(&mut k);
        assert_eq!(k.current(), Some(a));
        k.yield_now().unwrap();
        assert_eq!(k.current(), Some(b));
        k.yield_now().unwrap();
        assert_eq!(k.current(), Some(a));
    }

    #[test]
    fn test_delay_until_reached_returns_false() {
        let mut k = kernel(Config::DEFAULT);
        let a = k.create_task("a", 2, 32, body, 0).unwrap();
        start(&mut k);
        tick(&mut k, 3);
        assert_eq!(k.delay_until(a, 2), Ok(false));
        assert_eq!(k.current(), Some(a));
        assert_eq!(k.delay_until(a, 5), Ok(true));
        assert_eq!(k.task_state(a), Ok(TaskState::Blocked));
        tick(&mut k, 2);
        assert_eq!(k.current(), Some(a));
        assert_eq!(k.take_wake_outcome(a), Ok(WakeReason::Timeout));
    }

    #[test]
    fn test_delay_ready_task() {
        let mut k = kernel(Config::DEFAULT);
        let a = k.create_task("a", 2, 32, body, 0).unwrap();
        let b = k.create_task("b", 1, 32, body, 0).unwrap();
        start(&mut k);
        assert_eq!(k.delay_until(b, 4), Ok(true));
        assert_eq!(k.task_state(b), Ok(TaskState::Blocked));
        k.delay(10).unwrap();
        assert_eq!(k.current(), k.idle_task());
        tick(&mut k, 4);
        assert_eq!(k.current(), Some(b));
        assert_eq!(k.task_state(a), Ok(TaskState::Blocked));
    }

    #[test]
    fn test_abort_delay() {
        let mut k = kernel(Config::DEFAULT);
        let a = k.create_task("a", 2, 32, body, 0).unwrap();
        start(&mut k);
        k.delay(MAX_DELAY).unwrap();
        assert_eq!(k.task_state(a), Ok(TaskState::Blocked));
        tick(&mut k, 100);
        assert_eq!(k.task_state(a), Ok(TaskState::Blocked));
        k.abort_delay(a).unwrap();
        assert_eq!(k.current(), Some(a));
        assert_eq!(k.take_wake_outcome(a), Ok(WakeReason::Aborted));
        assert!(k.abort_delay(a).is_err());
    }

    #[test]
    fn test_suspend_resume() {
        let mut k = kernel(Config::DEFAULT);
        let a = k.create_task("a", 2, 32, body, 0).unwrap();
        let b = k.create_task("b", 1, 32, body, 0).unwrap();
        start(&mut k);
        k.suspend_task(a).unwrap();
        assert_eq!(k.current(), Some(b));
        assert_eq!(k.task_state(a), Ok(TaskState::Suspended));
        k.resume_task(a).unwrap();
        assert_eq!(k.current(), Some(a));
        k.resume_task(a).unwrap();
    }

    #[test]
    fn test_suspend_blocked_task_times_out_wait() {
        let mut k = kernel(Config::DEFAULT);
        let a = k.create_task("a", 2, 32, body, 0).unwrap();
        start(&mut k);
        k.delay(50).unwrap();
        k.suspend_task(a).unwrap();
        assert_eq!(k.take_wake_outcome(a), Ok(WakeReason::Timeout));
        tick(&mut k, 60);
        assert_eq!(k.task_state(a), Ok(TaskState::Suspended));
    }

    #[test]
    fn test_set_priority_preempts_and_lowers() {
        let mut k = kernel(Config::DEFAULT);
        let a = k.create_task("a", 2, 32, body, 0).unwrap();
        let b = k.create_task("b", 1, 32, body, 0).unwrap();
        start(&mut k);
        k.set_priority(b, 3).unwrap();
        assert_eq!(k.current(), Some(b));
        k.set_priority(b, 1).unwrap();
        assert_eq!(k.current(), Some(a));
        assert_eq!(k.priority(b), Ok(1));
        assert!(k.set_priority(b, 9).is_err());
    }

    #[test]
    fn test_notify_take_counts() {
        let mut k = kernel(Config::DEFAULT);
        let a = k.create_task("a", 2, 32, body, 0).unwrap();
        let b = k.create_task("b", 1, 32, body, 0).unwrap();
        start(&mut k);
        assert_eq!(k.notify_take(false, 0), Err(KernelError::Timeout));
        assert!(k.notify_take(true, MAX_DELAY).unwrap().is_blocked());
        assert_eq!(k.current(), Some(b));
        k.notify_give(a).unwrap();
        assert_eq!(k.current(), Some(a));
        assert_eq!(k.take_wake_outcome(a), Ok(WakeReason::Signaled));
        assert_eq!(k.take_notify_value(a), Ok(1));
        k.notify_give(a).unwrap();
        k.notify_give(a).unwrap();
        assert_eq!(k.notify_take(false, 0), Ok(Wait::Done(2)));
        assert_eq!(k.notify_value(a), Ok(1));
    }

    #[test]
    fn test_notify_wait_bits() {
        let mut k = kernel(Config::DEFAULT);
        let a = k.create_task("a", 2, 32, body, 0).unwrap();
        start(&mut k);
        k.notify(a, 0b0101, NotifyAction::SetBits).unwrap();
        assert_eq!(
            k.notify(a, 7, NotifyAction::SetValueWithoutOverwrite),
            Err(KernelError::ResourceExhausted)
        );
        assert_eq!(k.notify_wait(0, 0b0001, 0), Ok(Wait::Done(0b0101)));
        assert_eq!(k.notify_value(a), Ok(0b0100));
        assert!(k.notify_wait(u32::MAX, 0, 5).unwrap().is_blocked());
        tick(&mut k, 5);
        assert_eq!(k.take_wake_outcome(a), Ok(WakeReason::Timeout));
        assert_eq!(k.notify_value(a), Ok(0));
        assert_eq!(k.notify_state_clear(a), Ok(false));
    }

    #[test]
    fn test_task_info_and_listing() {
        let mut k = kernel(Config::DEFAULT);
        let a = k.create_task("worker", 2, 64, body, 0).unwrap();
        start(&mut k);
        k.port_mut().simulate_stack_usage(a, 10);
        k.delay(1).unwrap();
        let info = k.task_info(a).unwrap();
        assert_eq!(info.name, "worker");
        assert_eq!(info.state, TaskState::Blocked);
        assert_eq!(info.stack_depth, 64);
        assert_eq!(info.stack_high_water_mark, 54);
        assert!(k.task_list().iter().any(|t| t.id == a));
        let row = alloc::format!("{}", info);
        assert!(row.starts_with("worker"));
        assert!(row.contains("\tB\t2\t54\t"));
    }
}
