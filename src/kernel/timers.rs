/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] Software timers from timers.c. Timer commands travel over a
 * kernel queue to the timer service task, which keeps its own list of active
 * timers ordered by expiry and calls the callbacks in its own context.
 */

//! Software Timer Implementation
//!
//! Timers allow functions to execute at a set time in the future, or
//! periodically with a fixed frequency.
//!
//! ## Key Concepts
//!
//! - Timers are processed by the timer service task, created by
//!   [`Kernel::start`]
//! - Start / stop / reset / change-period / delete are commands sent to the
//!   service through its command queue
//! - Timers can be one-shot or auto-reload (periodic)
//!
//! The service body is [`Kernel::run_timer_service`]. It must be called
//! whenever the service task is current.

use alloc::string::String;
use alloc::vec::Vec;

use super::list::DelayedList;
use super::Kernel;
use crate::config::*;
use crate::error::{KernelError, KernelResult};
use crate::port::Port;
use crate::trace::*;
use crate::types::*;

/// Name of the timer service task.
pub const TIMER_SERVICE_TASK_NAME: &str = "Tmr Svc";

const UNKNOWN_TIMER: KernelError = KernelError::InvalidState("unknown or deleted timer");
const ZERO_PERIOD: KernelError = KernelError::InvalidState("timer period must be non-zero");

/// Timer callback. Runs in the timer service task with the kernel borrowed;
/// it must not block.
pub type TimerCallback<P> = fn(&mut Kernel<P>, TimerId);

fn timer_task_entry(_: usize) {}

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum TimerCommand {
    Start = 1,
    Reset = 2,
    Stop = 3,
    ChangePeriod = 4,
    Delete = 5,
}

impl TimerCommand {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(TimerCommand::Start),
            2 => Some(TimerCommand::Reset),
            3 => Some(TimerCommand::Stop),
            4 => Some(TimerCommand::ChangePeriod),
            5 => Some(TimerCommand::Delete),
            _ => None,
        }
    }
}

/// One command queue item: command, timer, argument and the tick it was
/// issued at, little endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CommandMessage {
    command: TimerCommand,
    timer: TimerId,
    value: TickType,
    issued: TickType,
}

impl CommandMessage {
    fn encode(&self) -> [u8; TIMER_COMMAND_SIZE] {
        let mut bytes = [0u8; TIMER_COMMAND_SIZE];
        bytes[0] = self.command as u8;
        bytes[2..4].copy_from_slice(&self.timer.0.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.value.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.issued.to_le_bytes());
        bytes
    }

    fn decode(bytes: &[u8; TIMER_COMMAND_SIZE]) -> Option<Self> {
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Some(CommandMessage {
            command: TimerCommand::from_u8(bytes[0])?,
            timer: TimerId(u16::from_le_bytes([bytes[2], bytes[3]])),
            value: word(4),
            issued: word(8),
        })
    }
}

// =============================================================================
// Timer service state
// =============================================================================

pub(crate) struct TimerObject<P: Port> {
    name: String,
    period: TickType,
    auto_reload: bool,
    id: usize,
    callback: TimerCallback<P>,
    active: bool,
    expiry: TickType,
}

pub(crate) struct TimerService<P: Port> {
    timers: Vec<Option<TimerObject<P>>>,
    /// Active timers by next expiry.
    active: DelayedList<TimerId>,
    queue: Option<QueueId>,
    task: Option<TaskId>,
}

impl<P: Port> TimerService<P> {
    pub(crate) fn new() -> Self {
        TimerService {
            timers: Vec::new(),
            active: DelayedList::new(),
            queue: None,
            task: None,
        }
    }

    fn timer_mut(&mut self, timer: TimerId) -> Option<&mut TimerObject<P>> {
        self.timers.get_mut(timer.index())?.as_mut()
    }
}

impl<P: Port> Kernel<P> {
    fn timer_ref(&self, timer: TimerId) -> KernelResult<&TimerObject<P>> {
        self.timer_service
            .timers
            .get(timer.index())
            .and_then(Option::as_ref)
            .ok_or(UNKNOWN_TIMER)
    }

    /// The timer service task, once the scheduler has started.
    pub fn timer_task(&self) -> Option<TaskId> {
        self.timer_service.task
    }

    pub(crate) fn timer_queue(&self) -> Option<QueueId> {
        self.timer_service.queue
    }

    fn ensure_timer_queue(&mut self) -> KernelResult<QueueId> {
        if let Some(queue) = self.timer_service.queue {
            return Ok(queue);
        }
        let queue = self.queue_create(self.config.timer_queue_length, TIMER_COMMAND_SIZE)?;
        self.timer_service.queue = Some(queue);
        Ok(queue)
    }

    /// Create the command queue (if no timer did yet) and the service task.
    pub(crate) fn create_timer_task(&mut self) -> KernelResult<()> {
        self.ensure_timer_queue()?;
        let task = self.create_task(
            TIMER_SERVICE_TASK_NAME,
            self.config.timer_task_priority,
            self.config.timer_task_stack_depth,
            timer_task_entry,
            0,
        )?;
        self.timer_service.task = Some(task);
        Ok(())
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a dormant timer. `id` is an application word handed back by
    /// [`Kernel::timer_id`].
    pub fn timer_create(
        &mut self,
        name: &str,
        period: TickType,
        auto_reload: bool,
        id: usize,
        callback: TimerCallback<P>,
    ) -> KernelResult<TimerId> {
        self.check_alive()?;
        if period == 0 {
            return Err(ZERO_PERIOD);
        }
        self.ensure_timer_queue()?;
        let timers = &mut self.timer_service.timers;
        let index = match timers.iter().position(Option::is_none) {
            Some(index) => index,
            None if timers.len() < self.config.max_timers => {
                timers.push(None);
                timers.len() - 1
            }
            None => {
                traceTIMER_CREATE_FAILED();
                return Err(KernelError::ResourceExhausted);
            }
        };
        timers[index] = Some(TimerObject {
            name: String::from(name),
            period,
            auto_reload,
            id,
            callback,
            active: false,
            expiry: 0,
        });
        let timer = TimerId(index as u16);
        traceTIMER_CREATE(timer, name, period);
        Ok(timer)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Queue a command for the service. Before the scheduler runs, and when
    /// sent by the service task itself, the send never blocks.
    fn send_timer_command(
        &mut self,
        timer: TimerId,
        command: TimerCommand,
        value: TickType,
        ticks_to_wait: TickType,
    ) -> KernelResult<Wait<()>> {
        self.check_alive()?;
        self.timer_ref(timer)?;
        let queue = self.ensure_timer_queue()?;
        let own_task = self.current.is_some() && self.current == self.timer_service.task;
        let wait = if !self.scheduler_running || own_task {
            0
        } else {
            ticks_to_wait
        };
        let message = CommandMessage {
            command,
            timer,
            value,
            issued: self.tick_count,
        };
        let result = self.queue_send(queue, &message.encode(), wait);
        traceTIMER_COMMAND_SEND(timer, command as u8, result.is_ok());
        result
    }

    fn send_timer_command_from_isr(
        &mut self,
        timer: TimerId,
        command: TimerCommand,
        value: TickType,
    ) -> KernelResult<bool> {
        self.check_alive()?;
        self.timer_ref(timer)?;
        let queue = self.ensure_timer_queue()?;
        let message = CommandMessage {
            command,
            timer,
            value,
            issued: self.tick_count,
        };
        let result = self.queue_send_from_isr(queue, &message.encode());
        traceTIMER_COMMAND_SEND(timer, command as u8, result.is_ok());
        result
    }

    /// Start the timer; it expires one period after the tick the command
    /// was issued at. Starting an active timer restarts it.
    pub fn timer_start(&mut self, timer: TimerId, ticks_to_wait: TickType) -> KernelResult<Wait<()>> {
        self.send_timer_command(timer, TimerCommand::Start, 0, ticks_to_wait)
    }

    pub fn timer_stop(&mut self, timer: TimerId, ticks_to_wait: TickType) -> KernelResult<Wait<()>> {
        self.send_timer_command(timer, TimerCommand::Stop, 0, ticks_to_wait)
    }

    /// Restart the period from now, starting the timer if it is dormant.
    pub fn timer_reset(&mut self, timer: TimerId, ticks_to_wait: TickType) -> KernelResult<Wait<()>> {
        self.send_timer_command(timer, TimerCommand::Reset, 0, ticks_to_wait)
    }

    /// Change the period and (re)start the timer with it.
    pub fn timer_change_period(
        &mut self,
        timer: TimerId,
        period: TickType,
        ticks_to_wait: TickType,
    ) -> KernelResult<Wait<()>> {
        if period == 0 {
            return Err(ZERO_PERIOD);
        }
        self.send_timer_command(timer, TimerCommand::ChangePeriod, period, ticks_to_wait)
    }

    pub fn timer_delete(&mut self, timer: TimerId, ticks_to_wait: TickType) -> KernelResult<Wait<()>> {
        self.send_timer_command(timer, TimerCommand::Delete, 0, ticks_to_wait)
    }

    pub fn timer_start_from_isr(&mut self, timer: TimerId) -> KernelResult<bool> {
        self.send_timer_command_from_isr(timer, TimerCommand::Start, 0)
    }

    pub fn timer_stop_from_isr(&mut self, timer: TimerId) -> KernelResult<bool> {
        self.send_timer_command_from_isr(timer, TimerCommand::Stop, 0)
    }

    pub fn timer_reset_from_isr(&mut self, timer: TimerId) -> KernelResult<bool> {
        self.send_timer_command_from_isr(timer, TimerCommand::Reset, 0)
    }

    pub fn timer_change_period_from_isr(
        &mut self,
        timer: TimerId,
        period: TickType,
    ) -> KernelResult<bool> {
        if period == 0 {
            return Err(ZERO_PERIOD);
        }
        self.send_timer_command_from_isr(timer, TimerCommand::ChangePeriod, period)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether the service has the timer in its active list.
    pub fn timer_is_active(&self, timer: TimerId) -> KernelResult<bool> {
        self.check_alive()?;
        Ok(self.timer_ref(timer)?.active)
    }

    pub fn timer_period(&self, timer: TimerId) -> KernelResult<TickType> {
        self.check_alive()?;
        Ok(self.timer_ref(timer)?.period)
    }

    /// Tick of the next (or, for a dormant timer, the last) expiry.
    pub fn timer_expiry(&self, timer: TimerId) -> KernelResult<TickType> {
        self.check_alive()?;
        Ok(self.timer_ref(timer)?.expiry)
    }

    pub fn timer_id(&self, timer: TimerId) -> KernelResult<usize> {
        self.check_alive()?;
        Ok(self.timer_ref(timer)?.id)
    }

    pub fn set_timer_id(&mut self, timer: TimerId, id: usize) -> KernelResult<()> {
        self.check_alive()?;
        self.critical(|k| {
            k.timer_service.timer_mut(timer).ok_or(UNKNOWN_TIMER)?.id = id;
            Ok(())
        })
    }

    pub fn timer_name(&self, timer: TimerId) -> KernelResult<&str> {
        self.check_alive()?;
        Ok(self.timer_ref(timer)?.name.as_str())
    }

    pub fn timer_reload_mode(&self, timer: TimerId) -> KernelResult<bool> {
        self.check_alive()?;
        Ok(self.timer_ref(timer)?.auto_reload)
    }

    /// Switch between one-shot and auto-reload. Takes effect at the next
    /// expiry.
    pub fn set_timer_reload_mode(&mut self, timer: TimerId, auto_reload: bool) -> KernelResult<()> {
        self.check_alive()?;
        self.critical(|k| {
            k.timer_service.timer_mut(timer).ok_or(UNKNOWN_TIMER)?.auto_reload = auto_reload;
            Ok(())
        })
    }

    // =========================================================================
    // Service task body
    // =========================================================================

    /// One pass of the timer service task: call the callbacks of expired
    /// timers, process every queued command, then block on the command queue
    /// until the next expiry, or indefinitely with no active timer.
    ///
    /// Returns `Done` if a task readied by a callback preempted the service
    /// before it could block.
    pub fn run_timer_service(&mut self) -> KernelResult<Wait<()>> {
        self.check_alive()?;
        let task = self
            .timer_service
            .task
            .ok_or(KernelError::InvalidState("timer service not started"))?;
        if self.current != Some(task) {
            return Err(KernelError::InvalidState("not running as the timer service task"));
        }
        let queue = self.ensure_timer_queue()?;

        // Outcome and item of the previous wait on the command queue.
        let tcb = self.tcb_mut(task)?;
        tcb.wake_outcome = None;
        tcb.transfer = None;

        // Callbacks run here: their blocking calls are rejected and any switch
        // they cause waits for the end of the pass.
        self.enter_critical();
        let mut buf = [0u8; TIMER_COMMAND_SIZE];
        loop {
            self.process_expired_timers();
            match self.queue_receive(queue, &mut buf, 0) {
                Ok(Wait::Done(())) => {
                    if let Some(message) = CommandMessage::decode(&buf) {
                        self.process_timer_command(message);
                    }
                }
                _ => break,
            }
        }
        self.exit_critical();
        self.check_alive()?;

        if self.current != Some(task) {
            return Ok(Wait::Done(()));
        }
        let timeout = match self.timer_service.active.next_wake() {
            Some(wake) => wake.wrapping_sub(self.tick_count),
            None => MAX_DELAY,
        };
        self.queue_peek(queue, &mut buf, timeout)
    }

    fn process_expired_timers(&mut self) {
        let now = self.tick_count;
        while let Some(timer) = self.timer_service.active.pop_expired(now) {
            self.fire_timer(timer, now);
        }
    }

    /// Call the callback of an expired timer. An auto-reload timer is
    /// rescheduled from its previous expiry; every period already missed gets
    /// its own callback.
    fn fire_timer(&mut self, timer: TimerId, now: TickType) {
        loop {
            let Some(t) = self.timer_service.timer_mut(timer) else {
                return;
            };
            let expiry = t.expiry;
            let callback = t.callback;
            if t.auto_reload {
                t.expiry = expiry.wrapping_add(t.period);
            } else {
                t.active = false;
            }
            traceTIMER_EXPIRED(timer, expiry);
            callback(self, timer);

            let service = &mut self.timer_service;
            let Some(t) = service.timer_mut(timer) else {
                return;
            };
            if !t.auto_reload || !t.active {
                t.active = false;
                return;
            }
            if !tick_reached(now, t.expiry) {
                let next = t.expiry;
                service.active.insert(now, next, timer);
                return;
            }
        }
    }

    fn process_timer_command(&mut self, message: CommandMessage) {
        let now = self.tick_count;
        let timer = message.timer;
        traceTIMER_COMMAND_RECEIVED(timer, message.command as u8, message.value);

        let service = &mut self.timer_service;
        // Deleted while the command was queued.
        let Some(t) = service.timers.get_mut(timer.index()).and_then(Option::as_mut) else {
            return;
        };
        service.active.remove(timer);
        let expiry = match message.command {
            TimerCommand::Start | TimerCommand::Reset => message.issued.wrapping_add(t.period),
            TimerCommand::ChangePeriod => {
                t.period = message.value;
                now.wrapping_add(message.value)
            }
            TimerCommand::Stop => {
                t.active = false;
                return;
            }
            TimerCommand::Delete => {
                service.timers[timer.index()] = None;
                return;
            }
        };
        t.active = true;
        t.expiry = expiry;
        if tick_reached(now, expiry) {
            self.fire_timer(timer, now);
        } else {
            service.active.insert(now, expiry, timer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::dummy::DummyPort;
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    fn body(_: usize) {}

    fn kernel(config: Config) -> Kernel<DummyPort> {
        Kernel::new(config, DummyPort::new()).unwrap()
    }

    /// Run the service as long as it is the current task.
    fn service(k: &mut Kernel<DummyPort>) {
        while k.current().is_some() && k.current() == k.timer_task() {
            if k.run_timer_service().unwrap().is_blocked() {
                break;
            }
        }
    }

    fn tick(k: &mut Kernel<DummyPort>, n: u32) {
        for _ in 0..n {
            k.tick_interrupt().unwrap();
            service(k);
        }
    }

    #[test]
    fn test_command_encoding() {
        let message = CommandMessage {
            command: TimerCommand::ChangePeriod,
            timer: TimerId(3),
            value: 250,
            issued: 0xDEAD_BEEF,
        };
        let bytes = message.encode();
        assert_eq!(bytes[0], 4);
        assert_eq!(&bytes[8..12], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(CommandMessage::decode(&bytes), Some(message));
        assert_eq!(CommandMessage::decode(&[0u8; TIMER_COMMAND_SIZE]), None);
    }

    static ONE_SHOT_FIRED: AtomicU32 = AtomicU32::new(0);
    static ONE_SHOT_IN_SERVICE: AtomicBool = AtomicBool::new(false);

    fn one_shot(k: &mut Kernel<DummyPort>, _: TimerId) {
        ONE_SHOT_FIRED.fetch_add(1, Ordering::SeqCst);
        ONE_SHOT_IN_SERVICE.store(k.current() == k.timer_task(), Ordering::SeqCst);
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut k = kernel(Config::DEFAULT);
        let app = k.create_task("app", 1, 64, body, 0).unwrap();
        let t = k.timer_create("once", 5, false, 7, one_shot).unwrap();
        assert_eq!(k.timer_start(t, 10), Ok(Wait::Done(())));
        k.start().unwrap();
        service(&mut k);
        assert_eq!(k.current(), Some(app));
        assert!(k.timer_is_active(t).unwrap());
        assert_eq!(k.timer_expiry(t), Ok(5));

        tick(&mut k, 4);
        assert_eq!(ONE_SHOT_FIRED.load(Ordering::SeqCst), 0);
        tick(&mut k, 1);
        assert_eq!(ONE_SHOT_FIRED.load(Ordering::SeqCst), 1);
        assert!(ONE_SHOT_IN_SERVICE.load(Ordering::SeqCst));
        tick(&mut k, 20);
        assert_eq!(ONE_SHOT_FIRED.load(Ordering::SeqCst), 1);
        assert_eq!(k.timer_is_active(t), Ok(false));
        assert_eq!(k.timer_id(t), Ok(7));
        assert_eq!(k.current(), Some(app));
    }

    static PERIODIC_FIRED: AtomicU32 = AtomicU32::new(0);

    fn periodic(_: &mut Kernel<DummyPort>, _: TimerId) {
        PERIODIC_FIRED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_auto_reload_until_stopped() {
        let mut k = kernel(Config::DEFAULT);
        let app = k.create_task("app", 1, 64, body, 0).unwrap();
        k.start().unwrap();
        service(&mut k);
        let t = k.timer_create("tick3", 3, true, 0, periodic).unwrap();
        k.timer_start(t, 0).unwrap();
        service(&mut k);
        assert_eq!(k.current(), Some(app));

        tick(&mut k, 10);
        assert_eq!(PERIODIC_FIRED.load(Ordering::SeqCst), 3);
        assert_eq!(k.timer_expiry(t), Ok(12));

        k.timer_stop(t, 0).unwrap();
        service(&mut k);
        tick(&mut k, 10);
        assert_eq!(PERIODIC_FIRED.load(Ordering::SeqCst), 3);
        assert_eq!(k.timer_is_active(t), Ok(false));

        k.timer_delete(t, 0).unwrap();
        service(&mut k);
        assert_eq!(k.timer_period(t), Err(UNKNOWN_TIMER));
        assert_eq!(k.timer_start(t, 0), Err(UNKNOWN_TIMER));
    }

    static CATCH_UP_FIRED: AtomicU32 = AtomicU32::new(0);

    fn catch_up(_: &mut Kernel<DummyPort>, _: TimerId) {
        CATCH_UP_FIRED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_missed_periods_caught_up() {
        let mut k = kernel(Config {
            timer_task_priority: 1,
            ..Config::DEFAULT
        });
        let app = k.create_task("busy", 2, 64, body, 0).unwrap();
        k.start().unwrap();
        assert_eq!(k.current(), Some(app));
        let t = k.timer_create("late", 2, true, 0, catch_up).unwrap();
        k.timer_start(t, 0).unwrap();
        // The service is starved until the busy task sleeps at tick 7.
        for _ in 0..7 {
            k.tick_interrupt().unwrap();
        }
        k.delay(100).unwrap();
        assert_eq!(k.current(), k.timer_task());
        service(&mut k);
        assert_eq!(CATCH_UP_FIRED.load(Ordering::SeqCst), 3);
        assert_eq!(k.timer_expiry(t), Ok(8));
    }

    static OVERDUE_FIRED_AT: AtomicU32 = AtomicU32::new(0);

    fn reload_quietly(_: &mut Kernel<DummyPort>, _: TimerId) {}

    fn overdue(k: &mut Kernel<DummyPort>, _: TimerId) {
        OVERDUE_FIRED_AT.store(k.tick_count(), Ordering::SeqCst);
    }

    #[test]
    fn test_overdue_timer_not_starved_by_reload() {
        let mut k = kernel(Config {
            timer_task_priority: 1,
            ..Config::DEFAULT
        });
        let busy = k.create_task("busy", 2, 64, body, 0).unwrap();
        k.start().unwrap();
        assert_eq!(k.current(), Some(busy));
        let a = k.timer_create("a", 6, true, 0, reload_quietly).unwrap();
        let b = k.timer_create("b", 7, false, 0, overdue).unwrap();
        k.timer_start(a, 0).unwrap();
        k.timer_start(b, 0).unwrap();

        // Let the service arm both timers at tick 0.
        k.delay(1).unwrap();
        assert_eq!(k.current(), k.timer_task());
        service(&mut k);
        assert!(k.timer_is_active(b).unwrap());

        // The busy task starves the service past both expiries.
        for _ in 0..8 {
            k.tick_interrupt().unwrap();
        }
        assert_eq!(k.current(), Some(busy));
        assert_eq!(k.tick_count(), 8);
        k.delay(100).unwrap();
        service(&mut k);

        assert_eq!(OVERDUE_FIRED_AT.load(Ordering::SeqCst), 8);
        assert_eq!(k.timer_is_active(b), Ok(false));
        assert_eq!(k.timer_expiry(a), Ok(12));
    }

    static CHANGED_FIRED: AtomicU32 = AtomicU32::new(0);

    fn changed(_: &mut Kernel<DummyPort>, _: TimerId) {
        CHANGED_FIRED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_change_period_restarts_from_now() {
        let mut k = kernel(Config::DEFAULT);
        k.create_task("app", 1, 64, body, 0).unwrap();
        k.start().unwrap();
        service(&mut k);
        let t = k.timer_create("slow", 10, true, 0, changed).unwrap();
        k.timer_start(t, 0).unwrap();
        service(&mut k);
        tick(&mut k, 2);
        k.timer_change_period(t, 3, 0).unwrap();
        service(&mut k);
        assert_eq!(k.timer_expiry(t), Ok(5));
        assert_eq!(k.timer_period(t), Ok(3));
        tick(&mut k, 3);
        assert_eq!(CHANGED_FIRED.load(Ordering::SeqCst), 1);
        assert_eq!(k.timer_change_period(t, 0, 0), Err(ZERO_PERIOD));
    }

    #[test]
    fn test_isr_command_wakes_service() {
        let mut k = kernel(Config::DEFAULT);
        let app = k.create_task("app", 1, 64, body, 0).unwrap();
        k.start().unwrap();
        service(&mut k);
        let t = k.timer_create("isr", 4, false, 0, changed).unwrap();
        k.enter_isr();
        assert_eq!(k.timer_start_from_isr(t), Ok(true));
        assert_eq!(k.current(), Some(app));
        k.exit_isr();
        assert_eq!(k.current(), k.timer_task());
        service(&mut k);
        assert!(k.timer_is_active(t).unwrap());
        assert_eq!(k.current(), Some(app));
    }

    #[test]
    fn test_create_and_queue_limits() {
        let mut k = kernel(Config {
            timer_queue_length: 2,
            max_timers: 1,
            ..Config::DEFAULT
        });
        assert_eq!(k.timer_create("zero", 0, false, 0, changed), Err(ZERO_PERIOD));
        let t = k.timer_create("t", 5, false, 0, changed).unwrap();
        assert_eq!(
            k.timer_create("u", 5, false, 0, changed),
            Err(KernelError::ResourceExhausted)
        );
        k.timer_start(t, 0).unwrap();
        k.timer_stop(t, MAX_DELAY).unwrap();
        assert_eq!(k.timer_reset(t, MAX_DELAY), Err(KernelError::Timeout));
        assert!(k.queue_delete(k.timer_queue().unwrap()).is_err());
        k.set_timer_reload_mode(t, true).unwrap();
        assert_eq!(k.timer_reload_mode(t), Ok(true));
        assert_eq!(k.timer_name(t), Ok("t"));
    }
}
