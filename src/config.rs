/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] This module is the Rust equivalent of FreeRTOSConfig.h.
 * Configuration is done via:
 * - Cargo features for major toggles (`timers`)
 * - A `Config` value handed to `Kernel::new` for numeric values
 */

//! Kernel Configuration
//!
//! [`Config::DEFAULT`] carries the values the RV1 board configuration used:
//! 1 kHz tick, five priority levels, preemption with time slicing and stack
//! overflow checking.

use crate::error::{KernelError, KernelResult};
use crate::types::*;

/// Number of stack words at the low end of every stack that hold the canary.
pub const STACK_CANARY_WORDS: usize = 4;

/// Value every stack word is filled with at creation. The canary region keeps
/// it for the life of the task; high water marks count untouched words.
pub const STACK_FILL_WORD: StackType = 0xA5A5_A5A5;

/// Length of an encoded timer service command, in bytes.
pub const TIMER_COMMAND_SIZE: usize = 12;

/// Kernel configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    // =========================================================================
    // Scheduler
    // =========================================================================
    /// Tick rate in Hz.
    pub tick_rate_hz: u32,

    /// Number of priority levels; valid priorities are `0..max_priorities`.
    pub max_priorities: u8,

    /// Preempt as soon as a more important task becomes ready. When `false`
    /// the running task only loses the CPU when it blocks or yields.
    pub use_preemption: bool,

    /// Rotate equal-priority ready tasks on every tick.
    pub use_time_slicing: bool,

    /// Capacity of the task arena, system tasks included.
    pub max_tasks: usize,

    /// Longest task name kept in the TCB, in bytes.
    pub max_task_name_len: usize,

    /// Tick count the kernel starts from (configINITIAL_TICK_COUNT). Set it
    /// close to `TickType::MAX` to exercise counter wrap early.
    pub initial_tick_count: TickType,

    // =========================================================================
    // Stacks
    // =========================================================================
    /// Stack depth of the idle task, in words.
    pub minimal_stack_size: usize,

    /// Check the stack canary of every task that is switched out.
    pub check_for_stack_overflow: bool,

    // =========================================================================
    // Objects
    // =========================================================================
    /// Capacity of the queue arena (the timer command queue included).
    pub max_queues: usize,

    /// Capacity of the semaphore arena.
    pub max_semaphores: usize,

    /// Capacity of the mutex arena.
    pub max_mutexes: usize,

    /// Capacity of the software timer arena.
    pub max_timers: usize,

    // =========================================================================
    // Timer service
    // =========================================================================
    /// Priority of the timer service task. Fixed once the kernel starts.
    pub timer_task_priority: Priority,

    /// Length of the timer command queue.
    pub timer_queue_length: usize,

    /// Stack depth of the timer service task, in words.
    pub timer_task_stack_depth: usize,
}

impl Config {
    /// Defaults matching the board configuration.
    pub const DEFAULT: Config = Config {
        tick_rate_hz: 1000,
        max_priorities: 5,
        use_preemption: true,
        use_time_slicing: true,
        max_tasks: 16,
        max_task_name_len: 16,
        initial_tick_count: 0,
        minimal_stack_size: 128,
        check_for_stack_overflow: true,
        max_queues: 8,
        max_semaphores: 8,
        max_mutexes: 8,
        max_timers: 8,
        timer_task_priority: 4,
        timer_queue_length: 10,
        timer_task_stack_depth: 256,
    };

    /// Reject configurations the kernel cannot run with.
    pub fn validate(&self) -> KernelResult<()> {
        if self.tick_rate_hz == 0 {
            return Err(KernelError::InvalidState("tick rate must be non-zero"));
        }
        if self.max_priorities < 2 {
            return Err(KernelError::InvalidState(
                "at least two priority levels are required",
            ));
        }
        if self.timer_task_priority >= self.max_priorities {
            return Err(KernelError::InvalidState(
                "timer task priority out of range",
            ));
        }
        // Idle plus timer service always occupy a slot.
        if self.max_tasks < 3 || self.max_tasks > u16::MAX as usize {
            return Err(KernelError::InvalidState("task arena size out of range"));
        }
        if self.minimal_stack_size <= STACK_CANARY_WORDS
            || self.timer_task_stack_depth <= STACK_CANARY_WORDS
        {
            return Err(KernelError::InvalidState("stack depth below canary size"));
        }
        if cfg!(feature = "timers") && (self.timer_queue_length == 0 || self.max_queues == 0) {
            return Err(KernelError::InvalidState(
                "timer service needs a command queue",
            ));
        }
        Ok(())
    }

    /// Highest valid priority.
    pub const fn max_priority(&self) -> Priority {
        self.max_priorities - 1
    }

    /// Tick period in milliseconds (0 for tick rates above 1 kHz).
    pub const fn tick_period_ms(&self) -> TickType {
        1000 / self.tick_rate_hz
    }

    /// Convert milliseconds to ticks.
    pub const fn ms_to_ticks(&self, ms: TickType) -> TickType {
        ((ms as u64 * self.tick_rate_hz as u64) / 1000u64) as TickType
    }

    /// Convert ticks to milliseconds.
    pub const fn ticks_to_ms(&self, ticks: TickType) -> TickType {
        ((ticks as u64 * 1000u64) / self.tick_rate_hz as u64) as TickType
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::DEFAULT
    }
}
