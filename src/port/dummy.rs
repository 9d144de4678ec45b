/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] This is the dummy port. It performs no hardware access and
 * records every call the kernel makes across the port boundary so host tests
 * can assert on them.
 */

//! Dummy Port Implementation
//!
//! Interrupt masking is tracked as a flag, context switches are recorded and
//! faults are collected instead of stopping the CPU. Stack usage of a task can
//! be simulated to drive the high water mark and the overflow check.
//!
//! **WARNING**: Do not use this port in production! It is only for host tests.

use alloc::vec::Vec;

use super::{Context, Port};
use crate::error::KernelError;
use crate::types::*;

/// Word written over simulated stack usage.
const USED_STACK_WORD: StackType = 0;

/// One call across the port boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    Save(TaskId),
    Restore(TaskId),
    InitContext,
    TriggerSwitch,
    DisableInterrupts,
    EnableInterrupts,
    SetupTick(u32),
    Fault(KernelError),
}

/// Host port for tests.
#[derive(Debug, Default)]
pub struct DummyPort {
    events: Vec<PortEvent>,
    record_masking: bool,
    interrupts_masked: bool,
    switches_triggered: u32,
    faults: Vec<KernelError>,
    stack_usage: Vec<(TaskId, usize)>,
}

impl DummyPort {
    pub fn new() -> Self {
        DummyPort::default()
    }

    /// Also record every interrupt mask / unmask.
    pub fn with_masking_events(mut self) -> Self {
        self.record_masking = true;
        self
    }

    /// Every recorded boundary call, oldest first.
    pub fn events(&self) -> &[PortEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Order in which tasks were restored.
    pub fn restored(&self) -> Vec<TaskId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PortEvent::Restore(task) => Some(*task),
                _ => None,
            })
            .collect()
    }

    pub fn interrupts_masked(&self) -> bool {
        self.interrupts_masked
    }

    pub fn switches_triggered(&self) -> u32 {
        self.switches_triggered
    }

    pub fn faults(&self) -> &[KernelError] {
        &self.faults
    }

    /// Pretend `task` uses the top `words` words of its stack. The usage is
    /// written into the stack the next time the task is switched out; a value
    /// reaching the canary region makes the kernel detect an overflow.
    pub fn simulate_stack_usage(&mut self, task: TaskId, words: usize) {
        match self.stack_usage.iter_mut().find(|(t, _)| *t == task) {
            Some(entry) => entry.1 = words,
            None => self.stack_usage.push((task, words)),
        }
    }
}

impl Port for DummyPort {
    fn save_context(&mut self, task: TaskId, _ctx: &mut Context, stack: &mut [StackType]) {
        self.events.push(PortEvent::Save(task));
        if let Some((_, words)) = self.stack_usage.iter().find(|(t, _)| *t == task) {
            let start = stack.len().saturating_sub(*words);
            stack[start..].fill(USED_STACK_WORD);
        }
    }

    fn restore_context(&mut self, task: TaskId, _ctx: &Context) {
        self.events.push(PortEvent::Restore(task));
    }

    fn init_context(&mut self, ctx: &mut Context, stack_top: usize, entry: TaskFn, arg: usize) {
        self.events.push(PortEvent::InitContext);
        *ctx = Context::initial(stack_top, entry, arg);
    }

    fn trigger_switch(&mut self) {
        self.switches_triggered += 1;
        self.events.push(PortEvent::TriggerSwitch);
    }

    fn disable_interrupts(&mut self) {
        self.interrupts_masked = true;
        if self.record_masking {
            self.events.push(PortEvent::DisableInterrupts);
        }
    }

    fn enable_interrupts(&mut self) {
        self.interrupts_masked = false;
        if self.record_masking {
            self.events.push(PortEvent::EnableInterrupts);
        }
    }

    fn setup_tick_interrupt(&mut self, tick_rate_hz: u32) {
        self.events.push(PortEvent::SetupTick(tick_rate_hz));
    }

    fn fault(&mut self, error: &KernelError) {
        self.faults.push(*error);
        self.events.push(PortEvent::Fault(*error));
    }
}
