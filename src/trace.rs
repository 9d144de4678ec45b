/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] This module provides the trace hook functions for the kernel.
 * In the original C, these are macros defined in FreeRTOS.h that default
 * to nothing but can be overridden by the user for tracing/debugging.
 *
 * Here every hook forwards to the `log` facade. Without an installed logger
 * the calls reduce to a level check.
 */

//! Trace Hooks
//!
//! The kernel calls these hooks at key points. Each one emits a `log` record
//! under a `rtkernel::<area>` target so applications can filter by area.
//!
//! ## Categories
//!
//! - `traceTASK_*` - Task lifecycle and scheduling events
//! - `traceQUEUE_*` - Queue operations
//! - `traceSEMAPHORE_*` / `traceMUTEX_*` - Semaphores and mutexes
//! - `traceTIMER_*` - Timer service events
//! - `traceFAULT` - Fatal kernel errors

#![allow(non_snake_case)]

use log::{debug, error, trace, warn};

use crate::error::KernelError;
use crate::types::*;

const TASK: &str = "rtkernel::task";
const SCHED: &str = "rtkernel::sched";
const QUEUE: &str = "rtkernel::queue";
const SEM: &str = "rtkernel::semaphore";
const MUTEX: &str = "rtkernel::mutex";
const TIMER: &str = "rtkernel::timer";

// =============================================================================
// Task tracing
// =============================================================================

#[inline(always)]
pub fn traceTASK_CREATE(task: TaskId, name: &str, priority: Priority) {
    debug!(target: TASK, "create {} '{}' prio {}", task, name, priority);
}

#[inline(always)]
pub fn traceTASK_CREATE_FAILED(name: &str) {
    warn!(target: TASK, "create '{}' failed: task arena full", name);
}

#[inline(always)]
pub fn traceTASK_DELETE(task: TaskId) {
    debug!(target: TASK, "delete {}", task);
}

#[inline(always)]
pub fn traceTASK_RECLAIM(task: TaskId) {
    trace!(target: TASK, "reclaim {}", task);
}

#[inline(always)]
pub fn traceTASK_DELAY_UNTIL(task: TaskId, wake: TickType) {
    trace!(target: TASK, "{} delay until {}", task, wake);
}

#[inline(always)]
pub fn traceTASK_PRIORITY_SET(task: TaskId, priority: Priority) {
    debug!(target: TASK, "{} base priority -> {}", task, priority);
}

#[inline(always)]
pub fn traceTASK_PRIORITY_INHERIT(owner: TaskId, priority: Priority) {
    debug!(target: MUTEX, "{} inherits priority {}", owner, priority);
}

#[inline(always)]
pub fn traceTASK_PRIORITY_DISINHERIT(owner: TaskId, priority: Priority) {
    debug!(target: MUTEX, "{} drops to priority {}", owner, priority);
}

#[inline(always)]
pub fn traceTASK_SUSPEND(task: TaskId) {
    debug!(target: TASK, "suspend {}", task);
}

#[inline(always)]
pub fn traceTASK_RESUME(task: TaskId) {
    debug!(target: TASK, "resume {}", task);
}

#[inline(always)]
pub fn traceTASK_ABORT_DELAY(task: TaskId) {
    debug!(target: TASK, "abort wait of {}", task);
}

#[inline(always)]
pub fn traceBLOCKING_ON(task: TaskId, timeout: TickType) {
    if timeout == MAX_DELAY {
        trace!(target: SCHED, "{} blocks indefinitely", task);
    } else {
        trace!(target: SCHED, "{} blocks for {} ticks", task, timeout);
    }
}

#[inline(always)]
pub fn traceTASK_WAKE(task: TaskId, reason: WakeReason) {
    trace!(target: SCHED, "{} woken: {:?}", task, reason);
}

#[inline(always)]
pub fn traceTASK_INCREMENT_TICK(tick: TickType) {
    trace!(target: SCHED, "tick {}", tick);
}

#[inline(always)]
pub fn traceTASK_SWITCHED_OUT(task: TaskId) {
    trace!(target: SCHED, "switch out {}", task);
}

#[inline(always)]
pub fn traceTASK_SWITCHED_IN(task: TaskId) {
    trace!(target: SCHED, "switch in {}", task);
}

#[inline(always)]
pub fn traceSCHEDULER_START(first: TaskId, tick_rate_hz: u32) {
    debug!(target: SCHED, "scheduler start, first {} at {} Hz", first, tick_rate_hz);
}

#[inline(always)]
pub fn traceTASK_NOTIFY(task: TaskId, action: NotifyAction) {
    trace!(target: TASK, "notify {} ({:?})", task, action);
}

#[inline(always)]
pub fn traceTASK_NOTIFY_WAIT_BLOCK(task: TaskId) {
    trace!(target: TASK, "{} waits for notification", task);
}

// =============================================================================
// Queue tracing
// =============================================================================

#[inline(always)]
pub fn traceQUEUE_CREATE(queue: QueueId, capacity: usize, item_size: usize) {
    debug!(
        target: QUEUE,
        "create {:?}: {} x {} bytes", queue, capacity, item_size
    );
}

#[inline(always)]
pub fn traceQUEUE_CREATE_FAILED() {
    warn!(target: QUEUE, "create failed: queue arena full");
}

#[inline(always)]
pub fn traceQUEUE_DELETE(queue: QueueId) {
    debug!(target: QUEUE, "delete {:?}", queue);
}

#[inline(always)]
pub fn traceQUEUE_SEND(queue: QueueId, len: usize) {
    trace!(target: QUEUE, "send {:?}, now {} items", queue, len);
}

#[inline(always)]
pub fn traceQUEUE_SEND_FAILED(queue: QueueId) {
    trace!(target: QUEUE, "send {:?} failed: full", queue);
}

#[inline(always)]
pub fn traceQUEUE_RECEIVE(queue: QueueId, len: usize) {
    trace!(target: QUEUE, "receive {:?}, now {} items", queue, len);
}

#[inline(always)]
pub fn traceQUEUE_RECEIVE_FAILED(queue: QueueId) {
    trace!(target: QUEUE, "receive {:?} failed: empty", queue);
}

#[inline(always)]
pub fn traceQUEUE_PEEK(queue: QueueId) {
    trace!(target: QUEUE, "peek {:?}", queue);
}

// =============================================================================
// Semaphore / mutex tracing
// =============================================================================

#[inline(always)]
pub fn traceCREATE_COUNTING_SEMAPHORE(sem: SemaphoreId, max: u32, initial: u32) {
    debug!(target: SEM, "create {:?}: {}/{}", sem, initial, max);
}

#[inline(always)]
pub fn traceCREATE_COUNTING_SEMAPHORE_FAILED() {
    warn!(target: SEM, "create failed: semaphore arena full");
}

#[inline(always)]
pub fn traceSEMAPHORE_TAKE(sem: SemaphoreId, count: u32) {
    trace!(target: SEM, "take {:?}, count {}", sem, count);
}

#[inline(always)]
pub fn traceSEMAPHORE_GIVE(sem: SemaphoreId, count: u32) {
    trace!(target: SEM, "give {:?}, count {}", sem, count);
}

#[inline(always)]
pub fn traceCREATE_MUTEX(mutex: MutexId, recursive: bool) {
    debug!(target: MUTEX, "create {:?} (recursive: {})", mutex, recursive);
}

#[inline(always)]
pub fn traceCREATE_MUTEX_FAILED() {
    warn!(target: MUTEX, "create failed: mutex arena full");
}

#[inline(always)]
pub fn traceTAKE_MUTEX(mutex: MutexId, owner: TaskId, depth: u32) {
    trace!(target: MUTEX, "{:?} taken by {} (depth {})", mutex, owner, depth);
}

#[inline(always)]
pub fn traceGIVE_MUTEX(mutex: MutexId, next_owner: Option<TaskId>) {
    match next_owner {
        Some(owner) => trace!(target: MUTEX, "{:?} handed to {}", mutex, owner),
        None => trace!(target: MUTEX, "{:?} released", mutex),
    }
}

// =============================================================================
// Timer tracing
// =============================================================================

#[inline(always)]
pub fn traceTIMER_CREATE(timer: TimerId, name: &str, period: TickType) {
    debug!(target: TIMER, "create {:?} '{}' period {}", timer, name, period);
}

#[inline(always)]
pub fn traceTIMER_CREATE_FAILED() {
    warn!(target: TIMER, "create failed: timer arena full");
}

#[inline(always)]
pub fn traceTIMER_COMMAND_SEND(timer: TimerId, command: u8, accepted: bool) {
    trace!(
        target: TIMER,
        "command {} for {:?} {}",
        command,
        timer,
        if accepted { "queued" } else { "dropped" }
    );
}

#[inline(always)]
pub fn traceTIMER_COMMAND_RECEIVED(timer: TimerId, command: u8, value: u32) {
    trace!(target: TIMER, "process command {} for {:?} ({})", command, timer, value);
}

#[inline(always)]
pub fn traceTIMER_EXPIRED(timer: TimerId, expiry: TickType) {
    trace!(target: TIMER, "{:?} expired at {}", timer, expiry);
}

// =============================================================================
// Faults
// =============================================================================

#[inline(always)]
pub fn traceFAULT(err: &KernelError) {
    error!(target: SCHED, "fatal: {}; scheduler halted", err);
}
