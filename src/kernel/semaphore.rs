/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] Binary and counting semaphores. In semphr.h these are queues of
 * zero-size items; here they are a count with its own wait list, and a give
 * with a waiter hands the token straight to it.
 */

//! Semaphores

use super::list::WaitList;
use super::tasks::BlockedOn;
use super::Kernel;
use crate::error::{KernelError, KernelResult};
use crate::port::Port;
use crate::trace::*;
use crate::types::*;

const UNKNOWN_SEMAPHORE: KernelError = KernelError::InvalidState("unknown or deleted semaphore");

pub(crate) struct SemaphoreObject {
    count: u32,
    max: u32,
    pub(crate) waiters: WaitList,
}

impl<P: Port> Kernel<P> {
    pub(crate) fn semaphore_slot(&mut self, sem: SemaphoreId) -> Option<&mut SemaphoreObject> {
        self.semaphores.get_mut(sem.index())?.as_mut()
    }

    fn semaphore_ref(&self, sem: SemaphoreId) -> KernelResult<&SemaphoreObject> {
        self.semaphores
            .get(sem.index())
            .and_then(Option::as_ref)
            .ok_or(UNKNOWN_SEMAPHORE)
    }

    /// Binary semaphore, created empty (xSemaphoreCreateBinary).
    pub fn semaphore_create_binary(&mut self) -> KernelResult<SemaphoreId> {
        self.semaphore_create_counting(1, 0)
    }

    pub fn semaphore_create_counting(&mut self, max: u32, initial: u32) -> KernelResult<SemaphoreId> {
        self.check_alive()?;
        if max == 0 || initial > max {
            return Err(KernelError::InvalidState("invalid semaphore count"));
        }
        let index = match self.semaphores.iter().position(Option::is_none) {
            Some(index) => index,
            None if self.semaphores.len() < self.config.max_semaphores => {
                self.semaphores.push(None);
                self.semaphores.len() - 1
            }
            None => {
                traceCREATE_COUNTING_SEMAPHORE_FAILED();
                return Err(KernelError::ResourceExhausted);
            }
        };
        self.semaphores[index] = Some(SemaphoreObject {
            count: initial,
            max,
            waiters: WaitList::new(),
        });
        let sem = SemaphoreId(index as u16);
        traceCREATE_COUNTING_SEMAPHORE(sem, max, initial);
        Ok(sem)
    }

    /// Fails while any task is blocked on the semaphore.
    pub fn semaphore_delete(&mut self, sem: SemaphoreId) -> KernelResult<()> {
        self.check_alive()?;
        if !self.semaphore_ref(sem)?.waiters.is_empty() {
            return Err(KernelError::InvalidState("tasks are blocked on the semaphore"));
        }
        self.semaphores[sem.index()] = None;
        Ok(())
    }

    /// Take a token, blocking for up to `timeout` ticks while none is
    /// available.
    pub fn semaphore_take(&mut self, sem: SemaphoreId, timeout: TickType) -> KernelResult<Wait<()>> {
        self.check_alive()?;
        self.check_block_context(timeout)?;
        self.critical(|k| {
            let s = k.semaphore_slot(sem).ok_or(UNKNOWN_SEMAPHORE)?;
            if s.count > 0 {
                s.count -= 1;
                traceSEMAPHORE_TAKE(sem, s.count);
                return Ok(Wait::Done(()));
            }
            if timeout == 0 {
                return Err(KernelError::Timeout);
            }
            let task = k.block_current(BlockedOn::Semaphore(sem), timeout)?;
            if let Some(s) = k.semaphore_slot(sem) {
                s.waiters.push(task);
            }
            Ok(Wait::Blocked)
        })
    }

    /// Interrupt form of a zero-timeout take.
    pub fn semaphore_take_from_isr(&mut self, sem: SemaphoreId) -> KernelResult<()> {
        self.semaphore_take(sem, 0).map(|_| ())
    }

    /// Release a token. With a waiter the token goes straight to the longest
    /// waiting task; at the maximum count the give fails.
    pub fn semaphore_give(&mut self, sem: SemaphoreId) -> KernelResult<()> {
        self.semaphore_give_from_isr(sem).map(|_| ())
    }

    /// Returns whether a higher-priority task was woken.
    pub fn semaphore_give_from_isr(&mut self, sem: SemaphoreId) -> KernelResult<bool> {
        self.check_alive()?;
        self.critical(|k| {
            let s = k.semaphore_slot(sem).ok_or(UNKNOWN_SEMAPHORE)?;
            if let Some(waiter) = s.waiters.pop_front() {
                traceSEMAPHORE_GIVE(sem, s.count);
                return Ok(k.wake_task(waiter, WakeReason::Signaled));
            }
            if s.count >= s.max {
                return Err(KernelError::ResourceExhausted);
            }
            s.count += 1;
            traceSEMAPHORE_GIVE(sem, s.count);
            Ok(false)
        })
    }

    pub fn semaphore_count(&self, sem: SemaphoreId) -> KernelResult<u32> {
        self.check_alive()?;
        Ok(self.semaphore_ref(sem)?.count)
    }
}
