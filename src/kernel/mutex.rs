/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] Mutexes and recursive mutexes with priority inheritance. The
 * holder of a mutex runs at the highest effective priority of the tasks
 * blocked on any mutex it holds; the raise follows chains of owners that are
 * themselves blocked on mutexes. Release hands ownership to the
 * highest-priority waiter, earliest arrival first.
 */

//! Mutexes

use super::list::WaitList;
use super::tasks::{self, BlockedOn};
use super::Kernel;
use crate::error::{KernelError, KernelResult};
use crate::port::Port;
use crate::trace::*;
use crate::types::*;

const UNKNOWN_MUTEX: KernelError = KernelError::InvalidState("unknown or deleted mutex");
const FROM_ISR: KernelError = KernelError::InvalidState("mutex used from interrupt");

pub(crate) struct MutexObject {
    pub(crate) owner: Option<TaskId>,
    /// Number of takes not yet matched by a give.
    depth: u32,
    recursive: bool,
    pub(crate) waiters: WaitList,
}

impl<P: Port> Kernel<P> {
    pub(crate) fn mutex_slot(&mut self, mutex: MutexId) -> Option<&mut MutexObject> {
        self.mutexes.get_mut(mutex.index())?.as_mut()
    }

    pub(crate) fn mutex_ref(&self, mutex: MutexId) -> Option<&MutexObject> {
        self.mutexes.get(mutex.index())?.as_ref()
    }

    pub fn mutex_create(&mut self) -> KernelResult<MutexId> {
        self.create_mutex(false)
    }

    /// A mutex its owner may take again; it is released when every take has
    /// been given back.
    pub fn mutex_create_recursive(&mut self) -> KernelResult<MutexId> {
        self.create_mutex(true)
    }

    fn create_mutex(&mut self, recursive: bool) -> KernelResult<MutexId> {
        self.check_alive()?;
        let index = match self.mutexes.iter().position(Option::is_none) {
            Some(index) => index,
            None if self.mutexes.len() < self.config.max_mutexes => {
                self.mutexes.push(None);
                self.mutexes.len() - 1
            }
            None => {
                traceCREATE_MUTEX_FAILED();
                return Err(KernelError::ResourceExhausted);
            }
        };
        self.mutexes[index] = Some(MutexObject {
            owner: None,
            depth: 0,
            recursive,
            waiters: WaitList::new(),
        });
        let mutex = MutexId(index as u16);
        traceCREATE_MUTEX(mutex, recursive);
        Ok(mutex)
    }

    /// Fails while the mutex is held or waited on.
    pub fn mutex_delete(&mut self, mutex: MutexId) -> KernelResult<()> {
        self.check_alive()?;
        let m = self.mutex_ref(mutex).ok_or(UNKNOWN_MUTEX)?;
        if m.owner.is_some() || !m.waiters.is_empty() {
            return Err(KernelError::InvalidState("mutex is in use"));
        }
        self.mutexes[mutex.index()] = None;
        Ok(())
    }

    pub fn mutex_owner(&self, mutex: MutexId) -> KernelResult<Option<TaskId>> {
        self.check_alive()?;
        Ok(self.mutex_ref(mutex).ok_or(UNKNOWN_MUTEX)?.owner)
    }

    /// Take the mutex for the running task. While another task holds it the
    /// caller blocks for up to `timeout` ticks and lends the holder its
    /// priority.
    pub fn mutex_take(&mut self, mutex: MutexId, timeout: TickType) -> KernelResult<Wait<()>> {
        self.check_alive()?;
        if self.in_isr() {
            return Err(FROM_ISR);
        }
        self.check_block_context(timeout)?;
        self.critical(|k| {
            let (task, _) = k
                .running_task()
                .ok_or(KernelError::InvalidState("scheduler not running"))?;
            let m = k.mutex_slot(mutex).ok_or(UNKNOWN_MUTEX)?;
            let holder = m.owner;
            match holder {
                None => {
                    m.owner = Some(task);
                    m.depth = 1;
                    traceTAKE_MUTEX(mutex, task, 1);
                    k.tcb_mut(task)?.mutexes_held.push(mutex);
                    Ok(Wait::Done(()))
                }
                Some(owner) if owner == task => {
                    if !m.recursive {
                        return Err(KernelError::InvalidState("mutex already held by caller"));
                    }
                    m.depth += 1;
                    traceTAKE_MUTEX(mutex, task, m.depth);
                    Ok(Wait::Done(()))
                }
                Some(owner) => {
                    if timeout == 0 {
                        return Err(KernelError::Timeout);
                    }
                    k.block_current(BlockedOn::Mutex(mutex), timeout)?;
                    if let Some(m) = k.mutex_slot(mutex) {
                        m.waiters.push(task);
                    }
                    k.recompute_priority(owner);
                    Ok(Wait::Blocked)
                }
            }
        })
    }

    /// Give the mutex back. Only the owner may give; at depth zero ownership
    /// passes to the highest-priority waiter and the giver drops any priority
    /// it no longer needs.
    pub fn mutex_give(&mut self, mutex: MutexId) -> KernelResult<()> {
        self.check_alive()?;
        if self.in_isr() {
            return Err(FROM_ISR);
        }
        self.critical(|k| {
            let task = k.current;
            let m = k.mutex_slot(mutex).ok_or(UNKNOWN_MUTEX)?;
            let owner = match m.owner {
                Some(owner) if Some(owner) == task => owner,
                _ => return Err(KernelError::InvalidState("mutex not held by caller")),
            };
            m.depth -= 1;
            if m.depth > 0 {
                return Ok(());
            }
            k.tcb_mut(owner)?.mutexes_held.retain(|held| *held != mutex);
            k.release_mutex(mutex);
            k.recompute_priority(owner);
            Ok(())
        })
    }

    /// Pass a mutex whose owner gave it up (or was deleted) to the
    /// highest-priority waiter, or leave it free.
    pub(crate) fn release_mutex(&mut self, mutex: MutexId) -> bool {
        let slots = &self.tasks;
        let Some(m) = self.mutexes.get_mut(mutex.index()).and_then(Option::as_mut) else {
            return false;
        };
        let next = m
            .waiters
            .pop_max_by_key(|t| tasks::slot(slots, t).map_or(0, |tcb| tcb.priority));
        m.owner = next;
        m.depth = next.map_or(0, |_| 1);
        traceGIVE_MUTEX(mutex, next);

        let Some(next) = next else {
            return false;
        };
        if let Ok(tcb) = self.tcb_mut(next) {
            tcb.mutexes_held.push(mutex);
        }
        let woken = self.wake_task(next, WakeReason::Signaled);
        // The new owner inherits from the waiters left behind.
        self.recompute_priority(next);
        woken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::port::dummy::DummyPort;

    fn body(_: usize) {}

    fn start(k: &mut Kernel<DummyPort>) {
        k.start().unwrap();
        #[cfg(feature = "timers")]
        if k.current() == k.timer_task() {
            assert!(k.run_timer_service().unwrap().is_blocked());
        }
    }

    fn kernel() -> Kernel<DummyPort> {
        Kernel::new(Config::DEFAULT, DummyPort::new()).unwrap()
    }

    #[test]
    fn test_inheritance_and_handover() {
        let mut k = kernel();
        let low = k.create_task("low", 1, 64, body, 0).unwrap();
        start(&mut k);
        let m = k.mutex_create().unwrap();
        assert_eq!(k.mutex_take(m, 0), Ok(Wait::Done(())));

        let high = k.create_task("high", 3, 64, body, 0).unwrap();
        assert_eq!(k.current(), Some(high));
        assert!(k.mutex_take(m, MAX_DELAY).unwrap().is_blocked());
        assert_eq!(k.current(), Some(low));
        assert_eq!(k.priority(low), Ok(3));
        assert_eq!(k.base_priority(low), Ok(1));

        k.mutex_give(m).unwrap();
        assert_eq!(k.priority(low), Ok(1));
        assert_eq!(k.current(), Some(high));
        assert_eq!(k.mutex_owner(m), Ok(Some(high)));
        assert_eq!(k.take_wake_outcome(high), Ok(WakeReason::Signaled));
    }

    #[test]
    fn test_inheritance_follows_chain() {
        let mut k = kernel();
        let low = k.create_task("low", 1, 64, body, 0).unwrap();
        start(&mut k);
        let m1 = k.mutex_create().unwrap();
        let m2 = k.mutex_create().unwrap();
        k.mutex_take(m2, 0).unwrap();

        let mid = k.create_task("mid", 2, 64, body, 0).unwrap();
        k.mutex_take(m1, 0).unwrap();
        assert!(k.mutex_take(m2, MAX_DELAY).unwrap().is_blocked());
        assert_eq!(k.priority(low), Ok(2));

        let high = k.create_task("high", 3, 64, body, 0).unwrap();
        assert!(k.mutex_take(m1, MAX_DELAY).unwrap().is_blocked());
        assert_eq!(k.priority(mid), Ok(3));
        assert_eq!(k.priority(low), Ok(3));
        assert_eq!(k.current(), Some(low));

        k.mutex_give(m2).unwrap();
        assert_eq!(k.priority(low), Ok(1));
        assert_eq!(k.current(), Some(mid));
        k.mutex_give(m1).unwrap();
        assert_eq!(k.priority(mid), Ok(2));
        assert_eq!(k.current(), Some(high));
        assert_eq!(k.mutex_owner(m2), Ok(Some(mid)));
    }

    #[test]
    fn test_timed_out_waiter_stops_lending() {
        let mut k = kernel();
        let low = k.create_task("low", 1, 64, body, 0).unwrap();
        start(&mut k);
        let m = k.mutex_create().unwrap();
        k.mutex_take(m, 0).unwrap();
        let high = k.create_task("high", 3, 64, body, 0).unwrap();
        assert!(k.mutex_take(m, 5).unwrap().is_blocked());
        assert_eq!(k.priority(low), Ok(3));
        for _ in 0..5 {
            k.tick_interrupt().unwrap();
        }
        assert_eq!(k.current(), Some(high));
        assert_eq!(k.take_wake_outcome(high), Ok(WakeReason::Timeout));
        assert_eq!(k.priority(low), Ok(1));
        assert_eq!(k.mutex_owner(m), Ok(Some(low)));
    }

    #[test]
    fn test_recursive_depth() {
        let mut k = kernel();
        let t = k.create_task("t", 1, 64, body, 0).unwrap();
        start(&mut k);
        let m = k.mutex_create_recursive().unwrap();
        k.mutex_take(m, 0).unwrap();
        k.mutex_take(m, 0).unwrap();
        k.mutex_give(m).unwrap();
        assert_eq!(k.mutex_owner(m), Ok(Some(t)));
        k.mutex_give(m).unwrap();
        assert_eq!(k.mutex_owner(m), Ok(None));
        k.mutex_delete(m).unwrap();
    }

    #[test]
    fn test_misuse_rejected() {
        let mut k = kernel();
        let a = k.create_task("a", 2, 64, body, 0).unwrap();
        let b = k.create_task("b", 1, 64, body, 0).unwrap();
        start(&mut k);
        let m = k.mutex_create().unwrap();
        k.mutex_take(m, 0).unwrap();
        assert_eq!(
            k.mutex_take(m, 0),
            Err(KernelError::InvalidState("mutex already held by caller"))
        );
        assert!(k.mutex_delete(m).is_err());
        k.delay(1).unwrap();
        assert_eq!(k.current(), Some(b));
        assert_eq!(
            k.mutex_give(m),
            Err(KernelError::InvalidState("mutex not held by caller"))
        );
        k.enter_isr();
        assert_eq!(k.mutex_take(m, 0), Err(FROM_ISR));
        k.exit_isr();
        assert_eq!(k.mutex_owner(m), Ok(Some(a)));
    }

    #[test]
    fn test_deleted_owner_hands_over() {
        let mut k = kernel();
        let low = k.create_task("low", 1, 64, body, 0).unwrap();
        start(&mut k);
        let m = k.mutex_create().unwrap();
        k.mutex_take(m, 0).unwrap();
        let high = k.create_task("high", 3, 64, body, 0).unwrap();
        k.mutex_take(m, MAX_DELAY).unwrap();
        assert_eq!(k.current(), Some(low));
        k.delete_task(low).unwrap();
        assert_eq!(k.current(), Some(high));
        assert_eq!(k.mutex_owner(m), Ok(Some(high)));
    }
}
