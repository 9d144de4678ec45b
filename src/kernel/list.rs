/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] The intrusive doubly linked List_t/ListItem_t pair is replaced
 * by three owning list types that store `TaskId`s: per-priority ready lists,
 * the wake-tick ordered delayed list and the FIFO event wait lists used by
 * queues, semaphores and mutexes. A task is in at most one list of each kind.
 */

//! Scheduler Lists

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::types::*;

// =============================================================================
// Ready lists
// =============================================================================

/// One FIFO sub-list per priority level.
///
/// The running task is kept at the head of its sub-list. Tasks becoming ready
/// are appended at the tail; yields and time slices move the running task
/// from the head to the tail.
#[derive(Debug)]
pub(crate) struct ReadyLists {
    lists: Vec<VecDeque<TaskId>>,
    /// Highest priority that may hold a task (uxTopReadyPriority).
    top_ready_priority: usize,
}

impl ReadyLists {
    pub(crate) fn new(priorities: u8) -> Self {
        let mut lists = Vec::with_capacity(priorities as usize);
        lists.resize_with(priorities as usize, VecDeque::new);
        ReadyLists {
            lists,
            top_ready_priority: 0,
        }
    }

    pub(crate) fn push_back(&mut self, priority: Priority, task: TaskId) {
        let priority = priority as usize;
        self.lists[priority].push_back(task);
        self.record_ready_priority(priority);
    }

    pub(crate) fn push_front(&mut self, priority: Priority, task: TaskId) {
        let priority = priority as usize;
        self.lists[priority].push_front(task);
        self.record_ready_priority(priority);
    }

    #[inline(always)]
    fn record_ready_priority(&mut self, priority: usize) {
        if priority > self.top_ready_priority {
            self.top_ready_priority = priority;
        }
    }

    /// Remove `task` from the sub-list of `priority`. Returns `false` if it was
    /// not there.
    pub(crate) fn remove(&mut self, priority: Priority, task: TaskId) -> bool {
        let list = &mut self.lists[priority as usize];
        match list.iter().position(|t| *t == task) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Head of the highest-priority non-empty sub-list.
    pub(crate) fn highest(&mut self) -> Option<TaskId> {
        let mut top = self.top_ready_priority;
        loop {
            if let Some(head) = self.lists[top].front() {
                self.top_ready_priority = top;
                return Some(*head);
            }
            if top == 0 {
                self.top_ready_priority = 0;
                return None;
            }
            top -= 1;
        }
    }

    /// Highest priority with at least one ready task.
    pub(crate) fn highest_priority(&mut self) -> Option<Priority> {
        self.highest().map(|_| self.top_ready_priority as Priority)
    }

    pub(crate) fn len(&self, priority: Priority) -> usize {
        self.lists[priority as usize].len()
    }

    pub(crate) fn contains(&self, priority: Priority, task: TaskId) -> bool {
        self.lists[priority as usize].contains(&task)
    }

    pub(crate) fn iter(&self, priority: Priority) -> impl Iterator<Item = TaskId> + '_ {
        self.lists[priority as usize].iter().copied()
    }
}

// =============================================================================
// Delayed list
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct DelayedEntry<T> {
    wake: TickType,
    item: T,
}

/// Items ordered by wake tick. Holds blocked tasks for the scheduler and
/// active timers for the timer service.
///
/// Entries are ordered by their distance from the current tick, which keeps
/// the order correct across tick counter wrap as long as no timeout exceeds
/// [`MAX_FINITE_DELAY`]. Entries whose wake tick has already been reached
/// count as distance zero, so they stay at the head until popped. Equal
/// wake ticks keep insertion order.
#[derive(Debug)]
pub(crate) struct DelayedList<T = TaskId> {
    entries: VecDeque<DelayedEntry<T>>,
}

impl<T: Copy + PartialEq> DelayedList<T> {
    pub(crate) fn new() -> Self {
        DelayedList {
            entries: VecDeque::new(),
        }
    }

    /// Insert `item` to wake at `wake`. An entry already due goes behind
    /// every other due entry.
    pub(crate) fn insert(&mut self, now: TickType, wake: TickType, item: T) {
        let distance = |wake: TickType| {
            if tick_reached(now, wake) {
                0
            } else {
                wake.wrapping_sub(now)
            }
        };
        let own = distance(wake);
        let pos = self
            .entries
            .iter()
            .position(|e| distance(e.wake) > own)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, DelayedEntry { wake, item });
    }

    pub(crate) fn remove(&mut self, item: T) -> bool {
        match self.entries.iter().position(|e| e.item == item) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Pop the first entry whose wake tick has been reached.
    pub(crate) fn pop_expired(&mut self, now: TickType) -> Option<T> {
        let head = self.entries.front()?;
        if tick_reached(now, head.wake) {
            self.entries.pop_front().map(|e| e.item)
        } else {
            None
        }
    }

    /// Wake tick of the earliest entry.
    pub(crate) fn next_wake(&self) -> Option<TickType> {
        self.entries.front().map(|e| e.wake)
    }

    pub(crate) fn contains(&self, item: T) -> bool {
        self.entries.iter().any(|e| e.item == item)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Event wait lists
// =============================================================================

/// Tasks blocked on one side of a kernel object, in arrival order.
#[derive(Debug, Default, Clone)]
pub(crate) struct WaitList {
    tasks: VecDeque<TaskId>,
}

impl WaitList {
    pub(crate) fn new() -> Self {
        WaitList {
            tasks: VecDeque::new(),
        }
    }

    pub(crate) fn push(&mut self, task: TaskId) {
        self.tasks.push_back(task);
    }

    /// Longest waiting task.
    pub(crate) fn pop_front(&mut self) -> Option<TaskId> {
        self.tasks.pop_front()
    }

    pub(crate) fn remove(&mut self, task: TaskId) -> bool {
        match self.tasks.iter().position(|t| *t == task) {
            Some(pos) => {
                self.tasks.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove and return the waiter with the largest key. Ties go to the
    /// earliest arrival.
    pub(crate) fn pop_max_by_key<K: Ord>(
        &mut self,
        mut key: impl FnMut(TaskId) -> K,
    ) -> Option<TaskId> {
        let mut best: Option<(usize, K)> = None;
        for (pos, task) in self.tasks.iter().enumerate() {
            let k = key(*task);
            match &best {
                Some((_, best_key)) if k <= *best_key => {}
                _ => best = Some((pos, k)),
            }
        }
        let (pos, _) = best?;
        self.tasks.remove(pos)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.iter().copied()
    }
}
