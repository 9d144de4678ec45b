/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] Queues from queue.c. Items are fixed-size byte strings copied in
 * and out of a circular buffer. Instead of the queue lock and a retry loop, an
 * item is handed straight to a blocked receiver, and a blocked sender parks
 * its item in its TCB until a slot frees.
 */

//! Queue Implementation
//!
//! A queue has a fixed capacity and item size chosen at creation. Senders
//! block while it is full and receivers while it is empty, each side in
//! arrival order. For typed access see [`crate::sync::Queue`].

use alloc::vec;
use alloc::vec::Vec;

use super::list::WaitList;
use super::tasks::BlockedOn;
use super::Kernel;
use crate::error::{KernelError, KernelResult};
use crate::port::Port;
use crate::trace::*;
use crate::types::*;

const UNKNOWN_QUEUE: KernelError = KernelError::InvalidState("unknown or deleted queue");
const SIZE_MISMATCH: KernelError = KernelError::InvalidState("item size mismatch");

// =============================================================================
// Queue storage
// =============================================================================

pub(crate) struct QueueObject {
    item_size: usize,
    capacity: usize,
    storage: Vec<u8>,
    /// Slot of the oldest item.
    head: usize,
    len: usize,
    pub(crate) senders: WaitList,
    pub(crate) receivers: WaitList,
}

impl QueueObject {
    fn new(capacity: usize, item_size: usize) -> Self {
        QueueObject {
            item_size,
            capacity,
            storage: vec![0; capacity * item_size],
            head: 0,
            len: 0,
            senders: WaitList::new(),
            receivers: WaitList::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.item_size;
        &mut self.storage[start..start + self.item_size]
    }

    fn push_back(&mut self, item: &[u8]) {
        let tail = (self.head + self.len) % self.capacity;
        self.slot(tail).copy_from_slice(item);
        self.len += 1;
    }

    fn push_front(&mut self, item: &[u8]) {
        self.head = (self.head + self.capacity - 1) % self.capacity;
        let head = self.head;
        self.slot(head).copy_from_slice(item);
        self.len += 1;
    }

    fn front(&self) -> &[u8] {
        let start = self.head * self.item_size;
        &self.storage[start..start + self.item_size]
    }

    fn pop_front(&mut self, buf: &mut [u8]) {
        buf.copy_from_slice(self.front());
        self.head = (self.head + 1) % self.capacity;
        self.len -= 1;
    }

    fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

impl<P: Port> Kernel<P> {
    pub(crate) fn queue_slot(&mut self, queue: QueueId) -> Option<&mut QueueObject> {
        self.queues.get_mut(queue.index())?.as_mut()
    }

    fn queue_ref(&self, queue: QueueId) -> KernelResult<&QueueObject> {
        self.queues
            .get(queue.index())
            .and_then(Option::as_ref)
            .ok_or(UNKNOWN_QUEUE)
    }

    // =========================================================================
    // Creation and deletion
    // =========================================================================

    /// Create a queue of `capacity` items of `item_size` bytes each.
    pub fn queue_create(&mut self, capacity: usize, item_size: usize) -> KernelResult<QueueId> {
        self.check_alive()?;
        if capacity == 0 {
            return Err(KernelError::InvalidState("queue capacity must be non-zero"));
        }
        let index = match self.queues.iter().position(Option::is_none) {
            Some(index) => index,
            None if self.queues.len() < self.config.max_queues => {
                self.queues.push(None);
                self.queues.len() - 1
            }
            None => {
                traceQUEUE_CREATE_FAILED();
                return Err(KernelError::ResourceExhausted);
            }
        };
        self.queues[index] = Some(QueueObject::new(capacity, item_size));
        let queue = QueueId(index as u16);
        traceQUEUE_CREATE(queue, capacity, item_size);
        Ok(queue)
    }

    /// Delete a queue. Fails while any task is blocked on it.
    pub fn queue_delete(&mut self, queue: QueueId) -> KernelResult<()> {
        self.check_alive()?;
        let q = self.queue_ref(queue)?;
        if !q.senders.is_empty() || !q.receivers.is_empty() {
            return Err(KernelError::InvalidState("tasks are blocked on the queue"));
        }
        #[cfg(feature = "timers")]
        if self.timer_queue() == Some(queue) {
            return Err(KernelError::InvalidState("queue belongs to the timer service"));
        }
        self.queues[queue.index()] = None;
        traceQUEUE_DELETE(queue);
        Ok(())
    }

    /// Discard every item, then let blocked senders in.
    pub fn queue_reset(&mut self, queue: QueueId) -> KernelResult<()> {
        self.check_alive()?;
        self.critical(|k| {
            k.queue_slot(queue).ok_or(UNKNOWN_QUEUE)?.clear();
            k.admit_senders(queue);
            Ok(())
        })
    }

    // =========================================================================
    // Send
    // =========================================================================

    /// Append `item`, blocking for up to `timeout` ticks while the queue is
    /// full.
    pub fn queue_send(
        &mut self,
        queue: QueueId,
        item: &[u8],
        timeout: TickType,
    ) -> KernelResult<Wait<()>> {
        self.send(queue, item, false, timeout)
            .map(|w| w.done().map_or(Wait::Blocked, |_| Wait::Done(())))
    }

    /// Insert `item` at the head so it is received next.
    pub fn queue_send_to_front(
        &mut self,
        queue: QueueId,
        item: &[u8],
        timeout: TickType,
    ) -> KernelResult<Wait<()>> {
        self.send(queue, item, true, timeout)
            .map(|w| w.done().map_or(Wait::Blocked, |_| Wait::Done(())))
    }

    /// Interrupt form of [`Kernel::queue_send`]; never blocks. Returns whether
    /// a higher-priority task was woken.
    pub fn queue_send_from_isr(&mut self, queue: QueueId, item: &[u8]) -> KernelResult<bool> {
        Ok(self.send(queue, item, false, 0)?.done().unwrap_or(false))
    }

    pub fn queue_send_to_front_from_isr(
        &mut self,
        queue: QueueId,
        item: &[u8],
    ) -> KernelResult<bool> {
        Ok(self.send(queue, item, true, 0)?.done().unwrap_or(false))
    }

    /// Mailbox write for a queue of capacity one: replace the stored item if
    /// there is one. Never blocks.
    pub fn queue_overwrite(&mut self, queue: QueueId, item: &[u8]) -> KernelResult<bool> {
        self.check_alive()?;
        let q = self.queue_ref(queue)?;
        if q.capacity != 1 {
            return Err(KernelError::InvalidState("overwrite needs a queue of capacity one"));
        }
        if item.len() != q.item_size {
            return Err(SIZE_MISMATCH);
        }
        self.critical(|k| {
            let q = k.queue_slot(queue).ok_or(UNKNOWN_QUEUE)?;
            q.clear();
            Ok(k.deliver(queue, item, false))
        })
    }

    fn send(
        &mut self,
        queue: QueueId,
        item: &[u8],
        front: bool,
        timeout: TickType,
    ) -> KernelResult<Wait<bool>> {
        self.check_alive()?;
        self.check_block_context(timeout)?;
        self.critical(|k| {
            let q = k.queue_slot(queue).ok_or(UNKNOWN_QUEUE)?;
            if item.len() != q.item_size {
                return Err(SIZE_MISMATCH);
            }
            if !q.is_full() {
                return Ok(Wait::Done(k.deliver(queue, item, front)));
            }
            if timeout == 0 {
                traceQUEUE_SEND_FAILED(queue);
                return Err(KernelError::Timeout);
            }
            let task = k.block_current(BlockedOn::QueueSend { queue, front }, timeout)?;
            k.tcb_mut(task)?.transfer = Some(item.to_vec());
            if let Some(q) = k.queue_slot(queue) {
                q.senders.push(task);
            }
            Ok(Wait::Blocked)
        })
    }

    /// Put an item into a queue with room. Blocked receivers are served
    /// first: peekers at the front get a copy, the first real receiver takes
    /// the item. Returns whether a preemption was requested.
    fn deliver(&mut self, queue: QueueId, item: &[u8], front: bool) -> bool {
        let mut woken = false;
        loop {
            let Some(receiver) = self.queue_slot(queue).and_then(|q| q.receivers.pop_front())
            else {
                break;
            };
            let peek = matches!(
                self.tcb(receiver).map(|t| t.blocked_on),
                Ok(Some(BlockedOn::QueueReceive { peek: true, .. }))
            );
            if let Ok(tcb) = self.tcb_mut(receiver) {
                tcb.transfer = Some(item.to_vec());
            }
            woken |= self.wake_task(receiver, WakeReason::Signaled);
            if !peek {
                traceQUEUE_SEND(queue, 0);
                return woken;
            }
        }
        if let Some(q) = self.queue_slot(queue) {
            if front {
                q.push_front(item);
            } else {
                q.push_back(item);
            }
            traceQUEUE_SEND(queue, q.len);
        }
        woken
    }

    /// Move parked items of blocked senders into free slots, oldest sender
    /// first, and wake them.
    fn admit_senders(&mut self, queue: QueueId) -> bool {
        let mut woken = false;
        loop {
            let Some(sender) = self
                .queue_slot(queue)
                .filter(|q| !q.is_full())
                .and_then(|q| q.senders.pop_front())
            else {
                break;
            };
            let (item, front) = match self.tcb_mut(sender) {
                Ok(tcb) => (
                    tcb.transfer.take(),
                    matches!(tcb.blocked_on, Some(BlockedOn::QueueSend { front: true, .. })),
                ),
                Err(_) => continue,
            };
            if let (Some(item), Some(q)) = (item, self.queue_slot(queue)) {
                if front {
                    q.push_front(&item);
                } else {
                    q.push_back(&item);
                }
            }
            woken |= self.wake_task(sender, WakeReason::Signaled);
        }
        woken
    }

    // =========================================================================
    // Receive
    // =========================================================================

    /// Take the oldest item into `buf`, blocking for up to `timeout` ticks
    /// while the queue is empty. After a blocked receive the item is collected
    /// with [`Kernel::take_received`].
    pub fn queue_receive(
        &mut self,
        queue: QueueId,
        buf: &mut [u8],
        timeout: TickType,
    ) -> KernelResult<Wait<()>> {
        self.receive(queue, buf, false, timeout)
            .map(|w| w.done().map_or(Wait::Blocked, |_| Wait::Done(())))
    }

    /// Copy the oldest item without removing it.
    pub fn queue_peek(
        &mut self,
        queue: QueueId,
        buf: &mut [u8],
        timeout: TickType,
    ) -> KernelResult<Wait<()>> {
        self.receive(queue, buf, true, timeout)
            .map(|w| w.done().map_or(Wait::Blocked, |_| Wait::Done(())))
    }

    /// Interrupt form of [`Kernel::queue_receive`]; never blocks. Returns
    /// whether a higher-priority sender was woken.
    pub fn queue_receive_from_isr(&mut self, queue: QueueId, buf: &mut [u8]) -> KernelResult<bool> {
        Ok(self.receive(queue, buf, false, 0)?.done().unwrap_or(false))
    }

    fn receive(
        &mut self,
        queue: QueueId,
        buf: &mut [u8],
        peek: bool,
        timeout: TickType,
    ) -> KernelResult<Wait<bool>> {
        self.check_alive()?;
        self.check_block_context(timeout)?;
        self.critical(|k| {
            let q = k.queue_slot(queue).ok_or(UNKNOWN_QUEUE)?;
            if buf.len() != q.item_size {
                return Err(SIZE_MISMATCH);
            }
            if !q.is_empty() {
                if peek {
                    buf.copy_from_slice(q.front());
                    traceQUEUE_PEEK(queue);
                    return Ok(Wait::Done(false));
                }
                q.pop_front(buf);
                traceQUEUE_RECEIVE(queue, q.len);
                return Ok(Wait::Done(k.admit_senders(queue)));
            }
            if timeout == 0 {
                traceQUEUE_RECEIVE_FAILED(queue);
                return Err(KernelError::Timeout);
            }
            let task = k.block_current(BlockedOn::QueueReceive { queue, peek }, timeout)?;
            if let Some(q) = k.queue_slot(queue) {
                q.receivers.push(task);
            }
            Ok(Wait::Blocked)
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Items currently stored (uxQueueMessagesWaiting).
    pub fn queue_len(&self, queue: QueueId) -> KernelResult<usize> {
        self.check_alive()?;
        Ok(self.queue_ref(queue)?.len)
    }

    /// Free slots (uxQueueSpacesAvailable).
    pub fn queue_spaces(&self, queue: QueueId) -> KernelResult<usize> {
        self.check_alive()?;
        let q = self.queue_ref(queue)?;
        Ok(q.capacity - q.len)
    }

    pub fn queue_item_size(&self, queue: QueueId) -> KernelResult<usize> {
        self.check_alive()?;
        Ok(self.queue_ref(queue)?.item_size)
    }
}
