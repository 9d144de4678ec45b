//! Typed Queue wrapper
//!
//! Provides a type-safe queue for inter-task communication.
//! Unlike the raw kernel API which moves byte slices,
//! this wrapper fixes the item type at compile time.

use core::marker::PhantomData;
use core::mem::{size_of, MaybeUninit};
use core::slice;

use crate::error::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::port::Port;
use crate::types::*;

/// Types a [`Queue`] can carry.
///
/// # Safety
///
/// Implementers guarantee the type has no padding bytes and that every byte
/// pattern of `size_of::<Self>()` bytes is a valid value. Items are moved
/// through the kernel as raw bytes.
pub unsafe trait QueueItem: Copy {}

unsafe impl QueueItem for u8 {}
unsafe impl QueueItem for u16 {}
unsafe impl QueueItem for u32 {}
unsafe impl QueueItem for u64 {}
unsafe impl QueueItem for usize {}
unsafe impl QueueItem for i8 {}
unsafe impl QueueItem for i16 {}
unsafe impl QueueItem for i32 {}
unsafe impl QueueItem for i64 {}
unsafe impl QueueItem for isize {}
unsafe impl QueueItem for f32 {}
unsafe impl QueueItem for f64 {}
unsafe impl<T: QueueItem, const N: usize> QueueItem for [T; N] {}

/// A type-safe FIFO queue for inter-task communication.
///
/// Queues allow tasks to send and receive messages of type `T`.
/// The queue stores copies of items, so `T` must be a [`QueueItem`].
///
/// # Example
///
/// ```ignore
/// use rtkernel::sync::Queue;
///
/// // Create a queue that can hold 10 u32 values
/// let queue: Queue<u32> = Queue::new(&mut kernel, 10)?;
///
/// // Send a value (from one task)
/// queue.try_send(&mut kernel, &42)?;
///
/// // Receive a value (from another task)
/// let value = queue.try_receive(&mut kernel)?;
/// ```
pub struct Queue<T: QueueItem> {
    id: QueueId,
    _marker: PhantomData<T>,
}

impl<T: QueueItem> Clone for Queue<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: QueueItem> Copy for Queue<T> {}

fn item_bytes<T: QueueItem>(item: &T) -> &[u8] {
    // Safety: `QueueItem` types have no padding, so every byte is initialised.
    unsafe { slice::from_raw_parts(item as *const T as *const u8, size_of::<T>()) }
}

/// Fill a `T` from the queue through `fill`.
fn read_item<T: QueueItem, R>(
    fill: impl FnOnce(&mut [u8]) -> KernelResult<Wait<R>>,
) -> KernelResult<Wait<(T, R)>> {
    let mut item = MaybeUninit::<T>::zeroed();
    // Safety: the storage is zero-initialised and exactly `size_of::<T>()` long.
    let buf = unsafe { slice::from_raw_parts_mut(item.as_mut_ptr() as *mut u8, size_of::<T>()) };
    match fill(buf)? {
        // Safety: any byte pattern is a valid `QueueItem`.
        Wait::Done(extra) => Ok(Wait::Done((unsafe { item.assume_init() }, extra))),
        Wait::Blocked => Ok(Wait::Blocked),
    }
}

impl<T: QueueItem> Queue<T> {
    /// Creates a new queue that can hold `length` items of type `T`.
    pub fn new<P: Port>(kernel: &mut Kernel<P>, length: usize) -> KernelResult<Self> {
        let id = kernel.queue_create(length, size_of::<T>())?;
        Ok(Self {
            id,
            _marker: PhantomData,
        })
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Sends an item to the back of the queue, blocking for up to `ticks`
    /// while it is full.
    pub fn send<P: Port>(
        &self,
        kernel: &mut Kernel<P>,
        item: &T,
        ticks: TickType,
    ) -> KernelResult<Wait<()>> {
        kernel.queue_send(self.id, item_bytes(item), ticks)
    }

    /// Attempts to send an item without blocking.
    pub fn try_send<P: Port>(&self, kernel: &mut Kernel<P>, item: &T) -> KernelResult<()> {
        self.send(kernel, item, 0).map(|_| ())
    }

    /// Sends an item to the front of the queue.
    ///
    /// Items sent to front are received before items sent to back.
    pub fn send_to_front<P: Port>(
        &self,
        kernel: &mut Kernel<P>,
        item: &T,
        ticks: TickType,
    ) -> KernelResult<Wait<()>> {
        kernel.queue_send_to_front(self.id, item_bytes(item), ticks)
    }

    /// Returns whether a higher-priority task was woken.
    pub fn send_from_isr<P: Port>(&self, kernel: &mut Kernel<P>, item: &T) -> KernelResult<bool> {
        kernel.queue_send_from_isr(self.id, item_bytes(item))
    }

    /// Receives an item, blocking for up to `ticks` while the queue is empty.
    ///
    /// After `Wait::Blocked`, the item is collected with
    /// [`Queue::take_received`] once the task runs again.
    pub fn receive<P: Port>(&self, kernel: &mut Kernel<P>, ticks: TickType) -> KernelResult<Wait<T>> {
        let item = read_item::<T, ()>(|buf| kernel.queue_receive(self.id, buf, ticks))?;
        Ok(item.done().map_or(Wait::Blocked, |(item, _)| Wait::Done(item)))
    }

    /// Attempts to receive an item without blocking.
    pub fn try_receive<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<T> {
        match self.receive(kernel, 0)? {
            Wait::Done(item) => Ok(item),
            Wait::Blocked => Err(KernelError::Timeout),
        }
    }

    /// Copies the oldest item without removing it.
    pub fn peek<P: Port>(&self, kernel: &mut Kernel<P>, ticks: TickType) -> KernelResult<Wait<T>> {
        let item = read_item::<T, ()>(|buf| kernel.queue_peek(self.id, buf, ticks))?;
        Ok(item.done().map_or(Wait::Blocked, |(item, _)| Wait::Done(item)))
    }

    /// Returns the item and whether a higher-priority sender was woken.
    pub fn receive_from_isr<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<(T, bool)> {
        let item = read_item::<T, bool>(|buf| {
            kernel.queue_receive_from_isr(self.id, buf).map(Wait::Done)
        })?;
        item.done().ok_or(KernelError::Timeout)
    }

    /// The item handed to `task` while it was blocked in
    /// [`Queue::receive`] or [`Queue::peek`].
    pub fn take_received<P: Port>(&self, kernel: &mut Kernel<P>, task: TaskId) -> KernelResult<T> {
        let item = read_item::<T, ()>(|buf| kernel.take_received(task, buf).map(Wait::Done))?;
        item.done()
            .map(|(item, _)| item)
            .ok_or(KernelError::InvalidState("no item received"))
    }

    /// Number of items in the queue.
    pub fn len<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<usize> {
        kernel.queue_len(self.id)
    }

    pub fn is_empty<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<bool> {
        Ok(self.len(kernel)? == 0)
    }

    /// Free slots.
    pub fn spaces<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<usize> {
        kernel.queue_spaces(self.id)
    }

    pub fn reset<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<()> {
        kernel.queue_reset(self.id)
    }

    pub fn delete<P: Port>(self, kernel: &mut Kernel<P>) -> KernelResult<()> {
        kernel.queue_delete(self.id)
    }
}
