//! Queues, semaphores, mutexes and notifications through the typed handles.

mod common;

use common::*;
use rtkernel::sync::{BinarySemaphore, CountingSemaphore, Mutex, Queue, QueueItem, TaskHandle};
use rtkernel::{KernelError, NotifyAction, TaskState, Wait, WakeReason, MAX_DELAY};

#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
struct Reading {
    sensor: u16,
    channel: u16,
    value: u32,
}

// Two u16 then a u32 under repr(C): no padding.
unsafe impl QueueItem for Reading {}

#[test]
fn test_queue_is_bounded_and_fifo() {
    let mut k = kernel();
    k.create_task("app", 1, 128, body, 0).unwrap();
    start(&mut k);
    let q: Queue<u32> = Queue::new(&mut k, 3).unwrap();

    for v in [1, 2, 3] {
        q.try_send(&mut k, &v).unwrap();
    }
    assert_eq!(q.try_send(&mut k, &4), Err(KernelError::Timeout));
    assert_eq!(q.spaces(&k), Ok(0));
    assert_eq!(q.len(&k), Ok(3));

    assert_eq!(q.try_receive(&mut k), Ok(1));
    q.send_to_front(&mut k, &9, 0).unwrap();
    assert_eq!(q.peek(&mut k, 0), Ok(Wait::Done(9)));
    assert_eq!(q.try_receive(&mut k), Ok(9));
    assert_eq!(q.try_receive(&mut k), Ok(2));
    assert_eq!(q.try_receive(&mut k), Ok(3));
    assert_eq!(q.try_receive(&mut k), Err(KernelError::Timeout));
    assert_eq!(q.is_empty(&k), Ok(true));
}

#[test]
fn test_queue_carries_odd_sized_arrays() {
    let mut k = kernel();
    k.create_task("app", 1, 128, body, 0).unwrap();
    start(&mut k);
    let q: Queue<[u8; 3]> = Queue::new(&mut k, 2).unwrap();
    q.try_send(&mut k, &[1, 2, 3]).unwrap();
    q.try_send(&mut k, &[4, 5, 6]).unwrap();
    assert_eq!(q.try_receive(&mut k), Ok([1, 2, 3]));
    assert_eq!(q.peek(&mut k, 0), Ok(Wait::Done([4, 5, 6])));
    assert_eq!(k.queue_item_size(q.id()), Ok(3));
}

#[test]
fn test_blocked_receiver_gets_item_directly() {
    let mut k = kernel();
    let producer = k.create_task("producer", 1, 128, body, 0).unwrap();
    let consumer = k.create_task("consumer", 2, 128, body, 0).unwrap();
    start(&mut k);
    let q: Queue<Reading> = Queue::new(&mut k, 2).unwrap();

    assert_eq!(k.current(), Some(consumer));
    assert!(q.receive(&mut k, MAX_DELAY).unwrap().is_blocked());
    assert_eq!(k.current(), Some(producer));

    let reading = Reading {
        sensor: 3,
        channel: 1,
        value: 0xdead_beef,
    };
    q.try_send(&mut k, &reading).unwrap();
    assert_eq!(k.current(), Some(consumer));
    assert_eq!(k.take_wake_outcome(consumer), Ok(WakeReason::Signaled));
    assert_eq!(q.take_received(&mut k, consumer), Ok(reading));
    assert_eq!(q.len(&k), Ok(0));
}

#[test]
fn test_blocked_sender_admitted_when_space_frees() {
    let mut k = kernel();
    k.create_task("receiver", 1, 128, body, 0).unwrap();
    let sender = k.create_task("sender", 2, 128, body, 0).unwrap();
    start(&mut k);
    let q: Queue<u32> = Queue::new(&mut k, 1).unwrap();

    q.try_send(&mut k, &1).unwrap();
    assert!(q.send(&mut k, &2, 5).unwrap().is_blocked());
    assert_eq!(q.try_receive(&mut k), Ok(1));

    assert_eq!(k.current(), Some(sender));
    assert_eq!(k.take_wake_outcome(sender), Ok(WakeReason::Signaled));
    assert_eq!(q.len(&k), Ok(1));
    assert_eq!(q.try_receive(&mut k), Ok(2));
}

#[test]
fn test_queue_send_from_isr_wakes_receiver_on_exit() {
    let mut k = kernel();
    let consumer = k.create_task("consumer", 2, 128, body, 0).unwrap();
    start(&mut k);
    let q: Queue<u32> = Queue::new(&mut k, 4).unwrap();
    assert!(q.receive(&mut k, MAX_DELAY).unwrap().is_blocked());
    assert_eq!(k.current(), k.idle_task());

    k.enter_isr();
    assert_eq!(q.send_from_isr(&mut k, &42), Ok(true));
    assert_eq!(k.current(), k.idle_task());
    k.exit_isr();
    assert_eq!(k.current(), Some(consumer));
    assert_eq!(q.take_received(&mut k, consumer), Ok(42));
}

#[test]
fn test_priority_inheritance_prevents_inversion() {
    let mut k = kernel();
    let low = k.create_task("low", 1, 128, body, 0).unwrap();
    let med = k.create_task("med", 2, 128, body, 0).unwrap();
    let high = k.create_task("high", 3, 128, body, 0).unwrap();
    start(&mut k);
    let m = k.mutex_create().unwrap();

    assert_eq!(k.current(), Some(high));
    k.delay(2).unwrap();
    assert_eq!(k.current(), Some(med));
    k.delay(3).unwrap();
    assert_eq!(k.current(), Some(low));
    assert_eq!(k.mutex_take(m, 0), Ok(Wait::Done(())));

    ticks(&mut k, 2);
    assert_eq!(k.current(), Some(high));
    assert!(k.mutex_take(m, MAX_DELAY).unwrap().is_blocked());
    assert_eq!(k.current(), Some(low));
    assert_eq!(k.priority(low), Ok(3));
    assert_eq!(k.base_priority(low), Ok(1));

    // med wakes but cannot run ahead of the boosted holder.
    tick(&mut k);
    assert_eq!(k.task_state(med), Ok(TaskState::Ready));
    assert_eq!(k.current(), Some(low));
    k.check_invariants().unwrap();

    k.mutex_give(m).unwrap();
    assert_eq!(k.current(), Some(high));
    assert_eq!(k.take_wake_outcome(high), Ok(WakeReason::Signaled));
    assert_eq!(k.mutex_owner(m), Ok(Some(high)));
    assert_eq!(k.priority(low), Ok(1));

    k.mutex_give(m).unwrap();
    k.delay(100).unwrap();
    assert_eq!(k.current(), Some(med));
}

#[test]
fn test_mutex_guard_gives_back_on_drop() {
    let mut k = kernel();
    let low = k.create_task("low", 1, 128, body, 0).unwrap();
    start(&mut k);
    let mut shared: Mutex<u32> = Mutex::new(&mut k, 0).unwrap();
    let id = shared.id();

    {
        let mut guard = shared.try_lock(&mut k).unwrap().unwrap();
        *guard += 1;
        assert_eq!(guard.kernel().mutex_owner(id), Ok(Some(low)));

        // A more important task arrives and waits for the lock.
        let high = guard.kernel().create_task("high", 3, 128, body, 0).unwrap();
        assert_eq!(guard.kernel().current(), Some(high));
        assert!(guard.kernel().mutex_take(id, MAX_DELAY).unwrap().is_blocked());
        assert_eq!(guard.kernel().current(), Some(low));
        assert_eq!(guard.kernel().priority(low), Ok(3));
    }

    // The drop handed the lock over.
    let high = k.current().unwrap();
    assert_ne!(high, low);
    assert_eq!(k.priority(low), Ok(1));
    {
        let mut guard = shared.acquired(&mut k).unwrap();
        assert_eq!(*guard, 1);
        *guard = 7;
    }
    assert_eq!(shared.owner(&k), Ok(None));
    assert_eq!(shared.into_inner(&mut k), Ok(7));
}

#[test]
fn test_binary_semaphore_signals_from_isr() {
    let mut k = kernel();
    let waiter = k.create_task("waiter", 2, 128, body, 0).unwrap();
    start(&mut k);
    let sem = BinarySemaphore::new(&mut k).unwrap();
    assert_eq!(sem.try_take(&mut k), Ok(false));
    assert!(sem.take(&mut k, MAX_DELAY).unwrap().is_blocked());

    k.enter_isr();
    assert_eq!(sem.give_from_isr(&mut k), Ok(true));
    k.exit_isr();
    assert_eq!(k.current(), Some(waiter));
    assert_eq!(k.take_wake_outcome(waiter), Ok(WakeReason::Signaled));
    assert_eq!(sem.is_given(&k), Ok(false));

    sem.give(&mut k).unwrap();
    assert_eq!(sem.give(&mut k), Err(KernelError::ResourceExhausted));
    assert_eq!(sem.try_take(&mut k), Ok(true));
}

#[test]
fn test_counting_semaphore_tracks_resources() {
    let mut k = kernel();
    k.create_task("app", 1, 128, body, 0).unwrap();
    start(&mut k);
    let pool = CountingSemaphore::new(&mut k, 3, 3).unwrap();
    for left in [2, 1, 0] {
        assert_eq!(pool.try_take(&mut k), Ok(true));
        assert_eq!(pool.count(&k), Ok(left));
    }
    assert_eq!(pool.try_take(&mut k), Ok(false));
    pool.give(&mut k).unwrap();
    assert_eq!(pool.count(&k), Ok(1));
    pool.delete(&mut k).unwrap();
}

#[test]
fn test_task_handle_control_and_notifications() {
    let mut k = kernel();
    let main = TaskHandle::spawn(&mut k, "main", 128, 1, body).unwrap();
    start(&mut k);
    assert_eq!(TaskHandle::current(&k), Ok(main));

    let worker = TaskHandle::spawn_with_param(&mut k, "worker", 128, 2, body, 5).unwrap();
    assert_eq!(TaskHandle::current(&k), Ok(worker));
    assert_eq!(worker.name(&k), Ok("worker"));
    assert!(k.notify_take(true, MAX_DELAY).unwrap().is_blocked());
    assert_eq!(TaskHandle::current(&k), Ok(main));

    worker.notify_give(&mut k).unwrap();
    assert_eq!(TaskHandle::current(&k), Ok(worker));
    assert_eq!(k.take_notify_value(worker.id()), Ok(1));

    worker.set_priority(&mut k, 0).unwrap();
    assert_eq!(TaskHandle::current(&k), Ok(main));
    assert_eq!(worker.priority(&k), Ok(0));

    worker.suspend(&mut k).unwrap();
    assert_eq!(worker.state(&k), Ok(TaskState::Suspended));
    worker.resume(&mut k).unwrap();
    assert_eq!(worker.state(&k), Ok(TaskState::Ready));

    worker.notify(&mut k, 0b100, NotifyAction::SetBits).unwrap();
    assert_eq!(k.notify_value(worker.id()), Ok(0b100));
    worker.delete(&mut k).unwrap();
    assert!(worker.state(&k).is_err());
}
