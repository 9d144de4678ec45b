//! Mutex wrapper with RAII guard pattern
//!
//! This provides a Rust-idiomatic mutex over the kernel mutex with
//! priority inheritance. The mutex protects data of type `T` and the
//! kernel mutex is given back when the guard drops.

use core::ops::{Deref, DerefMut};

use crate::error::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::port::Port;
use crate::types::*;

/// A mutual exclusion primitive with priority inheritance.
///
/// When a high-priority task blocks on a mutex held by a lower-priority
/// task, the lower-priority task temporarily inherits the higher priority.
///
/// # Example
///
/// ```ignore
/// use rtkernel::sync::Mutex;
///
/// let mut data: Mutex<u32> = Mutex::new(&mut kernel, 42)?;
///
/// if let Wait::Done(mut guard) = data.lock(&mut kernel, MAX_DELAY)? {
///     *guard += 1;
///     // mutex is held while guard is in scope
/// }
/// // mutex automatically given back when guard is dropped
/// ```
///
/// # Priority Inheritance
///
/// If you don't need the protected data pattern or priority
/// inheritance, consider using a `BinarySemaphore` instead.
pub struct Mutex<T> {
    id: MutexId,
    data: T,
}

impl<T> Mutex<T> {
    /// Creates a new mutex protecting the given value.
    pub fn new<P: Port>(kernel: &mut Kernel<P>, data: T) -> KernelResult<Self> {
        Ok(Self {
            id: kernel.mutex_create()?,
            data,
        })
    }

    pub fn id(&self) -> MutexId {
        self.id
    }

    /// Locks the mutex for the running task, blocking for up to `ticks`.
    ///
    /// On `Wait::Blocked` the caller is parked on the mutex; once it runs
    /// again, [`Mutex::acquired`] yields the guard.
    pub fn lock<'a, P: Port>(
        &'a mut self,
        kernel: &'a mut Kernel<P>,
        ticks: TickType,
    ) -> KernelResult<Wait<MutexGuard<'a, P, T>>> {
        match kernel.mutex_take(self.id, ticks)? {
            Wait::Done(()) => Ok(Wait::Done(MutexGuard {
                kernel,
                mutex: self,
            })),
            Wait::Blocked => Ok(Wait::Blocked),
        }
    }

    /// Attempts to lock the mutex without blocking.
    ///
    /// Returns `None` if the mutex is held by another task.
    pub fn try_lock<'a, P: Port>(
        &'a mut self,
        kernel: &'a mut Kernel<P>,
    ) -> KernelResult<Option<MutexGuard<'a, P, T>>> {
        match kernel.mutex_take(self.id, 0) {
            Ok(_) => Ok(Some(MutexGuard {
                kernel,
                mutex: self,
            })),
            Err(KernelError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The guard for a lock that blocked, once the waiting task runs again.
    /// Fails with the wait's timeout or abort.
    pub fn acquired<'a, P: Port>(
        &'a mut self,
        kernel: &'a mut Kernel<P>,
    ) -> KernelResult<MutexGuard<'a, P, T>> {
        let task = kernel
            .current()
            .ok_or(KernelError::InvalidState("scheduler not running"))?;
        kernel.take_wake_outcome(task)?.into_result()?;
        if kernel.mutex_owner(self.id)? != Some(task) {
            return Err(KernelError::InvalidState("mutex not held by caller"));
        }
        Ok(MutexGuard {
            kernel,
            mutex: self,
        })
    }

    /// The task holding the mutex, if any.
    pub fn owner<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<Option<TaskId>> {
        kernel.mutex_owner(self.id)
    }

    /// Deletes the kernel mutex and returns the protected value.
    pub fn into_inner<P: Port>(self, kernel: &mut Kernel<P>) -> KernelResult<T> {
        kernel.mutex_delete(self.id)?;
        Ok(self.data)
    }
}

/// RAII guard for mutex access.
///
/// The kernel mutex is given back when this guard is dropped. While the
/// guard lives it also holds the kernel borrow; reach the kernel through
/// [`MutexGuard::kernel`].
pub struct MutexGuard<'a, P: Port, T> {
    kernel: &'a mut Kernel<P>,
    mutex: &'a mut Mutex<T>,
}

impl<P: Port, T> MutexGuard<'_, P, T> {
    pub fn kernel(&mut self) -> &mut Kernel<P> {
        &mut *self.kernel
    }
}

impl<P: Port, T> Deref for MutexGuard<'_, P, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.mutex.data
    }
}

impl<P: Port, T> DerefMut for MutexGuard<'_, P, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.mutex.data
    }
}

impl<P: Port, T> Drop for MutexGuard<'_, P, T> {
    fn drop(&mut self) {
        // Fails only if the kernel halted or the holder changed underneath.
        if let Err(e) = self.kernel.mutex_give(self.mutex.id) {
            log::warn!("mutex give on guard drop failed: {}", e);
        }
    }
}
