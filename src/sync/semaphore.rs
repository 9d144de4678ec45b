//! Semaphore wrappers
//!
//! Provides binary and counting semaphores for task synchronization.
//! Unlike mutexes, semaphores don't have priority inheritance and
//! can be given from ISR context.

use crate::error::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::port::Port;
use crate::types::*;

/// A binary semaphore for task synchronization.
///
/// Binary semaphores are useful for signaling between tasks or from
/// an ISR to a task. Unlike mutexes, they don't have priority inheritance
/// and can be "given" from interrupt context.
///
/// # Example
///
/// ```ignore
/// use rtkernel::sync::BinarySemaphore;
///
/// let sem = BinarySemaphore::new(&mut kernel)?;
///
/// // In one task: wait for signal
/// sem.take(&mut kernel, MAX_DELAY)?;
///
/// // In another task or ISR: signal
/// sem.give(&mut kernel)?;
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinarySemaphore {
    id: SemaphoreId,
}

impl BinarySemaphore {
    /// Creates a new binary semaphore in the "not given" state.
    pub fn new<P: Port>(kernel: &mut Kernel<P>) -> KernelResult<Self> {
        Ok(Self {
            id: kernel.semaphore_create_binary()?,
        })
    }

    pub fn id(&self) -> SemaphoreId {
        self.id
    }

    /// Takes the semaphore, blocking for up to `ticks`.
    ///
    /// `Wait::Blocked` means the caller is now waiting; check
    /// [`Kernel::take_wake_outcome`] once it runs again.
    pub fn take<P: Port>(&self, kernel: &mut Kernel<P>, ticks: TickType) -> KernelResult<Wait<()>> {
        kernel.semaphore_take(self.id, ticks)
    }

    /// Attempts to take the semaphore without blocking.
    ///
    /// Returns `true` if the semaphore was taken, `false` if it
    /// wasn't available.
    pub fn try_take<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<bool> {
        match kernel.semaphore_take(self.id, 0) {
            Ok(_) => Ok(true),
            Err(KernelError::Timeout) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Gives the semaphore.
    ///
    /// Giving an already-given binary semaphore fails with
    /// `ResourceExhausted`.
    pub fn give<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<()> {
        kernel.semaphore_give(self.id)
    }

    /// Gives the semaphore from an ISR. Returns whether a higher-priority
    /// task was woken.
    pub fn give_from_isr<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<bool> {
        kernel.semaphore_give_from_isr(self.id)
    }

    pub fn is_given<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<bool> {
        Ok(kernel.semaphore_count(self.id)? > 0)
    }

    pub fn delete<P: Port>(self, kernel: &mut Kernel<P>) -> KernelResult<()> {
        kernel.semaphore_delete(self.id)
    }
}

/// A counting semaphore for resource management.
///
/// Counting semaphores track a count of available resources.
/// `take()` decrements the count, `give()` increments it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountingSemaphore {
    id: SemaphoreId,
}

impl CountingSemaphore {
    /// Creates a new counting semaphore.
    ///
    /// # Arguments
    ///
    /// * `max_count` - Maximum count value
    /// * `initial_count` - Starting count value
    pub fn new<P: Port>(
        kernel: &mut Kernel<P>,
        max_count: u32,
        initial_count: u32,
    ) -> KernelResult<Self> {
        Ok(Self {
            id: kernel.semaphore_create_counting(max_count, initial_count)?,
        })
    }

    pub fn id(&self) -> SemaphoreId {
        self.id
    }

    /// Takes one unit, blocking for up to `ticks` while the count is zero.
    pub fn take<P: Port>(&self, kernel: &mut Kernel<P>, ticks: TickType) -> KernelResult<Wait<()>> {
        kernel.semaphore_take(self.id, ticks)
    }

    pub fn try_take<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<bool> {
        match kernel.semaphore_take(self.id, 0) {
            Ok(_) => Ok(true),
            Err(KernelError::Timeout) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns one unit.
    pub fn give<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<()> {
        kernel.semaphore_give(self.id)
    }

    pub fn give_from_isr<P: Port>(&self, kernel: &mut Kernel<P>) -> KernelResult<bool> {
        kernel.semaphore_give_from_isr(self.id)
    }

    /// Returns the current count.
    pub fn count<P: Port>(&self, kernel: &Kernel<P>) -> KernelResult<u32> {
        kernel.semaphore_count(self.id)
    }

    pub fn delete<P: Port>(self, kernel: &mut Kernel<P>) -> KernelResult<()> {
        kernel.semaphore_delete(self.id)
    }
}
