//! Typed handles over the kernel objects
//!
//! This module provides Rust-idiomatic wrappers around the kernel's
//! id-based object API. Queues carry a fixed item type and mutexes
//! protect a value through an RAII guard.
//!
//! # Example
//!
//! ```ignore
//! use rtkernel::sync::Mutex;
//!
//! // Create a mutex protecting a counter
//! let mut counter: Mutex<u32> = Mutex::new(&mut kernel, 0)?;
//!
//! // Lock and modify - given back when the guard drops
//! if let Some(mut guard) = counter.try_lock(&mut kernel)? {
//!     *guard += 1;
//! } // mutex released here
//! ```

mod mutex;
mod queue;
mod semaphore;
mod task;
#[cfg(feature = "timers")]
mod timer;

pub use mutex::{Mutex, MutexGuard};
pub use queue::{Queue, QueueItem};
pub use semaphore::{BinarySemaphore, CountingSemaphore};
pub use task::TaskHandle;
#[cfg(feature = "timers")]
pub use timer::Timer;
