/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy of
 * this software and associated documentation files (the "Software"), to deal in
 * the Software without restriction, including without limitation the rights to
 * use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
 * the Software, and to permit persons to whom the Software is furnished to do so,
 * subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
 * FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
 * COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
 * IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
 * CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
 *
 * https://www.FreeRTOS.org
 * https://github.com/FreeRTOS
 *
 * [AMENDMENT] rtkernel keeps the scheduling model of the FreeRTOS kernel
 * (fixed priorities, FIFO time slicing, blocking with timeouts, priority
 * inheritance, a timer service task) behind an owned `Kernel` value instead of
 * global C state. The CPU specifics live behind the `Port` trait.
 */

//! # rtkernel - a preemptive priority RTOS kernel core
//!
//! The kernel schedules tasks by fixed priority with round-robin time slicing
//! among equals, and provides queues, binary and counting semaphores, mutexes
//! with priority inheritance, direct-to-task notifications and software
//! timers.
//!
//! ```ignore
//! use rtkernel::{Config, Kernel};
//!
//! let mut kernel = Kernel::new(Config::DEFAULT, MyPort::new())?;
//! kernel.create_task("blink", 2, 256, blink, 0)?;
//! kernel.start()?;
//! ```
//!
//! ## Features
//!
//! - `timers` - Software timer service task and its command queue (default)
//! - `std` - Host builds; supplies the `critical-section` implementation

#![no_std]
#![allow(non_snake_case)]
#![allow(non_upper_case_globals)]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

// Core modules
pub mod config;
pub mod error;
pub mod trace;
pub mod types;

// Port layer
pub mod port;

// Kernel modules
pub mod kernel;

// Typed handles
pub mod sync;

// Re-export commonly used items at crate root
pub use config::Config;
pub use error::{KernelError, KernelResult};
pub use kernel::{Kernel, KernelCell, TaskInfo};
pub use port::{Context, Port};
pub use types::*;
