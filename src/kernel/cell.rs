/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] Global kernel instance. Interrupt handlers and task code reach
 * the one kernel through a `KernelCell` placed in a `static`, initialised once
 * before the scheduler starts. Access is serialised with the
 * `critical-section` crate.
 */

//! Init-once Global Kernel
//!
//! ```ignore
//! static KERNEL: KernelCell<MyPort> = KernelCell::new();
//!
//! KERNEL.init(Kernel::new(Config::DEFAULT, MyPort::new())?)?;
//! KERNEL.with(|k| k.start())??;
//!
//! // in the tick interrupt
//! KERNEL.with(|k| k.tick_interrupt()).ok();
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use super::Kernel;
use crate::error::{KernelError, KernelResult};
use crate::port::Port;

/// Holder for the single kernel instance.
pub struct KernelCell<P: Port> {
    inner: Mutex<RefCell<Option<Kernel<P>>>>,
}

impl<P: Port> KernelCell<P> {
    pub const fn new() -> Self {
        KernelCell {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Install the kernel. Fails if one is already installed.
    pub fn init(&self, kernel: Kernel<P>) -> KernelResult<()> {
        critical_section::with(|cs| {
            let mut slot = self
                .inner
                .borrow(cs)
                .try_borrow_mut()
                .map_err(|_| KernelError::InvalidState("kernel cell in use"))?;
            if slot.is_some() {
                return Err(KernelError::InvalidState("kernel already initialised"));
            }
            *slot = Some(kernel);
            Ok(())
        })
    }

    pub fn is_initialised(&self) -> bool {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .try_borrow()
                .map(|slot| slot.is_some())
                .unwrap_or(true)
        })
    }

    /// Run `f` on the kernel inside a critical section. Re-entrant use (from
    /// inside `f`) and use before `init` fail with `InvalidState`.
    pub fn with<R>(&self, f: impl FnOnce(&mut Kernel<P>) -> R) -> KernelResult<R> {
        critical_section::with(|cs| {
            let mut slot = self
                .inner
                .borrow(cs)
                .try_borrow_mut()
                .map_err(|_| KernelError::InvalidState("kernel cell in use"))?;
            let kernel = slot
                .as_mut()
                .ok_or(KernelError::InvalidState("kernel not initialised"))?;
            Ok(f(kernel))
        })
    }
}

impl<P: Port> Default for KernelCell<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::port::dummy::DummyPort;

    fn body(_: usize) {}

    #[test]
    fn test_init_once() {
        let cell: KernelCell<DummyPort> = KernelCell::new();
        assert!(!cell.is_initialised());
        assert_eq!(
            cell.with(|k| k.tick_count()),
            Err(KernelError::InvalidState("kernel not initialised"))
        );
        cell.init(Kernel::new(Config::DEFAULT, DummyPort::new()).unwrap())
            .unwrap();
        assert!(cell.is_initialised());
        assert_eq!(
            cell.init(Kernel::new(Config::DEFAULT, DummyPort::new()).unwrap()),
            Err(KernelError::InvalidState("kernel already initialised"))
        );
    }

    #[test]
    fn test_static_cell_drives_kernel() {
        static KERNEL: KernelCell<DummyPort> = KernelCell::new();
        KERNEL
            .init(Kernel::new(Config::DEFAULT, DummyPort::new()).unwrap())
            .unwrap();
        let task = KERNEL
            .with(|k| k.create_task("t", 1, 64, body, 0))
            .unwrap()
            .unwrap();
        KERNEL.with(|k| k.start()).unwrap().unwrap();
        #[cfg(feature = "timers")]
        KERNEL
            .with(|k| {
                if k.current() == k.timer_task() {
                    k.run_timer_service().unwrap();
                }
            })
            .unwrap();
        assert_eq!(KERNEL.with(|k| k.current()), Ok(Some(task)));
        assert_eq!(KERNEL.with(|k| k.tick_interrupt()), Ok(Ok(false)));
        assert_eq!(KERNEL.with(|k| k.tick_count()), Ok(1));
        let nested = KERNEL.with(|_| KERNEL.with(|k| k.tick_count()));
        assert_eq!(
            nested,
            Ok(Err(KernelError::InvalidState("kernel cell in use")))
        );
    }
}
