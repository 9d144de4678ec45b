/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] This module provides the port layer abstraction. The port layer
 * contains hardware-specific implementations of:
 * - Critical sections (interrupt enable/disable)
 * - Context switching
 * - Stack initialization
 * - Tick timer setup
 *
 * Instead of selecting free functions through Cargo features, a port is a type
 * implementing the `Port` trait and owned by the kernel.
 */

//! Port Layer
//!
//! The kernel never touches registers. Everything target specific goes through
//! the [`Port`] trait; the register image of a task is an opaque [`Context`]
//! owned by its TCB.
//!
//! ## Available Ports
//!
//! - [`dummy::DummyPort`] - host port that records every call, for tests

pub mod dummy;

use crate::error::KernelError;
use crate::types::*;

/// Number of general purpose registers saved besides `pc` and `sp`
/// (x1 and x3..x31 on RV32, r0..r12 plus lr on ARMv7-M fit as well).
pub const portGPR_COUNT: usize = 31;

/// Index of the first argument register inside [`Context::regs`] (a0 / x10).
pub const portARG_REGISTER: usize = 9;

/// Initial status word: interrupts enabled on return, machine mode.
pub const portINITIAL_STATUS: usize = 0x1880;

/// Floating point state, present only for tasks that use the FPU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[repr(C)]
pub struct FpuContext {
    pub fregs: [u32; 32],
    pub fcsr: u32,
}

/// Saved register image of one task.
///
/// The layout is fixed and target neutral. A port copies the hardware state in
/// and out of it; the kernel only stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Context {
    /// Resume address.
    pub pc: usize,
    /// Status / program status register.
    pub status: usize,
    /// Stack pointer.
    pub sp: usize,
    /// General purpose registers.
    pub regs: [usize; portGPR_COUNT],
    /// Optional floating point registers.
    pub fpu: Option<FpuContext>,
}

impl Context {
    /// Build the frame a task starts from: `entry(arg)` on an empty stack.
    pub fn initial(stack_top: usize, entry: TaskFn, arg: usize) -> Self {
        let mut ctx = Context {
            pc: entry as usize,
            status: portINITIAL_STATUS,
            // Stacks are descending and 16 byte aligned.
            sp: stack_top & !0xF,
            ..Context::default()
        };
        ctx.regs[portARG_REGISTER] = arg;
        ctx
    }
}

/// Target boundary required by the kernel.
///
/// Every method is called by the kernel with its own state consistent; a port
/// must not call back into the kernel.
pub trait Port {
    /// Copy the live registers of the outgoing `task` into `ctx`. `stack` is
    /// the task's whole stack, lowest address first.
    fn save_context(&mut self, task: TaskId, ctx: &mut Context, stack: &mut [StackType]);

    /// Load the registers of the incoming `task` from `ctx`.
    fn restore_context(&mut self, task: TaskId, ctx: &Context);

    /// Prepare the initial frame of a new task.
    fn init_context(&mut self, ctx: &mut Context, stack_top: usize, entry: TaskFn, arg: usize) {
        *ctx = Context::initial(stack_top, entry, arg);
    }

    /// Request a context switch (PendSV, software interrupt, ...).
    fn trigger_switch(&mut self);

    /// Mask interrupts. Called on entry to the outermost critical section.
    fn disable_interrupts(&mut self);

    /// Unmask interrupts. Called on exit from the outermost critical section.
    fn enable_interrupts(&mut self);

    /// Start the periodic tick interrupt.
    fn setup_tick_interrupt(&mut self, tick_rate_hz: u32);

    /// Fatal error sink. The kernel is halted after this returns.
    fn fault(&mut self, error: &KernelError);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(_: usize) {}

    #[test]
    fn test_initial_context() {
        let ctx = Context::initial(0x2000_0ffc, entry, 42);
        assert_eq!(ctx.sp, 0x2000_0ff0);
        assert_eq!(ctx.regs[portARG_REGISTER], 42);
        assert_eq!(ctx.pc, entry as usize);
        assert_eq!(ctx.status, portINITIAL_STATUS);
        assert!(ctx.fpu.is_none());
    }
}
