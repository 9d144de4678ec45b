/*
 * FreeRTOS Kernel <DEVELOPMENT BRANCH>
 * Copyright (C) 2021 Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * SPDX-License-Identifier: MIT
 *
 * [AMENDMENT] Replaces the pdPASS / errQUEUE_FULL / errCOULD_NOT_ALLOCATE
 * return codes with a single error enum. Fatal conditions that the C kernel
 * reported through configASSERT and vApplicationStackOverflowHook are
 * variants here as well and halt the scheduler.
 */

//! Kernel Errors

use thiserror::Error;

use crate::types::TaskId;

/// Errors returned by kernel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KernelError {
    /// A fixed-size arena or buffer has no room left.
    #[error("kernel resource exhausted")]
    ResourceExhausted,

    /// A blocking call expired before its event happened.
    #[error("timed out")]
    Timeout,

    /// A blocked call was force-woken by `abort_delay`.
    #[error("wait aborted")]
    Aborted,

    /// The call is not valid in the current state (stale handle, give on an
    /// unheld mutex, blocking inside a critical section, ...).
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// The stack canary of a task was overwritten. Fatal.
    #[error("stack overflow in {0}")]
    StackOverflow(TaskId),

    /// An internal invariant did not hold. Fatal.
    #[error("kernel assertion failed: {0}")]
    AssertionFailure(&'static str),
}

impl KernelError {
    /// Fatal errors halt scheduling; everything else is reported to the caller.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            KernelError::StackOverflow(_) | KernelError::AssertionFailure(_)
        )
    }
}

/// Kernel result alias.
pub type KernelResult<T> = Result<T, KernelError>;
