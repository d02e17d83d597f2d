// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Error types for memlocal.
use thiserror::Error;

/// Errors from page syscalls.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum PageError {
    /// mmap refused to hand out a page.
    #[error("mmap failed")]
    Create = 0,

    /// mprotect could not drop protection for a transfer.
    #[error("mprotect(PROT_READ|PROT_WRITE) failed")]
    Unprotect = 1,

    /// mprotect could not restore PROT_NONE.
    #[error("mprotect(PROT_NONE) failed")]
    Protect = 2,
}

/// Errors surfaced by the public storage-area operations.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum Error {
    /// A page syscall failed.
    #[error("PageError: {0}")]
    Page(#[from] PageError),

    /// create() was asked for a zero-byte area.
    #[error("storage size must be greater than zero")]
    ZeroSize,

    /// The calling thread already owns a storage area.
    #[error("calling thread already has a storage area")]
    AlreadyRegistered,

    /// The calling thread owns no storage area.
    #[error("calling thread has no storage area")]
    NotRegistered,

    /// The clone source owns no storage area.
    #[error("source thread has no storage area")]
    SourceNotRegistered,

    /// offset + length walked past the end of the area.
    #[error("offset and length exceed the storage area")]
    OutOfRange,

    /// The registry mutex was poisoned by a panicking thread.
    #[error("registry mutex poisoned")]
    MutexPoisoned,
}
