// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Per-thread protected local storage areas.
//!
//! Each registered thread owns a local storage area: a run of anonymous
//! pages kept at PROT_NONE except while this crate itself moves bytes in
//! or out through [`read`] and [`write`]. Areas can be shared across
//! threads copy-on-write via [`clone_from`]; a write breaks sharing one
//! page at a time, so no other area ever observes it.
//!
//! Touching an area through an ordinary load or store instead of the
//! API raises a protection fault. The crate's fault interceptor
//! classifies the faulting address: inside a managed page it terminates
//! only the offending thread (via `pthread_exit`), anywhere else it
//! restores the default disposition and re-raises, so unrelated crashes
//! keep their system-default behavior.
//!
//! All five operations serialize behind one process-wide lock; the
//! first call installs the fault interceptor and queries the page size.
//!
//! # Example
//!
//! ```
//! use std::thread;
//!
//! thread::spawn(|| {
//!     memlocal::create(100)?;
//!     memlocal::write(0, b"hello")?;
//!
//!     let mut out = [0u8; 5];
//!     memlocal::read(0, &mut out)?;
//!     assert_eq!(&out, b"hello");
//!
//!     memlocal::destroy()
//! })
//! .join()
//! .unwrap()
//! .unwrap();
//! ```
//!
//! Zero-length reads and writes are no-op successes as long as the
//! caller is registered and `offset` does not exceed the area size.

#![warn(missing_docs)]
#![warn(unsafe_op_in_unsafe_fn)]

#[cfg(not(unix))]
compile_error!("memlocal requires a Unix platform (mmap/mprotect/sigaction)");

#[cfg(test)]
mod tests;

mod area;
mod error;
mod fault;
mod page;
mod registry;

use std::thread::{self, ThreadId};

pub use error::{Error, PageError};

/// Creates a storage area of `size` bytes for the calling thread.
///
/// Fails if `size` is zero or the thread already has an area.
pub fn create(size: usize) -> Result<(), Error> {
    registry::create(thread::current().id(), size)
}

/// Copies `buf.len()` bytes out of the calling thread's area, starting
/// at byte `offset`.
///
/// Fails if the thread has no area or the range walks past its end.
pub fn read(offset: usize, buf: &mut [u8]) -> Result<(), Error> {
    registry::read(thread::current().id(), offset, buf)
}

/// Copies `buf` into the calling thread's area, starting at byte
/// `offset`, privatizing any shared page it touches first.
///
/// Fails if the thread has no area or the range walks past its end.
pub fn write(offset: usize, buf: &[u8]) -> Result<(), Error> {
    registry::write(thread::current().id(), offset, buf)
}

/// Destroys the calling thread's area.
///
/// Pages shared with cloned areas stay alive until their last holder
/// is destroyed; private pages are zeroized and unmapped here.
pub fn destroy() -> Result<(), Error> {
    registry::destroy(thread::current().id())
}

/// Gives the calling thread an area sharing every page of `source`'s
/// area, copy-on-write.
///
/// Fails if `source` has no area or the caller already has one.
pub fn clone_from(source: ThreadId) -> Result<(), Error> {
    registry::clone_from(source, thread::current().id())
}

/// Base address of the calling thread's first page, or `None` if the
/// thread has no area. Test hook for exercising the fault interceptor.
pub fn internal_start_address() -> Option<usize> {
    registry::start_address(thread::current().id())
}
