// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Page - Low-level memory page with protection primitives.
//!
//! Wraps a single mmap'd page with mprotect toggling. Pages arrive
//! readable/writable and zero-filled; the owner protects them before
//! publishing. Every mapped page is listed in the managed-span table so
//! the fault interceptor can classify stray accesses against it.

use core::ptr;

use zeroize::Zeroize;

use crate::error::PageError;
use crate::fault;

/// One anonymous OS page.
///
/// Sharing across storage areas is expressed through `Arc<Page>`; the
/// strong count is the number of area slots listing the page.
#[derive(Debug)]
pub(crate) struct Page {
    ptr: *mut u8,
    len: usize,
}

unsafe impl Send for Page {}
unsafe impl Sync for Page {}

impl Page {
    /// Maps a fresh anonymous page and lists it as managed.
    ///
    /// The page arrives PROT_READ|PROT_WRITE and zero-filled; the
    /// caller decides when to protect it.
    pub(crate) fn map() -> Result<Self, PageError> {
        let len = fault::page_size();

        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(PageError::Create);
        }

        let page = Self {
            ptr: ptr as *mut u8,
            len,
        };
        fault::register(page.base());

        Ok(page)
    }

    /// Base address of the page.
    pub(crate) fn base(&self) -> usize {
        self.ptr as usize
    }

    /// Page length in bytes (the OS page size).
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Sets the page to PROT_NONE (no read/write access).
    pub(crate) fn protect(&self) -> Result<(), PageError> {
        let failed =
            unsafe { libc::mprotect(self.ptr as *mut _, self.len, libc::PROT_NONE) } != 0;

        if failed {
            return Err(PageError::Protect);
        }

        Ok(())
    }

    /// Sets the page to PROT_READ|PROT_WRITE for a transfer.
    pub(crate) fn unprotect(&self) -> Result<(), PageError> {
        let failed = unsafe {
            libc::mprotect(
                self.ptr as *mut _,
                self.len,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        } != 0;

        if failed {
            return Err(PageError::Unprotect);
        }

        Ok(())
    }

    /// Returns a slice view of the page.
    ///
    /// # Safety
    /// Page must be unprotected, otherwise SIGSEGV.
    pub(crate) unsafe fn as_slice(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Returns a mutable slice view of the page.
    ///
    /// # Safety
    /// Page must be unprotected, and the caller must have exclusive
    /// access to its contents; the registry lock serializes all
    /// writers, so holding it while the page is private suffices.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn as_mut_slice(&self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        // Unprotect so the contents can be scrubbed before the address
        // range goes back to the OS. If that fails the page stays
        // protected, which is the safe direction.
        let can_write = unsafe {
            libc::mprotect(
                self.ptr as *mut _,
                self.len,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        } == 0;

        if can_write {
            unsafe { self.as_mut_slice() }.zeroize();
        }

        fault::unregister(self.base());

        unsafe { libc::munmap(self.ptr as *mut libc::c_void, self.len) };
    }
}
