// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! LocalArea - one thread's storage area and its transfer engine.
//!
//! An area is an ordered run of `Arc<Page>` slots plus a byte size and
//! the owning thread. Pages rest at PROT_NONE; each transfer chunk
//! raises protection, moves bytes, and restores it. Writes break
//! sharing page by page: a slot whose strong count is above one is
//! replaced with a private copy before any caller byte lands on it.

use std::sync::Arc;
use std::thread::ThreadId;

use crate::error::{Error, PageError};
use crate::page::Page;

pub(crate) struct LocalArea {
    size: usize,
    owner: ThreadId,
    pages: Vec<Arc<Page>>,
}

impl LocalArea {
    /// Maps `ceil(size / page_size)` fresh private pages, each one
    /// protected before the area is published.
    pub(crate) fn new(size: usize, owner: ThreadId) -> Result<Self, Error> {
        let page_size = crate::fault::page_size();
        let page_count = size.div_ceil(page_size);

        let mut pages = Vec::with_capacity(page_count);
        for _ in 0..page_count {
            let page = Page::map()?;
            page.protect()?;
            pages.push(Arc::new(page));
        }

        Ok(Self { size, owner, pages })
    }

    /// A new area for `owner` sharing every page of this one. Cloning
    /// the slots is what raises the strong counts.
    pub(crate) fn share(&self, owner: ThreadId) -> Self {
        Self {
            size: self.size,
            owner,
            pages: self.pages.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Base address of page 0, for the stray-access test hook.
    pub(crate) fn start_address(&self) -> Option<usize> {
        self.pages.first().map(|page| page.base())
    }

    #[cfg(test)]
    pub(crate) fn page_ref_count(&self, index: usize) -> usize {
        Arc::strong_count(&self.pages[index])
    }

    fn page_size(&self) -> usize {
        // Every slot holds a page of the one OS page size.
        self.pages
            .first()
            .map_or_else(crate::fault::page_size, |page| page.len())
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), Error> {
        let end = offset.checked_add(len).ok_or(Error::OutOfRange)?;
        if end > self.size {
            return Err(Error::OutOfRange);
        }
        Ok(())
    }

    /// Copies bytes out of the area starting at `offset`.
    ///
    /// Shared pages are read in place; reading never breaks sharing.
    pub(crate) fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), Error> {
        self.check_range(offset, buf.len())?;

        let page_size = self.page_size();
        let mut index = offset / page_size;
        let mut in_page = offset % page_size;
        let mut copied = 0;

        while copied < buf.len() {
            let chunk = (page_size - in_page).min(buf.len() - copied);
            let page = &self.pages[index];

            page.unprotect()?;
            unsafe {
                buf[copied..copied + chunk]
                    .copy_from_slice(&page.as_slice()[in_page..in_page + chunk]);
            }
            protect_or_abort(page);

            copied += chunk;
            index += 1;
            in_page = 0;
        }

        Ok(())
    }

    /// Copies bytes into the area starting at `offset`.
    ///
    /// Every shared page in the plan is privatized before the first
    /// caller byte is transferred, so an allocation failure surfaces as
    /// a clean error with the area's observable contents untouched.
    pub(crate) fn write_at(&mut self, offset: usize, buf: &[u8]) -> Result<(), Error> {
        self.check_range(offset, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }

        let page_size = self.page_size();
        let first = offset / page_size;
        let last = (offset + buf.len() - 1) / page_size;

        for index in first..=last {
            self.make_private(index)?;
        }

        let mut index = first;
        let mut in_page = offset % page_size;
        let mut copied = 0;

        while copied < buf.len() {
            let chunk = (page_size - in_page).min(buf.len() - copied);
            let page = &self.pages[index];

            unprotect_or_abort(page);
            unsafe {
                page.as_mut_slice()[in_page..in_page + chunk]
                    .copy_from_slice(&buf[copied..copied + chunk]);
            }
            protect_or_abort(page);

            copied += chunk;
            index += 1;
            in_page = 0;
        }

        Ok(())
    }

    /// Breaks sharing on the slot at `index` so a write cannot be
    /// observed through any other area.
    ///
    /// Full-page copy under transient unprotect; swapping the slot
    /// drops one strong reference to the shared page.
    fn make_private(&mut self, index: usize) -> Result<(), Error> {
        if Arc::strong_count(&self.pages[index]) == 1 {
            return Ok(());
        }

        let fresh = Page::map()?;
        let shared = &self.pages[index];

        shared.unprotect()?;
        unsafe {
            fresh.as_mut_slice().copy_from_slice(shared.as_slice());
        }
        protect_or_abort(shared);

        fresh.protect()?;
        self.pages[index] = Arc::new(fresh);

        Ok(())
    }
}

/// Restores PROT_NONE after a transfer. A managed page that cannot be
/// re-protected would stay open to stray access, so the failure is not
/// recoverable.
fn protect_or_abort(page: &Page) {
    if page.protect().is_err() {
        abort(PageError::Protect);
    }
}

/// Raises protection during the transfer phase of a write. Sharing has
/// already been broken at this point; failing the write here would
/// leave the area half-written, so the process gives up instead.
fn unprotect_or_abort(page: &Page) {
    if page.unprotect().is_err() {
        abort(PageError::Unprotect);
    }
}

fn abort(error: PageError) -> ! {
    // Exit with the error code under test so subprocess tests can
    // observe which path fired.
    #[cfg(test)]
    std::process::exit(error as i32);

    #[cfg(not(test))]
    {
        let _ = error;
        unsafe { libc::abort() }
    }
}
