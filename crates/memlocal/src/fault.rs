// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Fault interceptor - classifies protection faults against the set of
//! managed pages and isolates the offending thread.
//!
//! The handler runs in signal context, possibly while another thread
//! holds the registry lock, so it must not lock or allocate. Managed
//! pages are therefore tracked outside the registry, in a singly linked
//! list of leaked heap nodes: registration appends (or reclaims a
//! vacant node), removal clears the node's base and leaves the node in
//! place. All mutation happens under the registry lock; the handler
//! performs atomic loads only, so it observes either the pre- or the
//! post-state of any mutation and never a torn one.

use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

struct SpanNode {
    /// Page base address; 0 marks the node vacant.
    base: AtomicUsize,
    next: AtomicPtr<SpanNode>,
}

static SPANS: AtomicPtr<SpanNode> = AtomicPtr::new(ptr::null_mut());
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Returns the OS page size, querying it on first use.
pub fn page_size() -> usize {
    match PAGE_SIZE.load(Ordering::Acquire) {
        0 => {
            let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
            PAGE_SIZE.store(size, Ordering::Release);
            size
        }
        size => size,
    }
}

/// Lists `base` as a managed page.
///
/// Called with the registry lock held; stores suffice because writers
/// are serialized and the handler only reads.
pub(crate) fn register(base: usize) {
    let mut node = SPANS.load(Ordering::Acquire);
    while !node.is_null() {
        let span = unsafe { &*node };
        if span.base.load(Ordering::Acquire) == 0 {
            span.base.store(base, Ordering::Release);
            return;
        }
        node = span.next.load(Ordering::Acquire);
    }

    // No vacant node; publish a fresh one at the head. The node is
    // leaked so the handler can never observe freed memory.
    let fresh = Box::leak(Box::new(SpanNode {
        base: AtomicUsize::new(base),
        next: AtomicPtr::new(SPANS.load(Ordering::Acquire)),
    }));
    SPANS.store(fresh, Ordering::Release);
}

/// Delists `base`. The node stays allocated for reuse.
pub(crate) fn unregister(base: usize) {
    let mut node = SPANS.load(Ordering::Acquire);
    while !node.is_null() {
        let span = unsafe { &*node };
        if span.base.load(Ordering::Acquire) == base {
            span.base.store(0, Ordering::Release);
            return;
        }
        node = span.next.load(Ordering::Acquire);
    }
}

/// Whether `addr` lies within any managed page.
///
/// Every page owns its full `[base, base + page_size)` range, including
/// the final page of an area whose size is not a page multiple; the OS
/// protects whole pages, so in-tail faults are managed-page faults.
///
/// Async-signal-safe: atomic loads only.
pub(crate) fn is_managed(addr: usize) -> bool {
    let page_size = PAGE_SIZE.load(Ordering::Acquire);
    if page_size == 0 {
        return false;
    }

    let mut node = SPANS.load(Ordering::Acquire);
    while !node.is_null() {
        let span = unsafe { &*node };
        let base = span.base.load(Ordering::Acquire);
        if base != 0 && addr >= base && addr < base + page_size {
            return true;
        }
        node = span.next.load(Ordering::Acquire);
    }
    false
}

/// Installs the protection-fault handler. Idempotent.
pub(crate) fn install() {
    if INSTALLED.swap(true, Ordering::AcqRel) {
        return;
    }

    page_size();

    unsafe {
        let mut action: libc::sigaction = core::mem::zeroed();
        action.sa_sigaction = fault_handler as usize;
        action.sa_flags = libc::SA_SIGINFO;
        libc::sigemptyset(&mut action.sa_mask);

        libc::sigaction(libc::SIGSEGV, &action, ptr::null_mut());

        #[cfg(target_os = "macos")]
        libc::sigaction(libc::SIGBUS, &action, ptr::null_mut());
    }
}

extern "C" fn fault_handler(
    signal: libc::c_int,
    info: *mut libc::siginfo_t,
    _context: *mut libc::c_void,
) {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let fault_addr = unsafe { (*info).si_addr() } as usize;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let fault_addr = unsafe { (*info).si_addr } as usize;

    if is_managed(fault_addr) {
        // Stray access into a protected area: only the offender dies.
        // Legitimate transfers run under the registry lock with
        // protection raised, so they never arrive here.
        unsafe { libc::pthread_exit(ptr::null_mut()) };
    }

    // Not ours: hand the fault back to the default disposition.
    unsafe {
        let mut action: libc::sigaction = core::mem::zeroed();
        action.sa_sigaction = libc::SIG_DFL;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(signal, &action, ptr::null_mut());
        libc::raise(signal);
    }
}
