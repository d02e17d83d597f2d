// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Process-wide registry binding threads to their storage areas.
//!
//! One mutex serializes the five public operations; protection toggles
//! and strong-count changes only ever happen under it. The first call
//! into the registry installs the fault interceptor.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::thread::ThreadId;

use crate::area::LocalArea;
use crate::error::Error;
use crate::fault;

pub(crate) struct Registry {
    areas: HashMap<ThreadId, LocalArea>,
}

static STATE: OnceLock<Mutex<Registry>> = OnceLock::new();

fn state() -> &'static Mutex<Registry> {
    STATE.get_or_init(|| {
        fault::install();
        Mutex::new(Registry {
            areas: HashMap::new(),
        })
    })
}

fn lock() -> Result<MutexGuard<'static, Registry>, Error> {
    state().lock().map_err(|_| Error::MutexPoisoned)
}

pub(crate) fn create(owner: ThreadId, size: usize) -> Result<(), Error> {
    let mut registry = lock()?;

    if size == 0 {
        return Err(Error::ZeroSize);
    }

    match registry.areas.entry(owner) {
        Entry::Occupied(_) => Err(Error::AlreadyRegistered),
        Entry::Vacant(slot) => {
            slot.insert(LocalArea::new(size, owner)?);
            Ok(())
        }
    }
}

pub(crate) fn read(owner: ThreadId, offset: usize, buf: &mut [u8]) -> Result<(), Error> {
    let registry = lock()?;

    let area = registry.areas.get(&owner).ok_or(Error::NotRegistered)?;
    debug_assert_eq!(area.owner(), owner);

    area.read_at(offset, buf)
}

pub(crate) fn write(owner: ThreadId, offset: usize, buf: &[u8]) -> Result<(), Error> {
    let mut registry = lock()?;

    let area = registry.areas.get_mut(&owner).ok_or(Error::NotRegistered)?;
    debug_assert_eq!(area.owner(), owner);

    area.write_at(offset, buf)
}

pub(crate) fn destroy(owner: ThreadId) -> Result<(), Error> {
    let mut registry = lock()?;

    // Dropping the area drops its slots; pages whose strong count
    // reaches zero are zeroized and unmapped.
    registry
        .areas
        .remove(&owner)
        .map(drop)
        .ok_or(Error::NotRegistered)
}

pub(crate) fn clone_from(source: ThreadId, caller: ThreadId) -> Result<(), Error> {
    let mut registry = lock()?;

    let shared = {
        let area = registry.areas.get(&source).ok_or(Error::SourceNotRegistered)?;
        if registry.areas.contains_key(&caller) {
            return Err(Error::AlreadyRegistered);
        }
        area.share(caller)
    };

    registry.areas.insert(caller, shared);
    Ok(())
}

pub(crate) fn start_address(owner: ThreadId) -> Option<usize> {
    let registry = lock().ok()?;
    registry.areas.get(&owner)?.start_address()
}
