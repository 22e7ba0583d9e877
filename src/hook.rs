//! Hook records and trampoline installation.
//!
//! Installing a hook on method `M`:
//!
//! 1. `M`'s record is copied. The copy (the *backup*) keeps the original
//!    entry point and is what invoke-original runs.
//! 2. A [`HookRecord`] is allocated and its address is written into `M`'s
//!    native-linkage slot, which from then on means "hook record".
//! 3. `M`'s entry point is swapped for the shared trampoline, after a
//!    release fence so callers that reach the trampoline see the record.
//! 4. The `NATIVE` flag is cleared so the runtime calls through the entry
//!    point instead of the JNI path.
//!
//! A method is hooked exactly when its entry point is the trampoline. Records
//! and backups are never freed: hooks live until the process exits.

use std::sync::atomic::{fence, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::info;

use crate::env::StaticRef;
use crate::error::{HookError, Result};
use crate::heap::Heap;
use crate::runtime::{AccessFlags, MethodId, Runtime};
use crate::sys::jni;

/// Everything the trampoline needs about one hooked method.
#[derive(Debug)]
pub struct HookRecord {
    method: MethodId,
    original: MethodId,
    reflected: StaticRef,
    payload: StaticRef,
}

impl HookRecord {
    /// The hooked method.
    pub fn method(&self) -> MethodId {
        self.method
    }

    /// The backup copy, still pointing at the original code.
    pub fn original(&self) -> MethodId {
        self.original
    }

    /// Reflected `Method`/`Constructor` bound to [`HookRecord::original`].
    pub fn reflected(&self) -> StaticRef {
        self.reflected
    }

    pub fn payload(&self) -> StaticRef {
        self.payload
    }
}

/// What a method's native-linkage slot currently means.
#[derive(Debug, Clone, Copy)]
pub enum HookSlot<'a> {
    Unhooked,
    Hooked(&'a HookRecord),
    /// A JNI entry point or other runtime data.
    NativeLinkage(usize),
}

/// All hooks installed through this store, keyed by method.
#[derive(Debug, Default)]
pub struct HookStore {
    records: DashMap<MethodId, &'static HookRecord>,
}

impl HookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Structural check: the entry point is the trampoline.
    pub fn is_hooked(&self, runtime: &dyn Runtime, method: MethodId) -> bool {
        runtime.entry_point(method) == runtime.trampoline_entry()
    }

    pub fn lookup(&self, method: MethodId) -> Option<&'static HookRecord> {
        self.records.get(&method).map(|r| *r)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Interprets `method`'s native-linkage slot.
    pub fn slot(&self, runtime: &dyn Runtime, method: MethodId) -> HookSlot<'static> {
        // The entry point is read first and paired with the release fence in
        // `install`, so a trampoline entry implies the record store is visible.
        let hooked = self.is_hooked(runtime, method);
        if hooked {
            fence(Ordering::Acquire);
        }
        let data = runtime.native_data(method);
        if hooked && data != 0 {
            // Only `install` stores into the slot of a method whose entry
            // point is the trampoline, and it stores a leaked record.
            HookSlot::Hooked(unsafe { &*(data as *const HookRecord) })
        } else if data == 0 {
            HookSlot::Unhooked
        } else {
            HookSlot::NativeLinkage(data)
        }
    }

    /// The record of a hooked method, read through its slot.
    pub fn record_for(&self, runtime: &dyn Runtime, method: MethodId) -> Result<&'static HookRecord> {
        match self.slot(runtime, method) {
            HookSlot::Hooked(record) => Ok(record),
            _ => Err(HookError::NotHooked(runtime.pretty_method(method))),
        }
    }

    /// Hooks `method`, attaching `payload` to it.
    ///
    /// Fails with [`HookError::AlreadyHooked`] without touching the existing
    /// hook, and with [`HookError::ExceptionPending`] if the reflected
    /// backup could not be allocated, leaving the method unhooked.
    pub fn install(
        &self,
        runtime: &dyn Runtime,
        heap: &dyn Heap,
        method: MethodId,
        payload: jni::jobject,
    ) -> Result<&'static HookRecord> {
        let entry = match self.records.entry(method) {
            Entry::Occupied(_) => return Err(HookError::AlreadyHooked(runtime.pretty_method(method))),
            Entry::Vacant(entry) => entry,
        };
        if self.is_hooked(runtime, method) {
            return Err(HookError::AlreadyHooked(runtime.pretty_method(method)));
        }

        let flags = runtime.access_flags(method);
        let original = runtime.copy_method(method);
        let Some(reflected) = heap.reflect_method(original, flags.contains(AccessFlags::CONSTRUCTOR)) else {
            runtime.release_method_copy(original);
            return Err(HookError::ExceptionPending);
        };

        let record: &'static HookRecord = Box::leak(Box::new(HookRecord {
            method,
            original,
            reflected: heap.new_static_ref(reflected),
            payload: heap.new_static_ref(payload),
        }));

        runtime.set_native_data(method, record as *const HookRecord as usize);
        fence(Ordering::Release);
        runtime.set_entry_point(method, runtime.trampoline_entry());
        if flags.contains(AccessFlags::NATIVE) {
            runtime.set_access_flags(method, flags - AccessFlags::NATIVE);
        }
        entry.insert(record);

        info!("hooked {}", runtime.pretty_method(method));
        Ok(record)
    }
}
