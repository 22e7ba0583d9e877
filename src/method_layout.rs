//! Field access for runtime method records with a fixed layout.
//!
//! A [`Runtime`](crate::runtime::Runtime) implementation for a particular
//! runtime build describes its method record once and delegates the record
//! half of the trait here.
//!
//! ```rust,ignore
//! const LAYOUT: MethodLayout = MethodLayout {
//!     size: 48,
//!     access_flags_offset: 12,
//!     native_data_offset: 32,
//!     entry_point_offset: 40,
//! };
//!
//! fn entry_point(&self, method: MethodId) -> EntryPoint {
//!     unsafe { LAYOUT.entry_point(method) }
//! }
//! ```

use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::runtime::{AccessFlags, EntryPoint, MethodId};

/// Byte offsets of the fields the interception core touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodLayout {
    /// Total record size in bytes.
    pub size: usize,
    /// `u32` access flags.
    pub access_flags_offset: usize,
    /// Pointer-sized native-linkage slot (JNI entry point).
    pub native_data_offset: usize,
    /// Pointer-sized compiled-code entry point.
    pub entry_point_offset: usize,
}

const WORD: usize = std::mem::size_of::<u64>();

impl MethodLayout {
    fn field<T>(&self, method: MethodId, offset: usize) -> *mut T {
        (method.0 + offset) as *mut T
    }

    /// # Safety
    ///
    /// `method` must point at a live record of this layout.
    pub unsafe fn access_flags(&self, method: MethodId) -> AccessFlags {
        let raw = ptr::read(self.field::<u32>(method, self.access_flags_offset));
        AccessFlags::from_bits_retain(raw)
    }

    /// # Safety
    ///
    /// `method` must point at a live, writable record of this layout.
    pub unsafe fn set_access_flags(&self, method: MethodId, flags: AccessFlags) {
        ptr::write(self.field::<u32>(method, self.access_flags_offset), flags.bits());
    }

    /// # Safety
    ///
    /// `method` must point at a live record of this layout.
    pub unsafe fn native_data(&self, method: MethodId) -> usize {
        (*self.field::<AtomicUsize>(method, self.native_data_offset)).load(Ordering::Acquire)
    }

    /// # Safety
    ///
    /// `method` must point at a live, writable record of this layout.
    pub unsafe fn set_native_data(&self, method: MethodId, data: usize) {
        (*self.field::<AtomicUsize>(method, self.native_data_offset)).store(data, Ordering::Release);
    }

    /// # Safety
    ///
    /// `method` must point at a live record of this layout.
    pub unsafe fn entry_point(&self, method: MethodId) -> EntryPoint {
        EntryPoint((*self.field::<AtomicUsize>(method, self.entry_point_offset)).load(Ordering::Acquire))
    }

    /// Release store: earlier writes to the record are visible to a thread
    /// that observes the new entry point.
    ///
    /// # Safety
    ///
    /// `method` must point at a live, writable record of this layout.
    pub unsafe fn set_entry_point(&self, method: MethodId, entry: EntryPoint) {
        (*self.field::<AtomicUsize>(method, self.entry_point_offset)).store(entry.0, Ordering::Release);
    }

    fn words(&self) -> usize {
        self.size.div_ceil(WORD)
    }

    /// Allocates a record of this layout initialized from `method`.
    ///
    /// # Safety
    ///
    /// `method` must point at a live record of this layout.
    pub unsafe fn copy(&self, method: MethodId) -> MethodId {
        let storage = vec![0u64; self.words()].into_boxed_slice();
        let copy = Box::into_raw(storage) as *mut u8;
        ptr::copy_nonoverlapping(method.0 as *const u8, copy, self.size);
        MethodId(copy as usize)
    }

    /// Frees a record obtained from [`MethodLayout::copy`].
    ///
    /// # Safety
    ///
    /// `copy` must come from `copy` on a layout of the same size and must not
    /// be used afterwards.
    pub unsafe fn release(&self, copy: MethodId) {
        let slice = ptr::slice_from_raw_parts_mut(copy.0 as *mut u64, self.words());
        drop(Box::from_raw(slice));
    }

    /// Allocates a zeroed record, for hosts that build records themselves.
    pub fn allocate(&self) -> MethodId {
        let storage = vec![0u64; self.words()].into_boxed_slice();
        MethodId(Box::into_raw(storage) as *mut u8 as usize)
    }
}
