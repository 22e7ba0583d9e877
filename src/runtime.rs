//! Host runtime facilities consumed by the interception core.
//!
//! The core never reaches into runtime internals directly. Everything it
//! needs from the host (method records, the current thread's suspension
//! state, its local reference table, raw reference decoding and direct
//! invocation) goes through the [`Runtime`] trait. An implementation is
//! written once per runtime build; [`crate::method_layout::MethodLayout`]
//! covers the method-record half for runtimes with a fixed record layout.

use std::ffi::c_void;

use bitflags::bitflags;

use crate::args::{QuickFrameLayout, RawArgumentBuffer};
use crate::shorty::TypeDescriptor;
use crate::sys::jni;
use crate::value::RawObject;

/// Identity of one method of one class: the address of its runtime record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub usize);

impl MethodId {
    pub fn from_ptr(ptr: *const c_void) -> Self {
        MethodId(ptr as usize)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Address the runtime jumps to when a method is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryPoint(pub usize);

bitflags! {
    /// Method access flags as stored in the runtime record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const CONSTRUCTOR = 0x0001_0000;

        // Runtime-private bits are carried through untouched.
        const _ = !0;
    }
}

/// How an invocation resolves its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Resolve through the receiver's virtual or interface tables.
    Virtual,
    /// Run exactly the given method body, never re-resolved.
    Direct,
}

/// The host runtime, as seen by the interception core.
///
/// All thread-related operations act on the calling thread.
pub trait Runtime: Send + Sync {
    // =========================================================================
    // Method records
    // =========================================================================

    /// The method's compact type descriptor, e.g. `"VIL"`.
    fn shorty(&self, method: MethodId) -> String;

    fn access_flags(&self, method: MethodId) -> AccessFlags;

    fn set_access_flags(&self, method: MethodId, flags: AccessFlags);

    /// The compiled-code entry point.
    fn entry_point(&self, method: MethodId) -> EntryPoint;

    /// Publishes a new compiled-code entry point. Writes made before this
    /// call must be visible to any thread that observes the new entry.
    fn set_entry_point(&self, method: MethodId, entry: EntryPoint);

    /// The record's native-linkage word (the JNI entry point).
    fn native_data(&self, method: MethodId) -> usize;

    fn set_native_data(&self, method: MethodId, data: usize);

    /// Copies the method record, metadata and entry point included.
    ///
    /// The copy belongs to the caller until handed to
    /// [`Runtime::release_method_copy`].
    fn copy_method(&self, method: MethodId) -> MethodId;

    fn release_method_copy(&self, copy: MethodId);

    /// The implementation `method` overrides, one level up the chain.
    fn find_overridden_method(&self, method: MethodId) -> Option<MethodId>;

    /// Human-readable method name for logs.
    fn pretty_method(&self, method: MethodId) -> String {
        format!("method@{:#x}", method.0)
    }

    // =========================================================================
    // Trampoline and frames
    // =========================================================================

    /// Entry point of the shared trampoline stub.
    fn trampoline_entry(&self) -> EntryPoint;

    /// Layout of the frame the trampoline stub spills arguments into.
    fn frame_layout(&self) -> QuickFrameLayout;

    /// The JNI environment of a runtime thread.
    fn jni_env(&self, thread: *mut c_void) -> *mut jni::JNIEnv;

    /// The application's target SDK version, `0` when unknown.
    fn target_sdk_version(&self) -> i32;

    // =========================================================================
    // Current thread
    // =========================================================================

    /// Starts a region in which the thread must not suspend. Returns a token
    /// for [`Runtime::end_no_suspension`].
    fn start_no_suspension(&self, cause: &'static str) -> usize;

    fn end_no_suspension(&self, token: usize);

    /// Records `sp` as the top of the managed stack so it can be walked.
    fn set_top_of_stack(&self, sp: *mut c_void);

    /// Current position of the local reference table.
    fn local_ref_cookie(&self) -> u32;

    /// Drops every local reference created since `cookie` was taken.
    fn restore_local_ref_cookie(&self, cookie: u32);

    /// Registers a raw reference in the local reference table.
    fn add_local_reference(&self, obj: RawObject) -> jni::jobject;

    /// The raw reference behind a local or global reference.
    fn decode_reference(&self, obj: jni::jobject) -> RawObject;

    // =========================================================================
    // Invocation
    // =========================================================================

    /// Runs `method` with an argument array laid out for `descriptor`
    /// (receiver first for instance methods) and returns the raw result.
    /// A thrown exception is left pending.
    fn invoke(
        &self,
        method: MethodId,
        args: &RawArgumentBuffer,
        descriptor: &TypeDescriptor,
        mode: DispatchMode,
    ) -> u64;
}

// =============================================================================
// Guards
// =============================================================================

/// A region in which the current thread must not be suspended.
///
/// Ends on [`NoSuspension::end`] or when dropped.
pub struct NoSuspension<'a> {
    runtime: &'a dyn Runtime,
    token: Option<usize>,
}

impl<'a> NoSuspension<'a> {
    pub fn enter(runtime: &'a dyn Runtime, cause: &'static str) -> Self {
        let token = runtime.start_no_suspension(cause);
        NoSuspension { runtime, token: Some(token) }
    }

    pub fn end(mut self) {
        if let Some(token) = self.token.take() {
            self.runtime.end_no_suspension(token);
        }
    }
}

impl Drop for NoSuspension<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.runtime.end_no_suspension(token);
        }
    }
}

/// Bounds the local references created during one call.
pub struct LocalRefScope<'a> {
    runtime: &'a dyn Runtime,
    cookie: u32,
}

impl<'a> LocalRefScope<'a> {
    pub fn enter(runtime: &'a dyn Runtime) -> Self {
        LocalRefScope { runtime, cookie: runtime.local_ref_cookie() }
    }
}

impl Drop for LocalRefScope<'_> {
    fn drop(&mut self) {
        self.runtime.restore_local_ref_cookie(self.cookie);
    }
}
