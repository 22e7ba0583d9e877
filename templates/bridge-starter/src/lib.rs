//! Starter bridge for one ART build.
//!
//! Method record fields are read at fixed offsets. Everything that needs
//! runtime internals (threads, reference tables, invocation) goes through a
//! small C++ shim linked into the same library, together with the
//! assembly trampoline that calls `arthook_quick_invoke_handler`.

use std::ffi::{c_char, c_void, CStr};

use arthook::prelude::*;

// Offsets of ArtMethod fields for the targeted build.
const LAYOUT: MethodLayout = MethodLayout {
    size: 40,
    access_flags_offset: 4,
    native_data_offset: 24,
    entry_point_offset: 32,
};

extern "C" {
    fn shim_shorty(method: *mut c_void) -> *const c_char;
    fn shim_pretty_method(method: *mut c_void) -> *const c_char;
    fn shim_find_overridden(method: *mut c_void) -> *mut c_void;
    fn shim_trampoline() -> *const c_void;
    fn shim_jni_env(thread: *mut c_void) -> *mut jni::JNIEnv;
    fn shim_target_sdk() -> i32;
    fn shim_start_no_suspension(cause: *const c_char) -> usize;
    fn shim_end_no_suspension(token: usize);
    fn shim_set_top_of_stack(sp: *mut c_void);
    fn shim_local_ref_cookie() -> u32;
    fn shim_restore_local_ref_cookie(cookie: u32);
    fn shim_add_local_reference(obj: u32) -> jni::jobject;
    fn shim_decode_reference(obj: jni::jobject) -> u32;
    fn shim_invoke(method: *mut c_void, args: *const u32, num_bytes: usize, shorty: *const c_char, direct: bool) -> u64;
}

fn owned(s: *const c_char) -> String {
    if s.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned()
}

#[derive(Default)]
struct Art;

impl Runtime for Art {
    fn shorty(&self, method: MethodId) -> String {
        owned(unsafe { shim_shorty(method.as_ptr()) })
    }

    fn access_flags(&self, method: MethodId) -> AccessFlags {
        unsafe { LAYOUT.access_flags(method) }
    }

    fn set_access_flags(&self, method: MethodId, flags: AccessFlags) {
        unsafe { LAYOUT.set_access_flags(method, flags) }
    }

    fn entry_point(&self, method: MethodId) -> EntryPoint {
        unsafe { LAYOUT.entry_point(method) }
    }

    fn set_entry_point(&self, method: MethodId, entry: EntryPoint) {
        unsafe { LAYOUT.set_entry_point(method, entry) }
    }

    fn native_data(&self, method: MethodId) -> usize {
        unsafe { LAYOUT.native_data(method) }
    }

    fn set_native_data(&self, method: MethodId, data: usize) {
        unsafe { LAYOUT.set_native_data(method, data) }
    }

    fn copy_method(&self, method: MethodId) -> MethodId {
        unsafe { LAYOUT.copy(method) }
    }

    fn release_method_copy(&self, copy: MethodId) {
        unsafe { LAYOUT.release(copy) }
    }

    fn find_overridden_method(&self, method: MethodId) -> Option<MethodId> {
        let found = MethodId::from_ptr(unsafe { shim_find_overridden(method.as_ptr()) });
        (!found.is_null()).then_some(found)
    }

    fn pretty_method(&self, method: MethodId) -> String {
        owned(unsafe { shim_pretty_method(method.as_ptr()) })
    }

    fn trampoline_entry(&self) -> EntryPoint {
        EntryPoint(unsafe { shim_trampoline() } as usize)
    }

    fn frame_layout(&self) -> QuickFrameLayout {
        QuickFrameLayout::ARM64
    }

    fn jni_env(&self, thread: *mut c_void) -> *mut jni::JNIEnv {
        unsafe { shim_jni_env(thread) }
    }

    fn target_sdk_version(&self) -> i32 {
        unsafe { shim_target_sdk() }
    }

    fn start_no_suspension(&self, _cause: &'static str) -> usize {
        unsafe { shim_start_no_suspension(c"arthook".as_ptr()) }
    }

    fn end_no_suspension(&self, token: usize) {
        unsafe { shim_end_no_suspension(token) }
    }

    fn set_top_of_stack(&self, sp: *mut c_void) {
        unsafe { shim_set_top_of_stack(sp) }
    }

    fn local_ref_cookie(&self) -> u32 {
        unsafe { shim_local_ref_cookie() }
    }

    fn restore_local_ref_cookie(&self, cookie: u32) {
        unsafe { shim_restore_local_ref_cookie(cookie) }
    }

    fn add_local_reference(&self, obj: RawObject) -> jni::jobject {
        unsafe { shim_add_local_reference(obj.0) }
    }

    fn decode_reference(&self, obj: jni::jobject) -> RawObject {
        RawObject(unsafe { shim_decode_reference(obj) })
    }

    fn invoke(
        &self,
        method: MethodId,
        args: &RawArgumentBuffer,
        descriptor: &TypeDescriptor,
        mode: DispatchMode,
    ) -> u64 {
        let shorty = std::ffi::CString::new(descriptor.shorty()).unwrap_or_default();
        unsafe {
            shim_invoke(
                method.as_ptr(),
                args.as_ptr(),
                args.num_bytes(),
                shorty.as_ptr(),
                mode == DispatchMode::Direct,
            )
        }
    }
}

export_bridge!(Art, BridgeConfig::default().with_bridge_class("com/example/hooks/HookBridge"));
