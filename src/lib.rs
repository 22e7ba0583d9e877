//! # arthook
//!
//! Method interception for ART-style managed runtimes.
//!
//! A hooked method keeps its identity but its compiled entry point is
//! swapped for a shared trampoline. Every call then lands in a handler that
//! sees the reflected original, a payload, the receiver and the boxed
//! arguments, and decides the result. The original body stays reachable
//! through a backup copy of the method record.
//!
//! ## Quick Start
//!
//! **1. Create a library crate for the target device:**
//! ```toml
//! [lib]
//! crate-type = ["cdylib"]
//!
//! [dependencies]
//! arthook = "0.1"
//! ```
//!
//! **2. Describe the runtime build and export the bridge:**
//! ```rust,ignore
//! use arthook::prelude::*;
//!
//! #[derive(Default)]
//! struct Art { /* offsets and thread hooks for this runtime build */ }
//!
//! impl Runtime for Art {
//!     // ...
//! }
//!
//! export_bridge!(Art);
//! ```
//!
//! **3. Load the library from the managed side.** `JNI_OnLoad` registers
//! `hookMethodNative`, `invokeOriginalMethodNative` and `invokeSuperNative`
//! on the bridge class (see [`BridgeConfig`]).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 JNI boundary (this file)                 │
//! │   export_bridge!, natives, arthook_quick_invoke_handler  │
//! ├─────────────────────────────────────────────────────────┤
//! │                        Bridge                            │
//! │   hook::HookStore      - install, structural lookup      │
//! │   trampoline           - capture, dispatch, fixup        │
//! │   invoke               - original / super invocation     │
//! ├─────────────────────────────────────────────────────────┤
//! │                 Marshaling (marshal, args)               │
//! │   boxing, unboxing, quick frames, argument arrays        │
//! ├─────────────────────────────────────────────────────────┤
//! │          Host facilities (runtime, heap, handler)        │
//! │   Runtime - method records, threads, invocation          │
//! │   Heap - boxing and arrays over JNI                      │
//! ├─────────────────────────────────────────────────────────┤
//! │               Raw FFI bindings (sys module)              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`shorty`] | Compact type descriptors |
//! | [`args`] | Argument arrays and quick-frame capture |
//! | [`marshal`] | Boxing and unboxing |
//! | [`hook`] | Hook records and trampoline installation |
//! | [`runtime`] | The [`Runtime`] trait a host implements |
//! | [`method_layout`] | Offset-based method record access |
//! | [`heap`] | The [`heap::Heap`] trait and its JNI implementation |
//! | [`env`] | JNI wrappers |
//!
//! ## Logging
//!
//! Everything goes through the `log` facade. Install a backend (on Android,
//! an android logger) before `JNI_OnLoad` runs to see it.

pub mod sys;
pub mod env;

#[doc(hidden)]
pub mod jni_wrapper;

pub mod args;
pub mod bridge;
pub mod config;
pub mod error;
pub mod handler;
pub mod heap;
pub mod hook;
pub mod invoke;
pub mod marshal;
pub mod method_layout;
pub mod prelude;
pub mod runtime;
pub mod shorty;
pub mod trampoline;
pub mod value;

use std::ffi::c_void;
use std::sync::OnceLock;

use log::{error, warn};

pub use crate::bridge::Bridge;
pub use crate::config::BridgeConfig;
pub use crate::error::{HookError, Result};
pub use crate::runtime::Runtime;
pub use crate::sys::jni;

use crate::env::JniEnv;
use crate::heap::Heap;
use crate::runtime::MethodId;

/// The process-wide bridge, set once by `JNI_OnLoad`.
pub static GLOBAL_BRIDGE: OnceLock<Bridge> = OnceLock::new();

pub fn set_global_bridge(bridge: Bridge) -> Result<()> {
    GLOBAL_BRIDGE.set(bridge).map_err(|_| HookError::AlreadyInitialized)
}

pub fn global_bridge() -> Option<&'static Bridge> {
    GLOBAL_BRIDGE.get()
}

/// The registration table for the bridge class.
pub fn native_methods() -> [jni::JNINativeMethod; 3] {
    [
        jni::JNINativeMethod {
            name: c"hookMethodNative".as_ptr(),
            signature: c"(Ljava/lang/reflect/Member;Ljava/lang/Class;ILjava/lang/Object;)V".as_ptr(),
            fnPtr: hook_method_native as *mut c_void,
        },
        jni::JNINativeMethod {
            name: c"invokeOriginalMethodNative".as_ptr(),
            signature: c"(Ljava/lang/reflect/Member;I[Ljava/lang/Class;Ljava/lang/Class;Ljava/lang/Object;[Ljava/lang/Object;)Ljava/lang/Object;".as_ptr(),
            fnPtr: invoke_original_method_native as *mut c_void,
        },
        jni::JNINativeMethod {
            name: c"invokeSuperNative".as_ptr(),
            signature: c"(Ljava/lang/Object;[Ljava/lang/Object;Ljava/lang/reflect/Member;Ljava/lang/Class;[Ljava/lang/Class;Ljava/lang/Class;I)Ljava/lang/Object;".as_ptr(),
            fnPtr: invoke_super_native as *mut c_void,
        },
    ]
}

/// Activates the bridge for `vm`. Called by the `JNI_OnLoad` that
/// [`export_bridge!`] generates.
///
/// Returns `config.jni_version` even when activation fails, so the library
/// still loads; `JNI_ERR` only when the thread has no JNI environment.
///
/// # Safety
///
/// `vm` must be the `JavaVM` passed to `JNI_OnLoad`, on an attached thread.
pub unsafe fn attach_vm(vm: *mut jni::JavaVM, runtime: Box<dyn Runtime>, config: BridgeConfig) -> jni::jint {
    let version = config.jni_version;
    let env = match JniEnv::from_vm(vm, version) {
        Ok(env) => env,
        Err(code) => {
            error!("{}", HookError::JniVersion(code));
            return jni::JNI_ERR;
        }
    };

    let natives = native_methods();
    match Bridge::attach(&env, runtime, config, &natives) {
        Ok(bridge) => {
            if let Err(e) = set_global_bridge(bridge) {
                warn!("{e}");
            }
        }
        Err(e) => error!("hook bridge not activated: {e}"),
    }
    version
}

/// Turns a core result into what the JNI caller sees.
///
/// A pending exception is left for the caller. Contract violations abort.
fn boundary<T>(operation: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(HookError::ExceptionPending) => None,
        Err(e) if e.is_fatal() => {
            error!("{operation}: {e}");
            panic!("{operation}: {e}");
        }
        Err(e) => {
            warn!("{operation}: {e}");
            None
        }
    }
}

unsafe fn with_bridge<T>(env: *mut jni::JNIEnv, f: impl FnOnce(&Bridge, &dyn Heap) -> Result<T>) -> Result<T> {
    let bridge = global_bridge().ok_or(HookError::NotInitialized)?;
    let heap = bridge.jni_heap(JniEnv::from_raw(env))?;
    f(bridge, &heap)
}

unsafe extern "system" fn hook_method_native(
    env: *mut jni::JNIEnv,
    _class: jni::jclass,
    member: jni::jobject,
    _declaring_class: jni::jclass,
    _slot: jni::jint,
    payload: jni::jobject,
) {
    let result = with_bridge(env, |bridge, heap| bridge.hook_method(heap, member, payload).map(|_| ()));
    boundary("hookMethodNative", result);
}

unsafe extern "system" fn invoke_original_method_native(
    env: *mut jni::JNIEnv,
    _class: jni::jclass,
    member: jni::jobject,
    _slot: jni::jint,
    _parameter_types: jni::jobjectArray,
    _return_type: jni::jclass,
    receiver: jni::jobject,
    args: jni::jobjectArray,
) -> jni::jobject {
    let result = with_bridge(env, |bridge, heap| bridge.invoke_original(heap, member, receiver, args));
    boundary("invokeOriginalMethodNative", result).unwrap_or(std::ptr::null_mut())
}

unsafe extern "system" fn invoke_super_native(
    env: *mut jni::JNIEnv,
    _class: jni::jclass,
    receiver: jni::jobject,
    args: jni::jobjectArray,
    member: jni::jobject,
    _declaring_class: jni::jclass,
    _parameter_types: jni::jobjectArray,
    _return_type: jni::jclass,
    _slot: jni::jint,
) -> jni::jobject {
    let result = with_bridge(env, |bridge, heap| bridge.invoke_super(heap, receiver, args, member));
    boundary("invokeSuperNative", result).unwrap_or(std::ptr::null_mut())
}

/// Rust half of the trampoline. The assembly stub calls this with the
/// hooked method, the receiver register, the current thread and the quick
/// frame it built, and returns the result in the integer and floating-point
/// result registers.
///
/// # Safety
///
/// Only to be called by the trampoline stub, with `sp` pointing at its frame.
#[no_mangle]
pub unsafe extern "C" fn arthook_quick_invoke_handler(
    method: *mut c_void,
    _receiver: u32,
    thread: *mut c_void,
    sp: *mut c_void,
) -> u64 {
    let result = global_bridge().ok_or(HookError::NotInitialized).and_then(|bridge| {
        let env = JniEnv::from_raw(bridge.runtime().jni_env(thread));
        let heap = bridge.jni_heap(env)?;
        bridge.handle_quick_invocation(&heap, MethodId::from_ptr(method), sp)
    });
    boundary("trampoline", result).unwrap_or(0)
}

/// Generates `JNI_OnLoad` for a [`Runtime`] type.
///
/// The runtime type must implement [`Default`]. An optional second argument
/// supplies the [`BridgeConfig`]; the default configuration is used otherwise.
///
/// ```rust,ignore
/// use arthook::{export_bridge, BridgeConfig};
///
/// export_bridge!(MyRuntime, BridgeConfig::default().with_bridge_class("com/example/Hooks"));
/// ```
#[macro_export]
macro_rules! export_bridge {
    ($runtime:ty) => {
        $crate::export_bridge!($runtime, $crate::BridgeConfig::default());
    };
    ($runtime:ty, $config:expr) => {
        #[no_mangle]
        pub unsafe extern "system" fn JNI_OnLoad(
            vm: *mut $crate::sys::jni::JavaVM,
            _reserved: *mut std::ffi::c_void,
        ) -> $crate::sys::jni::jint {
            let runtime: Box<dyn $crate::Runtime> = Box::new(<$runtime>::default());
            $crate::attach_vm(vm, runtime, $config)
        }
    };
}
