//! The collaborator that decides what a hooked call does.

use crate::env::{JniEnv, LocalRef, StaticRef};
use crate::error::{HookError, Result};
use crate::heap::{Heap, MethodRef};
use crate::sys::jni;

/// Marker passed to the handler for every trampoline dispatch.
pub const INVOCATION_KIND: jni::jint = 0;

/// Everything the handler sees about one intercepted call.
#[derive(Debug, Clone, Copy)]
pub struct HookedCall {
    /// Reflected object bound to the backup of the hooked method.
    pub reflected_method: jni::jobject,
    pub marker: jni::jint,
    pub payload: jni::jobject,
    /// Null for static methods.
    pub receiver: jni::jobject,
    /// `Object[]` of boxed arguments, or null for a zero-argument call.
    pub args: jni::jobjectArray,
}

/// Receives every call to a hooked method.
///
/// Returns the boxed result (ignored for `void` methods). To make the
/// intercepted method throw, leave an exception pending and return null.
pub trait HookHandler: Send + Sync {
    fn handle_hooked_method(&self, heap: &dyn Heap, call: &HookedCall) -> jni::jobject;
}

/// Dispatches to a static managed method, `handleHookedMethod` by default.
#[derive(Debug, Clone, Copy)]
pub struct JavaHandler {
    class: StaticRef,
    method: MethodRef,
}

impl JavaHandler {
    /// Looks up the static dispatch method once.
    ///
    /// `class` must be a global reference that lives for the process.
    pub fn resolve(env: &JniEnv, class: StaticRef, class_name: &str, name: &str, signature: &str) -> Result<Self> {
        let Some(id) = env.get_static_method_id(class.get(), name, signature) else {
            env.exception_clear();
            return Err(HookError::MethodNotFound {
                class: class_name.to_string(),
                name: name.to_string(),
                signature: signature.to_string(),
            });
        };
        Ok(JavaHandler { class, method: unsafe { MethodRef::from_raw(id) } })
    }

    /// Looks up `class_name` and its dispatch method.
    pub fn find(env: &JniEnv, class_name: &str, name: &str, signature: &str) -> Result<Self> {
        let Some(local) = env.find_class(class_name) else {
            env.exception_clear();
            return Err(HookError::ClassNotFound(class_name.to_string()));
        };
        let local = LocalRef::new(env, local);
        let class = unsafe { StaticRef::from_raw(env.new_global_ref(local.get())) };
        Self::resolve(env, class, class_name, name, signature)
    }

    pub fn class(&self) -> StaticRef {
        self.class
    }
}

impl HookHandler for JavaHandler {
    fn handle_hooked_method(&self, heap: &dyn Heap, call: &HookedCall) -> jni::jobject {
        let args = [
            jni::jvalue { l: call.reflected_method },
            jni::jvalue { i: call.marker },
            jni::jvalue { l: call.payload },
            jni::jvalue { l: call.receiver },
            jni::jvalue { l: call.args },
        ];
        heap.call_static_object_method(self.class.get(), self.method.get(), &args)
    }
}
