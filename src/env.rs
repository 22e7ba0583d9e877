//! High-level JNI environment wrappers.
//!
//! - [`JniEnv`]: the JNI environment with `Option`/`Result` returns
//! - [`LocalRef`]: deletes a local reference when dropped
//! - [`StaticRef`]: a global reference kept for the life of the process
//!
//! ```rust,ignore
//! use arthook::env::{JniEnv, LocalRef};
//!
//! fn is_method(env: &JniEnv, obj: arthook::jni::jobject) -> Option<bool> {
//!     // deleted when `cls` goes out of scope
//!     let cls = LocalRef::new(env, env.find_class("java/lang/reflect/Method")?);
//!     Some(env.is_instance_of(obj, cls.get()))
//! }
//! ```

mod jni_impl {
    pub use crate::jni_wrapper::{JniEnv, LocalRef, StaticRef};
}

pub use jni_impl::{JniEnv, LocalRef, StaticRef};
