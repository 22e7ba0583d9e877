//! Safe wrapper around the JNI environment.
//!
//! Only the operations the interception core needs are wrapped. Calls that
//! can fail report `None` or `Err(code)`; a pending Java exception is left in
//! place for the caller to inspect with [`JniEnv::exception_check`].
//!
//! # Example
//!
//! ```rust,ignore
//! use arthook::env::{JniEnv, LocalRef};
//!
//! fn find_bridge(env: &JniEnv) -> Option<arthook::jni::jclass> {
//!     let local = LocalRef::new(env, env.find_class("com/example/Bridge")?);
//!     Some(env.new_global_ref(local.get()))
//! }
//! ```

use crate::sys::jni;
use crate::{jni_call, jvm_call};
use std::ffi::{c_void, CString};
use std::ptr;

/// Wraps the `Call<Type>MethodA` family used to unbox wrapper objects.
macro_rules! call_unbox_methods {
    ($($name:ident => $slot:ident -> $ret:ty,)*) => {
        $(
            pub fn $name(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) -> $ret {
                unsafe {
                    jni_call!(self.env, $slot, obj, method_id, args.as_ptr())
                }
            }
        )*
    };
}

/// Safe wrapper around a JNI environment pointer.
///
/// # Thread Safety
///
/// A `JniEnv` is tied to a specific thread and cannot be sent across threads.
/// Each managed thread has its own JNI environment.
pub struct JniEnv {
    env: *mut jni::JNIEnv,
}

impl JniEnv {
    /// Creates a JniEnv wrapper from a raw pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure the pointer is valid and comes from the current thread.
    pub unsafe fn from_raw(env: *mut jni::JNIEnv) -> Self {
        JniEnv { env }
    }

    /// Obtains the current thread's environment from a `JavaVM`.
    ///
    /// # Safety
    ///
    /// `vm` must be a valid `JavaVM` pointer and the current thread must be attached.
    pub unsafe fn from_vm(vm: *mut jni::JavaVM, version: jni::jint) -> Result<Self, jni::jint> {
        let mut env: *mut c_void = ptr::null_mut();
        let result = jvm_call!(vm, GetEnv, &mut env, version);
        if result != jni::JNI_OK || env.is_null() {
            return Err(if result == jni::JNI_OK { jni::JNI_ERR } else { result });
        }
        Ok(JniEnv { env: env as *mut jni::JNIEnv })
    }

    // =========================================================================
    // Class Operations
    // =========================================================================

    /// Finds a class by its fully qualified name ('/' separated).
    pub fn find_class(&self, name: &str) -> Option<jni::jclass> {
        let c_name = CString::new(name).ok()?;
        unsafe {
            let cls = jni_call!(self.env, FindClass, c_name.as_ptr());
            if cls.is_null() { None } else { Some(cls) }
        }
    }

    /// Checks if an object is an instance of a class.
    pub fn is_instance_of(&self, obj: jni::jobject, cls: jni::jclass) -> bool {
        unsafe {
            jni_call!(self.env, IsInstanceOf, obj, cls) != 0
        }
    }

    // =========================================================================
    // Reflection
    // =========================================================================

    /// Converts a `java.lang.reflect.Method` or `Constructor` to a method ID.
    pub fn from_reflected_method(&self, method: jni::jobject) -> Option<jni::jmethodID> {
        unsafe {
            let mid = jni_call!(self.env, FromReflectedMethod, method);
            if mid.is_null() { None } else { Some(mid) }
        }
    }

    // =========================================================================
    // Exception Handling
    // =========================================================================

    /// Checks if an exception is pending.
    pub fn exception_check(&self) -> bool {
        unsafe {
            jni_call!(self.env, ExceptionCheck) != 0
        }
    }

    /// Clears any pending exception.
    pub fn exception_clear(&self) {
        unsafe {
            jni_call!(self.env, ExceptionClear);
        }
    }

    /// Throws a new instance of `cls` with `message`. Returns false if the
    /// exception could not be constructed.
    pub fn throw_new(&self, cls: jni::jclass, message: &str) -> bool {
        let Ok(c_message) = CString::new(message) else {
            return false;
        };
        unsafe {
            jni_call!(self.env, ThrowNew, cls, c_message.as_ptr()) == 0
        }
    }

    // =========================================================================
    // Method and Field IDs
    // =========================================================================

    /// Gets the method ID for an instance method.
    pub fn get_method_id(&self, cls: jni::jclass, name: &str, sig: &str) -> Option<jni::jmethodID> {
        let c_name = CString::new(name).ok()?;
        let c_sig = CString::new(sig).ok()?;
        unsafe {
            let mid = jni_call!(self.env, GetMethodID, cls, c_name.as_ptr(), c_sig.as_ptr());
            if mid.is_null() { None } else { Some(mid) }
        }
    }

    /// Gets the method ID for a static method.
    pub fn get_static_method_id(&self, cls: jni::jclass, name: &str, sig: &str) -> Option<jni::jmethodID> {
        let c_name = CString::new(name).ok()?;
        let c_sig = CString::new(sig).ok()?;
        unsafe {
            let mid = jni_call!(self.env, GetStaticMethodID, cls, c_name.as_ptr(), c_sig.as_ptr());
            if mid.is_null() { None } else { Some(mid) }
        }
    }

    /// Gets the field ID for an instance field.
    pub fn get_field_id(&self, cls: jni::jclass, name: &str, sig: &str) -> Option<jni::jfieldID> {
        let c_name = CString::new(name).ok()?;
        let c_sig = CString::new(sig).ok()?;
        unsafe {
            let fid = jni_call!(self.env, GetFieldID, cls, c_name.as_ptr(), c_sig.as_ptr());
            if fid.is_null() { None } else { Some(fid) }
        }
    }

    // =========================================================================
    // Object Operations
    // =========================================================================

    /// Allocates a new object without calling any constructor.
    pub fn alloc_object(&self, cls: jni::jclass) -> Option<jni::jobject> {
        unsafe {
            let obj = jni_call!(self.env, AllocObject, cls);
            if obj.is_null() { None } else { Some(obj) }
        }
    }

    /// Sets a long instance field.
    pub fn set_long_field(&self, obj: jni::jobject, field_id: jni::jfieldID, value: jni::jlong) {
        unsafe {
            jni_call!(self.env, SetLongField, obj, field_id, value);
        }
    }

    // =========================================================================
    // Reference Management
    // =========================================================================

    /// Creates a new global reference to an object.
    pub fn new_global_ref(&self, obj: jni::jobject) -> jni::jobject {
        unsafe {
            jni_call!(self.env, NewGlobalRef, obj)
        }
    }

    /// Deletes a local reference.
    pub fn delete_local_ref(&self, obj: jni::jobject) {
        unsafe {
            jni_call!(self.env, DeleteLocalRef, obj);
        }
    }

    // =========================================================================
    // Array Operations
    // =========================================================================

    /// Gets the length of an array.
    pub fn get_array_length(&self, array: jni::jarray) -> jni::jsize {
        unsafe {
            jni_call!(self.env, GetArrayLength, array)
        }
    }

    /// Creates a new object array.
    pub fn new_object_array(&self, length: jni::jsize, cls: jni::jclass, init: jni::jobject) -> Option<jni::jobjectArray> {
        unsafe {
            let arr = jni_call!(self.env, NewObjectArray, length, cls, init);
            if arr.is_null() { None } else { Some(arr) }
        }
    }

    /// Gets an element from an object array.
    pub fn get_object_array_element(&self, array: jni::jobjectArray, index: jni::jsize) -> jni::jobject {
        unsafe {
            jni_call!(self.env, GetObjectArrayElement, array, index)
        }
    }

    /// Sets an element in an object array.
    pub fn set_object_array_element(&self, array: jni::jobjectArray, index: jni::jsize, value: jni::jobject) {
        unsafe {
            jni_call!(self.env, SetObjectArrayElement, array, index, value);
        }
    }

    // =========================================================================
    // Method Calls
    // =========================================================================

    call_unbox_methods! {
        call_boolean_method => CallBooleanMethodA -> jni::jboolean,
        call_byte_method => CallByteMethodA -> jni::jbyte,
        call_char_method => CallCharMethodA -> jni::jchar,
        call_short_method => CallShortMethodA -> jni::jshort,
        call_int_method => CallIntMethodA -> jni::jint,
        call_long_method => CallLongMethodA -> jni::jlong,
        call_float_method => CallFloatMethodA -> jni::jfloat,
        call_double_method => CallDoubleMethodA -> jni::jdouble,
    }

    /// Calls an object static method.
    pub fn call_static_object_method(&self, cls: jni::jclass, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jobject {
        unsafe {
            jni_call!(self.env, CallStaticObjectMethodA, cls, method_id, args.as_ptr())
        }
    }

    // =========================================================================
    // Native Method Registration
    // =========================================================================

    /// Registers native methods for a class.
    pub fn register_natives(&self, cls: jni::jclass, methods: &[jni::JNINativeMethod]) -> Result<(), jni::jint> {
        unsafe {
            let result = jni_call!(self.env, RegisterNatives, cls, methods.as_ptr(), methods.len() as jni::jint);
            if result == 0 { Ok(()) } else { Err(result) }
        }
    }
}

// =========================================================================
// Reference Guards (RAII wrappers)
// =========================================================================

/// A guard that automatically deletes a local reference when dropped.
pub struct LocalRef<'a> {
    env: &'a JniEnv,
    obj: jni::jobject,
}

impl<'a> LocalRef<'a> {
    /// Creates a new LocalRef guard.
    pub fn new(env: &'a JniEnv, obj: jni::jobject) -> Self {
        LocalRef { env, obj }
    }

    /// Returns the underlying jobject.
    pub fn get(&self) -> jni::jobject {
        self.obj
    }
}

impl<'a> Drop for LocalRef<'a> {
    fn drop(&mut self) {
        if !self.obj.is_null() {
            self.env.delete_local_ref(self.obj);
        }
    }
}

/// A global reference that is never deleted.
///
/// Global references are valid on every thread, so this handle is
/// `Send + Sync`. Hook records hold their reflected backup and payload this
/// way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRef(jni::jobject);

impl StaticRef {
    /// Wraps an existing global reference (or null).
    ///
    /// # Safety
    ///
    /// `obj` must be null or a global reference that is never deleted.
    pub unsafe fn from_raw(obj: jni::jobject) -> Self {
        StaticRef(obj)
    }

    pub fn null() -> Self {
        StaticRef(ptr::null_mut())
    }

    pub fn get(&self) -> jni::jobject {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

unsafe impl Send for StaticRef {}
unsafe impl Sync for StaticRef {}
