//! Managed-heap operations reachable through JNI.
//!
//! The [`Heap`] trait is what the marshaler and the handler dispatch need
//! from the managed side: boxing, object arrays, reflection objects and the
//! pending-exception flag. [`JniHeap`] implements it over a [`JniEnv`] with
//! classes and method IDs resolved once at activation ([`WellKnownClasses`]).
//!
//! Every operation that allocates may trigger a garbage collection.

use std::ffi::c_void;

use log::warn;

use crate::env::{JniEnv, LocalRef, StaticRef};
use crate::error::{HookError, Result};
use crate::runtime::MethodId;
use crate::shorty::TypeTag;
use crate::sys::jni;
use crate::value::Value;

/// Managed-heap facilities used by the interception core.
pub trait Heap {
    /// Whether a managed exception is pending on this thread.
    fn exception_pending(&self) -> bool;

    /// Boxes a primitive into its wrapper object.
    /// `None` means allocation failed and an exception is pending.
    fn box_value(&self, value: Value) -> Option<jni::jobject>;

    /// Unwraps a wrapper object whose primitive type must be exactly `tag`.
    fn unbox_value(&self, obj: jni::jobject, tag: TypeTag) -> Result<Value>;

    /// Leaves a `NullPointerException` pending on this thread.
    fn throw_null_pointer(&self, message: &str);

    /// Allocates an `Object[]` of `len` nulls.
    /// `None` means allocation failed and an exception is pending.
    fn new_object_array(&self, len: usize) -> Option<jni::jobjectArray>;

    fn array_length(&self, array: jni::jobjectArray) -> usize;

    fn array_element(&self, array: jni::jobjectArray, index: usize) -> jni::jobject;

    fn set_array_element(&self, array: jni::jobjectArray, index: usize, value: jni::jobject);

    /// The method behind a `java.lang.reflect.Method` or `Constructor`.
    fn from_reflected_method(&self, reflected: jni::jobject) -> Option<MethodId>;

    /// Allocates a reflected `Method` (or `Constructor`) bound to `method`.
    /// `None` means allocation failed and an exception is pending.
    fn reflect_method(&self, method: MethodId, is_constructor: bool) -> Option<jni::jobject>;

    /// Promotes a reference to a global reference kept for the process lifetime.
    fn new_static_ref(&self, obj: jni::jobject) -> StaticRef;

    fn call_static_object_method(
        &self,
        class: jni::jclass,
        method: jni::jmethodID,
        args: &[jni::jvalue],
    ) -> jni::jobject;
}

/// A JNI method ID usable from any thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodRef(jni::jmethodID);

impl MethodRef {
    /// # Safety
    ///
    /// `id` must be a method ID whose class stays loaded.
    pub unsafe fn from_raw(id: jni::jmethodID) -> Self {
        MethodRef(id)
    }

    pub fn get(&self) -> jni::jmethodID {
        self.0
    }
}

unsafe impl Send for MethodRef {}
unsafe impl Sync for MethodRef {}

#[derive(Debug, Clone, Copy)]
struct FieldRef(jni::jfieldID);

unsafe impl Send for FieldRef {}
unsafe impl Sync for FieldRef {}

#[derive(Debug)]
struct BoxClass {
    class: StaticRef,
    value_of: MethodRef,
    unbox: MethodRef,
}

/// Classes and member IDs the JNI heap needs, resolved once.
#[derive(Debug)]
pub struct WellKnownClasses {
    object: StaticRef,
    method: StaticRef,
    constructor: StaticRef,
    null_pointer: StaticRef,
    art_method: FieldRef,
    boxes: Vec<BoxClass>,
}

impl WellKnownClasses {
    /// Class holding the method-record pointer of reflected methods.
    pub const REFLECT_HOLDER: &'static str = "java/lang/reflect/AbstractMethod";
    /// Field on [`Self::REFLECT_HOLDER`] storing the record address.
    pub const ART_METHOD_FIELD: &'static str = "artMethod";

    pub fn resolve(env: &JniEnv) -> Result<Self> {
        let object = global_class(env, "java/lang/Object")?;
        let method = global_class(env, "java/lang/reflect/Method")?;
        let constructor = global_class(env, "java/lang/reflect/Constructor")?;
        let null_pointer = global_class(env, "java/lang/NullPointerException")?;

        let holder = LocalRef::new(env, find_class(env, Self::REFLECT_HOLDER)?);
        let art_method = env
            .get_field_id(holder.get(), Self::ART_METHOD_FIELD, "J")
            .ok_or_else(|| {
                env.exception_clear();
                HookError::MethodNotFound {
                    class: Self::REFLECT_HOLDER.to_string(),
                    name: Self::ART_METHOD_FIELD.to_string(),
                    signature: "J".to_string(),
                }
            })?;

        let mut boxes = Vec::with_capacity(TypeTag::PRIMITIVES.len());
        for tag in TypeTag::PRIMITIVES {
            let (Some(name), Some(value_of_sig), Some((unbox_name, unbox_sig))) =
                (tag.wrapper_class(), tag.value_of_signature(), tag.unbox_method())
            else {
                continue;
            };
            let class = global_class(env, name)?;
            let value_of = static_method(env, class, name, "valueOf", value_of_sig)?;
            let unbox = instance_method(env, class, name, unbox_name, unbox_sig)?;
            boxes.push(BoxClass { class, value_of, unbox });
        }

        Ok(WellKnownClasses {
            object,
            method,
            constructor,
            null_pointer,
            art_method: FieldRef(art_method),
            boxes,
        })
    }

    fn box_class(&self, tag: TypeTag) -> Option<&BoxClass> {
        let index = TypeTag::PRIMITIVES.iter().position(|t| *t == tag)?;
        self.boxes.get(index)
    }

    pub fn object_class(&self) -> jni::jclass {
        self.object.get()
    }
}

fn find_class(env: &JniEnv, name: &str) -> Result<jni::jclass> {
    env.find_class(name).ok_or_else(|| {
        env.exception_clear();
        HookError::ClassNotFound(name.to_string())
    })
}

fn global_class(env: &JniEnv, name: &str) -> Result<StaticRef> {
    let local = LocalRef::new(env, find_class(env, name)?);
    Ok(unsafe { StaticRef::from_raw(env.new_global_ref(local.get())) })
}

fn static_method(env: &JniEnv, class: StaticRef, class_name: &str, name: &str, sig: &str) -> Result<MethodRef> {
    env.get_static_method_id(class.get(), name, sig)
        .map(|id| unsafe { MethodRef::from_raw(id) })
        .ok_or_else(|| missing_method(env, class_name, name, sig))
}

fn instance_method(env: &JniEnv, class: StaticRef, class_name: &str, name: &str, sig: &str) -> Result<MethodRef> {
    env.get_method_id(class.get(), name, sig)
        .map(|id| unsafe { MethodRef::from_raw(id) })
        .ok_or_else(|| missing_method(env, class_name, name, sig))
}

fn missing_method(env: &JniEnv, class: &str, name: &str, sig: &str) -> HookError {
    env.exception_clear();
    HookError::MethodNotFound {
        class: class.to_string(),
        name: name.to_string(),
        signature: sig.to_string(),
    }
}

/// [`Heap`] over a thread's JNI environment.
pub struct JniHeap<'a> {
    env: JniEnv,
    classes: &'a WellKnownClasses,
}

impl<'a> JniHeap<'a> {
    pub fn new(env: JniEnv, classes: &'a WellKnownClasses) -> Self {
        JniHeap { env, classes }
    }

    pub fn env(&self) -> &JniEnv {
        &self.env
    }

    fn describe(&self, obj: jni::jobject) -> String {
        if obj.is_null() {
            return "null".to_string();
        }
        TypeTag::PRIMITIVES
            .iter()
            .zip(&self.classes.boxes)
            .find(|(_, b)| self.env.is_instance_of(obj, b.class.get()))
            .map(|(tag, _)| format!("boxed {tag}"))
            .unwrap_or_else(|| "a non-wrapper object".to_string())
    }
}

impl Heap for JniHeap<'_> {
    fn exception_pending(&self) -> bool {
        self.env.exception_check()
    }

    fn box_value(&self, value: Value) -> Option<jni::jobject> {
        let boxed = self.classes.box_class(value.tag())?;
        let obj = self
            .env
            .call_static_object_method(boxed.class.get(), boxed.value_of.get(), &[value.to_jvalue()]);
        if obj.is_null() { None } else { Some(obj) }
    }

    fn unbox_value(&self, obj: jni::jobject, tag: TypeTag) -> Result<Value> {
        let mismatch = || HookError::TypeMismatch { expected: tag, found: self.describe(obj) };
        let boxed = self.classes.box_class(tag).ok_or_else(mismatch)?;
        if obj.is_null() || !self.env.is_instance_of(obj, boxed.class.get()) {
            return Err(mismatch());
        }

        let env = &self.env;
        let mid = boxed.unbox.get();
        let value = match tag {
            TypeTag::Boolean => Value::Boolean(env.call_boolean_method(obj, mid, &[]) != 0),
            TypeTag::Byte => Value::Byte(env.call_byte_method(obj, mid, &[])),
            TypeTag::Char => Value::Char(env.call_char_method(obj, mid, &[])),
            TypeTag::Short => Value::Short(env.call_short_method(obj, mid, &[])),
            TypeTag::Int => Value::Int(env.call_int_method(obj, mid, &[])),
            TypeTag::Long => Value::Long(env.call_long_method(obj, mid, &[])),
            TypeTag::Float => Value::Float(env.call_float_method(obj, mid, &[])),
            TypeTag::Double => Value::Double(env.call_double_method(obj, mid, &[])),
            TypeTag::Void | TypeTag::Reference => return Err(mismatch()),
        };
        Ok(value)
    }

    fn throw_null_pointer(&self, message: &str) {
        if !self.env.throw_new(self.classes.null_pointer.get(), message) {
            warn!("could not raise NullPointerException: {message}");
        }
    }

    fn new_object_array(&self, len: usize) -> Option<jni::jobjectArray> {
        self.env
            .new_object_array(len as jni::jsize, self.classes.object_class(), std::ptr::null_mut())
    }

    fn array_length(&self, array: jni::jobjectArray) -> usize {
        self.env.get_array_length(array).max(0) as usize
    }

    fn array_element(&self, array: jni::jobjectArray, index: usize) -> jni::jobject {
        self.env.get_object_array_element(array, index as jni::jsize)
    }

    fn set_array_element(&self, array: jni::jobjectArray, index: usize, value: jni::jobject) {
        self.env.set_object_array_element(array, index as jni::jsize, value);
    }

    fn from_reflected_method(&self, reflected: jni::jobject) -> Option<MethodId> {
        self.env
            .from_reflected_method(reflected)
            .map(|mid| MethodId::from_ptr(mid as *const c_void))
    }

    fn reflect_method(&self, method: MethodId, is_constructor: bool) -> Option<jni::jobject> {
        let class = if is_constructor { &self.classes.constructor } else { &self.classes.method };
        let obj = self.env.alloc_object(class.get())?;
        self.env.set_long_field(obj, self.classes.art_method.0, method.0 as jni::jlong);
        Some(obj)
    }

    fn new_static_ref(&self, obj: jni::jobject) -> StaticRef {
        if obj.is_null() {
            return StaticRef::null();
        }
        unsafe { StaticRef::from_raw(self.env.new_global_ref(obj)) }
    }

    fn call_static_object_method(
        &self,
        class: jni::jclass,
        method: jni::jmethodID,
        args: &[jni::jvalue],
    ) -> jni::jobject {
        self.env.call_static_object_method(class, method, args)
    }
}
