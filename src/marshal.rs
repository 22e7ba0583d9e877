//! Conversion between raw calling-convention values and boxed objects.
//!
//! Boxing runs on the way into the handler: every captured argument becomes
//! an element of an `Object[]`, primitives wrapped in their wrapper class.
//! Unboxing runs on the way out, and in reverse for the original/super
//! invoker, which rebuilds a [`RawArgumentBuffer`] from an `Object[]`.
//!
//! Boxing allocates, so it may suspend the thread. Callers must hold every
//! reference they need as a local reference before calling in here.

use crate::args::RawArgumentBuffer;
use crate::error::{HookError, Result};
use crate::heap::Heap;
use crate::runtime::{NoSuspension, Runtime};
use crate::shorty::{TypeDescriptor, TypeTag};
use crate::sys::jni;
use crate::value::{RawObject, Value};

/// A captured argument, safe to hold across suspension points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg {
    /// A local (or global) reference; may be null.
    Object(jni::jobject),
    Primitive(Value),
}

/// Whether a zero-argument call still gets a non-null, empty array.
///
/// Applies when the target SDK is known and at most `max_sdk`.
pub fn wants_empty_array(target_sdk: i32, max_sdk: i32) -> bool {
    target_sdk > 0 && target_sdk <= max_sdk
}

/// Boxes `args` into a fresh `Object[]`.
///
/// Returns `Ok(None)` when there is nothing to box and `force_array` is
/// unset. An allocation failure surfaces as [`HookError::ExceptionPending`].
pub fn box_arguments(heap: &dyn Heap, args: &[Arg], force_array: bool) -> Result<Option<jni::jobjectArray>> {
    if args.is_empty() && !force_array {
        return Ok(None);
    }

    let array = heap.new_object_array(args.len()).ok_or(HookError::ExceptionPending)?;
    for (index, arg) in args.iter().enumerate() {
        let element = match *arg {
            Arg::Object(obj) => obj,
            Arg::Primitive(value) => heap.box_value(value).ok_or(HookError::ExceptionPending)?,
        };
        heap.set_array_element(array, index, element);
    }
    Ok(Some(array))
}

/// A handler result after unboxing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReturnValue {
    Void,
    Object(jni::jobject),
    Primitive(Value),
}

impl ReturnValue {
    /// The bit pattern for the calling convention's result register.
    ///
    /// References are decoded to their raw form; null becomes zero.
    pub fn into_raw(self, runtime: &dyn Runtime) -> u64 {
        match self {
            ReturnValue::Void => 0,
            ReturnValue::Object(obj) => raw_ref(runtime, obj).0 as u64,
            ReturnValue::Primitive(value) => value.to_bits(),
        }
    }
}

/// Unboxes a handler result for a method returning `tag`.
///
/// References pass through untouched. A primitive return requires a wrapper
/// of exactly that type; anything else is [`HookError::TypeMismatch`]. A
/// null result leaves a `NullPointerException` pending and reports
/// [`HookError::ExceptionPending`], as unboxing null does in managed code.
pub fn unbox_result(heap: &dyn Heap, result: jni::jobject, tag: TypeTag) -> Result<ReturnValue> {
    match tag {
        TypeTag::Void => Ok(ReturnValue::Void),
        TypeTag::Reference => Ok(ReturnValue::Object(result)),
        _ if result.is_null() => {
            heap.throw_null_pointer(&format!("hooked method returned null for a {tag} result"));
            Err(HookError::ExceptionPending)
        }
        _ => heap.unbox_value(result, tag).map(ReturnValue::Primitive),
    }
}

/// Boxes the raw result of a direct invocation.
///
/// `void` yields null, references come back as a new local reference.
pub fn box_return(heap: &dyn Heap, runtime: &dyn Runtime, tag: TypeTag, bits: u64) -> Result<jni::jobject> {
    match tag {
        TypeTag::Void => Ok(std::ptr::null_mut()),
        TypeTag::Reference => Ok(local_ref(runtime, RawObject(bits as u32))),
        _ => {
            let value = Value::from_bits(tag, bits).ok_or_else(|| HookError::MalformedDescriptor(tag.to_string()))?;
            heap.box_value(value).ok_or(HookError::ExceptionPending)
        }
    }
}

/// Rebuilds the raw argument array for a direct invocation from an `Object[]`.
///
/// `receiver` is placed first for instance methods. A null `args` array
/// stands for zero arguments. Primitives are unboxed strictly first; the
/// references are decoded afterwards inside a no-suspension region so none
/// of them can move before the buffer is handed to the runtime.
pub fn build_argument_buffer(
    heap: &dyn Heap,
    runtime: &dyn Runtime,
    descriptor: &TypeDescriptor,
    receiver: Option<jni::jobject>,
    args: jni::jobjectArray,
) -> Result<RawArgumentBuffer> {
    let actual = if args.is_null() { 0 } else { heap.array_length(args) };
    let expected = descriptor.param_count();
    if actual != expected {
        return Err(HookError::ArgumentCount { expected, actual });
    }

    let mut unboxed = Vec::with_capacity(expected);
    for (index, &tag) in descriptor.params().iter().enumerate() {
        let element = heap.array_element(args, index);
        let arg = match tag {
            TypeTag::Reference => Arg::Object(element),
            _ => Arg::Primitive(heap.unbox_value(element, tag)?),
        };
        unboxed.push(arg);
    }

    let mut buffer = RawArgumentBuffer::with_capacity(descriptor.slot_count(receiver.is_none()));
    let region = NoSuspension::enter(runtime, "building argument array");
    if let Some(receiver) = receiver {
        buffer.push_object(raw_ref(runtime, receiver));
    }
    for arg in unboxed {
        match arg {
            Arg::Object(obj) => buffer.push_object(raw_ref(runtime, obj)),
            Arg::Primitive(value) => buffer.push_value(value),
        }
    }
    region.end();
    Ok(buffer)
}

/// Registers `obj` as a local reference. Null stays null.
pub(crate) fn local_ref(runtime: &dyn Runtime, obj: RawObject) -> jni::jobject {
    if obj.is_null() {
        std::ptr::null_mut()
    } else {
        runtime.add_local_reference(obj)
    }
}

/// The raw reference behind `obj`. Null stays null.
pub(crate) fn raw_ref(runtime: &dyn Runtime, obj: jni::jobject) -> RawObject {
    if obj.is_null() {
        RawObject::NULL
    } else {
        runtime.decode_reference(obj)
    }
}
