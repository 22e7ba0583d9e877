//! Invoking original and ancestor implementations.
//!
//! Both paths rebuild the raw argument array from the boxed `Object[]` the
//! caller supplies and run the resolved method with
//! [`DispatchMode::Direct`], so a hooked method's backup runs exactly the
//! code it was copied with.

use log::{debug, warn};

use crate::bridge::Bridge;
use crate::error::{HookError, Result};
use crate::heap::Heap;
use crate::marshal::{box_return, build_argument_buffer};
use crate::runtime::{AccessFlags, DispatchMode, MethodId};
use crate::shorty::TypeDescriptor;
use crate::sys::jni;

impl Bridge {
    /// Runs the method behind `reflected` itself, without the trampoline.
    ///
    /// `reflected` is normally the backup object handed to the handler.
    /// Passing a method that is currently hooked would re-enter the
    /// trampoline and is refused with [`HookError::ReentrantOriginal`].
    pub fn invoke_original(
        &self,
        heap: &dyn Heap,
        reflected: jni::jobject,
        receiver: jni::jobject,
        args: jni::jobjectArray,
    ) -> Result<jni::jobject> {
        let method = self.resolve_reflected(heap, reflected)?;
        let runtime = self.runtime();
        if self.is_hooked(method) {
            let pretty = runtime.pretty_method(method);
            warn!("refusing to invoke hooked {pretty} as the original");
            return Err(HookError::ReentrantOriginal(pretty));
        }
        debug!("invoke original {}", runtime.pretty_method(method));
        self.invoke_direct(heap, method, receiver, args)
    }

    /// Runs the implementation `reflected` overrides, on `receiver`.
    ///
    /// Resolution does not look at hooks: the ancestor body runs even when
    /// the overriding method is hooked.
    pub fn invoke_super(
        &self,
        heap: &dyn Heap,
        receiver: jni::jobject,
        args: jni::jobjectArray,
        reflected: jni::jobject,
    ) -> Result<jni::jobject> {
        let method = self.resolve_reflected(heap, reflected)?;
        let runtime = self.runtime();
        let Some(target) = runtime.find_overridden_method(method) else {
            let pretty = runtime.pretty_method(method);
            warn!("{pretty} overrides nothing, cannot invoke super");
            return Err(HookError::NoSuperMethod(pretty));
        };
        debug!("invoke super {} -> {}", runtime.pretty_method(method), runtime.pretty_method(target));
        self.invoke_direct(heap, target, receiver, args)
    }

    fn invoke_direct(
        &self,
        heap: &dyn Heap,
        method: MethodId,
        receiver: jni::jobject,
        args: jni::jobjectArray,
    ) -> Result<jni::jobject> {
        let runtime = self.runtime();
        let is_static = runtime.access_flags(method).contains(AccessFlags::STATIC);
        let descriptor = TypeDescriptor::parse(&runtime.shorty(method))?;
        let receiver = (!is_static).then_some(receiver);

        let buffer = build_argument_buffer(heap, runtime, &descriptor, receiver, args)?;
        let bits = runtime.invoke(method, &buffer, &descriptor, DispatchMode::Direct);
        if heap.exception_pending() {
            return Err(HookError::ExceptionPending);
        }
        box_return(heap, runtime, descriptor.return_type(), bits)
    }
}
