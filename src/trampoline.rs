//! The body of the shared trampoline.
//!
//! The assembly stub saves the argument registers into a quick frame and
//! calls [`crate::arthook_quick_invoke_handler`], which lands in
//! [`Bridge::handle_quick_invocation`]. From there on the call is handled in
//! two phases:
//!
//! - **capture**, with thread suspension disallowed: every reference
//!   argument (receiver included) is registered as a local reference before
//!   anything can allocate.
//! - **dispatch**: arguments are boxed, the handler runs, and its result is
//!   unboxed into the result register. Any of this may collect garbage.
//!
//! Afterwards the captured references are written back into the frame so a
//! moved object is seen at its new address by the caller.

use std::ffi::c_void;

use log::debug;

use crate::args::{ArgumentVisitor, QuickFrameVisitor};
use crate::bridge::Bridge;
use crate::error::{HookError, Result};
use crate::handler::{HookedCall, INVOCATION_KIND};
use crate::heap::Heap;
use crate::hook::HookRecord;
use crate::marshal::{box_arguments, local_ref, raw_ref, unbox_result, wants_empty_array, Arg};
use crate::runtime::{AccessFlags, LocalRefScope, MethodId, NoSuspension};
use crate::shorty::{TypeDescriptor, TypeTag};
use crate::sys::jni;
use crate::value::RawObject;

impl Bridge {
    /// Handles a call that entered the trampoline with its quick frame at `sp`.
    ///
    /// # Safety
    ///
    /// `sp` must point at the quick frame the stub built for `method`, laid
    /// out as [`Runtime::frame_layout`](crate::runtime::Runtime::frame_layout) describes.
    pub unsafe fn handle_quick_invocation(&self, heap: &dyn Heap, method: MethodId, sp: *mut c_void) -> Result<u64> {
        let runtime = self.runtime();
        let is_static = runtime.access_flags(method).contains(AccessFlags::STATIC);
        let descriptor = TypeDescriptor::parse(&runtime.shorty(method))?;
        let mut frame = QuickFrameVisitor::from_sp(sp as *mut u8, runtime.frame_layout(), is_static, &descriptor);
        self.handle_described(heap, method, sp, is_static, &descriptor, &mut frame)
    }

    /// Handles one call to a hooked method whose arguments `visitor` reads.
    ///
    /// Returns the raw result for the calling convention. A pending
    /// exception is reported as [`HookError::ExceptionPending`] and left in
    /// place for the caller.
    pub fn handle_invocation(
        &self,
        heap: &dyn Heap,
        method: MethodId,
        sp: *mut c_void,
        visitor: &mut dyn ArgumentVisitor,
    ) -> Result<u64> {
        let runtime = self.runtime();
        let is_static = runtime.access_flags(method).contains(AccessFlags::STATIC);
        let descriptor = TypeDescriptor::parse(&runtime.shorty(method))?;
        self.handle_described(heap, method, sp, is_static, &descriptor, visitor)
    }

    fn handle_described(
        &self,
        heap: &dyn Heap,
        method: MethodId,
        sp: *mut c_void,
        is_static: bool,
        descriptor: &TypeDescriptor,
        visitor: &mut dyn ArgumentVisitor,
    ) -> Result<u64> {
        let runtime = self.runtime();
        let _locals = LocalRefScope::enter(runtime);

        let region = NoSuspension::enter(runtime, "adding hooked method arguments to local references");
        runtime.set_top_of_stack(sp);

        let mut receiver: jni::jobject = std::ptr::null_mut();
        let mut args = Vec::with_capacity(descriptor.param_count());
        let mut refs = Vec::new();
        let mut pending_receiver = !is_static;
        visitor.visit_arguments(is_static, descriptor, &mut |raw| {
            if raw.tag == TypeTag::Reference {
                let local = local_ref(runtime, raw.as_object());
                refs.push(local);
                if pending_receiver {
                    pending_receiver = false;
                    receiver = local;
                } else {
                    args.push(Arg::Object(local));
                }
            } else if let Some(value) = raw.as_value() {
                args.push(Arg::Primitive(value));
            }
        });
        region.end();

        debug!(
            "trampoline entered for {} static={} shorty={} args={}",
            runtime.pretty_method(method),
            is_static,
            descriptor,
            args.len()
        );

        let result = self.store().record_for(runtime, method).and_then(|record| {
            self.dispatch(heap, record, receiver, &args, descriptor.return_type())
        });

        let updated: Vec<RawObject> = refs.iter().map(|&local| raw_ref(runtime, local)).collect();
        visitor.fixup_references(&updated);
        result
    }

    fn dispatch(
        &self,
        heap: &dyn Heap,
        record: &HookRecord,
        receiver: jni::jobject,
        args: &[Arg],
        return_type: TypeTag,
    ) -> Result<u64> {
        let runtime = self.runtime();
        let force_array = wants_empty_array(runtime.target_sdk_version(), self.config().legacy_empty_args_max_sdk);
        let boxed = box_arguments(heap, args, force_array)?;

        let call = HookedCall {
            reflected_method: record.reflected().get(),
            marker: INVOCATION_KIND,
            payload: record.payload().get(),
            receiver,
            args: boxed.unwrap_or(std::ptr::null_mut()),
        };
        let result = self.handler().handle_hooked_method(heap, &call);

        if heap.exception_pending() {
            return Err(HookError::ExceptionPending);
        }
        Ok(unbox_result(heap, result, return_type)?.into_raw(runtime))
    }
}
