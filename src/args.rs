//! Argument capture and argument arrays.
//!
//! Two layouts matter to the interception core:
//!
//! - the **quick frame**: the register spill area the trampoline stub builds
//!   on entry, split into general-purpose and floating-point register saves
//!   plus the caller's outgoing stack arguments. Its shape depends on the
//!   target architecture and is described by a [`QuickFrameLayout`].
//! - the **argument array** ([`RawArgumentBuffer`]): the flat sequence of
//!   32-bit slots the runtime's invoke path consumes, receiver first, wide
//!   values spanning two slots.
//!
//! Both are read through the [`ArgumentVisitor`] capability, so the rest of
//! the core sees a uniform sequence of typed slots.

use crate::shorty::{TypeDescriptor, TypeTag};
use crate::value::{RawObject, Value};

/// One incoming argument as captured from the calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawArg {
    pub tag: TypeTag,
    pub bits: u64,
}

impl RawArg {
    /// The compressed reference held by a reference argument.
    pub fn as_object(&self) -> RawObject {
        RawObject(self.bits as u32)
    }

    /// The typed value of a primitive argument.
    pub fn as_value(&self) -> Option<Value> {
        Value::from_bits(self.tag, self.bits)
    }
}

/// Walks the arguments of one call in calling-convention order.
///
/// Implemented once per argument layout. The receiver of an instance method
/// is visited first, tagged as a reference.
pub trait ArgumentVisitor {
    fn visit_arguments(
        &mut self,
        is_static: bool,
        descriptor: &TypeDescriptor,
        visit: &mut dyn FnMut(RawArg),
    );

    /// Writes possibly relocated references back to the slots they were read
    /// from, in visit order. Layouts that are not observed by the caller
    /// after the call can ignore this.
    fn fixup_references(&mut self, _updated: &[RawObject]) {}
}

// =============================================================================
// RawArgumentBuffer
// =============================================================================

/// A flat array of 32-bit argument slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArgumentBuffer {
    slots: Vec<u32>,
}

impl RawArgumentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(slots: usize) -> Self {
        RawArgumentBuffer { slots: Vec::with_capacity(slots) }
    }

    pub fn push_int(&mut self, value: i32) {
        self.slots.push(value as u32);
    }

    pub fn push_float(&mut self, value: f32) {
        self.slots.push(value.to_bits());
    }

    pub fn push_long(&mut self, value: i64) {
        self.push_wide(value as u64);
    }

    pub fn push_double(&mut self, value: f64) {
        self.push_wide(value.to_bits());
    }

    pub fn push_object(&mut self, obj: RawObject) {
        self.slots.push(obj.0);
    }

    /// Appends a primitive value using its natural slot layout.
    pub fn push_value(&mut self, value: Value) {
        match value {
            Value::Boolean(z) => self.push_int(z as i32),
            Value::Byte(b) => self.push_int(b as i32),
            Value::Char(c) => self.push_int(c as i32),
            Value::Short(s) => self.push_int(s as i32),
            Value::Int(i) => self.push_int(i),
            Value::Long(j) => self.push_long(j),
            Value::Float(f) => self.push_float(f),
            Value::Double(d) => self.push_double(d),
        }
    }

    fn push_wide(&mut self, bits: u64) {
        self.slots.push(bits as u32);
        self.slots.push((bits >> 32) as u32);
    }

    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn num_bytes(&self) -> usize {
        self.slots.len() * std::mem::size_of::<u32>()
    }

    pub fn as_ptr(&self) -> *const u32 {
        self.slots.as_ptr()
    }
}

impl ArgumentVisitor for RawArgumentBuffer {
    fn visit_arguments(
        &mut self,
        is_static: bool,
        descriptor: &TypeDescriptor,
        visit: &mut dyn FnMut(RawArg),
    ) {
        let mut next = 0;
        if !is_static {
            visit(RawArg { tag: TypeTag::Reference, bits: self.slots[0] as u64 });
            next = 1;
        }
        for &tag in descriptor.params() {
            let bits = if tag.is_wide() {
                let lo = self.slots[next] as u64;
                let hi = self.slots[next + 1] as u64;
                lo | (hi << 32)
            } else {
                self.slots[next] as u64
            };
            next += tag.slot_count();
            visit(RawArg { tag, bits });
        }
    }
}

// =============================================================================
// Quick frames
// =============================================================================

/// Shape of the callee-save frame the trampoline stub spills arguments into.
///
/// Offsets are from the frame's stack pointer, which holds the method
/// pointer. Outgoing stack arguments start right after the frame and the
/// caller's method pointer slot, one 32-bit slot per argument word.
///
/// `gpr_offsets` maps the n-th argument register to its spill slot relative
/// to `gpr1_offset`. The stub saves registers in encoding order, which is not
/// argument order on every architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickFrameLayout {
    pub frame_size: usize,
    pub gpr_args: usize,
    pub fpr_args: usize,
    pub gpr1_offset: usize,
    pub fpr1_offset: usize,
    pub gpr_offsets: &'static [usize],
    pub fpr_size: usize,
    pub method_pointer_size: usize,
}

impl QuickFrameLayout {
    /// AArch64: x1-x7 and d0-d7 carry arguments.
    pub const ARM64: QuickFrameLayout = QuickFrameLayout {
        frame_size: 224,
        gpr_args: 7,
        fpr_args: 8,
        gpr1_offset: 80,
        fpr1_offset: 16,
        gpr_offsets: &[0, 8, 16, 24, 32, 40, 48],
        fpr_size: 8,
        method_pointer_size: 8,
    };

    /// x86-64: rsi, rdx, rcx, r8, r9 and xmm0-xmm7 carry arguments.
    ///
    /// The spill area holds rcx, rdx, rbx, rbp, rsi, r8, r9 from low to high.
    pub const X86_64: QuickFrameLayout = QuickFrameLayout {
        frame_size: 208,
        gpr_args: 5,
        fpr_args: 8,
        gpr1_offset: 80,
        fpr1_offset: 16,
        gpr_offsets: &[32, 8, 0, 40, 48],
        fpr_size: 8,
        method_pointer_size: 8,
    };

    /// The preset for the architecture this crate is compiled for.
    pub fn native() -> Option<QuickFrameLayout> {
        if cfg!(target_arch = "aarch64") {
            Some(Self::ARM64)
        } else if cfg!(target_arch = "x86_64") {
            Some(Self::X86_64)
        } else {
            None
        }
    }

    /// Frame offset of the `index`-th argument register.
    pub fn gpr_offset(&self, index: usize) -> usize {
        self.gpr1_offset + self.gpr_offsets[index]
    }

    pub fn stack_args_offset(&self) -> usize {
        self.frame_size + self.method_pointer_size
    }

    /// Bytes from the frame's stack pointer to the end of the outgoing arguments.
    pub fn span(&self, is_static: bool, descriptor: &TypeDescriptor) -> usize {
        self.stack_args_offset() + descriptor.slot_count(is_static) * 4
    }
}

/// Reads arguments out of a quick frame.
pub struct QuickFrameVisitor<'a> {
    frame: &'a mut [u8],
    layout: QuickFrameLayout,
    ref_offsets: Vec<usize>,
}

impl<'a> QuickFrameVisitor<'a> {
    /// Wraps a frame already available as bytes.
    ///
    /// The slice must start at the frame's stack pointer and cover at least
    /// [`QuickFrameLayout::span`] bytes.
    pub fn new(frame: &'a mut [u8], layout: QuickFrameLayout) -> Self {
        QuickFrameVisitor { frame, layout, ref_offsets: Vec::new() }
    }

    /// Wraps the live frame at `sp`.
    ///
    /// # Safety
    ///
    /// `sp` must point at a quick frame of `layout` for a method described by
    /// `descriptor`, valid for reads and writes while the visitor lives.
    pub unsafe fn from_sp(
        sp: *mut u8,
        layout: QuickFrameLayout,
        is_static: bool,
        descriptor: &TypeDescriptor,
    ) -> Self {
        let len = layout.span(is_static, descriptor);
        let frame = std::slice::from_raw_parts_mut(sp, len);
        QuickFrameVisitor::new(frame, layout)
    }

    fn read_u32(&self, offset: usize) -> u64 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.frame[offset..offset + 4]);
        u32::from_le_bytes(buf) as u64
    }

    fn read_u64(&self, offset: usize) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.frame[offset..offset + 8]);
        u64::from_le_bytes(buf)
    }
}

impl ArgumentVisitor for QuickFrameVisitor<'_> {
    fn visit_arguments(
        &mut self,
        is_static: bool,
        descriptor: &TypeDescriptor,
        visit: &mut dyn FnMut(RawArg),
    ) {
        let layout = self.layout;
        let stack_args = layout.stack_args_offset();
        let mut gpr_index = 0;
        let mut fpr_index = 0;
        // Every argument owns a stack slot, even when passed in a register.
        let mut stack_index = 0;
        self.ref_offsets.clear();

        let receiver = (!is_static).then_some(TypeTag::Reference);
        for tag in receiver.into_iter().chain(descriptor.params().iter().copied()) {
            let stack_offset = stack_args + stack_index * 4;
            let offset = match tag {
                TypeTag::Float | TypeTag::Double if fpr_index < layout.fpr_args => {
                    fpr_index += 1;
                    layout.fpr1_offset + (fpr_index - 1) * layout.fpr_size
                }
                TypeTag::Float | TypeTag::Double => stack_offset,
                _ if gpr_index < layout.gpr_args => {
                    gpr_index += 1;
                    layout.gpr_offset(gpr_index - 1)
                }
                _ => stack_offset,
            };
            stack_index += tag.slot_count();

            let bits = if tag.is_wide() { self.read_u64(offset) } else { self.read_u32(offset) };
            if tag == TypeTag::Reference {
                self.ref_offsets.push(offset);
            }
            visit(RawArg { tag, bits });
        }
    }

    fn fixup_references(&mut self, updated: &[RawObject]) {
        for (&offset, obj) in self.ref_offsets.iter().zip(updated) {
            self.frame[offset..offset + 4].copy_from_slice(&obj.0.to_le_bytes());
        }
    }
}
