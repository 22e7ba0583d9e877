#![allow(dead_code)]

//! In-process fake host for the integration tests.
//!
//! Method records are real byte buffers accessed through `MethodLayout`, so
//! installation, copying and slot repurposing run the same code as on a
//! device. Objects live in a table indexed by their raw reference; local and
//! global references are indices into separate tables, so a relocation is
//! observable the way a moving collector's would be.

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::{Arc, Mutex, MutexGuard};

use arthook::args::{QuickFrameLayout, RawArgumentBuffer};
use arthook::env::StaticRef;
use arthook::error::{HookError, Result};
use arthook::handler::{HookHandler, HookedCall};
use arthook::heap::Heap;
use arthook::method_layout::MethodLayout;
use arthook::runtime::{AccessFlags, DispatchMode, EntryPoint, MethodId, Runtime};
use arthook::shorty::{TypeDescriptor, TypeTag};
use arthook::sys::jni;
use arthook::value::{RawObject, Value};
use arthook::{Bridge, BridgeConfig};

pub const LAYOUT: MethodLayout = MethodLayout {
    size: 32,
    access_flags_offset: 0,
    native_data_offset: 8,
    entry_point_offset: 16,
};

/// Index into `World::methods`, stored in the record so copies keep it.
const INFO_OFFSET: usize = 4;

pub const TRAMPOLINE: EntryPoint = EntryPoint(0x7ead_0000);

const LOCAL_BASE: usize = 0x10_0000;
const GLOBAL_BASE: usize = 0x20_0000;

pub type Body = Arc<dyn Fn(&FakeHeap, &[u32]) -> u64 + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum FakeObject {
    Boxed(Value),
    Array(Vec<RawObject>),
    Plain(String),
    Reflected { method: MethodId, constructor: bool },
    Throwable(String),
    /// Left behind at the old address by `World::relocate`.
    Moved,
}

pub struct MethodInfo {
    pub name: String,
    pub shorty: String,
    pub overridden: Option<MethodId>,
}

#[derive(Default)]
pub struct World {
    pub objects: Vec<FakeObject>,
    pub locals: Vec<RawObject>,
    pub globals: Vec<RawObject>,
    pub exception: Option<RawObject>,
    pub fail_allocations: bool,
    pub target_sdk: i32,
    pub no_suspension: usize,
    /// Allocations attempted while suspension was disallowed.
    pub violations: Vec<String>,
    pub top_of_stack: usize,
    pub methods: Vec<MethodInfo>,
    pub bodies: HashMap<usize, Body>,
    pub invocations: Vec<(MethodId, DispatchMode)>,
    pub trampoline_reentries: usize,
    pub copies: usize,
    pub released: usize,
    pub shorty_reads: usize,
}

impl World {
    pub fn alloc(&mut self, obj: FakeObject) -> RawObject {
        if self.no_suspension > 0 {
            self.violations.push(format!("allocated {obj:?}"));
        }
        self.objects.push(obj);
        RawObject(self.objects.len() as u32)
    }

    pub fn object(&self, raw: RawObject) -> &FakeObject {
        &self.objects[raw.0 as usize - 1]
    }

    pub fn object_mut(&mut self, raw: RawObject) -> &mut FakeObject {
        &mut self.objects[raw.0 as usize - 1]
    }

    pub fn add_local(&mut self, raw: RawObject) -> jni::jobject {
        if raw.is_null() {
            return std::ptr::null_mut();
        }
        self.locals.push(raw);
        (LOCAL_BASE + self.locals.len() - 1) as jni::jobject
    }

    pub fn add_global(&mut self, raw: RawObject) -> jni::jobject {
        if raw.is_null() {
            return std::ptr::null_mut();
        }
        self.globals.push(raw);
        (GLOBAL_BASE + self.globals.len() - 1) as jni::jobject
    }

    pub fn decode(&self, obj: jni::jobject) -> RawObject {
        let handle = obj as usize;
        if handle == 0 {
            RawObject::NULL
        } else if handle >= GLOBAL_BASE {
            self.globals[handle - GLOBAL_BASE]
        } else {
            assert!(handle - LOCAL_BASE < self.locals.len(), "stale local reference {handle:#x}");
            self.locals[handle - LOCAL_BASE]
        }
    }

    /// Moves an object the way a compacting collector would, updating every
    /// local and global reference to it.
    pub fn relocate(&mut self, raw: RawObject) -> RawObject {
        let obj = std::mem::replace(self.object_mut(raw), FakeObject::Moved);
        self.objects.push(obj);
        let moved = RawObject(self.objects.len() as u32);
        for slot in self.locals.iter_mut().chain(self.globals.iter_mut()) {
            if *slot == raw {
                *slot = moved;
            }
        }
        moved
    }

    pub fn throw(&mut self, message: &str) -> RawObject {
        let raw = self.alloc(FakeObject::Throwable(message.to_string()));
        self.exception = Some(raw);
        raw
    }

    fn describe(&self, raw: RawObject) -> String {
        if raw.is_null() {
            return "null".to_string();
        }
        match self.object(raw) {
            FakeObject::Boxed(v) => format!("boxed {}", v.tag()),
            other => format!("{other:?}"),
        }
    }
}

pub type SharedWorld = Arc<Mutex<World>>;

// =============================================================================
// FakeRuntime
// =============================================================================

#[derive(Clone)]
pub struct FakeRuntime {
    world: SharedWorld,
}

impl FakeRuntime {
    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap()
    }

    fn info_index(&self, method: MethodId) -> usize {
        unsafe { std::ptr::read((method.0 + INFO_OFFSET) as *const u32) as usize }
    }
}

impl Runtime for FakeRuntime {
    fn shorty(&self, method: MethodId) -> String {
        let index = self.info_index(method);
        let mut world = self.world();
        world.shorty_reads += 1;
        world.methods[index].shorty.clone()
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
        self.world().copies += 1;
        unsafe { LAYOUT.copy(method) }
    }

    fn release_method_copy(&self, copy: MethodId) {
        self.world().released += 1;
        unsafe { LAYOUT.release(copy) }
    }

    fn find_overridden_method(&self, method: MethodId) -> Option<MethodId> {
        self.world().methods[self.info_index(method)].overridden
    }

    fn pretty_method(&self, method: MethodId) -> String {
        self.world().methods[self.info_index(method)].name.clone()
    }

    fn trampoline_entry(&self) -> EntryPoint {
        TRAMPOLINE
    }

    fn frame_layout(&self) -> QuickFrameLayout {
        QuickFrameLayout::ARM64
    }

    fn jni_env(&self, _thread: *mut c_void) -> *mut jni::JNIEnv {
        std::ptr::null_mut()
    }

    fn target_sdk_version(&self) -> i32 {
        self.world().target_sdk
    }

    fn start_no_suspension(&self, _cause: &'static str) -> usize {
        let mut world = self.world();
        world.no_suspension += 1;
        world.no_suspension
    }

    fn end_no_suspension(&self, token: usize) {
        let mut world = self.world();
        assert_eq!(world.no_suspension, token, "unbalanced no-suspension region");
        world.no_suspension -= 1;
    }

    fn set_top_of_stack(&self, sp: *mut c_void) {
        self.world().top_of_stack = sp as usize;
    }

    fn local_ref_cookie(&self) -> u32 {
        self.world().locals.len() as u32
    }

    fn restore_local_ref_cookie(&self, cookie: u32) {
        self.world().locals.truncate(cookie as usize);
    }

    fn add_local_reference(&self, obj: RawObject) -> jni::jobject {
        self.world().add_local(obj)
    }

    fn decode_reference(&self, obj: jni::jobject) -> RawObject {
        self.world().decode(obj)
    }

    fn invoke(
        &self,
        method: MethodId,
        args: &RawArgumentBuffer,
        _descriptor: &TypeDescriptor,
        mode: DispatchMode,
    ) -> u64 {
        let entry = self.entry_point(method);
        let body = {
            let mut world = self.world();
            world.invocations.push((method, mode));
            if entry == TRAMPOLINE {
                world.trampoline_reentries += 1;
                return 0;
            }
            world.bodies.get(&entry.0).cloned()
        };
        let heap = FakeHeap { world: self.world.clone() };
        body.map(|body| body(&heap, args.slots())).unwrap_or(0)
    }
}

// =============================================================================
// FakeHeap
// =============================================================================

#[derive(Clone)]
pub struct FakeHeap {
    world: SharedWorld,
}

impl FakeHeap {
    pub fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap()
    }

    /// Allocates `obj` and returns a local reference to it.
    pub fn new_local(&self, obj: FakeObject) -> jni::jobject {
        let mut world = self.world();
        let raw = world.alloc(obj);
        world.add_local(raw)
    }

    pub fn boxed(&self, value: Value) -> jni::jobject {
        self.new_local(FakeObject::Boxed(value))
    }

    pub fn array(&self, elements: &[jni::jobject]) -> jni::jobject {
        let mut world = self.world();
        let raws = elements.iter().map(|&e| world.decode(e)).collect();
        let raw = world.alloc(FakeObject::Array(raws));
        world.add_local(raw)
    }

    pub fn throw(&self, message: &str) -> RawObject {
        self.world().throw(message)
    }

    pub fn object_of(&self, obj: jni::jobject) -> Option<FakeObject> {
        let world = self.world();
        let raw = world.decode(obj);
        (!raw.is_null()).then(|| world.object(raw).clone())
    }

    fn allocate(&self, obj: FakeObject) -> Option<jni::jobject> {
        let mut world = self.world();
        if world.fail_allocations {
            world.throw("java.lang.OutOfMemoryError");
            return None;
        }
        let raw = world.alloc(obj);
        Some(world.add_local(raw))
    }
}

impl Heap for FakeHeap {
    fn exception_pending(&self) -> bool {
        self.world().exception.is_some()
    }

    fn box_value(&self, value: Value) -> Option<jni::jobject> {
        self.allocate(FakeObject::Boxed(value))
    }

    fn unbox_value(&self, obj: jni::jobject, tag: TypeTag) -> Result<Value> {
        let world = self.world();
        let raw = world.decode(obj);
        match (!raw.is_null()).then(|| world.object(raw)) {
            Some(FakeObject::Boxed(value)) if value.tag() == tag => Ok(*value),
            _ => Err(HookError::TypeMismatch { expected: tag, found: world.describe(raw) }),
        }
    }

    fn throw_null_pointer(&self, _message: &str) {
        self.throw("java.lang.NullPointerException");
    }

    fn new_object_array(&self, len: usize) -> Option<jni::jobjectArray> {
        self.allocate(FakeObject::Array(vec![RawObject::NULL; len]))
    }

    fn array_length(&self, array: jni::jobjectArray) -> usize {
        let world = self.world();
        match world.object(world.decode(array)) {
            FakeObject::Array(elements) => elements.len(),
            other => panic!("not an array: {other:?}"),
        }
    }

    fn array_element(&self, array: jni::jobjectArray, index: usize) -> jni::jobject {
        let mut world = self.world();
        let element = match world.object(world.decode(array)) {
            FakeObject::Array(elements) => elements[index],
            other => panic!("not an array: {other:?}"),
        };
        world.add_local(element)
    }

    fn set_array_element(&self, array: jni::jobjectArray, index: usize, value: jni::jobject) {
        let mut world = self.world();
        let value = world.decode(value);
        let raw = world.decode(array);
        match world.object_mut(raw) {
            FakeObject::Array(elements) => elements[index] = value,
            other => panic!("not an array: {other:?}"),
        }
    }

    fn from_reflected_method(&self, reflected: jni::jobject) -> Option<MethodId> {
        match self.object_of(reflected)? {
            FakeObject::Reflected { method, .. } => Some(method),
            _ => None,
        }
    }

    fn reflect_method(&self, method: MethodId, is_constructor: bool) -> Option<jni::jobject> {
        self.allocate(FakeObject::Reflected { method, constructor: is_constructor })
    }

    fn new_static_ref(&self, obj: jni::jobject) -> StaticRef {
        let mut world = self.world();
        let raw = world.decode(obj);
        unsafe { StaticRef::from_raw(world.add_global(raw)) }
    }

    fn call_static_object_method(
        &self,
        _class: jni::jclass,
        _method: jni::jmethodID,
        _args: &[jni::jvalue],
    ) -> jni::jobject {
        std::ptr::null_mut()
    }
}

// =============================================================================
// RecordingHandler
// =============================================================================

/// One dispatch as the handler saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub reflected: Option<FakeObject>,
    pub marker: jni::jint,
    pub payload: Option<FakeObject>,
    pub receiver: RawObject,
    /// `None` when the handler got a null array.
    pub args: Option<Vec<Option<FakeObject>>>,
}

pub type Respond = Box<dyn Fn(&FakeHeap, &HookedCall) -> jni::jobject + Send + Sync>;

#[derive(Clone)]
pub struct RecordingHandler {
    heap: FakeHeap,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    respond: Arc<Mutex<Respond>>,
}

impl RecordingHandler {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn respond_with(&self, respond: impl Fn(&FakeHeap, &HookedCall) -> jni::jobject + Send + Sync + 'static) {
        *self.respond.lock().unwrap() = Box::new(respond);
    }
}

impl HookHandler for RecordingHandler {
    fn handle_hooked_method(&self, _heap: &dyn Heap, call: &HookedCall) -> jni::jobject {
        let recorded = {
            let world = self.heap.world();
            let object = |obj: jni::jobject| {
                let raw = world.decode(obj);
                (!raw.is_null()).then(|| world.object(raw).clone())
            };
            let args = (!call.args.is_null()).then(|| match world.object(world.decode(call.args)) {
                FakeObject::Array(elements) => elements
                    .iter()
                    .map(|&e| (!e.is_null()).then(|| world.object(e).clone()))
                    .collect(),
                other => panic!("handler got a non-array: {other:?}"),
            });
            RecordedCall {
                reflected: object(call.reflected_method),
                marker: call.marker,
                payload: object(call.payload),
                receiver: world.decode(call.receiver),
                args,
            }
        };
        self.calls.lock().unwrap().push(recorded);
        let respond = self.respond.lock().unwrap();
        (*respond)(&self.heap, call)
    }
}

// =============================================================================
// Fixture
// =============================================================================

pub struct Fixture {
    pub runtime: FakeRuntime,
    pub heap: FakeHeap,
    pub handler: RecordingHandler,
    pub bridge: Bridge,
    next_entry: Mutex<usize>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        let world: SharedWorld = Arc::new(Mutex::new(World::default()));
        let runtime = FakeRuntime { world: world.clone() };
        let heap = FakeHeap { world: world.clone() };
        let handler = RecordingHandler {
            heap: heap.clone(),
            calls: Arc::default(),
            respond: Arc::new(Mutex::new(Box::new(|_, _| std::ptr::null_mut()))),
        };
        let bridge = Bridge::new(Box::new(runtime.clone()), Box::new(handler.clone()), config);
        Fixture {
            runtime,
            heap,
            handler,
            bridge,
            next_entry: Mutex::new(0x1000),
        }
    }

    pub fn world(&self) -> MutexGuard<'_, World> {
        self.heap.world()
    }

    /// Defines a method record whose compiled code runs `body`.
    pub fn define_method(
        &self,
        name: &str,
        shorty: &str,
        flags: AccessFlags,
        body: impl Fn(&FakeHeap, &[u32]) -> u64 + Send + Sync + 'static,
    ) -> MethodId {
        let entry = {
            let mut next = self.next_entry.lock().unwrap();
            *next += 0x10;
            EntryPoint(*next)
        };
        let index = {
            let mut world = self.world();
            world.methods.push(MethodInfo {
                name: name.to_string(),
                shorty: shorty.to_string(),
                overridden: None,
            });
            world.bodies.insert(entry.0, Arc::new(body));
            world.methods.len() - 1
        };

        let method = LAYOUT.allocate();
        unsafe {
            std::ptr::write((method.0 + INFO_OFFSET) as *mut u32, index as u32);
            LAYOUT.set_access_flags(method, flags);
            LAYOUT.set_entry_point(method, entry);
        }
        method
    }

    pub fn set_overridden(&self, method: MethodId, ancestor: MethodId) {
        let index = unsafe { std::ptr::read((method.0 + INFO_OFFSET) as *const u32) as usize };
        self.world().methods[index].overridden = Some(ancestor);
    }

    /// A reflected `Method` for `method`, as a global reference.
    pub fn reflect(&self, method: MethodId) -> jni::jobject {
        let mut world = self.world();
        let raw = world.alloc(FakeObject::Reflected { method, constructor: false });
        world.add_global(raw)
    }

    pub fn hook(&self, method: MethodId, payload: &str) -> Result<&'static arthook::hook::HookRecord> {
        let reflected = self.reflect(method);
        let payload = self.heap.new_local(FakeObject::Plain(payload.to_string()));
        self.bridge.hook_method(&self.heap, reflected, payload)
    }

    /// Calls `method` the way compiled code would: through the trampoline
    /// when hooked, straight into its body otherwise.
    pub fn call(&self, method: MethodId, mut args: RawArgumentBuffer) -> Result<u64> {
        if self.bridge.is_hooked(method) {
            let mut sp = [0u8; 16];
            self.bridge.handle_invocation(&self.heap, method, sp.as_mut_ptr() as *mut c_void, &mut args)
        } else {
            let descriptor = TypeDescriptor::parse(&self.runtime.shorty(method))?;
            Ok(self.runtime.invoke(method, &args, &descriptor, DispatchMode::Virtual))
        }
    }

    pub fn object(&self, name: &str) -> RawObject {
        self.world().alloc(FakeObject::Plain(name.to_string()))
    }
}
