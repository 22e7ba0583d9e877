mod support;

use arthook::error::HookError;
use arthook::heap::Heap;
use arthook::runtime::{AccessFlags, DispatchMode};
use arthook::value::{RawObject, Value};

use support::{FakeObject, Fixture};

fn static_() -> AccessFlags {
    AccessFlags::PUBLIC | AccessFlags::STATIC
}

#[test]
fn original_runs_the_backup_body_directly() {
    let fx = Fixture::new();
    let method = fx.define_method("Math.inc", "II", static_(), |_, slots| (slots[0] as i32 + 1) as i64 as u64);
    let record = fx.hook(method, "p").unwrap();

    for _ in 0..2 {
        let args = fx.heap.array(&[fx.heap.boxed(Value::Int(41))]);
        let result = fx.bridge.invoke_original(&fx.heap, record.reflected().get(), std::ptr::null_mut(), args).unwrap();
        assert_eq!(fx.heap.object_of(result), Some(FakeObject::Boxed(Value::Int(42))));
    }

    assert!(fx.handler.calls().is_empty());
    let world = fx.world();
    assert_eq!(world.trampoline_reentries, 0);
    assert_eq!(world.invocations, vec![(record.original(), DispatchMode::Direct); 2]);
}

#[test]
fn hooked_call_can_delegate_to_the_original() {
    let fx = Fixture::new();
    let method = fx.define_method("Math.twice", "JJ", static_(), |_, slots| {
        let value = slots[0] as u64 | (slots[1] as u64) << 32;
        (value as i64 * 2) as u64
    });
    fx.hook(method, "p").unwrap();

    let record = fx.bridge.store().lookup(method).unwrap();
    let backup = record.reflected().get() as usize;
    let heap = fx.heap.clone();
    let observed = std::sync::Arc::new(std::sync::Mutex::new(None));
    let seen = observed.clone();
    fx.handler.respond_with(move |h, call| {
        *seen.lock().unwrap() = Some((call.reflected_method as usize == backup, h.array_length(call.args)));
        heap.boxed(Value::Long(-1))
    });

    let mut args = arthook::args::RawArgumentBuffer::new();
    args.push_long(21);
    assert_eq!(fx.call(method, args).unwrap(), u64::MAX);
    assert_eq!(*observed.lock().unwrap(), Some((true, 1)));

    let args = fx.heap.array(&[fx.heap.boxed(Value::Long(21))]);
    let result = fx.bridge.invoke_original(&fx.heap, record.reflected().get(), std::ptr::null_mut(), args).unwrap();
    assert_eq!(fx.heap.object_of(result), Some(FakeObject::Boxed(Value::Long(42))));
}

#[test]
fn original_of_a_hooked_method_is_refused() {
    let fx = Fixture::new();
    let method = fx.define_method("Foo.bar", "V", static_(), |_, _| 0);
    fx.hook(method, "p").unwrap();

    let err = fx
        .bridge
        .invoke_original(&fx.heap, fx.reflect(method), std::ptr::null_mut(), std::ptr::null_mut())
        .unwrap_err();
    assert!(matches!(err, HookError::ReentrantOriginal(ref name) if name == "Foo.bar"));
    assert!(!err.is_fatal());
    assert!(fx.world().invocations.is_empty());
}

#[test]
fn original_of_an_unhooked_method_just_runs_it() {
    let fx = Fixture::new();
    let method = fx.define_method("Foo.answer", "I", static_(), |_, _| 42);
    let result = fx
        .bridge
        .invoke_original(&fx.heap, fx.reflect(method), std::ptr::null_mut(), std::ptr::null_mut())
        .unwrap();
    assert_eq!(fx.heap.object_of(result), Some(FakeObject::Boxed(Value::Int(42))));
}

#[test]
fn instance_original_gets_the_receiver_first() {
    let fx = Fixture::new();
    let receiver_raw = fx.object("this");
    let method = fx.define_method("Foo.pick", "LLI", AccessFlags::PUBLIC, move |heap, slots| {
        assert_eq!(RawObject(slots[0]), receiver_raw);
        assert_eq!(slots[2], 5);
        let world = heap.world();
        assert_eq!(world.object(RawObject(slots[1])), &FakeObject::Plain("arg".into()));
        slots[1] as u64
    });
    let record = fx.hook(method, "p").unwrap();

    let receiver = fx.world().add_local(receiver_raw);
    let arg = fx.heap.new_local(FakeObject::Plain("arg".into()));
    let args = fx.heap.array(&[arg, fx.heap.boxed(Value::Int(5))]);
    let result = fx.bridge.invoke_original(&fx.heap, record.reflected().get(), receiver, args).unwrap();
    assert_eq!(fx.heap.object_of(result), Some(FakeObject::Plain("arg".into())));
}

#[test]
fn super_runs_the_ancestor_even_when_hooked() {
    let fx = Fixture::new();
    let ancestor = fx.define_method("Base.name", "L", AccessFlags::PUBLIC, |heap, _| {
        let mut world = heap.world();
        world.alloc(FakeObject::Plain("base".into())).0 as u64
    });
    let method = fx.define_method("Derived.name", "L", AccessFlags::PUBLIC, |_, _| 0);
    fx.set_overridden(method, ancestor);
    fx.hook(method, "p").unwrap();

    let receiver = fx.heap.new_local(FakeObject::Plain("derived".into()));
    let result = fx.bridge.invoke_super(&fx.heap, receiver, std::ptr::null_mut(), fx.reflect(method)).unwrap();

    assert_eq!(fx.heap.object_of(result), Some(FakeObject::Plain("base".into())));
    assert!(fx.handler.calls().is_empty());
    let world = fx.world();
    assert_eq!(world.invocations, vec![(ancestor, DispatchMode::Direct)]);
    assert_eq!(world.trampoline_reentries, 0);
}

#[test]
fn super_without_an_ancestor_fails() {
    let fx = Fixture::new();
    let method = fx.define_method("Foo.toString", "L", AccessFlags::PUBLIC, |_, _| 0);
    let receiver = fx.heap.new_local(FakeObject::Plain("foo".into()));
    let err = fx.bridge.invoke_super(&fx.heap, receiver, std::ptr::null_mut(), fx.reflect(method)).unwrap_err();
    assert!(matches!(err, HookError::NoSuperMethod(ref name) if name == "Foo.toString"));
}

#[test]
fn arguments_are_checked_before_running() {
    let fx = Fixture::new();
    let method = fx.define_method("Foo.set", "VIZ", static_(), |_, _| 0);
    let reflected = fx.reflect(method);

    let args = fx.heap.array(&[fx.heap.boxed(Value::Int(1))]);
    let err = fx.bridge.invoke_original(&fx.heap, reflected, std::ptr::null_mut(), args).unwrap_err();
    assert!(matches!(err, HookError::ArgumentCount { expected: 2, actual: 1 }));
    assert!(err.is_fatal());

    let args = fx.heap.array(&[fx.heap.boxed(Value::Int(1)), fx.heap.boxed(Value::Int(0))]);
    let err = fx.bridge.invoke_original(&fx.heap, reflected, std::ptr::null_mut(), args).unwrap_err();
    assert!(matches!(err, HookError::TypeMismatch { .. }));

    assert!(fx.world().invocations.is_empty());
}

#[test]
fn exceptions_from_the_body_propagate() {
    let fx = Fixture::new();
    let method = fx.define_method("Foo.fail", "I", static_(), |heap, _| {
        heap.throw("java.io.IOException");
        0
    });
    let err = fx
        .bridge
        .invoke_original(&fx.heap, fx.reflect(method), std::ptr::null_mut(), std::ptr::null_mut())
        .unwrap_err();
    assert!(matches!(err, HookError::ExceptionPending));
    assert!(fx.heap.exception_pending());
}

#[test]
fn void_original_returns_null() {
    let fx = Fixture::new();
    let method = fx.define_method("Foo.run", "V", static_(), |_, _| 7);
    let result = fx
        .bridge
        .invoke_original(&fx.heap, fx.reflect(method), std::ptr::null_mut(), std::ptr::null_mut())
        .unwrap();
    assert!(result.is_null());
}

#[test]
fn null_or_foreign_method_objects_are_invalid() {
    let fx = Fixture::new();
    let null = std::ptr::null_mut();
    let err = fx.bridge.invoke_original(&fx.heap, null, null, null).unwrap_err();
    assert!(matches!(err, HookError::InvalidMethod));

    let plain = fx.heap.new_local(FakeObject::Plain("x".into()));
    let err = fx.bridge.invoke_super(&fx.heap, null, null, plain).unwrap_err();
    assert!(matches!(err, HookError::InvalidMethod));
}
