//! Foreign method and class binding through the bridge

use std::os::raw::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

use wrenlink_core::sdk::{ErrorKind, ForeignClassMethods, ForeignMethodFn, InterpretResult, MethodKey};
use wrenlink_core::{BridgeConfig, VmHooks};

use crate::harness::Fixture;

#[test]
fn test_registered_static_method_is_called() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    unsafe extern "C" fn add(_vm: *mut c_void) {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let fx = Fixture::new(BridgeConfig::default(), None);
    let vm = fx.vm();
    fx.host
        .add_foreign_method(vm, MethodKey::new("main", "Math", true, "add(_,_)"), add)
        .unwrap();

    let result = fx
        .bridge
        .interpret(vm, "main", "call main Math static add(_,_)\ncall main Math static add(_,_)")
        .unwrap();

    assert_eq!(result, InterpretResult::Success);
    assert_eq!(CALLS.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unregistered_method_raises_runtime_error() {
    let fx = Fixture::new(BridgeConfig::default(), None);
    let vm = fx.vm();

    assert!(fx
        .bridge
        .bind_foreign_method(vm, "main", "Math", true, "sub(_,_)")
        .is_none());

    let result = fx
        .bridge
        .interpret(vm, "main", "print start\ncall main Math static sub(_,_)")
        .unwrap();

    assert_eq!(result, InterpretResult::RuntimeError);
    assert_eq!(fx.output(), "start\n");
    let errors = fx.errors();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].kind(), Some(ErrorKind::Runtime));
    assert_eq!(errors[0].line(), None);
    assert_eq!(errors[1].kind(), Some(ErrorKind::StackTrace));
    assert_eq!(errors[1].line(), Some(2));
}

#[test]
fn test_static_and_instance_are_distinct() {
    unsafe extern "C" fn length(_vm: *mut c_void) {}

    let fx = Fixture::new(BridgeConfig::default(), None);
    let vm = fx.vm();
    fx.host
        .add_foreign_method(vm, MethodKey::new("main", "Str", false, "length"), length)
        .unwrap();

    assert!(fx.bridge.bind_foreign_method(vm, "main", "Str", false, "length").is_some());
    assert!(fx.bridge.bind_foreign_method(vm, "main", "Str", true, "length").is_none());
    assert!(fx.bridge.bind_foreign_method(vm, "other", "Str", false, "length").is_none());
}

#[test]
fn test_methods_are_per_vm() {
    unsafe extern "C" fn now(_vm: *mut c_void) {}

    let fx = Fixture::new(BridgeConfig::default(), None);
    let (a, b) = (fx.vm(), fx.vm());
    fx.host
        .add_foreign_class_methods(a, "clock", "Clock", [(true, "now", now as ForeignMethodFn)])
        .unwrap();

    assert!(fx.bridge.bind_foreign_method(a, "clock", "Clock", true, "now").is_some());
    assert!(fx.bridge.bind_foreign_method(b, "clock", "Clock", true, "now").is_none());
}

#[test]
fn test_foreign_class_allocator_and_finalizer() {
    static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
    static FINALIZED: AtomicUsize = AtomicUsize::new(0);
    unsafe extern "C" fn allocate(_vm: *mut c_void) {
        ALLOCATED.fetch_add(1, Ordering::SeqCst);
    }
    unsafe extern "C" fn finalize(_data: *mut c_void) {
        FINALIZED.fetch_add(1, Ordering::SeqCst);
    }

    let fx = Fixture::new(BridgeConfig::default(), None);
    let vm = fx.vm();
    fx.host
        .add_foreign_class(
            vm,
            "io",
            "File",
            ForeignClassMethods {
                allocate: Some(allocate),
                finalize: Some(finalize),
            },
        )
        .unwrap();

    let result = fx.bridge.interpret(vm, "main", "new io File").unwrap();
    assert_eq!(result, InterpretResult::Success);
    assert_eq!(ALLOCATED.load(Ordering::SeqCst), 1);
    assert_eq!(FINALIZED.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unknown_class_has_no_methods() {
    let fx = Fixture::new(BridgeConfig::default(), None);
    let vm = fx.vm();

    let methods = fx.bridge.bind_foreign_class(vm, "io", "Socket");
    assert!(methods.allocate.is_none());
    assert!(methods.finalize.is_none());

    // A class with no custom behavior still instantiates
    let result = fx.bridge.interpret(vm, "main", "new io Socket").unwrap();
    assert_eq!(result, InterpretResult::Success);
}

#[test]
fn test_allocator_without_finalizer() {
    unsafe extern "C" fn allocate(_vm: *mut c_void) {}

    let fx = Fixture::new(BridgeConfig::default(), None);
    let vm = fx.vm();
    fx.host
        .add_foreign_class(
            vm,
            "io",
            "Buffer",
            ForeignClassMethods {
                allocate: Some(allocate),
                finalize: None,
            },
        )
        .unwrap();

    let methods = fx.bridge.bind_foreign_class(vm, "io", "Buffer");
    assert!(methods.allocate.is_some());
    assert!(methods.finalize.is_none());
}
