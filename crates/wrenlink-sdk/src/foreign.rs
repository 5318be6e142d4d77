//! Foreign binding types and registry
//!
//! A foreign binding is a native function (or a class allocate/finalize pair)
//! that backs a `foreign` declaration in script source. The VM asks for them by
//! (module, class, signature); the host answers with a function pointer that
//! the VM calls directly.

use std::collections::HashMap;
use std::os::raw::c_void;

use crate::error::{SdkError, SdkResult};

/// Native implementation of a foreign method or a foreign class allocator.
///
/// Called by the VM with its own VM pointer; arguments and results travel
/// through the VM's slot API.
pub type ForeignMethodFn = unsafe extern "C" fn(vm: *mut c_void);

/// Native finalizer for a foreign class instance.
///
/// Called with a pointer to the instance's foreign data when it is collected.
pub type FinalizerFn = unsafe extern "C" fn(data: *mut c_void);

/// Allocator/finalizer pair for a foreign class.
///
/// Layout-compatible with the VM's `WrenForeignClassMethods`; a `None` field
/// is a null pointer and means "no custom behavior".
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ForeignClassMethods {
    /// Called to allocate a new instance
    pub allocate: Option<ForeignMethodFn>,
    /// Called when an instance is collected
    pub finalize: Option<FinalizerFn>,
}

/// Lookup key for a foreign method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    /// Module the class is declared in
    pub module: String,
    /// Class the method belongs to
    pub class_name: String,
    /// Whether the method is declared `static`
    pub is_static: bool,
    /// Full signature, e.g. `add(_,_)`
    pub signature: String,
}

impl MethodKey {
    /// Create a new method key
    pub fn new(
        module: impl Into<String>,
        class_name: impl Into<String>,
        is_static: bool,
        signature: impl Into<String>,
    ) -> Self {
        MethodKey {
            module: module.into(),
            class_name: class_name.into(),
            is_static,
            signature: signature.into(),
        }
    }
}

/// Foreign methods and classes registered by a host for one VM.
#[derive(Debug, Default)]
pub struct ForeignRegistry {
    methods: HashMap<MethodKey, ForeignMethodFn>,
    classes: HashMap<(String, String), ForeignClassMethods>,
}

impl ForeignRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a foreign method.
    ///
    /// Registering the same key twice is an error; the first binding stays.
    pub fn add_method(&mut self, key: MethodKey, method: ForeignMethodFn) -> SdkResult<()> {
        if self.methods.contains_key(&key) {
            return Err(SdkError::DuplicateMethod {
                module: key.module,
                class_name: key.class_name,
                is_static: key.is_static,
                signature: key.signature,
            });
        }
        self.methods.insert(key, method);
        Ok(())
    }

    /// Register a foreign class's allocator and finalizer.
    pub fn add_class(
        &mut self,
        module: impl Into<String>,
        class_name: impl Into<String>,
        methods: ForeignClassMethods,
    ) -> SdkResult<()> {
        let key = (module.into(), class_name.into());
        if self.classes.contains_key(&key) {
            return Err(SdkError::DuplicateClass {
                module: key.0,
                class_name: key.1,
            });
        }
        self.classes.insert(key, methods);
        Ok(())
    }

    /// Look up a foreign method
    pub fn method(&self, key: &MethodKey) -> Option<ForeignMethodFn> {
        self.methods.get(key).copied()
    }

    /// Look up a foreign class's allocator
    pub fn allocator(&self, module: &str, class_name: &str) -> Option<ForeignMethodFn> {
        self.class(module, class_name).and_then(|c| c.allocate)
    }

    /// Look up a foreign class's finalizer
    pub fn finalizer(&self, module: &str, class_name: &str) -> Option<FinalizerFn> {
        self.class(module, class_name).and_then(|c| c.finalize)
    }

    fn class(&self, module: &str, class_name: &str) -> Option<&ForeignClassMethods> {
        self.classes
            .get(&(module.to_string(), class_name.to_string()))
    }

    /// Number of registered methods
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Number of registered classes
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}
