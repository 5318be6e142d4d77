//! Test harness: a scripted stand-in for the VM engine
//!
//! `ScriptEngine` understands a tiny line-based language that exercises every
//! VM-to-bridge callback:
//!
//! ```text
//! import "name"                      load a module and run it
//! print text                         write "text\n"
//! call module Class static sig       bind a foreign method and invoke it
//! new module Class                   bind a foreign class and allocate
//! abort message                      raise a runtime error
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use parking_lot::Mutex;
use wrenlink_core::sdk::{
    EmbeddedHost, ErrorKind, ErrorReport, HostCallbacks, InterpretResult, VmHandle, NO_LINE,
};
use wrenlink_core::{
    Bridge, BridgeConfig, FetchCompletion, Fetcher, FetchFailure, NoTransfer, Transfer,
    VmConfiguration, VmEngine, VmHooks,
};

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Default)]
pub struct ScriptEngine {
    next: AtomicUsize,
    live: Mutex<HashSet<VmHandle>>,
    configs: Mutex<HashMap<VmHandle, VmConfiguration>>,
    last: Mutex<Option<VmConfiguration>>,
    freed: Mutex<Vec<VmHandle>>,
}

impl ScriptEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(ScriptEngine {
            next: AtomicUsize::new(0x1000),
            ..ScriptEngine::default()
        })
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    pub fn freed(&self) -> Vec<VmHandle> {
        self.freed.lock().clone()
    }

    pub fn last_config(&self) -> Option<VmConfiguration> {
        *self.last.lock()
    }

    pub fn config_of(&self, vm: VmHandle) -> Option<VmConfiguration> {
        self.configs.lock().get(&vm).copied()
    }

    fn run(
        &self,
        vm: VmHandle,
        module: &str,
        source: &str,
        hooks: &dyn VmHooks,
        imports_enabled: bool,
    ) -> InterpretResult {
        for (index, line) in source.lines().enumerate() {
            let line_no = index as i32 + 1;
            let line = line.trim();
            let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

            match command {
                "" => {}
                "import" => {
                    let name = rest.trim_matches('"');
                    let loaded = if imports_enabled {
                        hooks.load_module(vm, name).ok()
                    } else {
                        None
                    };
                    let Some(buffer) = loaded else {
                        hooks.report_error(
                            vm,
                            ErrorKind::Compile.as_raw(),
                            Some(module),
                            line_no,
                            &format!("Could not load module '{}'.", name),
                        );
                        return InterpretResult::CompileError;
                    };
                    assert_eq!(buffer.as_bytes_with_nul().last(), Some(&0));
                    let text = buffer.to_str().unwrap_or_default().to_string();
                    let result = self.run(vm, name, &text, hooks, imports_enabled);
                    if result != InterpretResult::Success {
                        return result;
                    }
                }
                "print" => {
                    hooks.write(vm, rest);
                    hooks.write(vm, "\n");
                }
                "call" => {
                    let parts: Vec<&str> = rest.split_whitespace().collect();
                    let [m, class, kind, signature] = parts[..] else {
                        return InterpretResult::CompileError;
                    };
                    match hooks.bind_foreign_method(vm, m, class, kind == "static", signature) {
                        Some(method) => unsafe { method(vm.as_ptr()) },
                        None => {
                            hooks.report_error(
                                vm,
                                ErrorKind::Runtime.as_raw(),
                                None,
                                NO_LINE,
                                &format!("{} does not implement '{}'.", class, signature),
                            );
                            hooks.report_error(
                                vm,
                                ErrorKind::StackTrace.as_raw(),
                                Some(module),
                                line_no,
                                "(script)",
                            );
                            return InterpretResult::RuntimeError;
                        }
                    }
                }
                "new" => {
                    let parts: Vec<&str> = rest.split_whitespace().collect();
                    let [m, class] = parts[..] else {
                        return InterpretResult::CompileError;
                    };
                    let methods = hooks.bind_foreign_class(vm, m, class);
                    if let Some(allocate) = methods.allocate {
                        unsafe { allocate(vm.as_ptr()) };
                    }
                    if let Some(finalize) = methods.finalize {
                        unsafe { finalize(std::ptr::null_mut()) };
                    }
                }
                "abort" => {
                    hooks.report_error(vm, ErrorKind::Runtime.as_raw(), None, NO_LINE, rest);
                    return InterpretResult::RuntimeError;
                }
                _ => {
                    hooks.report_error(
                        vm,
                        ErrorKind::Compile.as_raw(),
                        Some(module),
                        line_no,
                        &format!("Error at '{}': Unexpected token.", command),
                    );
                    return InterpretResult::CompileError;
                }
            }
        }
        InterpretResult::Success
    }
}

impl VmEngine for ScriptEngine {
    fn new_vm(&self, config: &VmConfiguration) -> Option<VmHandle> {
        let raw = self.next.fetch_add(0x10, Ordering::SeqCst);
        let vm = VmHandle::from_raw(raw)?;
        self.live.lock().insert(vm);
        self.configs.lock().insert(vm, *config);
        *self.last.lock() = Some(*config);
        Some(vm)
    }

    fn free_vm(&self, vm: VmHandle) {
        assert!(self.live.lock().remove(&vm), "double free of {}", vm);
        self.configs.lock().remove(&vm);
        self.freed.lock().push(vm);
    }

    fn interpret(
        &self,
        vm: VmHandle,
        module: &str,
        source: &str,
        hooks: &dyn VmHooks,
    ) -> InterpretResult {
        assert!(self.live.lock().contains(&vm), "interpret on dead VM {}", vm);
        let imports_enabled = self.config_of(vm).is_some_and(|c| c.imports_enabled);
        self.run(vm, module, source, hooks, imports_enabled)
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Serves a fixed set of files and counts requests
#[derive(Default)]
pub struct MapFetcher {
    files: Mutex<Vec<(String, Vec<u8>)>>,
    requests: Mutex<Vec<String>>,
}

impl MapFetcher {
    pub fn with_files(files: &[(&str, &str)]) -> Arc<Self> {
        let fetcher = MapFetcher::default();
        for (path, source) in files {
            fetcher
                .files
                .lock()
                .push((path.to_string(), source.as_bytes().to_vec()));
        }
        Arc::new(fetcher)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl Fetcher for MapFetcher {
    fn start(&self, path: &str, completion: FetchCompletion) -> Box<dyn Transfer> {
        self.requests.lock().push(path.to_string());
        let found = self
            .files
            .lock()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, bytes)| bytes.clone());
        let path = path.to_string();
        std::thread::spawn(move || match found {
            Some(bytes) => completion.succeed(bytes),
            None => completion.fail(FetchFailure::Status { status: 404, url: path }),
        });
        Box::new(NoTransfer)
    }
}

// ============================================================================
// Host fixture
// ============================================================================

pub struct Fixture {
    pub engine: Arc<ScriptEngine>,
    pub host: Arc<EmbeddedHost>,
    pub bridge: Bridge,
    pub output: Arc<Mutex<String>>,
    pub errors: Arc<Mutex<Vec<ErrorReport>>>,
}

impl Fixture {
    pub fn new(config: BridgeConfig, fetcher: Option<Arc<dyn Fetcher>>) -> Self {
        init_tracing();
        let engine = ScriptEngine::new();
        let host = Arc::new(EmbeddedHost::new());
        let bridge = Bridge::with_config(engine.clone(), host.clone(), fetcher, config).unwrap();
        Fixture {
            engine,
            host,
            bridge,
            output: Arc::new(Mutex::new(String::new())),
            errors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a VM and attach recording callbacks for it
    pub fn vm(&self) -> VmHandle {
        let vm = self.bridge.create_vm().unwrap();
        let (out, errors) = (self.output.clone(), self.errors.clone());
        self.host.attach(
            vm,
            HostCallbacks::new(
                move |text| out.lock().push_str(text),
                move |report| errors.lock().push(report.clone()),
            ),
        );
        vm
    }

    pub fn output(&self) -> String {
        self.output.lock().clone()
    }

    pub fn errors(&self) -> Vec<ErrorReport> {
        self.errors.lock().clone()
    }
}
