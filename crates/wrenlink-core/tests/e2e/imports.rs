//! Module resolution through the bridge

use std::sync::Arc;
use std::time::Duration;

use wrenlink_core::sdk::{ErrorKind, InterpretResult};
use wrenlink_core::{
    BridgeConfig, FetchCompletion, Fetcher, ResolveError, StrategyConfig, TerminatorPolicy,
    Transfer, VmHooks,
};

use crate::harness::{Fixture, MapFetcher};

fn preload_only() -> BridgeConfig {
    BridgeConfig {
        strategies: StrategyConfig {
            host_preload: true,
            network_fetch: false,
            restrict_fetch: false,
        },
        ..BridgeConfig::default()
    }
}

fn fetch_only(restrict: bool) -> BridgeConfig {
    BridgeConfig {
        strategies: StrategyConfig {
            host_preload: false,
            network_fetch: true,
            restrict_fetch: restrict,
        },
        ..BridgeConfig::default()
    }
}

#[test]
fn test_preloaded_module_is_terminated_copy() {
    let fx = Fixture::new(preload_only(), None);
    let vm = fx.vm();
    fx.host.import_source(vm, "main.wren", "X").unwrap();

    let buffer = fx.bridge.load_module(vm, "main").unwrap();
    assert_eq!(buffer.len(), 2);
    assert_eq!(buffer.as_bytes_with_nul(), b"X\0");
}

#[test]
fn test_script_imports_preloaded_module() {
    let fx = Fixture::new(preload_only(), None);
    let vm = fx.vm();
    fx.host
        .import_source(vm, "greeting.wren", "print hello from greeting")
        .unwrap();

    let result = fx
        .bridge
        .interpret(vm, "main", "import \"greeting\"\nprint done")
        .unwrap();

    assert_eq!(result, InterpretResult::Success);
    assert_eq!(fx.output(), "hello from greeting\ndone\n");
}

#[test]
fn test_nested_imports() {
    let fx = Fixture::new(preload_only(), None);
    let vm = fx.vm();
    fx.host.import_source(vm, "a.wren", "import \"b\"\nprint a").unwrap();
    fx.host.import_source(vm, "b.wren", "print b").unwrap();

    let result = fx.bridge.interpret(vm, "main", "import \"a\"").unwrap();
    assert_eq!(result, InterpretResult::Success);
    assert_eq!(fx.output(), "b\na\n");
}

#[test]
fn test_fetched_module_append_terminator() {
    let fetcher = MapFetcher::with_files(&[("lib.wren", "0123456789")]);
    let fx = Fixture::new(fetch_only(false), Some(fetcher.clone()));
    let vm = fx.vm();

    let buffer = fx.bridge.load_module(vm, "lib").unwrap();
    assert_eq!(buffer.len(), 11);
    assert_eq!(buffer.source(), b"0123456789");
    assert_eq!(fetcher.requests(), vec!["lib.wren"]);
}

#[test]
fn test_fetched_module_overwrite_last_terminator() {
    let fetcher = MapFetcher::with_files(&[("lib.wren", "0123456789")]);
    let config = BridgeConfig {
        terminator: TerminatorPolicy::OverwriteLast,
        ..fetch_only(false)
    };
    let fx = Fixture::new(config, Some(fetcher));
    let vm = fx.vm();

    let buffer = fx.bridge.load_module(vm, "lib").unwrap();
    assert_eq!(buffer.len(), 10);
    assert_eq!(buffer.as_bytes_with_nul(), b"012345678\0");
}

#[test]
fn test_nested_fetches_run_one_at_a_time() {
    let fetcher = MapFetcher::with_files(&[("a.wren", "import \"b\"\nprint a"), ("b.wren", "print b")]);
    let config = BridgeConfig {
        allowed_scripts: vec!["a.wren".to_string(), "b.wren".to_string()],
        ..fetch_only(true)
    };
    let fx = Fixture::new(config, Some(fetcher.clone()));
    let vm = fx.vm();

    let result = fx.bridge.interpret(vm, "main", "import \"a\"").unwrap();
    assert_eq!(result, InterpretResult::Success);
    assert_eq!(fx.output(), "b\na\n");
    assert_eq!(fetcher.requests(), vec!["a.wren", "b.wren"]);

    let stats = fx.bridge.fetch_stats().unwrap();
    assert_eq!(stats.started, 2);
    assert_eq!(stats.peak_in_flight, 1);
    assert_eq!(stats.in_flight, 0);
}

#[test]
fn test_preload_miss_falls_through_to_fetch() {
    let fetcher = MapFetcher::with_files(&[("remote.wren", "print remote")]);
    let fx = Fixture::new(BridgeConfig::default(), Some(fetcher.clone()));
    let vm = fx.vm();
    fx.host.import_source(vm, "local.wren", "print local").unwrap();

    let result = fx
        .bridge
        .interpret(vm, "main", "import \"local\"\nimport \"remote\"")
        .unwrap();

    assert_eq!(result, InterpretResult::Success);
    assert_eq!(fx.output(), "local\nremote\n");
    assert_eq!(fetcher.requests(), vec!["remote.wren"]);
}

#[test]
fn test_restricted_fetch_refuses_unlisted_path() {
    let fetcher = MapFetcher::with_files(&[("lib.wren", "print lib")]);
    let fx = Fixture::new(fetch_only(true), Some(fetcher.clone()));
    let vm = fx.vm();

    let err = fx.bridge.load_module(vm, "lib").unwrap_err();
    assert!(matches!(err, ResolveError::NotFound { .. }));
    assert!(fetcher.requests().is_empty());
}

#[test]
#[cfg(feature = "fetch-allow-list")]
fn test_allow_list_build_never_fetches_unlisted_path() {
    use wrenlink_core::sdk::EmbeddedHost;
    use wrenlink_core::{Bridge, BridgeError, ConfigError};

    use crate::harness::ScriptEngine;

    let fetcher = MapFetcher::with_files(&[("../../private/x.wren", "print secret")]);

    let err = BridgeConfig::from_toml_str("[strategies]\nhost_preload = false\nrestrict_fetch = false")
        .unwrap_err();
    assert!(matches!(err, ConfigError::RestrictionRequired));
    let bridge = Bridge::with_config(
        ScriptEngine::new(),
        Arc::new(EmbeddedHost::new()),
        Some(fetcher.clone()),
        fetch_only(false),
    );
    assert!(matches!(
        bridge,
        Err(BridgeError::Config(ConfigError::RestrictionRequired))
    ));

    let config = BridgeConfig::from_toml_str("[strategies]\nhost_preload = false").unwrap();
    assert!(config.strategies.restrict_fetch);
    let fx = Fixture::new(config, Some(fetcher.clone()));
    let vm = fx.vm();

    assert!(fx.bridge.load_module(vm, "../../private/x").is_err());
    assert!(fetcher.requests().is_empty());
}

#[test]
fn test_restricted_fetch_allows_host_listed_path() {
    let fetcher = MapFetcher::with_files(&[("lib.wren", "print lib")]);
    let fx = Fixture::new(fetch_only(true), Some(fetcher.clone()));
    fx.host.allow_script("lib.wren");
    let vm = fx.vm();

    assert!(fx.bridge.load_module(vm, "lib").is_ok());
    assert_eq!(fetcher.requests(), vec!["lib.wren"]);
}

#[test]
fn test_restricted_fetch_allows_configured_path() {
    let fetcher = MapFetcher::with_files(&[("lib.wren", "print lib")]);
    let config = BridgeConfig {
        allowed_scripts: vec!["lib.wren".to_string()],
        ..fetch_only(true)
    };
    let fx = Fixture::new(config, Some(fetcher.clone()));
    let vm = fx.vm();

    assert!(fx.bridge.load_module(vm, "lib").is_ok());
    assert!(fx.bridge.load_module(vm, "other").is_err());
    assert_eq!(fetcher.requests(), vec!["lib.wren"]);
}

#[test]
fn test_imports_disabled() {
    let config = BridgeConfig {
        strategies: StrategyConfig::none(),
        ..BridgeConfig::default()
    };
    let fx = Fixture::new(config, None);
    let vm = fx.vm();
    fx.host.import_source(vm, "lib.wren", "print lib").unwrap();

    assert_eq!(fx.engine.last_config().map(|c| c.imports_enabled), Some(false));
    let err = fx.bridge.load_module(vm, "lib").unwrap_err();
    assert!(matches!(err, ResolveError::ImportsDisabled { .. }));

    let result = fx.bridge.interpret(vm, "main", "import \"lib\"").unwrap();
    assert_eq!(result, InterpretResult::CompileError);
    assert_eq!(fx.output(), "");
}

#[test]
fn test_missing_module_reports_compile_error() {
    let fx = Fixture::new(preload_only(), None);
    let vm = fx.vm();

    let result = fx
        .bridge
        .interpret(vm, "main", "print before\nimport \"nowhere\"\nprint after")
        .unwrap();

    assert_eq!(result, InterpretResult::CompileError);
    assert_eq!(fx.output(), "before\n");
    let errors = fx.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), Some(ErrorKind::Compile));
    assert_eq!(errors[0].module.as_deref(), Some("main"));
    assert_eq!(errors[0].line(), Some(2));
}

#[test]
fn test_module_outcome_cached_per_vm() {
    let fetcher = MapFetcher::with_files(&[("lib.wren", "print lib")]);
    let fx = Fixture::new(fetch_only(false), Some(fetcher.clone()));
    let vm = fx.vm();

    fx.bridge.load_module(vm, "lib").unwrap();
    fx.bridge.load_module(vm, "lib").unwrap();
    assert!(fx.bridge.load_module(vm, "gone").is_err());
    assert!(fx.bridge.load_module(vm, "gone").is_err());

    assert_eq!(fetcher.requests(), vec!["lib.wren", "gone.wren"]);
    assert_eq!(fx.bridge.cached_modules(vm), Some(2));

    // A second VM has its own cache
    let other = fx.vm();
    fx.bridge.load_module(other, "lib").unwrap();
    assert_eq!(fetcher.requests().len(), 3);
}

#[test]
fn test_cache_disabled_refetches() {
    let fetcher = MapFetcher::with_files(&[("lib.wren", "print lib")]);
    let config = BridgeConfig {
        cache_modules: false,
        ..fetch_only(false)
    };
    let fx = Fixture::new(config, Some(fetcher.clone()));
    let vm = fx.vm();

    fx.bridge.load_module(vm, "lib").unwrap();
    fx.bridge.load_module(vm, "lib").unwrap();
    assert_eq!(fetcher.requests().len(), 2);
    assert_eq!(fx.bridge.cached_modules(vm), Some(0));
}

#[test]
fn test_destroy_drops_module_cache() {
    let fetcher = MapFetcher::with_files(&[("lib.wren", "print lib")]);
    let fx = Fixture::new(fetch_only(false), Some(fetcher));
    let vm = fx.vm();
    fx.bridge.load_module(vm, "lib").unwrap();

    fx.bridge.destroy_vm(Some(vm));
    assert_eq!(fx.bridge.cached_modules(vm), None);
}

/// Never completes; records whether its transfer was closed
#[derive(Default)]
struct StalledFetcher {
    closed: Arc<std::sync::atomic::AtomicBool>,
    pending: parking_lot::Mutex<Vec<FetchCompletion>>,
}

struct StalledTransfer(Arc<std::sync::atomic::AtomicBool>);

impl Transfer for StalledTransfer {
    fn close(self: Box<Self>) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Fetcher for StalledFetcher {
    fn start(&self, _path: &str, completion: FetchCompletion) -> Box<dyn Transfer> {
        self.pending.lock().push(completion);
        Box::new(StalledTransfer(self.closed.clone()))
    }
}

#[test]
fn test_stalled_fetch_times_out_as_not_found() {
    let fetcher = Arc::new(StalledFetcher::default());
    let mut config = fetch_only(false);
    config.fetch.timeout_ms = 50;
    config.fetch.poll_interval_ms = 5;
    let fx = Fixture::new(config, Some(fetcher.clone()));
    let vm = fx.vm();

    let started = std::time::Instant::now();
    let err = fx.bridge.load_module(vm, "slow").unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(err.to_string().contains("slow.wren"));
    assert!(fetcher.closed.load(std::sync::atomic::Ordering::SeqCst));

    let stats = fx.bridge.fetch_stats().unwrap();
    assert_eq!(stats.timed_out, 1);
    assert_eq!(stats.in_flight, 0);
}

#[test]
fn test_import_files_builds_manifest() {
    let fetcher = MapFetcher::with_files(&[("a.wren", "print a"), ("b.wren", "print b")]);
    let fx = Fixture::new(preload_only(), Some(fetcher));
    let vm = fx.vm();

    let manifest = fx.bridge.import_files(&["a.wren", "b.wren"]).unwrap();
    fx.host.import_manifest(vm, manifest).unwrap();

    let result = fx
        .bridge
        .interpret(vm, "main", "import \"a\"\nimport \"b\"")
        .unwrap();
    assert_eq!(result, InterpretResult::Success);
    assert_eq!(fx.output(), "a\nb\n");
}

#[test]
fn test_import_files_without_fetcher() {
    let fx = Fixture::new(preload_only(), None);
    assert!(fx.bridge.import_files(&["a.wren"]).is_err());
}
