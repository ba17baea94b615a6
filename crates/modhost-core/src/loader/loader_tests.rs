use super::*;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use modhost_protocols::{ComponentRef, LifecyclePhase, Opaque, Router};
use tempfile::TempDir;

use crate::lifecycle::{RuntimeOptions, RuntimeState};
use crate::test_support::{InconsistentComponent, Journal, MockComponent};

/// What a fake unit file exports.
#[derive(Clone)]
enum Export {
    Component(&'static str, &'static [&'static str]),
    FailingInit(&'static str),
    MissingSymbol,
    BrokenContract,
    Unopenable,
}

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

struct MockOpener {
    exports: HashMap<String, Export>,
    journal: Journal,
    counters: Arc<Counters>,
}

struct MockUnit {
    path: PathBuf,
    export: Export,
    journal: Journal,
    counters: Arc<Counters>,
}

impl UnitOpener for MockOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn UnitHandle>, ComponentError> {
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let export = match self.exports.get(&file) {
            Some(Export::Unopenable) | None => {
                return Err(ComponentError::invalid_plugin(path, "not a loadable unit"));
            }
            Some(export) => export.clone(),
        };
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockUnit {
            path: path.to_path_buf(),
            export,
            journal: self.journal.clone(),
            counters: self.counters.clone(),
        }))
    }
}

impl UnitHandle for MockUnit {
    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self, symbol: &str) -> Result<ComponentRef, ComponentError> {
        assert_eq!(symbol, INSTANCE_SYMBOL);
        match &self.export {
            Export::Component(name, deps) => Ok(MockComponent::shared(name, deps, &self.journal)),
            Export::FailingInit(name) => Ok(Arc::new(
                MockComponent::new(name, &[], &self.journal).failing_on(LifecyclePhase::Init),
            )),
            Export::MissingSymbol => Err(ComponentError::invalid_plugin(
                &self.path,
                format!("missing symbol '{symbol}'"),
            )),
            Export::BrokenContract => Ok(Arc::new(InconsistentComponent::new("odd"))),
            Export::Unopenable => unreachable!(),
        }
    }

    fn close(self: Box<Self>) -> Result<(), ComponentError> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    journal: Journal,
    counters: Arc<Counters>,
    runtime: Arc<Runtime>,
    loader: ComponentLoader,
}

impl Fixture {
    fn new(files: &[(&str, Export)]) -> Self {
        Self::with_settings(files, |s| s)
    }

    fn with_settings(
        files: &[(&str, Export)],
        configure: impl FnOnce(LoaderSettings) -> LoaderSettings,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        for (file, _) in files {
            fs::write(dir.path().join(file), b"").unwrap();
        }

        let journal = Journal::default();
        let counters = Arc::new(Counters::default());
        let opener = MockOpener {
            exports: files
                .iter()
                .map(|(file, export)| (file.to_string(), export.clone()))
                .collect(),
            journal: journal.clone(),
            counters: counters.clone(),
        };

        let runtime = Runtime::new(RuntimeOptions::default());
        let settings = configure(LoaderSettings::new(dir.path()).with_extension("so"));
        let loader = ComponentLoader::with_opener(runtime.clone(), settings, Arc::new(opener));

        Self {
            dir,
            journal,
            counters,
            runtime,
            loader,
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.path().join(file)
    }

    fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

fn audit_and_heartbeat() -> Vec<(&'static str, Export)> {
    vec![
        ("libaudit.so", Export::Component("audit", &[])),
        ("libheartbeat.so", Export::Component("heartbeat", &["audit"])),
    ]
}

#[test]
fn test_discover_sorted_by_extension() {
    let fx = Fixture::new(&[
        ("libzeta.so", Export::Component("zeta", &[])),
        ("libalpha.so", Export::Component("alpha", &[])),
    ]);
    fs::write(fx.path("README.txt"), b"docs").unwrap();
    fs::create_dir(fx.path("nested.so")).unwrap();

    let found = fx.loader.discover().unwrap();
    assert_eq!(found, vec![fx.path("libalpha.so"), fx.path("libzeta.so")]);
}

#[test]
fn test_discover_missing_directory() {
    let runtime = Runtime::new(RuntimeOptions::default());
    let opener = MockOpener {
        exports: HashMap::new(),
        journal: Journal::default(),
        counters: Arc::default(),
    };
    let loader = ComponentLoader::with_opener(
        runtime,
        LoaderSettings::new("/definitely/not/here").with_extension("so"),
        Arc::new(opener),
    );
    assert!(loader.discover().unwrap().is_empty());
}

#[tokio::test]
async fn test_load_all_before_init_registers() {
    let fx = Fixture::new(&audit_and_heartbeat());

    let report = fx.loader.load_all().await.unwrap();

    assert_eq!(report.loaded, vec!["audit", "heartbeat"]);
    assert!(report.failed.is_empty());
    // Registered only; nothing runs until init_all.
    assert!(fx.journal.entries().is_empty());

    let init = fx.runtime.init_all().await.unwrap();
    assert_eq!(init.initialized, vec!["audit", "heartbeat"]);
    assert_eq!(
        fx.loader.loaded_units(),
        vec![
            ("audit".to_string(), fx.path("libaudit.so")),
            ("heartbeat".to_string(), fx.path("libheartbeat.so")),
        ]
    );
}

#[tokio::test]
async fn test_load_same_file_twice_is_noop() {
    let fx = Fixture::new(&audit_and_heartbeat());
    let path = fx.path("libaudit.so");

    let first = fx.loader.load_path(&path).await.unwrap();
    assert_eq!(
        first,
        LoadOutcome::Loaded {
            name: "audit".to_string(),
            admission: Admission::Registered
        }
    );

    let second = fx.loader.load_path(&path).await.unwrap();
    assert_eq!(second, LoadOutcome::AlreadyLoaded("audit".to_string()));
    assert_eq!(fx.opened(), 1);
    assert_eq!(fx.runtime.registry().len(), 1);
}

#[tokio::test]
async fn test_same_name_from_other_file_is_noop() {
    let fx = Fixture::new(&[
        ("libaudit.so", Export::Component("audit", &[])),
        ("libaudit_copy.so", Export::Component("audit", &[])),
    ]);

    let report = fx.loader.load_all().await.unwrap();

    assert_eq!(report.loaded, vec!["audit"]);
    assert_eq!(report.skipped, vec!["audit"]);
    assert_eq!(fx.closed(), 1);
}

#[tokio::test]
async fn test_statically_registered_name_is_noop() {
    let fx = Fixture::new(&audit_and_heartbeat());
    fx.runtime
        .register_component(MockComponent::shared("audit", &[], &fx.journal))
        .unwrap();

    let outcome = fx.loader.load_path(&fx.path("libaudit.so")).await.unwrap();

    assert_eq!(outcome, LoadOutcome::AlreadyLoaded("audit".to_string()));
    assert!(!fx.loader.is_loaded("audit"));
}

#[tokio::test]
async fn test_failures_are_per_unit() {
    let fx = Fixture::new(&[
        ("libaudit.so", Export::Component("audit", &[])),
        ("libbroken.so", Export::MissingSymbol),
        ("libodd.so", Export::BrokenContract),
        ("libjunk.so", Export::Unopenable),
    ]);

    let report = fx.loader.load_all().await.unwrap();

    assert_eq!(report.loaded, vec!["audit"]);
    let failed: Vec<PathBuf> = report.failed.iter().map(|(p, _)| p.clone()).collect();
    assert_eq!(
        failed,
        vec![
            fx.path("libbroken.so"),
            fx.path("libjunk.so"),
            fx.path("libodd.so"),
        ]
    );
    assert!(report
        .failed
        .iter()
        .all(|(_, e)| matches!(e, ComponentError::InvalidPlugin { .. })));
    // Opened units that failed are closed again.
    assert_eq!(fx.closed(), 2);
}

#[tokio::test]
async fn test_exclude_filter() {
    let fx = Fixture::with_settings(&audit_and_heartbeat(), |s| s.with_exclude(["heartbeat"]));

    let report = fx.loader.load_all().await.unwrap();

    assert_eq!(report.loaded, vec!["audit"]);
    assert_eq!(report.skipped, vec!["heartbeat"]);
    assert!(!fx.runtime.contains("heartbeat"));
    assert_eq!(fx.closed(), 1);
}

#[tokio::test]
async fn test_include_filter() {
    let fx = Fixture::with_settings(&audit_and_heartbeat(), |s| s.with_include(["heartbeat"]));

    let outcome = fx.loader.load_path(&fx.path("libaudit.so")).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Filtered("audit".to_string()));
}

#[tokio::test]
async fn test_load_all_after_init_defers_missing_dependencies() {
    // Sorted discovery puts the dependent first.
    let fx = Fixture::new(&[
        ("a_heartbeat.so", Export::Component("heartbeat", &["audit"])),
        ("b_audit.so", Export::Component("audit", &[])),
    ]);
    fx.runtime.init_all().await.unwrap();

    let report = fx.loader.load_all().await.unwrap();

    assert_eq!(report.loaded, vec!["audit", "heartbeat"]);
    assert!(report.failed.is_empty());
    assert_eq!(
        fx.journal.phase(LifecyclePhase::PostInit),
        vec!["audit", "heartbeat"]
    );
    assert_eq!(fx.runtime.init_order(), vec!["audit", "heartbeat"]);
}

#[tokio::test]
async fn test_load_all_after_init_reports_unresolvable() {
    let fx = Fixture::new(&[("libheartbeat.so", Export::Component("heartbeat", &["audit"]))]);
    fx.runtime.init_all().await.unwrap();

    let report = fx.loader.load_all().await.unwrap();

    assert!(report.loaded.is_empty());
    assert!(matches!(
        report.failed[0].1,
        ComponentError::MissingDependency { .. }
    ));
    assert!(fx.journal.entries().is_empty());
}

#[tokio::test]
async fn test_attach_failure_closes_unit() {
    let fx = Fixture::new(&[("libflaky.so", Export::FailingInit("flaky"))]);
    fx.runtime.init_all().await.unwrap();

    let result = fx.loader.load_path(&fx.path("libflaky.so")).await;

    assert!(matches!(result, Err(ComponentError::Init { .. })));
    assert!(!fx.loader.is_loaded("flaky"));
    assert!(!fx.runtime.contains("flaky"));
    assert_eq!(fx.closed(), 1);
}

#[tokio::test]
async fn test_load_by_name() {
    let fx = Fixture::new(&[
        ("librate_limit.so", Export::Component("rate-limit", &[])),
        ("audit.so", Export::Component("audit", &[])),
    ]);

    assert!(matches!(
        fx.loader.load("rate-limit").await.unwrap(),
        LoadOutcome::Loaded { .. }
    ));
    assert!(matches!(
        fx.loader.load("audit").await.unwrap(),
        LoadOutcome::Loaded { .. }
    ));
    assert_eq!(
        fx.loader.load("audit").await.unwrap(),
        LoadOutcome::AlreadyLoaded("audit".to_string())
    );
    assert!(matches!(
        fx.loader.load("ghost").await,
        Err(ComponentError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_unload() {
    let fx = Fixture::new(&audit_and_heartbeat());
    fx.loader.load_all().await.unwrap();
    fx.runtime.init_all().await.unwrap();

    fx.loader.unload("heartbeat").await.unwrap();

    assert!(matches!(
        fx.runtime.get_component("heartbeat"),
        Err(ComponentError::NotFound(_))
    ));
    assert!(!fx.loader.is_loaded("heartbeat"));
    assert_eq!(fx.journal.phase(LifecyclePhase::Cleanup), vec!["heartbeat"]);
    assert_eq!(fx.closed(), 1);

    assert!(matches!(
        fx.loader.unload("heartbeat").await,
        Err(ComponentError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_unload_keeps_unit_while_service_held() {
    let fx = Fixture::new(&audit_and_heartbeat());
    fx.loader.load_all().await.unwrap();
    fx.runtime.init_all().await.unwrap();

    let held = fx.runtime.get_service("heartbeat", "echo").unwrap();
    fx.loader.unload("heartbeat").await.unwrap();

    assert!(!fx.loader.is_loaded("heartbeat"));
    assert!(!fx.runtime.contains("heartbeat"));
    assert_eq!(fx.closed(), 0);
    assert_eq!(held.downcast_ref::<String>().map(String::as_str), Some("heartbeat"));
}

#[tokio::test]
async fn test_unload_closes_once_lent_values_are_dropped() {
    let fx = Fixture::new(&audit_and_heartbeat());
    fx.loader.load_all().await.unwrap();
    fx.runtime.init_all().await.unwrap();

    let service = fx.runtime.get_service("heartbeat", "echo").unwrap();
    let handler = fx.runtime.get_handler("heartbeat", "ping").unwrap();
    drop(service);
    drop(handler);

    fx.loader.unload("heartbeat").await.unwrap();
    assert_eq!(fx.closed(), 1);
}

#[tokio::test]
async fn test_unload_keeps_unit_while_route_handler_held() {
    struct KeepingRouter(Vec<Opaque>);

    impl Router for KeepingRouter {
        fn add_route(&mut self, _method: &str, _path: &str, handler: Opaque) {
            self.0.push(handler);
        }
    }

    let fx = Fixture::new(&audit_and_heartbeat());
    fx.loader.load_all().await.unwrap();
    fx.runtime.init_all().await.unwrap();

    let mut router = KeepingRouter(Vec::new());
    fx.runtime.register_routes(&mut router);
    assert_eq!(router.0.len(), 2);

    fx.loader.unload("heartbeat").await.unwrap();
    assert_eq!(fx.closed(), 0);
}

#[tokio::test]
async fn test_unload_keeps_unit_while_component_held() {
    let fx = Fixture::new(&audit_and_heartbeat());
    fx.loader.load_all().await.unwrap();
    fx.runtime.init_all().await.unwrap();

    let held = fx.runtime.get_component("heartbeat").unwrap();
    fx.loader.unload("heartbeat").await.unwrap();

    assert_eq!(fx.closed(), 0);
    assert_eq!(held.name(), "heartbeat");
}

#[tokio::test]
async fn test_unload_after_cleanup_keeps_unit_while_service_held() {
    let fx = Fixture::new(&audit_and_heartbeat());
    fx.loader.load_all().await.unwrap();
    fx.runtime.init_all().await.unwrap();

    let held = fx.runtime.get_service("audit", "echo").unwrap();
    fx.runtime.cleanup().await.unwrap();
    fx.loader.unload("audit").await.unwrap();

    assert!(!fx.loader.is_loaded("audit"));
    assert_eq!(fx.closed(), 0);
    drop(held);
}

#[tokio::test]
async fn test_unload_static_component() {
    let fx = Fixture::new(&[]);
    fx.runtime
        .register_component(MockComponent::shared("builtin", &[], &fx.journal))
        .unwrap();
    fx.runtime.init_all().await.unwrap();

    fx.loader.unload("builtin").await.unwrap();

    assert!(!fx.runtime.contains("builtin"));
    assert_eq!(fx.closed(), 0);
}

#[tokio::test]
async fn test_unload_after_runtime_cleanup() {
    let fx = Fixture::new(&audit_and_heartbeat());
    fx.loader.load_all().await.unwrap();
    fx.runtime.init_all().await.unwrap();
    fx.runtime.cleanup().await.unwrap();

    fx.loader.unload("audit").await.unwrap();
    assert!(!fx.loader.is_loaded("audit"));
    assert_eq!(fx.closed(), 1);
}

#[tokio::test]
async fn test_reload() {
    let fx = Fixture::new(&audit_and_heartbeat());
    fx.loader.load_all().await.unwrap();
    fx.runtime.init_all().await.unwrap();

    let outcome = fx.loader.reload("audit").await.unwrap();

    assert_eq!(
        outcome,
        LoadOutcome::Loaded {
            name: "audit".to_string(),
            admission: Admission::Attached
        }
    );
    assert_eq!(fx.opened(), 3);
    assert_eq!(fx.closed(), 1);
    assert_eq!(fx.journal.phase(LifecyclePhase::Cleanup), vec!["audit"]);
    assert_eq!(
        fx.journal.phase(LifecyclePhase::Init),
        vec!["audit", "heartbeat", "audit"]
    );
    assert_eq!(fx.runtime.state(), RuntimeState::Initialized);
    assert!(fx.runtime.contains("audit"));
}

#[tokio::test]
async fn test_reload_unknown() {
    let fx = Fixture::new(&audit_and_heartbeat());
    fx.runtime
        .register_component(MockComponent::shared("builtin", &[], &fx.journal))
        .unwrap();

    // Statically registered components have no unit to reload from.
    assert!(matches!(
        fx.loader.reload("builtin").await,
        Err(ComponentError::NotFound(_))
    ));
    assert!(matches!(
        fx.loader.reload("ghost").await,
        Err(ComponentError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_reload_all_picks_up_new_files() {
    let fx = Fixture::new(&[
        ("libaudit.so", Export::Component("audit", &[])),
        ("libheartbeat.so", Export::Component("heartbeat", &["audit"])),
    ]);
    fs::remove_file(fx.path("libheartbeat.so")).unwrap();
    fx.loader.load_all().await.unwrap();
    fx.runtime.init_all().await.unwrap();

    fs::write(fx.path("libheartbeat.so"), b"").unwrap();
    let report = fx.loader.reload_all().await.unwrap();

    assert_eq!(report.loaded, vec!["audit", "heartbeat"]);
    assert!(report.failed.is_empty());
    assert_eq!(fx.journal.phase(LifecyclePhase::Cleanup), vec!["audit"]);
    assert_eq!(fx.runtime.init_order(), vec!["audit", "heartbeat"]);
}

#[test]
fn test_inspect_does_not_initialize() {
    let fx = Fixture::new(&[
        ("libaudit.so", Export::Component("audit", &[])),
        ("libbroken.so", Export::MissingSymbol),
    ]);

    let units = fx.loader.inspect().unwrap();

    assert_eq!(units.len(), 2);
    assert_eq!(units[0].0, fx.path("libaudit.so"));
    assert_eq!(units[0].1.as_ref().unwrap().name, "audit");
    assert!(units[1].1.is_err());
    assert!(fx.journal.entries().is_empty());
    assert!(fx.runtime.registry().is_empty());
    assert_eq!(fx.opened(), 2);
    assert_eq!(fx.closed(), 2);
}

#[test]
fn test_load_report_record() {
    let mut report = LoadReport::default();
    report.record(
        Path::new("/p/a.so"),
        Ok(LoadOutcome::Loaded {
            name: "a".into(),
            admission: Admission::Registered,
        }),
    );
    report.record(Path::new("/p/b.so"), Ok(LoadOutcome::Filtered("b".into())));
    report.record(
        Path::new("/p/c.so"),
        Err(ComponentError::NotFound("c".into())),
    );

    assert_eq!(report.loaded, vec!["a"]);
    assert_eq!(report.skipped, vec!["b"]);
    assert_eq!(report.failed[0].0, PathBuf::from("/p/c.so"));
}
