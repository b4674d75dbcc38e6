//! 作用域生命周期端到端测试

use parking_lot::Mutex;
use scope_abstractions::{
    Scope, ScopeAttribute, ScopeDestructionAware, ScopeExt, ScopeLifecycleListener,
    ScopeSingleton, SessionSnapshot, SnapshotAttribute, Snapshotable,
};
use scope_common::{BoxError, ChangeResult, ScopeError, ScopeKind, ScopeManagerConfig};
use scope_composition::{InfrastructureBootstrapper, ScopeInfrastructureBuilder};
use scope_impl::{RequestContext, ScopeManager, SingletonRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

/// 销毁时记录自身名称的资源
#[derive(Debug)]
struct Tracked {
    name: String,
    log: Log,
}

impl Tracked {
    fn new(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
        }
    }
}

impl ScopeAttribute for Tracked {
    fn as_destruction_aware(&self) -> Option<&dyn ScopeDestructionAware> {
        Some(self)
    }
}

impl ScopeDestructionAware for Tracked {
    fn on_scope_destruction(&self, scope: &dyn Scope) -> Result<(), BoxError> {
        self.log
            .lock()
            .push(format!("{}@{}:{}", self.name, scope.kind(), scope.id()));
        Ok(())
    }
}

/// 记录作用域销毁完成事件
struct DestroyedLog {
    log: Log,
}

impl ScopeLifecycleListener for DestroyedLog {
    fn name(&self) -> &str {
        "destroyed-log"
    }

    fn on_scope_destroyed(&self, scope: &dyn Scope) -> Result<(), BoxError> {
        self.log
            .lock()
            .push(format!("destroyed:{}:{}", scope.kind(), scope.id()));
        Ok(())
    }
}

/// 随会话迁移的偏好设置
#[derive(Debug, Default, Serialize, Deserialize)]
struct Preferences {
    theme: String,
}

impl ScopeAttribute for Preferences {
    fn as_snapshot(&self) -> Option<&dyn SnapshotAttribute> {
        Some(self)
    }
}

impl Snapshotable for Preferences {
    const SNAPSHOT_TYPE: &'static str = "preferences";
    const SNAPSHOT_VERSION: u32 = 1;
}

impl ScopeSingleton for Preferences {}

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn test_scopes_absent_before_begin_and_stable_after() {
    let manager = ScopeManager::new();
    let context = RequestContext::new();

    assert!(manager.get_global_scope(false).unwrap().is_none());
    assert!(manager.get_application_scope("app1", false).unwrap().is_none());
    assert!(manager.get_session_scope(&context, false).unwrap().is_none());
    assert!(manager
        .get_session_application_scope(&context, "app1", false)
        .unwrap()
        .is_none());
    assert!(manager.get_request_scope(&context).is_none());

    let global = manager.on_global_begin("g1").unwrap();
    let mut context = RequestContext::new();
    let request = manager
        .on_request_begin(&mut context, "app1", "req1", "sess1")
        .unwrap();

    assert!(Arc::ptr_eq(&global, &manager.get_global_scope(false).unwrap().unwrap()));
    assert!(Arc::ptr_eq(&request, &manager.require_request_scope(&context).unwrap()));
    assert!(Arc::ptr_eq(
        &manager.require_application_scope("app1").unwrap(),
        &manager.get_application_scope("app1", false).unwrap().unwrap()
    ));
    assert!(Arc::ptr_eq(
        &manager.require_session_scope(&context).unwrap(),
        &manager.get_session_scope(&context, false).unwrap().unwrap()
    ));
}

#[test]
fn test_attribute_change_results() {
    let manager = ScopeManager::new();
    let global = manager.on_global_begin("g1").unwrap();

    assert_eq!(global.set_attribute("missing", None).unwrap(), ChangeResult::Unchanged);
    assert_eq!(global.attribute_count(), 0);

    assert_eq!(global.set("k", "v".to_string()).unwrap(), ChangeResult::Changed);
    assert_eq!(global.attribute_count(), 1);
    assert_eq!(global.set("k", "v".to_string()).unwrap(), ChangeResult::Unchanged);
    assert_eq!(global.set_attribute("k", None).unwrap(), ChangeResult::Changed);
    assert_eq!(global.attribute_count(), 0);
}

#[test]
fn test_session_state_survives_across_requests() {
    let manager = ScopeManager::new();
    manager.on_global_begin("g1").unwrap();

    let mut context = RequestContext::new();
    manager
        .on_request_begin(&mut context, "app1", "req1", "sess1")
        .unwrap();
    manager
        .get_session_application_scope(&context, "app1", true)
        .unwrap()
        .unwrap()
        .set("k", "v".to_string())
        .unwrap();
    manager.on_request_end(&mut context).unwrap();

    manager
        .on_request_begin(&mut context, "app1", "req2", "sess1")
        .unwrap();
    let scope = manager
        .get_session_application_scope(&context, "app1", true)
        .unwrap()
        .unwrap();
    assert_eq!(scope.get_string("k").unwrap().as_deref(), Some("v"));
    manager.on_request_end(&mut context).unwrap();
}

#[test]
fn test_session_cascade_destroys_children_first() {
    let log = new_log();
    let manager = ScopeManager::new();
    manager.register_listener(Arc::new(DestroyedLog { log: Arc::clone(&log) }));
    manager.on_global_begin("g1").unwrap();

    let mut context = RequestContext::new();
    manager
        .on_request_begin(&mut context, "app1", "req1", "sess1")
        .unwrap();
    let session = manager.require_session_scope(&context).unwrap();
    session.set("cart", Tracked::new("cart", &log)).unwrap();
    for app in ["app1", "app2"] {
        manager
            .get_session_application_scope(&context, app, true)
            .unwrap()
            .unwrap()
            .set("state", Tracked::new(app, &log))
            .unwrap();
    }
    manager.on_request_end(&mut context).unwrap();
    log.lock().clear();

    manager.on_session_end("sess1").unwrap();
    assert!(session.is_destroyed());
    assert_eq!(
        *log.lock(),
        vec![
            "app1@session_application:app1",
            "destroyed:session_application:app1",
            "app2@session_application:app2",
            "destroyed:session_application:app2",
            "cart@session:sess1",
            "destroyed:session:sess1",
        ]
    );
}

#[test]
fn test_destroy_invokes_cleanup_exactly_once() {
    let log = new_log();
    let manager = ScopeManager::new();
    let global = manager.on_global_begin("g1").unwrap();
    let app = manager.get_application_scope("app1", true).unwrap().unwrap();
    app.set("pool", Tracked::new("pool", &log)).unwrap();

    app.destroy_scope();
    app.destroy_scope();
    assert!(!app.is_valid());
    assert!(!app.is_in_destruction());
    assert!(app.is_destroyed());
    assert_eq!(*log.lock(), vec!["pool@application:app1"]);

    // 全局结束时已销毁的应用作用域不会再次清理
    manager.on_global_end().unwrap();
    assert!(global.is_destroyed());
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn test_duplicate_lifecycle_events_are_reported() {
    let manager = ScopeManager::new();
    let mut context = RequestContext::new();

    assert!(matches!(
        manager.on_request_begin(&mut context, "app1", "req1", "sess1"),
        Err(ScopeError::GlobalScopeNotPresent)
    ));
    manager.on_global_begin("g1").unwrap();
    assert!(manager.on_global_begin("g1").unwrap_err().is_duplicate_lifecycle_event());
    assert!(manager.on_request_end(&mut context).unwrap_err().is_duplicate_lifecycle_event());
    assert!(matches!(
        manager.on_request_begin(&mut context, "app1", "", "sess1"),
        Err(ScopeError::EmptyScopeId { kind: ScopeKind::Request })
    ));
}

#[test]
fn test_singletons_per_scope_kind() {
    let manager = ScopeManager::new();
    manager.on_global_begin("g1").unwrap();

    let mut first = RequestContext::new();
    let mut second = RequestContext::new();
    manager.on_request_begin(&mut first, "app1", "req1", "sess1").unwrap();
    manager.on_request_begin(&mut second, "app1", "req2", "sess2").unwrap();

    let app_a = manager.application_singleton::<Preferences>("app1").unwrap();
    let app_b = manager.application_singleton::<Preferences>("app1").unwrap();
    assert!(Arc::ptr_eq(&app_a, &app_b));

    let session_a = manager.session_singleton::<Preferences>(&first).unwrap();
    let session_b = manager.session_singleton::<Preferences>(&second).unwrap();
    assert!(!Arc::ptr_eq(&session_a, &session_b));

    let sess2 = manager.session_scope_of_id("sess2").unwrap();
    assert!(SingletonRegistry::is_singleton_instantiated::<Preferences>(sess2.as_ref()).unwrap());
    let request2 = manager.require_request_scope(&second).unwrap();
    assert!(!SingletonRegistry::is_singleton_instantiated::<Preferences>(request2.as_ref()).unwrap());
}

#[test]
fn test_session_migrates_between_managers() {
    let source = ScopeManager::new();
    source.snapshot_registry().register::<Preferences>();
    source.on_global_begin("node-a").unwrap();

    let mut context = RequestContext::new();
    source
        .on_request_begin(&mut context, "app1", "req1", "sess1")
        .unwrap();
    let session = source.require_session_scope(&context).unwrap();
    session
        .set("prefs", Preferences { theme: "dark".to_string() })
        .unwrap();
    session.set("transient", 42_i64).unwrap();
    source.on_request_end(&mut context).unwrap();

    let wire = serde_json::to_vec(&source.snapshot_session("sess1").unwrap()).unwrap();
    source.on_global_end().unwrap();

    let target = ScopeManager::new();
    target.snapshot_registry().register::<Preferences>();
    target.on_global_begin("node-b").unwrap();
    let snapshot: SessionSnapshot = serde_json::from_slice(&wire).unwrap();
    target.restore_session(&snapshot).unwrap();

    let mut context = RequestContext::new();
    target
        .on_request_begin(&mut context, "app1", "req2", "sess1")
        .unwrap();
    let session = target.require_session_scope(&context).unwrap();
    let prefs = session.get_typed::<Preferences>("prefs").unwrap().unwrap();
    assert_eq!(prefs.theme, "dark");
    assert!(!session.contains_attribute("transient").unwrap());
}

#[test]
fn test_optional_session_policy() {
    let manager = ScopeManager::with_config(ScopeManagerConfig {
        require_session_id: false,
        ..Default::default()
    });
    manager.on_global_begin("g1").unwrap();

    let mut context = RequestContext::new();
    manager.on_request_begin(&mut context, "app1", "req1", "").unwrap();
    assert!(manager.get_session_scope(&context, false).unwrap().is_none());
    assert!(manager
        .get_current_session_application_scope(&context, false)
        .unwrap()
        .is_none());
    manager.on_request_end(&mut context).unwrap();
}

#[tokio::test]
async fn test_process_infrastructure_install_and_shutdown() {
    let log = new_log();
    let infrastructure = InfrastructureBootstrapper::new(
        ScopeInfrastructureBuilder::new()
            .add_listener(Arc::new(DestroyedLog { log: Arc::clone(&log) }))
            .register_snapshot_type::<Preferences>(),
    )
    .with_global_scope_id("process")
    .bootstrap_and_install()
    .await
    .unwrap();

    let installed = scope_composition::installed().unwrap();
    assert!(Arc::ptr_eq(&installed, &infrastructure));
    assert!(InfrastructureBootstrapper::default()
        .bootstrap_and_install()
        .await
        .is_err());

    let manager = infrastructure.manager();
    assert!(manager.snapshot_registry().is_registered("preferences"));
    let mut context = RequestContext::new();
    manager
        .on_request_begin(&mut context, "app1", "req1", "sess1")
        .unwrap();
    manager.on_request_end(&mut context).unwrap();

    scope_composition::shutdown_installed().await.unwrap();
    assert!(!scope_composition::is_installed());
    assert!(log
        .lock()
        .contains(&"destroyed:global:process".to_string()));
    assert!(log.lock().contains(&"destroyed:session:sess1".to_string()));
}
