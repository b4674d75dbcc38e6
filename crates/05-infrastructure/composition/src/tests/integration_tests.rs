//! 配置加载与基础设施生命周期集成测试

use crate::builder::{LoggingConfig, ScopeInfrastructureBuilder};
use crate::config_sources::{LoggingSettings, ScopeConfigLoader};
use crate::infrastructure::InfrastructureStatus;
use scope_abstractions::{Scope, ScopeExt, ScopeLifecycleListener};
use scope_common::{BoxError, ConfigError, ScopeInfrastructureError, ScopeManagerConfig};
use scope_impl::RequestContext;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::{Builder, NamedTempFile};

fn temp_config(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_missing_sources_use_defaults() {
    let settings = ScopeConfigLoader::new()
        .add_toml_file("/nonexistent/scopes.toml", 10)
        .load()
        .unwrap();
    assert_eq!(settings.scopes, ScopeManagerConfig::default());
    assert!(settings.logging.is_none());
}

#[test]
fn test_load_toml_section() {
    let file = temp_config(
        ".toml",
        r#"
[scopes]
default_global_scope_id = "main"
require_session_id = false

[logging]
level = "debug"
json_format = true
"#,
    );

    let settings = ScopeConfigLoader::new()
        .add_file(file.path(), 10)
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(settings.scopes.default_global_scope_id, "main");
    assert!(!settings.scopes.require_session_id);
    assert!(settings.scopes.end_sessions_on_global_end);

    let logging = settings.logging.unwrap();
    assert_eq!(logging.level, "debug");
    assert!(logging.json_format);
    assert!(logging.show_target);
}

#[test]
fn test_load_json_and_yaml() {
    let json = temp_config(".json", r#"{ "scopes": { "debug_life_cycle": true } }"#);
    let yaml = temp_config(".yaml", "scopes:\n  end_sessions_on_global_end: false\n");

    let settings = ScopeConfigLoader::new()
        .add_file(json.path(), 20)
        .unwrap()
        .add_file(yaml.path(), 10)
        .unwrap()
        .load()
        .unwrap();
    assert!(settings.scopes.debug_life_cycle);
    assert!(!settings.scopes.end_sessions_on_global_end);
}

#[test]
fn test_higher_priority_source_wins() {
    let base = temp_config(".toml", "[scopes]\ndefault_global_scope_id = \"base\"\n");
    let local = temp_config(".toml", "[scopes]\ndefault_global_scope_id = \"local\"\n");

    let settings = ScopeConfigLoader::new()
        .add_file(local.path(), 1)
        .unwrap()
        .add_file(base.path(), 5)
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(settings.scopes.default_global_scope_id, "local");
}

#[test]
fn test_environment_overrides_file() {
    let file = temp_config(".toml", "[scopes]\nrequire_session_id = true\n");
    let vars = HashMap::from([(
        "SCOPES_SCOPES__REQUIRE_SESSION_ID".to_string(),
        "false".to_string(),
    )]);

    let settings = ScopeConfigLoader::new()
        .add_file(file.path(), 10)
        .unwrap()
        .add_environment("SCOPES", 1)
        .with_environment_overrides(vars)
        .load()
        .unwrap();
    assert!(!settings.scopes.require_session_id);
}

#[test]
fn test_malformed_file_is_parse_error() {
    let file = temp_config(".toml", "[scopes\nbroken");
    let result = ScopeConfigLoader::new()
        .add_file(file.path(), 10)
        .unwrap()
        .load();
    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

#[test]
fn test_invalid_values_are_rejected() {
    let file = temp_config(".toml", "[scopes]\ndefault_global_scope_id = \" \"\n");
    let result = ScopeConfigLoader::new()
        .add_file(file.path(), 10)
        .unwrap()
        .load();
    assert!(matches!(result, Err(ConfigError::ValidationError { .. })));

    assert!(matches!(
        ScopeConfigLoader::new().add_file("scopes.ini", 10),
        Err(ConfigError::ValidationError { .. })
    ));
    assert!(matches!(
        ScopeConfigLoader::new().add_required_file("/nonexistent/scopes.toml", 10),
        Err(ConfigError::FileNotFound { .. })
    ));
}

#[test]
fn test_logging_settings_conversion() {
    let config = LoggingConfig::try_from(&LoggingSettings {
        level: "warn".to_string(),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(config.level, tracing::Level::WARN);

    let invalid = LoggingConfig::try_from(&LoggingSettings {
        level: "loud".to_string(),
        ..Default::default()
    });
    assert!(matches!(
        invalid,
        Err(ScopeInfrastructureError::BootstrapFailed { .. })
    ));
}

#[derive(Default)]
struct GlobalCounter {
    begins: AtomicUsize,
    ends: AtomicUsize,
}

impl ScopeLifecycleListener for GlobalCounter {
    fn name(&self) -> &str {
        "global-counter"
    }

    fn on_global_scope_begin(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_global_scope_end(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        self.ends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_infrastructure_lifecycle() {
    let config_file = temp_config(".toml", "[scopes]\ndefault_global_scope_id = \"app-server\"\n");
    let counter = Arc::new(GlobalCounter::default());

    let infrastructure = ScopeInfrastructureBuilder::new()
        .add_config_file(config_file.path())
        .unwrap()
        .add_listener(Arc::clone(&counter) as Arc<dyn ScopeLifecycleListener>)
        .build()
        .unwrap();
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Initialized);

    let global = infrastructure.start().await.unwrap();
    assert_eq!(global.id(), "app-server");
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Running);
    assert_eq!(counter.begins.load(Ordering::SeqCst), 1);

    let manager = infrastructure.manager();
    let mut context = RequestContext::new();
    manager
        .on_request_begin(&mut context, "shop", "req-1", "session-1")
        .unwrap();
    manager
        .require_session_scope(&context)
        .unwrap()
        .set("user", "alice".to_string())
        .unwrap();
    manager.on_request_end(&mut context).unwrap();

    let metrics = infrastructure.get_metrics().await;
    assert_eq!(metrics.live_session_count, 1);
    assert_eq!(metrics.application_scope_count, 1);
    assert_eq!(metrics.listener_count, 1);

    infrastructure.stop().await.unwrap();
    assert!(global.is_destroyed());
    assert_eq!(counter.ends.load(Ordering::SeqCst), 1);
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Stopped);

    let metrics = infrastructure.get_metrics().await;
    assert_eq!(metrics.ended_session_count, 1);
    assert_eq!(metrics.live_session_count, 0);
    assert!(metrics.uptime().is_some());
}

#[tokio::test]
async fn test_start_twice_fails() {
    let infrastructure = ScopeInfrastructureBuilder::new().build().unwrap();
    infrastructure.start().await.unwrap();

    let err = infrastructure.start().await.unwrap_err();
    assert!(matches!(err, ScopeInfrastructureError::ScopeError { .. }));
    assert_eq!(infrastructure.get_status().await, InfrastructureStatus::Failed);
}

#[tokio::test]
async fn test_explicit_config_overrides_sources() {
    let config_file = temp_config(".toml", "[scopes]\ndefault_global_scope_id = \"from-file\"\n");
    let infrastructure = ScopeInfrastructureBuilder::new()
        .add_config_file(config_file.path())
        .unwrap()
        .with_config(ScopeManagerConfig {
            default_global_scope_id: "explicit".to_string(),
            ..Default::default()
        })
        .build()
        .unwrap();

    let global = infrastructure.start().await.unwrap();
    assert_eq!(global.id(), "explicit");
    infrastructure.stop().await.unwrap();
}
