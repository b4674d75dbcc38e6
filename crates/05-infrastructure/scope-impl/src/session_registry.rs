//! 会话作用域注册表

use crate::listeners::ScopeListenerRegistry;
use crate::scopes::{end_scope, sorted_by_id, SessionScope};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use scope_abstractions::{Scope, ScopeLifecycleEvent};
use scope_common::{ScopeError, ScopeKind, ScopeResult};
use std::sync::Arc;
use tracing::info;

/// 会话作用域注册表
///
/// 会话ID到存活会话作用域的唯一映射。
#[derive(Debug)]
pub struct SessionScopeRegistry {
    sessions: DashMap<String, Arc<SessionScope>>,
    listeners: Arc<ScopeListenerRegistry>,
}

impl SessionScopeRegistry {
    /// 创建会话注册表
    pub fn new(listeners: Arc<ScopeListenerRegistry>) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            listeners,
        })
    }

    /// 获取会话作用域，不存在时按需创建
    pub fn get_session_scope(
        self: &Arc<Self>,
        session_id: &str,
        create_if_not_existing: bool,
    ) -> ScopeResult<Option<Arc<SessionScope>>> {
        Self::check_session_id(session_id)?;
        if let Some(existing) = self.session_scope_of_id(session_id) {
            return Ok(Some(existing));
        }
        if !create_if_not_existing {
            return Ok(None);
        }

        let (scope, created) = match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let scope = self.new_session(session_id)?;
                entry.insert(Arc::clone(&scope));
                (scope, true)
            }
        };
        if created {
            self.on_session_created(&scope);
        }
        Ok(Some(scope))
    }

    /// 创建新会话作用域，ID已存在时失败
    pub fn create_session_scope(self: &Arc<Self>, session_id: &str) -> ScopeResult<Arc<SessionScope>> {
        Self::check_session_id(session_id)?;
        let scope = match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(ScopeError::SessionScopeAlreadyPresent {
                    session_id: session_id.to_string(),
                })
            }
            Entry::Vacant(entry) => {
                let scope = self.new_session(session_id)?;
                entry.insert(Arc::clone(&scope));
                scope
            }
        };
        self.on_session_created(&scope);
        Ok(scope)
    }

    /// 按ID查找会话作用域
    pub fn session_scope_of_id(&self, session_id: &str) -> Option<Arc<SessionScope>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// 是否存在会话
    pub fn contains_session(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// 存活会话数量
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// 所有存活会话，按ID排序
    pub fn all_session_scopes(&self) -> Vec<Arc<SessionScope>> {
        sorted_by_id(
            self.sessions
                .iter()
                .map(|entry| Arc::clone(entry.value()))
                .collect(),
        )
    }

    /// 结束会话：注销 → 结束通知 → 级联销毁 → 销毁完成通知
    pub fn end_session(&self, session_id: &str) -> ScopeResult<()> {
        let (_, scope) = self.sessions.remove(session_id).ok_or_else(|| {
            ScopeError::SessionScopeNotPresent {
                session_id: session_id.to_string(),
            }
        })?;
        self.destroy_session(&scope);
        Ok(())
    }

    /// 仅当注册表中的会话正是该实例时结束它
    pub(crate) fn end_session_instance(&self, scope: &SessionScope) -> bool {
        let removed = self
            .sessions
            .remove_if(scope.id(), |_, registered| {
                std::ptr::eq(Arc::as_ptr(registered), scope)
            })
            .is_some();
        if removed {
            self.destroy_session(scope);
        }
        removed
    }

    /// 结束所有会话，返回结束的数量
    pub fn end_all_sessions(&self) -> usize {
        let mut sessions = Vec::new();
        self.sessions.retain(|_, scope| {
            sessions.push(Arc::clone(scope));
            false
        });

        let count = sessions.len();
        for session in sorted_by_id(sessions) {
            self.destroy_session(&session);
        }
        if count > 0 {
            info!("已结束 {} 个会话作用域", count);
        }
        count
    }

    fn new_session(self: &Arc<Self>, session_id: &str) -> ScopeResult<Arc<SessionScope>> {
        let scope = Arc::new(SessionScope::new(
            session_id,
            Arc::clone(&self.listeners),
            Arc::downgrade(self),
        )?);
        scope.init_scope();
        Ok(scope)
    }

    fn on_session_created(&self, scope: &Arc<SessionScope>) {
        info!("会话作用域已创建: {}", scope.id());
        self.listeners
            .dispatch(ScopeLifecycleEvent::Begin, scope.as_ref());
    }

    fn destroy_session(&self, scope: &SessionScope) {
        info!("结束会话作用域: {}", scope.id());
        end_scope(&self.listeners, scope);
    }

    fn check_session_id(session_id: &str) -> ScopeResult<()> {
        if session_id.trim().is_empty() {
            return Err(ScopeError::EmptyScopeId {
                kind: ScopeKind::Session,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use scope_abstractions::ScopeLifecycleListener;
    use scope_common::BoxError;

    #[derive(Default)]
    struct SessionEvents {
        events: Mutex<Vec<String>>,
    }

    impl ScopeLifecycleListener for SessionEvents {
        fn name(&self) -> &str {
            "session-events"
        }

        fn on_session_scope_begin(&self, scope: &dyn Scope) -> Result<(), BoxError> {
            self.events.lock().push(format!("begin:{}", scope.id()));
            Ok(())
        }

        fn on_session_scope_end(&self, scope: &dyn Scope) -> Result<(), BoxError> {
            self.events.lock().push(format!("end:{}", scope.id()));
            Ok(())
        }

        fn on_scope_destroyed(&self, scope: &dyn Scope) -> Result<(), BoxError> {
            self.events
                .lock()
                .push(format!("destroyed:{}:{}", scope.kind(), scope.id()));
            Ok(())
        }
    }

    fn registry() -> (Arc<SessionScopeRegistry>, Arc<SessionEvents>) {
        let listeners = Arc::new(ScopeListenerRegistry::new());
        let events = Arc::new(SessionEvents::default());
        listeners.register(Arc::clone(&events) as Arc<dyn ScopeLifecycleListener>);
        (SessionScopeRegistry::new(listeners), events)
    }

    #[test]
    fn test_get_session_scope_creates_once() {
        let (registry, events) = registry();
        assert!(registry.get_session_scope("s", false).unwrap().is_none());

        let a = registry.get_session_scope("s", true).unwrap().unwrap();
        let b = registry.get_session_scope("s", true).unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*events.events.lock(), vec!["begin:s"]);
    }

    #[test]
    fn test_create_session_scope_rejects_duplicates() {
        let (registry, _) = registry();
        registry.create_session_scope("s").unwrap();
        assert!(matches!(
            registry.create_session_scope("s"),
            Err(ScopeError::SessionScopeAlreadyPresent { .. })
        ));
        assert!(matches!(
            registry.get_session_scope("", true),
            Err(ScopeError::EmptyScopeId { kind: ScopeKind::Session })
        ));
    }

    #[test]
    fn test_end_session_notifies_and_cascades() {
        let (registry, events) = registry();
        let session = registry.get_session_scope("s", true).unwrap().unwrap();
        let app = session
            .get_session_application_scope("shop", true)
            .unwrap()
            .unwrap();

        registry.end_session("s").unwrap();
        assert!(app.is_destroyed());
        assert!(!registry.contains_session("s"));
        assert_eq!(
            *events.events.lock(),
            vec![
                "begin:s",
                "end:s",
                "destroyed:session_application:shop",
                "destroyed:session:s"
            ]
        );
    }

    #[test]
    fn test_stale_instance_does_not_end_replacement() {
        let (registry, _) = registry();
        let old = registry.get_session_scope("s", true).unwrap().unwrap();
        registry.end_session("s").unwrap();
        let replacement = registry.get_session_scope("s", true).unwrap().unwrap();

        assert!(!registry.end_session_instance(&old));
        old.self_destruct();
        assert!(replacement.is_valid());
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn test_end_all_sessions() {
        let (registry, _) = registry();
        for id in ["b", "a", "c"] {
            registry.get_session_scope(id, true).unwrap();
        }
        let ids: Vec<_> = registry
            .all_session_scopes()
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        assert_eq!(registry.end_all_sessions(), 3);
        assert_eq!(registry.session_count(), 0);
        assert_eq!(registry.end_all_sessions(), 0);
    }
}
