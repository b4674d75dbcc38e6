use super::{end_scope, sorted_by_id, SessionApplicationScope};
use crate::core::{delegate_scope, ScopeCore, ScopeHooks};
use crate::listeners::ScopeListenerRegistry;
use crate::session_registry::SessionScopeRegistry;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use scope_abstractions::{AttributeValue, Scope, ScopeLifecycleEvent};
use scope_common::{ScopeError, ScopeKind, ScopeResult};
use std::sync::{Arc, Weak};
use tracing::debug;

/// 会话作用域
///
/// 拥有以应用ID为键的会话应用作用域。销毁时先级联销毁所有会话应用作用域。
#[derive(Debug)]
pub struct SessionScope {
    core: ScopeCore,
    session_applications: DashMap<String, Arc<SessionApplicationScope>>,
    listeners: Arc<ScopeListenerRegistry>,
    registry: Weak<SessionScopeRegistry>,
}

impl SessionScope {
    pub(crate) fn new(
        session_id: impl Into<String>,
        listeners: Arc<ScopeListenerRegistry>,
        registry: Weak<SessionScopeRegistry>,
    ) -> ScopeResult<Self> {
        Ok(Self {
            core: ScopeCore::new(ScopeKind::Session, session_id)?,
            session_applications: DashMap::new(),
            listeners,
            registry,
        })
    }

    /// 会话ID
    pub fn session_id(&self) -> &str {
        self.core.id()
    }

    /// 获取会话应用作用域，不存在时按需创建
    pub fn get_session_application_scope(
        &self,
        application_id: &str,
        create_if_not_existing: bool,
    ) -> ScopeResult<Option<Arc<SessionApplicationScope>>> {
        if application_id.trim().is_empty() {
            return Err(ScopeError::EmptyScopeId {
                kind: ScopeKind::SessionApplication,
            });
        }
        if let Some(existing) = self.session_applications.get(application_id) {
            return Ok(Some(Arc::clone(existing.value())));
        }
        if !create_if_not_existing {
            return Ok(None);
        }
        if !self.is_valid() {
            return Err(ScopeError::not_valid(ScopeKind::Session, self.id(), self.state()));
        }

        let (scope, created) = match self.session_applications.entry(application_id.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let scope = Arc::new(SessionApplicationScope::new(self.id(), application_id)?);
                scope.init_scope();
                entry.insert(Arc::clone(&scope));
                (scope, true)
            }
        };

        if created {
            if !self.is_valid() {
                self.session_applications
                    .remove_if(application_id, |_, existing| Arc::ptr_eq(existing, &scope));
                scope.destroy_scope();
                return Err(ScopeError::not_valid(ScopeKind::Session, self.id(), self.state()));
            }
            debug!(session_id = self.id(), "会话应用作用域已创建: {}", application_id);
            self.listeners
                .dispatch(ScopeLifecycleEvent::Begin, scope.as_ref());
        }
        Ok(Some(scope))
    }

    /// 会话应用作用域数量
    pub fn session_application_scope_count(&self) -> usize {
        self.session_applications.len()
    }

    /// 所有会话应用作用域，按应用ID排序
    pub fn all_session_application_scopes(&self) -> Vec<Arc<SessionApplicationScope>> {
        sorted_by_id(
            self.session_applications
                .iter()
                .map(|entry| Arc::clone(entry.value()))
                .collect(),
        )
    }

    /// 所有续期感知属性
    pub fn renewal_aware_attributes(&self) -> ScopeResult<Vec<(String, AttributeValue)>> {
        Ok(self
            .all_attributes()?
            .into_iter()
            .filter(|(_, value)| value.is_renewal_aware())
            .collect())
    }

    /// 会话超时等外部信号触发的自我销毁
    ///
    /// 通过会话注册表注销并发出通知；已不在注册表中时直接销毁。
    pub fn self_destruct(&self) {
        let unregistered = self
            .registry
            .upgrade()
            .is_some_and(|registry| registry.end_session_instance(self));
        if !unregistered {
            end_scope(&self.listeners, self);
        }
    }
}

impl ScopeHooks for SessionScope {
    fn pre_destroy(&self) {
        let mut applications = Vec::new();
        self.session_applications.retain(|_, scope| {
            applications.push(Arc::clone(scope));
            false
        });

        for application in sorted_by_id(applications) {
            end_scope(&self.listeners, application.as_ref());
        }
    }
}

delegate_scope!(SessionScope);
