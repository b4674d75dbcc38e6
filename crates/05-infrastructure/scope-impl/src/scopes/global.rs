use super::{end_scope, sorted_by_id, ApplicationScope};
use crate::core::{delegate_scope, ScopeCore, ScopeHooks};
use crate::listeners::ScopeListenerRegistry;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use scope_abstractions::{Scope, ScopeLifecycleEvent};
use scope_common::{ScopeError, ScopeKind, ScopeResult};
use std::sync::Arc;
use tracing::info;

/// 全局作用域
///
/// 每个进程最多一个，拥有以应用ID为键的应用作用域。销毁时先级联销毁所有应用作用域。
#[derive(Debug)]
pub struct GlobalScope {
    core: ScopeCore,
    applications: DashMap<String, Arc<ApplicationScope>>,
    listeners: Arc<ScopeListenerRegistry>,
}

impl GlobalScope {
    /// 创建全局作用域
    pub fn new(id: impl Into<String>, listeners: Arc<ScopeListenerRegistry>) -> ScopeResult<Self> {
        Ok(Self {
            core: ScopeCore::new(ScopeKind::Global, id)?,
            applications: DashMap::new(),
            listeners,
        })
    }

    /// 获取应用作用域，不存在时按需创建
    ///
    /// 创建是原子的：并发首次访问同一应用ID只会创建一个实例。
    /// 新作用域注册完成后才发出开始通知。
    pub fn get_application_scope(
        &self,
        application_id: &str,
        create_if_not_existing: bool,
    ) -> ScopeResult<Option<Arc<ApplicationScope>>> {
        if application_id.trim().is_empty() {
            return Err(ScopeError::EmptyScopeId {
                kind: ScopeKind::Application,
            });
        }
        if let Some(existing) = self.applications.get(application_id) {
            return Ok(Some(Arc::clone(existing.value())));
        }
        if !create_if_not_existing {
            return Ok(None);
        }
        if !self.is_valid() {
            return Err(ScopeError::not_valid(ScopeKind::Global, self.id(), self.state()));
        }

        let (scope, created) = match self.applications.entry(application_id.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let scope = Arc::new(ApplicationScope::new(application_id)?);
                scope.init_scope();
                entry.insert(Arc::clone(&scope));
                (scope, true)
            }
        };

        if created {
            // 全局作用域在创建期间开始销毁时，新应用作用域不能遗留
            if !self.is_valid() {
                self.applications
                    .remove_if(application_id, |_, existing| Arc::ptr_eq(existing, &scope));
                scope.destroy_scope();
                return Err(ScopeError::not_valid(ScopeKind::Global, self.id(), self.state()));
            }
            info!(global_id = self.id(), "应用作用域已创建: {}", application_id);
            self.listeners
                .dispatch(ScopeLifecycleEvent::Begin, scope.as_ref());
        }
        Ok(Some(scope))
    }

    /// 应用作用域数量
    pub fn application_scope_count(&self) -> usize {
        self.applications.len()
    }

    /// 所有应用作用域，按ID排序
    pub fn all_application_scopes(&self) -> Vec<Arc<ApplicationScope>> {
        sorted_by_id(
            self.applications
                .iter()
                .map(|entry| Arc::clone(entry.value()))
                .collect(),
        )
    }
}

impl ScopeHooks for GlobalScope {
    fn pre_destroy(&self) {
        let mut applications = Vec::new();
        self.applications.retain(|_, scope| {
            applications.push(Arc::clone(scope));
            false
        });

        for application in sorted_by_id(applications) {
            info!(global_id = self.id(), "销毁应用作用域: {}", application.id());
            end_scope(&self.listeners, application.as_ref());
        }
    }
}

delegate_scope!(GlobalScope);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use scope_abstractions::ScopeLifecycleListener;
    use scope_common::BoxError;

    #[derive(Default)]
    struct ApplicationEvents {
        events: Mutex<Vec<String>>,
    }

    impl ScopeLifecycleListener for ApplicationEvents {
        fn name(&self) -> &str {
            "application-events"
        }

        fn on_application_scope_begin(&self, scope: &dyn Scope) -> Result<(), BoxError> {
            self.events.lock().push(format!("begin:{}", scope.id()));
            Ok(())
        }

        fn on_application_scope_end(&self, scope: &dyn Scope) -> Result<(), BoxError> {
            self.events.lock().push(format!("end:{}", scope.id()));
            Ok(())
        }
    }

    fn global() -> (GlobalScope, Arc<ApplicationEvents>) {
        let listeners = Arc::new(ScopeListenerRegistry::new());
        let events = Arc::new(ApplicationEvents::default());
        listeners.register(Arc::clone(&events) as Arc<dyn ScopeLifecycleListener>);
        let global = GlobalScope::new("g", listeners).unwrap();
        global.init_scope();
        (global, events)
    }

    #[test]
    fn test_application_scope_created_once() {
        let (global, events) = global();
        assert!(global.get_application_scope("shop", false).unwrap().is_none());

        let a = global.get_application_scope("shop", true).unwrap().unwrap();
        let b = global.get_application_scope("shop", true).unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(global.application_scope_count(), 1);
        assert_eq!(*events.events.lock(), vec!["begin:shop"]);
    }

    #[test]
    fn test_destroy_cascades_sorted_by_id() {
        let (global, events) = global();
        let blog = global.get_application_scope("blog", true).unwrap().unwrap();
        let admin = global.get_application_scope("admin", true).unwrap().unwrap();

        global.destroy_scope();
        assert!(blog.is_destroyed());
        assert!(admin.is_destroyed());
        assert_eq!(global.application_scope_count(), 0);
        assert_eq!(
            *events.events.lock(),
            vec!["begin:blog", "begin:admin", "end:admin", "end:blog"]
        );
    }

    #[test]
    fn test_no_applications_after_destruction() {
        let (global, _) = global();
        global.destroy_scope();
        assert!(matches!(
            global.get_application_scope("shop", true),
            Err(ScopeError::ScopeNotValid { kind: ScopeKind::Global, .. })
        ));
        assert!(global.get_application_scope("shop", false).unwrap().is_none());
    }
}
