//! 具体作用域实现

mod application;
mod global;
mod request;
mod session;
mod session_application;

pub use application::ApplicationScope;
pub use global::GlobalScope;
pub use request::RequestScope;
pub use session::SessionScope;
pub use session_application::SessionApplicationScope;

use crate::listeners::ScopeListenerRegistry;
use scope_abstractions::{Scope, ScopeLifecycleEvent};
use std::sync::Arc;

/// 带通知地销毁作用域：结束通知 → 销毁 → 销毁完成通知
pub(crate) fn end_scope(listeners: &ScopeListenerRegistry, scope: &dyn Scope) {
    if !scope.is_valid() {
        return;
    }
    listeners.dispatch(ScopeLifecycleEvent::End, scope);
    scope.destroy_scope();
    listeners.dispatch(ScopeLifecycleEvent::Destroyed, scope);
}

/// 按ID排序，保证级联销毁顺序确定
pub(crate) fn sorted_by_id<S: Scope>(mut scopes: Vec<Arc<S>>) -> Vec<Arc<S>> {
    scopes.sort_by(|a, b| a.id().cmp(b.id()));
    scopes
}
