//! 作用域生命周期监听器（SPI）
//!
//! 由外部协作方实现，框架在作用域开始和结束时按优先级通知。

use crate::scope::Scope;
use scope_common::{BoxError, ScopeKind};

/// 生命周期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeLifecycleEvent {
    /// 作用域已创建并注册
    Begin,
    /// 作用域即将销毁，属性仍可读取
    End,
    /// 作用域销毁完成
    Destroyed,
}

/// 作用域生命周期监听器 trait
///
/// 所有方法默认为空操作。返回的错误会被记录，不会中断其他监听器。
pub trait ScopeLifecycleListener: Send + Sync {
    /// 监听器名称
    fn name(&self) -> &str;

    /// 优先级，数值越高越先通知
    fn priority(&self) -> i32 {
        0
    }

    /// 全局作用域开始
    fn on_global_scope_begin(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        Ok(())
    }

    /// 全局作用域结束
    fn on_global_scope_end(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        Ok(())
    }

    /// 应用作用域开始
    fn on_application_scope_begin(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        Ok(())
    }

    /// 应用作用域结束
    fn on_application_scope_end(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        Ok(())
    }

    /// 会话作用域开始
    fn on_session_scope_begin(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        Ok(())
    }

    /// 会话作用域结束
    fn on_session_scope_end(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        Ok(())
    }

    /// 会话应用作用域开始
    fn on_session_application_scope_begin(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        Ok(())
    }

    /// 会话应用作用域结束
    fn on_session_application_scope_end(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        Ok(())
    }

    /// 请求作用域开始
    fn on_request_scope_begin(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        Ok(())
    }

    /// 请求作用域结束
    fn on_request_scope_end(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        Ok(())
    }

    /// 任意作用域销毁完成
    fn on_scope_destroyed(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        Ok(())
    }
}

/// 将事件分派到监听器对应的方法
pub fn notify_listener(
    listener: &dyn ScopeLifecycleListener,
    event: ScopeLifecycleEvent,
    scope: &dyn Scope,
) -> Result<(), BoxError> {
    match (event, scope.kind()) {
        (ScopeLifecycleEvent::Begin, ScopeKind::Global) => listener.on_global_scope_begin(scope),
        (ScopeLifecycleEvent::End, ScopeKind::Global) => listener.on_global_scope_end(scope),
        (ScopeLifecycleEvent::Begin, ScopeKind::Application) => {
            listener.on_application_scope_begin(scope)
        }
        (ScopeLifecycleEvent::End, ScopeKind::Application) => {
            listener.on_application_scope_end(scope)
        }
        (ScopeLifecycleEvent::Begin, ScopeKind::Session) => listener.on_session_scope_begin(scope),
        (ScopeLifecycleEvent::End, ScopeKind::Session) => listener.on_session_scope_end(scope),
        (ScopeLifecycleEvent::Begin, ScopeKind::SessionApplication) => {
            listener.on_session_application_scope_begin(scope)
        }
        (ScopeLifecycleEvent::End, ScopeKind::SessionApplication) => {
            listener.on_session_application_scope_end(scope)
        }
        (ScopeLifecycleEvent::Begin, ScopeKind::Request) => listener.on_request_scope_begin(scope),
        (ScopeLifecycleEvent::End, ScopeKind::Request) => listener.on_request_scope_end(scope),
        (ScopeLifecycleEvent::Destroyed, _) => listener.on_scope_destroyed(scope),
    }
}
