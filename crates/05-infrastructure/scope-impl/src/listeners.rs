//! 生命周期监听器注册与分派

use crate::core::panic_message;
use parking_lot::RwLock;
use scope_abstractions::{notify_listener, Scope, ScopeLifecycleEvent, ScopeLifecycleListener};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info};

/// 生命周期监听器注册表
///
/// 按优先级从高到低通知，同优先级按注册顺序。监听器的错误和 panic
/// 只记录，不影响其他监听器和作用域状态。
#[derive(Default)]
pub struct ScopeListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn ScopeLifecycleListener>>>,
}

impl std::fmt::Debug for ScopeListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeListenerRegistry")
            .field("listeners", &self.listener_names())
            .finish()
    }
}

impl ScopeListenerRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册监听器
    pub fn register(&self, listener: Arc<dyn ScopeLifecycleListener>) {
        info!(
            "注册作用域监听器: {} (优先级 {})",
            listener.name(),
            listener.priority()
        );
        let mut listeners = self.listeners.write();
        let position = listeners
            .iter()
            .position(|existing| existing.priority() < listener.priority())
            .unwrap_or(listeners.len());
        listeners.insert(position, listener);
    }

    /// 按名称移除监听器
    pub fn unregister(&self, name: &str) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|listener| listener.name() != name);
        let removed = listeners.len() < before;
        if removed {
            info!("移除作用域监听器: {}", name);
        }
        removed
    }

    /// 监听器数量
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// 按通知顺序返回监听器名称
    pub fn listener_names(&self) -> Vec<String> {
        self.listeners
            .read()
            .iter()
            .map(|listener| listener.name().to_string())
            .collect()
    }

    /// 分派生命周期事件
    ///
    /// 在监听器列表快照上通知，监听器内可以重入注册表和作用域管理器。
    pub fn dispatch(&self, event: ScopeLifecycleEvent, scope: &dyn Scope) {
        let listeners = self.listeners.read().clone();
        if listeners.is_empty() {
            return;
        }

        debug!(
            kind = %scope.kind(),
            scope_id = scope.id(),
            "分派作用域事件 {:?} 到 {} 个监听器",
            event,
            listeners.len()
        );
        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| {
                notify_listener(listener.as_ref(), event, scope)
            })) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(
                    listener = listener.name(),
                    kind = %scope.kind(),
                    scope_id = scope.id(),
                    "作用域监听器处理 {:?} 失败: {}",
                    event,
                    e
                ),
                Err(panic) => error!(
                    listener = listener.name(),
                    kind = %scope.kind(),
                    scope_id = scope.id(),
                    "作用域监听器处理 {:?} 时发生 panic: {}",
                    event,
                    panic_message(panic.as_ref())
                ),
            }
        }
    }
}
