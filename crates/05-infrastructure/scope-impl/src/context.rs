//! 请求上下文
//!
//! 请求作用域不绑定到线程，而是由调用方显式持有的 [`RequestContext`] 承载，
//! 并传递给所有依赖当前请求的调用。

use crate::scopes::RequestScope;
use std::sync::Arc;

/// 请求上下文
///
/// 每个上下文同一时刻最多绑定一个请求作用域。
#[derive(Debug, Default)]
pub struct RequestContext {
    request: Option<Arc<RequestScope>>,
}

impl RequestContext {
    /// 创建未绑定的上下文
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前绑定的请求作用域
    pub fn request_scope(&self) -> Option<&Arc<RequestScope>> {
        self.request.as_ref()
    }

    /// 是否已绑定请求作用域
    pub fn is_bound(&self) -> bool {
        self.request.is_some()
    }

    /// 当前请求ID
    pub fn request_id(&self) -> Option<&str> {
        self.request.as_deref().map(RequestScope::request_id)
    }

    /// 当前会话ID
    pub fn session_id(&self) -> Option<&str> {
        self.request.as_deref().map(RequestScope::session_id)
    }

    /// 当前应用ID
    pub fn application_id(&self) -> Option<&str> {
        self.request.as_deref().map(RequestScope::application_id)
    }

    pub(crate) fn bind(&mut self, request: Arc<RequestScope>) {
        self.request = Some(request);
    }

    pub(crate) fn unbind(&mut self) -> Option<Arc<RequestScope>> {
        self.request.take()
    }
}
