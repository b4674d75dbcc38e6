use crate::core::{delegate_scope, ScopeCore, ScopeHooks};
use scope_common::{ScopeKind, ScopeResult};

/// 应用作用域
///
/// 归属于全局作用域，以应用ID标识，跨越多个请求和会话存在。
#[derive(Debug)]
pub struct ApplicationScope {
    core: ScopeCore,
}

impl ApplicationScope {
    /// 创建应用作用域
    pub fn new(application_id: impl Into<String>) -> ScopeResult<Self> {
        Ok(Self {
            core: ScopeCore::new(ScopeKind::Application, application_id)?,
        })
    }
}

impl ScopeHooks for ApplicationScope {}

delegate_scope!(ApplicationScope);
