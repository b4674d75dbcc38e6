use crate::core::{delegate_scope, ScopeCore, ScopeHooks};
use scope_common::{ScopeKind, ScopeResult};

/// 会话应用作用域
///
/// 保存某个会话在某个应用下的状态，ID 为应用ID。
#[derive(Debug)]
pub struct SessionApplicationScope {
    core: ScopeCore,
    session_id: String,
}

impl SessionApplicationScope {
    /// 创建会话应用作用域
    pub fn new(session_id: impl Into<String>, application_id: impl Into<String>) -> ScopeResult<Self> {
        Ok(Self {
            core: ScopeCore::new(ScopeKind::SessionApplication, application_id)?,
            session_id: session_id.into(),
        })
    }

    /// 所属会话ID
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 应用ID
    pub fn application_id(&self) -> &str {
        self.core.id()
    }
}

impl ScopeHooks for SessionApplicationScope {}

delegate_scope!(SessionApplicationScope);
