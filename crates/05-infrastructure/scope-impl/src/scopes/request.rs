use crate::core::{delegate_scope, ScopeCore, ScopeHooks};
use scope_common::{ScopeError, ScopeKind, ScopeResult};

/// 请求作用域
///
/// 只在一次请求期间存在，由一个 [`RequestContext`](crate::RequestContext) 独占。
#[derive(Debug)]
pub struct RequestScope {
    core: ScopeCore,
    application_id: String,
    session_id: String,
}

impl RequestScope {
    /// 创建请求作用域
    pub fn new(
        request_id: impl Into<String>,
        application_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> ScopeResult<Self> {
        let application_id = application_id.into();
        if application_id.trim().is_empty() {
            return Err(ScopeError::EmptyScopeId {
                kind: ScopeKind::Application,
            });
        }
        Ok(Self {
            core: ScopeCore::new(ScopeKind::Request, request_id)?,
            application_id,
            session_id: session_id.into(),
        })
    }

    /// 请求ID
    pub fn request_id(&self) -> &str {
        self.core.id()
    }

    /// 应用ID
    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// 会话ID
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl ScopeHooks for RequestScope {}

delegate_scope!(RequestScope);
