//! 作用域管理器
//!
//! 作用域类型 + ID 到存活作用域的唯一映射，负责开始/结束事件的编排和级联销毁。
//! 管理器是显式构造和持有的对象，进程级单实例只在最外层组合点创建。

use crate::context::RequestContext;
use crate::listeners::ScopeListenerRegistry;
use crate::scopes::{
    end_scope, ApplicationScope, GlobalScope, RequestScope, SessionApplicationScope, SessionScope,
};
use crate::session_registry::SessionScopeRegistry;
use crate::snapshot::SnapshotRegistry;
use dashmap::DashSet;
use parking_lot::RwLock;
use scope_abstractions::{
    AttributeValue, Scope, ScopeLifecycleEvent, ScopeLifecycleListener, SessionSnapshot,
};
use scope_common::{ScopeError, ScopeKind, ScopeManagerConfig, ScopeResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 作用域管理器
#[derive(Debug)]
pub struct ScopeManager {
    config: ScopeManagerConfig,
    listeners: Arc<ScopeListenerRegistry>,
    global: RwLock<Option<Arc<GlobalScope>>>,
    sessions: Arc<SessionScopeRegistry>,
    active_requests: DashSet<String>,
    snapshots: SnapshotRegistry,
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeManager {
    /// 使用默认配置创建管理器
    pub fn new() -> Self {
        Self::with_config(ScopeManagerConfig::default())
    }

    /// 使用指定配置创建管理器
    pub fn with_config(config: ScopeManagerConfig) -> Self {
        let listeners = Arc::new(ScopeListenerRegistry::new());
        Self {
            config,
            sessions: SessionScopeRegistry::new(Arc::clone(&listeners)),
            listeners,
            global: RwLock::new(None),
            active_requests: DashSet::new(),
            snapshots: SnapshotRegistry::new(),
        }
    }

    /// 管理器配置
    pub fn config(&self) -> &ScopeManagerConfig {
        &self.config
    }

    /// 监听器注册表
    pub fn listeners(&self) -> &Arc<ScopeListenerRegistry> {
        &self.listeners
    }

    /// 注册生命周期监听器
    pub fn register_listener(&self, listener: Arc<dyn ScopeLifecycleListener>) {
        self.listeners.register(listener);
    }

    /// 会话注册表
    pub fn session_registry(&self) -> &Arc<SessionScopeRegistry> {
        &self.sessions
    }

    /// 快照类型注册表
    pub fn snapshot_registry(&self) -> &SnapshotRegistry {
        &self.snapshots
    }

    // ---------------------------------------------------------------- 全局

    /// 开始全局作用域，已存在时失败
    pub fn on_global_begin(&self, scope_id: &str) -> ScopeResult<Arc<GlobalScope>> {
        let global = {
            let mut slot = self.global.write();
            if let Some(existing) = slot.as_ref() {
                return Err(ScopeError::GlobalScopeAlreadyPresent {
                    scope_id: existing.id().to_string(),
                });
            }
            let global = self.new_global(scope_id)?;
            *slot = Some(Arc::clone(&global));
            global
        };

        info!("全局作用域已开始: {}", global.id());
        self.listeners
            .dispatch(ScopeLifecycleEvent::Begin, global.as_ref());
        Ok(global)
    }

    /// 结束全局作用域，级联销毁所有应用作用域
    ///
    /// 配置 `end_sessions_on_global_end` 时先结束所有会话。
    pub fn on_global_end(&self) -> ScopeResult<()> {
        let global = self
            .global
            .write()
            .take()
            .ok_or(ScopeError::GlobalScopeNotPresent)?;

        if self.config.end_sessions_on_global_end {
            self.sessions.end_all_sessions();
        }
        end_scope(&self.listeners, global.as_ref());
        info!("全局作用域已结束: {}", global.id());
        Ok(())
    }

    /// 当前全局作用域
    pub fn global_scope(&self) -> Option<Arc<GlobalScope>> {
        self.global.read().clone()
    }

    /// 是否存在全局作用域
    pub fn is_global_scope_present(&self) -> bool {
        self.global.read().is_some()
    }

    /// 获取全局作用域，按需使用配置的默认ID创建
    pub fn get_global_scope(
        &self,
        create_if_not_existing: bool,
    ) -> ScopeResult<Option<Arc<GlobalScope>>> {
        if let Some(global) = self.global_scope() {
            return Ok(Some(global));
        }
        if !create_if_not_existing {
            return Ok(None);
        }

        let (global, created) = {
            let mut slot = self.global.write();
            match slot.as_ref() {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let global = self.new_global(&self.config.default_global_scope_id)?;
                    *slot = Some(Arc::clone(&global));
                    (global, true)
                }
            }
        };
        if created {
            info!("全局作用域已按需创建: {}", global.id());
            self.listeners
                .dispatch(ScopeLifecycleEvent::Begin, global.as_ref());
        }
        Ok(Some(global))
    }

    /// 获取全局作用域，不存在时失败
    pub fn require_global_scope(&self) -> ScopeResult<Arc<GlobalScope>> {
        self.global_scope().ok_or(ScopeError::GlobalScopeNotPresent)
    }

    fn new_global(&self, scope_id: &str) -> ScopeResult<Arc<GlobalScope>> {
        let global = Arc::new(GlobalScope::new(scope_id, Arc::clone(&self.listeners))?);
        global.init_scope();
        Ok(global)
    }

    // ---------------------------------------------------------------- 应用

    /// 获取应用作用域
    ///
    /// 没有全局作用域时：不创建则返回 `None`，要求创建则失败。
    pub fn get_application_scope(
        &self,
        application_id: &str,
        create_if_not_existing: bool,
    ) -> ScopeResult<Option<Arc<ApplicationScope>>> {
        match self.global_scope() {
            Some(global) => global.get_application_scope(application_id, create_if_not_existing),
            None if create_if_not_existing => Err(ScopeError::GlobalScopeNotPresent),
            None => Ok(None),
        }
    }

    /// 获取应用作用域，不存在时失败
    pub fn require_application_scope(&self, application_id: &str) -> ScopeResult<Arc<ApplicationScope>> {
        self.require_global_scope()?
            .get_application_scope(application_id, false)?
            .ok_or_else(|| ScopeError::ApplicationScopeNotPresent {
                application_id: application_id.to_string(),
            })
    }

    // ---------------------------------------------------------------- 请求

    /// 开始请求
    ///
    /// 获取或创建应用作用域和会话作用域，创建新的请求作用域并绑定到上下文。
    /// 上下文已绑定请求时失败；任何一步失败都不会留下已注册的请求。
    pub fn on_request_begin(
        &self,
        context: &mut RequestContext,
        application_id: &str,
        request_id: &str,
        session_id: &str,
    ) -> ScopeResult<Arc<RequestScope>> {
        if let Some(bound) = context.request_id() {
            return Err(ScopeError::RequestScopeAlreadyPresent {
                request_id: bound.to_string(),
            });
        }
        if request_id.trim().is_empty() {
            return Err(ScopeError::EmptyScopeId {
                kind: ScopeKind::Request,
            });
        }
        if self.config.require_session_id && session_id.trim().is_empty() {
            return Err(ScopeError::EmptyScopeId {
                kind: ScopeKind::Session,
            });
        }
        let global = self.require_global_scope()?;

        if !self.active_requests.insert(request_id.to_string()) {
            return Err(ScopeError::DuplicateRequestId {
                request_id: request_id.to_string(),
            });
        }
        let request = match self.create_request(&global, application_id, request_id, session_id) {
            Ok(request) => request,
            Err(e) => {
                self.active_requests.remove(request_id);
                return Err(e);
            }
        };

        context.bind(Arc::clone(&request));
        debug!(
            application_id,
            session_id, "请求作用域已开始: {}", request_id
        );
        self.listeners
            .dispatch(ScopeLifecycleEvent::Begin, request.as_ref());
        Ok(request)
    }

    fn create_request(
        &self,
        global: &GlobalScope,
        application_id: &str,
        request_id: &str,
        session_id: &str,
    ) -> ScopeResult<Arc<RequestScope>> {
        global.get_application_scope(application_id, true)?;
        if !session_id.trim().is_empty() {
            self.sessions.get_session_scope(session_id, true)?;
        }
        let request = Arc::new(RequestScope::new(request_id, application_id, session_id)?);
        request.init_scope();
        Ok(request)
    }

    /// 结束请求，销毁请求作用域并解除上下文绑定
    pub fn on_request_end(&self, context: &mut RequestContext) -> ScopeResult<()> {
        let request = context.unbind().ok_or(ScopeError::RequestScopeNotPresent)?;
        self.active_requests.remove(request.id());
        end_scope(&self.listeners, request.as_ref());
        debug!("请求作用域已结束: {}", request.id());
        Ok(())
    }

    /// 上下文绑定的请求作用域
    pub fn get_request_scope(&self, context: &RequestContext) -> Option<Arc<RequestScope>> {
        context.request_scope().cloned()
    }

    /// 上下文绑定的请求作用域，未绑定时失败
    pub fn require_request_scope(&self, context: &RequestContext) -> ScopeResult<Arc<RequestScope>> {
        self.get_request_scope(context)
            .ok_or(ScopeError::RequestScopeNotPresent)
    }

    /// 活动请求数量
    pub fn active_request_count(&self) -> usize {
        self.active_requests.len()
    }

    // ---------------------------------------------------------------- 会话

    /// 获取当前请求的会话作用域
    ///
    /// 上下文未绑定请求时：不创建则返回 `None`，要求创建则失败。
    pub fn get_session_scope(
        &self,
        context: &RequestContext,
        create_if_not_existing: bool,
    ) -> ScopeResult<Option<Arc<SessionScope>>> {
        let Some(request) = context.request_scope() else {
            return if create_if_not_existing {
                Err(ScopeError::RequestScopeNotPresent)
            } else {
                Ok(None)
            };
        };
        if request.session_id().trim().is_empty() && !create_if_not_existing {
            return Ok(None);
        }
        self.sessions
            .get_session_scope(request.session_id(), create_if_not_existing)
    }

    /// 获取当前请求的会话作用域，不存在时失败
    pub fn require_session_scope(&self, context: &RequestContext) -> ScopeResult<Arc<SessionScope>> {
        let request = self.require_request_scope(context)?;
        self.sessions
            .get_session_scope(request.session_id(), false)?
            .ok_or_else(|| ScopeError::SessionScopeNotPresent {
                session_id: request.session_id().to_string(),
            })
    }

    /// 按ID查找会话作用域
    pub fn session_scope_of_id(&self, session_id: &str) -> Option<Arc<SessionScope>> {
        self.sessions.session_scope_of_id(session_id)
    }

    /// 结束会话（如会话超时），级联销毁其会话应用作用域
    pub fn on_session_end(&self, session_id: &str) -> ScopeResult<()> {
        self.sessions.end_session(session_id)
    }

    /// 会话续期
    ///
    /// 先注册新会话，失败时旧会话保持不变。随后把旧会话及其会话应用作用域中的
    /// 续期感知属性迁移到新会话，再结束旧会话；迁移的属性在旧会话销毁前移除，
    /// 不会触发销毁通知。迁移失败时新会话被撤销，属性仍由旧会话持有。
    pub fn renew_session(
        &self,
        old_session_id: &str,
        new_session_id: &str,
    ) -> ScopeResult<Arc<SessionScope>> {
        if new_session_id.trim().is_empty() {
            return Err(ScopeError::EmptyScopeId {
                kind: ScopeKind::Session,
            });
        }
        let old = self.session_scope_of_id(old_session_id).ok_or_else(|| {
            ScopeError::SessionScopeNotPresent {
                session_id: old_session_id.to_string(),
            }
        })?;

        let renewed = self.sessions.create_session_scope(new_session_id)?;
        let mut moved = Vec::new();
        if let Err(e) = move_renewal_aware(&old, &renewed, &mut moved) {
            warn!("会话续期失败，撤销新会话 {}: {}", new_session_id, e);
            for (_, target, name) in &moved {
                let _ = target.remove_attribute(name);
            }
            self.sessions.end_session_instance(&renewed);
            return Err(e);
        }

        for (source, _, name) in &moved {
            if let Err(e) = source.remove_attribute(name) {
                warn!("从旧会话移除已迁移属性 {} 失败: {}", name, e);
            }
        }
        self.sessions.end_session_instance(&old);

        info!("会话已续期: {} -> {}", old_session_id, new_session_id);
        Ok(renewed)
    }

    /// 生成会话快照
    pub fn snapshot_session(&self, session_id: &str) -> ScopeResult<SessionSnapshot> {
        let session = self.session_scope_of_id(session_id).ok_or_else(|| {
            ScopeError::SessionScopeNotPresent {
                session_id: session_id.to_string(),
            }
        })?;
        self.snapshots.snapshot_session(&session)
    }

    /// 从快照恢复会话
    ///
    /// 所有属性先完整恢复，成功后才注册新会话；会话ID已存在时失败。
    pub fn restore_session(&self, snapshot: &SessionSnapshot) -> ScopeResult<Arc<SessionScope>> {
        let restored = self.snapshots.restore(snapshot)?;
        let session = self.sessions.create_session_scope(&snapshot.session_id)?;
        apply_attributes(session.as_ref(), restored.attributes)?;
        for (application_id, attributes) in restored.applications {
            if let Some(scope) = session.get_session_application_scope(&application_id, true)? {
                apply_attributes(scope.as_ref(), attributes)?;
            }
        }
        info!("会话已从快照恢复: {}", snapshot.session_id);
        Ok(session)
    }

    // ---------------------------------------------------------------- 会话应用

    /// 获取当前请求会话下指定应用的会话应用作用域
    pub fn get_session_application_scope(
        &self,
        context: &RequestContext,
        application_id: &str,
        create_if_not_existing: bool,
    ) -> ScopeResult<Option<Arc<SessionApplicationScope>>> {
        match self.get_session_scope(context, create_if_not_existing)? {
            Some(session) => {
                session.get_session_application_scope(application_id, create_if_not_existing)
            }
            None => Ok(None),
        }
    }

    /// 获取当前请求会话下当前应用的会话应用作用域
    pub fn get_current_session_application_scope(
        &self,
        context: &RequestContext,
        create_if_not_existing: bool,
    ) -> ScopeResult<Option<Arc<SessionApplicationScope>>> {
        let Some(application_id) = context.application_id() else {
            return if create_if_not_existing {
                Err(ScopeError::RequestScopeNotPresent)
            } else {
                Ok(None)
            };
        };
        self.get_session_application_scope(context, application_id, create_if_not_existing)
    }

    /// 获取会话应用作用域，不存在时失败
    pub fn require_session_application_scope(
        &self,
        context: &RequestContext,
        application_id: &str,
    ) -> ScopeResult<Arc<SessionApplicationScope>> {
        let session = self.require_session_scope(context)?;
        session
            .get_session_application_scope(application_id, false)?
            .ok_or_else(|| ScopeError::SessionApplicationScopeNotPresent {
                session_id: session.id().to_string(),
                application_id: application_id.to_string(),
            })
    }
}

/// 已迁移的属性：来源作用域、目标作用域、属性名
type MovedAttribute = (Arc<dyn Scope>, Arc<dyn Scope>, String);

fn renewal_aware(scope: &dyn Scope) -> ScopeResult<Vec<(String, AttributeValue)>> {
    Ok(scope
        .all_attributes()?
        .into_iter()
        .filter(|(_, value)| value.is_renewal_aware())
        .collect())
}

fn copy_renewal_aware(
    source: Arc<dyn Scope>,
    target: Arc<dyn Scope>,
    moved: &mut Vec<MovedAttribute>,
) -> ScopeResult<()> {
    for (name, value) in renewal_aware(source.as_ref())? {
        target.set_attribute(&name, Some(value))?;
        moved.push((Arc::clone(&source), Arc::clone(&target), name));
    }
    Ok(())
}

/// 把续期感知属性复制到新会话，旧会话中的属性保持不动
fn move_renewal_aware(
    old: &Arc<SessionScope>,
    renewed: &Arc<SessionScope>,
    moved: &mut Vec<MovedAttribute>,
) -> ScopeResult<()> {
    copy_renewal_aware(
        Arc::clone(old) as Arc<dyn Scope>,
        Arc::clone(renewed) as Arc<dyn Scope>,
        moved,
    )?;
    for application in old.all_session_application_scopes() {
        if renewal_aware(application.as_ref())?.is_empty() {
            continue;
        }
        if let Some(target) = renewed.get_session_application_scope(application.id(), true)? {
            copy_renewal_aware(application as Arc<dyn Scope>, target as Arc<dyn Scope>, moved)?;
        }
    }
    Ok(())
}

fn apply_attributes(scope: &dyn Scope, attributes: Vec<(String, AttributeValue)>) -> ScopeResult<()> {
    for (name, value) in attributes {
        scope.set_attribute(&name, Some(value))?;
    }
    Ok(())
}
