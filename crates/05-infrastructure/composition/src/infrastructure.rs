//! 作用域基础设施主入口

use crate::builder::ScopeInfrastructureBuilder;
use scope_common::{InfrastructureResult, ScopeError, ScopeInfrastructureError};
use scope_impl::{GlobalScope, ScopeManager};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// 作用域基础设施
///
/// 持有进程内唯一的作用域管理器，负责全局作用域的开始与结束
#[derive(Debug)]
pub struct ScopeInfrastructure {
    /// 作用域管理器
    manager: Arc<ScopeManager>,
    /// 运行状态
    status: RwLock<InfrastructureStatus>,
    /// 统计信息
    metrics: RwLock<InfrastructureMetrics>,
}

impl ScopeInfrastructure {
    /// 创建基础设施构建器
    pub fn builder() -> ScopeInfrastructureBuilder {
        ScopeInfrastructureBuilder::new()
    }

    pub(crate) fn new(manager: Arc<ScopeManager>) -> Self {
        Self {
            manager,
            status: RwLock::new(InfrastructureStatus::Initialized),
            metrics: RwLock::new(InfrastructureMetrics::default()),
        }
    }

    /// 启动：以配置的ID开始全局作用域
    pub async fn start(&self) -> InfrastructureResult<Arc<GlobalScope>> {
        let scope_id = self.manager.config().default_global_scope_id.clone();
        self.start_with_global_id(&scope_id).await
    }

    /// 启动：以指定ID开始全局作用域
    pub async fn start_with_global_id(&self, scope_id: &str) -> InfrastructureResult<Arc<GlobalScope>> {
        info!("启动作用域基础设施");
        *self.status.write().await = InfrastructureStatus::Starting;

        let global = match self.manager.on_global_begin(scope_id) {
            Ok(global) => global,
            Err(e) => {
                error!("全局作用域开始失败: {}", e);
                *self.status.write().await = InfrastructureStatus::Failed;
                return Err(e.into());
            }
        };

        {
            let mut metrics = self.metrics.write().await;
            metrics.start_time = Some(chrono::Utc::now());
            metrics.stop_time = None;
            metrics.listener_count = self.manager.listeners().listener_count();
        }
        *self.status.write().await = InfrastructureStatus::Running;

        info!("作用域基础设施启动完成");
        Ok(global)
    }

    /// 停止：结束全局作用域及其级联的所有作用域
    ///
    /// 停止时仍有活动请求只记录警告，请求作用域由各自的上下文负责结束。
    pub async fn stop(&self) -> InfrastructureResult<()> {
        info!("停止作用域基础设施");
        *self.status.write().await = InfrastructureStatus::Stopping;

        let active_requests = self.manager.active_request_count();
        if active_requests > 0 {
            warn!("停止时仍有 {} 个活动请求", active_requests);
        }

        let sessions_before = self.manager.session_registry().session_count();
        match self.manager.on_global_end() {
            Ok(()) => {}
            Err(ScopeError::GlobalScopeNotPresent) => {
                warn!("全局作用域不存在，跳过结束");
            }
            Err(e) => {
                *self.status.write().await = InfrastructureStatus::Failed;
                return Err(ScopeInfrastructureError::ShutdownFailed {
                    message: format!("结束全局作用域失败: {}", e),
                });
            }
        }
        let ended_sessions =
            sessions_before.saturating_sub(self.manager.session_registry().session_count());

        {
            let mut metrics = self.metrics.write().await;
            metrics.stop_time = Some(chrono::Utc::now());
            metrics.ended_session_count += ended_sessions as u64;
        }
        *self.status.write().await = InfrastructureStatus::Stopped;

        info!("作用域基础设施停止完成");
        Ok(())
    }

    /// 作用域管理器
    pub fn manager(&self) -> &Arc<ScopeManager> {
        &self.manager
    }

    /// 运行状态
    pub async fn get_status(&self) -> InfrastructureStatus {
        *self.status.read().await
    }

    /// 统计信息
    pub async fn get_metrics(&self) -> InfrastructureMetrics {
        let mut metrics = self.metrics.read().await.clone();
        metrics.live_session_count = self.manager.session_registry().session_count();
        metrics.active_request_count = self.manager.active_request_count();
        metrics.application_scope_count = self
            .manager
            .global_scope()
            .map(|global| global.application_scope_count())
            .unwrap_or(0);
        metrics
    }
}

/// 基础设施运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfrastructureStatus {
    /// 已初始化
    Initialized,
    /// 启动中
    Starting,
    /// 运行中
    Running,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 失败
    Failed,
}

/// 基础设施统计信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfrastructureMetrics {
    /// 启动时间
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    /// 停止时间
    pub stop_time: Option<chrono::DateTime<chrono::Utc>>,
    /// 监听器数量
    pub listener_count: usize,
    /// 应用作用域数量
    pub application_scope_count: usize,
    /// 存活会话数量
    pub live_session_count: usize,
    /// 活动请求数量
    pub active_request_count: usize,
    /// 停止时结束的会话数量
    pub ended_session_count: u64,
}

impl InfrastructureMetrics {
    /// 计算运行时间
    pub fn uptime(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.stop_time) {
            (Some(start), Some(stop)) => Some(stop - start),
            (Some(start), None) => Some(chrono::Utc::now() - start),
            _ => None,
        }
    }
}
