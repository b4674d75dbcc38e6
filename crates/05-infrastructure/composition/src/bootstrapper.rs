//! 基础设施启动器
//!
//! 进程级唯一的作用域基础设施只在这里安装，其余代码通过显式传递的
//! [`ScopeManager`](scope_impl::ScopeManager) 访问作用域。

use crate::builder::ScopeInfrastructureBuilder;
use crate::infrastructure::ScopeInfrastructure;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use scope_common::{InfrastructureResult, ScopeInfrastructureError};
use std::sync::Arc;
use tracing::{info, warn};

/// 进程级基础设施
static PROCESS_INFRASTRUCTURE: Lazy<RwLock<Option<Arc<ScopeInfrastructure>>>> =
    Lazy::new(|| RwLock::new(None));

/// 基础设施启动器
///
/// 按顺序完成构建、启动和安装，任何一步失败都不会留下已安装的实例
#[derive(Debug, Default)]
pub struct InfrastructureBootstrapper {
    builder: ScopeInfrastructureBuilder,
    global_scope_id: Option<String>,
}

impl InfrastructureBootstrapper {
    /// 使用构建器创建启动器
    pub fn new(builder: ScopeInfrastructureBuilder) -> Self {
        Self {
            builder,
            global_scope_id: None,
        }
    }

    /// 指定全局作用域ID，默认使用配置中的ID
    pub fn with_global_scope_id<S: Into<String>>(mut self, scope_id: S) -> Self {
        self.global_scope_id = Some(scope_id.into());
        self
    }

    /// 构建并启动基础设施，但不安装为进程级实例
    pub async fn bootstrap(self) -> InfrastructureResult<Arc<ScopeInfrastructure>> {
        info!("开始启动作用域基础设施");

        let infrastructure = Arc::new(self.builder.build()?);
        match &self.global_scope_id {
            Some(scope_id) => infrastructure.start_with_global_id(scope_id).await?,
            None => infrastructure.start().await?,
        };

        info!("作用域基础设施启动完成");
        Ok(infrastructure)
    }

    /// 构建、启动并安装为进程级实例
    ///
    /// 已有安装的实例时失败，新构建的实例会被停止。
    pub async fn bootstrap_and_install(self) -> InfrastructureResult<Arc<ScopeInfrastructure>> {
        if is_installed() {
            return Err(already_installed());
        }
        let infrastructure = self.bootstrap().await?;
        if let Err(e) = install(Arc::clone(&infrastructure)) {
            infrastructure.stop().await?;
            return Err(e);
        }
        Ok(infrastructure)
    }
}

/// 安装进程级基础设施
pub fn install(infrastructure: Arc<ScopeInfrastructure>) -> InfrastructureResult<()> {
    let mut slot = PROCESS_INFRASTRUCTURE.write();
    if slot.is_some() {
        return Err(already_installed());
    }
    *slot = Some(infrastructure);
    info!("已安装进程级作用域基础设施");
    Ok(())
}

/// 进程级基础设施
pub fn installed() -> Option<Arc<ScopeInfrastructure>> {
    PROCESS_INFRASTRUCTURE.read().clone()
}

/// 是否已安装进程级基础设施
pub fn is_installed() -> bool {
    PROCESS_INFRASTRUCTURE.read().is_some()
}

/// 卸载并停止进程级基础设施
pub async fn shutdown_installed() -> InfrastructureResult<()> {
    let taken = PROCESS_INFRASTRUCTURE.write().take();
    let Some(infrastructure) = taken else {
        warn!("没有已安装的作用域基础设施");
        return Ok(());
    };
    infrastructure.stop().await
}

fn already_installed() -> ScopeInfrastructureError {
    ScopeInfrastructureError::BootstrapFailed {
        message: "进程级作用域基础设施已安装".to_string(),
    }
}
