//! # 作用域基础设施组合层
//!
//! 将配置加载、日志初始化、生命周期监听器和快照类型组装成一个可运行的
//! 作用域基础设施，并在最外层提供进程级唯一实例。
//!
//! ## 主要功能
//!
//! - **基础设施构建器**: 使用构建者模式组装配置、日志和监听器
//! - **配置源管理**: 合并 TOML/JSON/YAML 文件和环境变量
//! - **生命周期管理**: 启动时开始全局作用域，停止时级联结束所有作用域
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use scope_composition::ScopeInfrastructureBuilder;
//! use scope_impl::RequestContext;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let infrastructure = ScopeInfrastructureBuilder::new()
//!         .add_config_file("config/scopes.toml")?
//!         .add_default_env_vars()
//!         .build()?;
//!
//!     infrastructure.start().await?;
//!
//!     let manager = infrastructure.manager();
//!     let mut context = RequestContext::new();
//!     manager.on_request_begin(&mut context, "shop", "req-1", "session-1")?;
//!     manager.on_request_end(&mut context)?;
//!
//!     infrastructure.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod bootstrapper;
pub mod builder;
pub mod config_sources;
pub mod infrastructure;

#[cfg(test)]
mod tests;

pub use bootstrapper::{install, installed, is_installed, shutdown_installed, InfrastructureBootstrapper};
pub use builder::{LoggingConfig, ScopeInfrastructureBuilder};
pub use config_sources::{
    ConfigSourceDescriptor, ConfigSourceType, LoggingSettings, ScopeConfigLoader, ScopeSettings,
    DEFAULT_ENV_PREFIX, ENV_SEPARATOR,
};
pub use infrastructure::{InfrastructureMetrics, InfrastructureStatus, ScopeInfrastructure};

// 重新导出错误类型
pub use scope_common::ScopeInfrastructureError;
