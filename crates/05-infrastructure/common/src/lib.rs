//! # Scope Common
//!
//! 这个 crate 提供了作用域生命周期框架的公共类型和工具。
//!
//! ## 核心类型
//!
//! - [`ScopeKind`] - 作用域类型（全局、应用、会话、会话应用、请求）
//! - [`ScopeState`] - 作用域状态机（可用 → 销毁中 → 已销毁）
//! - [`ChangeResult`] - 属性变更结果
//! - [`ScopeError`] - 作用域错误类型
//! - [`ScopeManagerConfig`] - 作用域管理器配置
//! - [`ScopeDebugFlags`] - 进程级调试开关
//!
//! ## 设计原则
//!
//! - 作用域状态单调递进
//! - 前置条件违反立即失败
//! - 属性销毁错误隔离记录，不向外传播

pub mod configuration;
pub mod debug;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use configuration::*;
pub use debug::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
