//! # Scope Abstractions
//!
//! 作用域抽象层，定义属性存储、作用域状态机和生命周期通知的核心接口。
//!
//! ## 核心接口
//!
//! - [`AttributeContainer`] - 属性容器接口
//! - [`ScopeAttribute`] - 作用域属性及其能力查询
//! - [`ScopeDestructionAware`] - 销毁感知能力
//! - [`Scope`] - 作用域接口
//! - [`ScopeLifecycleListener`] - 生命周期监听器（SPI）
//! - [`ScopeSingleton`] - 作用域单例
//! - [`Snapshotable`] - 会话快照契约（带类型的导出与恢复）
//! - [`SnapshotAttribute`] - 快照能力，由 [`ScopeAttribute::as_snapshot`] 查询

pub mod attribute;
pub mod container;
pub mod listener;
pub mod scope;
pub mod singleton;
pub mod snapshot;

pub use attribute::*;
pub use container::*;
pub use listener::*;
pub use scope::*;
pub use singleton::*;
pub use snapshot::*;
