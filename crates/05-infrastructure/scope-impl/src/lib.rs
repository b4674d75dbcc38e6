//! # 作用域具体实现
//!
//! 提供属性容器、作用域状态机、五种具体作用域、生命周期管理器、单例解析和会话快照。
//!
//! ## 使用
//!
//! ```
//! use scope_impl::{RequestContext, ScopeManager};
//!
//! let manager = ScopeManager::new();
//! manager.on_global_begin("global").unwrap();
//!
//! let mut context = RequestContext::new();
//! manager
//!     .on_request_begin(&mut context, "shop", "req-1", "session-1")
//!     .unwrap();
//! manager.on_request_end(&mut context).unwrap();
//!
//! manager.on_global_end().unwrap();
//! ```

pub mod container;
pub mod context;
pub mod core;
pub mod listeners;
pub mod manager;
pub mod scopes;
pub mod session_registry;
pub mod singleton;
pub mod snapshot;

pub use container::MapAttributeContainer;
pub use context::RequestContext;
pub use crate::core::{ScopeCore, ScopeHooks};
pub use listeners::ScopeListenerRegistry;
pub use manager::ScopeManager;
pub use scopes::{
    ApplicationScope, GlobalScope, RequestScope, SessionApplicationScope, SessionScope,
};
pub use session_registry::SessionScopeRegistry;
pub use singleton::SingletonRegistry;
pub use snapshot::SnapshotRegistry;
