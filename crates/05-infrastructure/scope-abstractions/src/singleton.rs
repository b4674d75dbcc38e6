//! 作用域单例抽象

use crate::attribute::ScopeAttribute;
use crate::scope::Scope;

/// 作用域单例 trait
///
/// 每个作用域实例中同一具体类型最多只有一个实例，通过 [`Default`] 构造。
/// 需要释放资源的单例同时实现 [`ScopeDestructionAware`](crate::ScopeDestructionAware)
/// 并通过 [`ScopeAttribute::as_destruction_aware`] 暴露。
pub trait ScopeSingleton: ScopeAttribute + Default {
    /// 实例已存入作用域后调用
    fn on_after_instantiation(&self, _scope: &dyn Scope) {}
}
