//! 作用域抽象接口

use crate::attribute::{downcast_attribute, AsAny, AttributeValue, ScopeAttribute};
use chrono::{DateTime, Utc};
use scope_common::{ChangeResult, ScopeKind, ScopeResult, ScopeState};
use std::fmt::Debug;
use std::sync::Arc;

/// 属性工厂，供 [`Scope::get_or_create_attribute`] 使用
pub type AttributeFactory<'a> = dyn FnMut() -> ScopeResult<AttributeValue> + 'a;

/// 作用域 trait
///
/// 带类型和ID的属性容器，具有显式的状态机：可用 → 销毁中 → 已销毁。
/// 一旦开始销毁，所有属性访问都返回 [`ScopeError::ScopeNotValid`](scope_common::ScopeError::ScopeNotValid)。
pub trait Scope: Send + Sync + Debug {
    /// 作用域ID
    fn id(&self) -> &str;

    /// 作用域类型
    fn kind(&self) -> ScopeKind;

    /// 创建时间
    fn created_at(&self) -> DateTime<Utc>;

    /// 当前状态
    fn state(&self) -> ScopeState;

    /// 是否可用
    fn is_valid(&self) -> bool {
        self.state() == ScopeState::Valid
    }

    /// 是否正在销毁
    fn is_in_destruction(&self) -> bool {
        self.state() == ScopeState::InDestruction
    }

    /// 是否已销毁
    fn is_destroyed(&self) -> bool {
        self.state() == ScopeState::Destroyed
    }

    /// 构造后初始化，只生效一次
    fn init_scope(&self);

    /// 销毁作用域
    ///
    /// 重复调用是空操作。属性销毁钩子的错误只记录不传播。
    fn destroy_scope(&self);

    /// 设置属性，值为 `None` 等同于删除
    fn set_attribute(&self, name: &str, value: Option<AttributeValue>) -> ScopeResult<ChangeResult>;

    /// 获取属性
    fn get_attribute(&self, name: &str) -> ScopeResult<Option<AttributeValue>>;

    /// 删除属性
    fn remove_attribute(&self, name: &str) -> ScopeResult<ChangeResult>;

    /// 是否包含属性
    fn contains_attribute(&self, name: &str) -> ScopeResult<bool>;

    /// 属性数量，销毁后为 0
    fn attribute_count(&self) -> usize;

    /// 所有属性名
    fn attribute_names(&self) -> ScopeResult<Vec<String>>;

    /// 所有属性
    fn all_attributes(&self) -> ScopeResult<Vec<(String, AttributeValue)>>;

    /// 原子的“不存在则创建”
    ///
    /// 同一作用域内的创建过程互斥；工厂在创建期间可以重入访问本作用域，
    /// 但同一线程重入创建同名属性会返回错误。
    fn get_or_create_attribute(
        &self,
        name: &str,
        factory: &mut AttributeFactory<'_>,
    ) -> ScopeResult<(AttributeValue, ChangeResult)>;
}

/// 作用域便捷扩展
pub trait ScopeExt: Scope {
    /// 设置类型化属性
    fn set<T: ScopeAttribute>(&self, name: &str, value: T) -> ScopeResult<ChangeResult> {
        self.set_attribute(name, Some(Arc::new(value)))
    }

    /// 获取类型化属性，类型不符时返回 `None`
    fn get_typed<T: ScopeAttribute>(&self, name: &str) -> ScopeResult<Option<Arc<T>>> {
        Ok(self
            .get_attribute(name)?
            .and_then(|value| downcast_attribute::<T>(&value)))
    }

    /// 获取字符串属性
    fn get_string(&self, name: &str) -> ScopeResult<Option<String>> {
        Ok(self.get_attribute(name)?.and_then(|value| {
            let any = AsAny::as_any(value.as_ref());
            any.downcast_ref::<String>()
                .cloned()
                .or_else(|| any.downcast_ref::<&'static str>().map(|s| (*s).to_string()))
        }))
    }

    /// 获取并设置布尔标记，返回之前是否已设置
    fn get_and_set_flag(&self, name: &str) -> ScopeResult<bool> {
        let (_, change) =
            self.get_or_create_attribute(name, &mut || Ok(Arc::new(true) as AttributeValue))?;
        Ok(change.is_unchanged())
    }
}

impl<S: Scope + ?Sized> ScopeExt for S {}
