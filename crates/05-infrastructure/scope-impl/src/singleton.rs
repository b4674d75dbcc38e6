//! 作用域单例解析
//!
//! 单例就是以类型完整路径命名的作用域属性，每个作用域实例中每种类型最多一个。
//! 创建通过作用域的原子“不存在则创建”完成，实例在构造完成后才对其他调用方可见。

use crate::context::RequestContext;
use crate::manager::ScopeManager;
use scope_abstractions::{
    downcast_attribute, AttributeValue, Scope, ScopeAttribute, ScopeSingleton,
};
use scope_common::{
    is_singleton_attribute_name, BoxError, ScopeError, ScopeResult, TypeInfo,
};
use std::sync::Arc;
use tracing::debug;

/// 单例注册表
///
/// 无状态的解析入口，所有单例都存放在目标作用域的属性中。
#[derive(Debug, Clone, Copy, Default)]
pub struct SingletonRegistry;

impl SingletonRegistry {
    /// 获取单例，不存在时通过 [`Default`] 创建
    ///
    /// 新建实例存入作用域后调用 [`ScopeSingleton::on_after_instantiation`]。
    pub fn get_singleton<T: ScopeSingleton>(scope: &dyn Scope) -> ScopeResult<Arc<T>> {
        Self::get_singleton_with(scope, || Ok(T::default()))
    }

    /// 使用自定义构造函数获取单例
    ///
    /// 构造失败时返回 [`ScopeError::SingletonCreationFailed`]，作用域中不留下任何值。
    pub fn get_singleton_with<T, F>(scope: &dyn Scope, factory: F) -> ScopeResult<Arc<T>>
    where
        T: ScopeSingleton,
        F: FnOnce() -> Result<T, BoxError>,
    {
        let info = TypeInfo::of::<T>();
        let name = info.singleton_attribute_name();

        let mut factory = Some(factory);
        let (value, change) = scope
            .get_or_create_attribute(&name, &mut || -> ScopeResult<AttributeValue> {
                let create = factory.take().ok_or_else(|| ScopeError::SingletonCreationFailed {
                    type_name: info.module_path.clone(),
                    message: "构造函数已被调用".to_string(),
                })?;
                let instance = create().map_err(|e| ScopeError::SingletonCreationFailed {
                    type_name: info.module_path.clone(),
                    message: e.to_string(),
                })?;
                Ok(Arc::new(instance) as AttributeValue)
            })
            .map_err(|e| match e {
                ScopeError::RecursiveSingletonCreation { .. } => {
                    ScopeError::RecursiveSingletonCreation {
                        type_name: info.module_path.clone(),
                    }
                }
                other => other,
            })?;

        let singleton = downcast_attribute::<T>(&value).ok_or_else(|| {
            ScopeError::SingletonTypeMismatch {
                attribute_name: name.clone(),
                expected: info.module_path.clone(),
            }
        })?;

        if change.is_changed() {
            debug!(
                kind = %scope.kind(),
                scope_id = scope.id(),
                "单例已创建: {}",
                info.short_name()
            );
            singleton.on_after_instantiation(scope);
        }
        Ok(singleton)
    }

    /// 在访问器返回的作用域中获取单例
    ///
    /// 各作用域类型的单例解析都基于此函数。
    pub fn get_singleton_from<T, S, A>(accessor: A) -> ScopeResult<Arc<T>>
    where
        T: ScopeSingleton,
        S: Scope,
        A: FnOnce() -> ScopeResult<Arc<S>>,
    {
        let scope = accessor()?;
        Self::get_singleton::<T>(scope.as_ref())
    }

    /// 仅查询已存在的单例，从不创建
    pub fn get_singleton_if_instantiated<T: ScopeSingleton>(
        scope: &dyn Scope,
    ) -> ScopeResult<Option<Arc<T>>> {
        let info = TypeInfo::of::<T>();
        let name = info.singleton_attribute_name();
        match scope.get_attribute(&name)? {
            Some(value) => downcast_attribute::<T>(&value)
                .map(Some)
                .ok_or(ScopeError::SingletonTypeMismatch {
                    attribute_name: name,
                    expected: info.module_path,
                }),
            None => Ok(None),
        }
    }

    /// 单例是否已存在
    pub fn is_singleton_instantiated<T: ScopeSingleton>(scope: &dyn Scope) -> ScopeResult<bool> {
        scope.contains_attribute(&TypeInfo::of::<T>().singleton_attribute_name())
    }

    /// 作用域中所有单例，按创建顺序
    pub fn get_all_singletons(scope: &dyn Scope) -> ScopeResult<Vec<AttributeValue>> {
        Self::get_all_singletons_matching(scope, |_| true)
    }

    /// 作用域中所有类型为 `T` 的属性值
    pub fn get_all_singletons_of<T: ScopeAttribute>(scope: &dyn Scope) -> ScopeResult<Vec<Arc<T>>> {
        Ok(Self::get_all_singletons(scope)?
            .iter()
            .filter_map(downcast_attribute::<T>)
            .collect())
    }

    /// 作用域中所有满足条件的单例
    pub fn get_all_singletons_matching<P>(
        scope: &dyn Scope,
        mut predicate: P,
    ) -> ScopeResult<Vec<AttributeValue>>
    where
        P: FnMut(&AttributeValue) -> bool,
    {
        Ok(scope
            .all_attributes()?
            .into_iter()
            .filter(|(name, value)| is_singleton_attribute_name(name) && predicate(value))
            .map(|(_, value)| value)
            .collect())
    }
}

/// 各作用域类型的单例解析
impl ScopeManager {
    /// 全局作用域中的单例
    pub fn global_singleton<T: ScopeSingleton>(&self) -> ScopeResult<Arc<T>> {
        SingletonRegistry::get_singleton_from(|| self.require_global_scope())
    }

    /// 应用作用域中的单例，应用作用域不存在时创建
    pub fn application_singleton<T: ScopeSingleton>(&self, application_id: &str) -> ScopeResult<Arc<T>> {
        SingletonRegistry::get_singleton_from(|| {
            self.get_application_scope(application_id, true)?
                .ok_or_else(|| ScopeError::ApplicationScopeNotPresent {
                    application_id: application_id.to_string(),
                })
        })
    }

    /// 当前请求会话中的单例
    pub fn session_singleton<T: ScopeSingleton>(&self, context: &RequestContext) -> ScopeResult<Arc<T>> {
        SingletonRegistry::get_singleton_from(|| {
            self.get_session_scope(context, true)?
                .ok_or(ScopeError::RequestScopeNotPresent)
        })
    }

    /// 当前请求会话应用作用域中的单例
    pub fn session_application_singleton<T: ScopeSingleton>(
        &self,
        context: &RequestContext,
    ) -> ScopeResult<Arc<T>> {
        SingletonRegistry::get_singleton_from(|| {
            self.get_current_session_application_scope(context, true)?
                .ok_or(ScopeError::RequestScopeNotPresent)
        })
    }

    /// 当前请求作用域中的单例
    pub fn request_singleton<T: ScopeSingleton>(&self, context: &RequestContext) -> ScopeResult<Arc<T>> {
        SingletonRegistry::get_singleton_from(|| self.require_request_scope(context))
    }
}
