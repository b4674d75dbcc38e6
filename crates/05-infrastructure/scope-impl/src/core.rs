//! 作用域基础实现
//!
//! [`ScopeCore`] 实现所有作用域共享的状态机、属性访问与销毁流程，
//! 各类型作用域通过 [`ScopeHooks`] 扩展初始化和销毁过程。

use crate::container::MapAttributeContainer;
use chrono::{DateTime, Utc};
use parking_lot::{ReentrantMutex, RwLock};
use scope_abstractions::{AttributeContainer, AttributeFactory, AttributeValue, Scope};
use scope_common::{
    log_life_cycle, BoxError, ChangeResult, ScopeError, ScopeKind, ScopeResult, ScopeState,
};
use std::cell::RefCell;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn};

/// 作用域扩展钩子
pub trait ScopeHooks {
    /// 初始化后调用
    fn on_init(&self) {}

    /// 状态进入销毁中之后、属性销毁之前调用
    fn pre_destroy(&self) {}

    /// 属性清空之后、状态变为已销毁之前调用
    fn post_destroy(&self) {}
}

/// 创建中标记，工厂返回或展开时移除
struct CreatingMarker<'a> {
    creating: &'a RefCell<HashSet<String>>,
    name: &'a str,
}

impl Drop for CreatingMarker<'_> {
    fn drop(&mut self) {
        self.creating.borrow_mut().remove(self.name);
    }
}

/// 作用域基础实现
pub struct ScopeCore {
    id: String,
    kind: ScopeKind,
    created_at: DateTime<Utc>,
    state: RwLock<ScopeState>,
    initialized: AtomicBool,
    attributes: MapAttributeContainer,
    /// 正在创建中的属性名
    creating: ReentrantMutex<RefCell<HashSet<String>>>,
}

impl std::fmt::Debug for ScopeCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeCore")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .field("attribute_count", &self.attributes.attribute_count())
            .finish()
    }
}

impl ScopeCore {
    /// 创建新的作用域基础实例
    pub fn new(kind: ScopeKind, id: impl Into<String>) -> ScopeResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ScopeError::EmptyScopeId { kind });
        }

        log_life_cycle("作用域已创建", kind.as_str(), &id);
        Ok(Self {
            id,
            kind,
            created_at: Utc::now(),
            state: RwLock::new(ScopeState::Valid),
            initialized: AtomicBool::new(false),
            attributes: MapAttributeContainer::new(),
            creating: ReentrantMutex::new(RefCell::new(HashSet::new())),
        })
    }

    /// 作用域ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 作用域类型
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// 创建时间
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 当前状态
    pub fn state(&self) -> ScopeState {
        *self.state.read_recursive()
    }

    /// 标记已初始化，仅首次调用返回 `true`
    pub fn mark_initialized(&self) -> bool {
        let first = !self.initialized.swap(true, Ordering::AcqRel);
        if !first {
            warn!(kind = %self.kind, scope_id = %self.id, "作用域重复初始化，忽略");
        }
        first
    }

    /// 在可用状态下访问属性容器
    ///
    /// 持有状态读锁直到操作完成，销毁只能在操作之间开始。
    fn with_valid<R>(&self, f: impl FnOnce(&MapAttributeContainer) -> R) -> ScopeResult<R> {
        let state = self.state.read_recursive();
        if *state != ScopeState::Valid {
            return Err(ScopeError::not_valid(self.kind, &self.id, *state));
        }
        Ok(f(&self.attributes))
    }

    /// 设置属性，`None` 表示移除
    pub fn set_attribute(
        &self,
        name: &str,
        value: Option<AttributeValue>,
    ) -> ScopeResult<ChangeResult> {
        self.with_valid(|attributes| attributes.set_attribute(name, value))
    }

    /// 读取属性
    pub fn get_attribute(&self, name: &str) -> ScopeResult<Option<AttributeValue>> {
        self.with_valid(|attributes| attributes.get_attribute(name))
    }

    /// 移除属性
    pub fn remove_attribute(&self, name: &str) -> ScopeResult<ChangeResult> {
        self.with_valid(|attributes| attributes.remove_attribute(name))
    }

    /// 属性是否存在
    pub fn contains_attribute(&self, name: &str) -> ScopeResult<bool> {
        self.with_valid(|attributes| attributes.contains_attribute(name))
    }

    /// 属性数量，不检查状态
    pub fn attribute_count(&self) -> usize {
        self.attributes.attribute_count()
    }

    /// 按插入顺序列出属性名
    pub fn attribute_names(&self) -> ScopeResult<Vec<String>> {
        self.with_valid(|attributes| attributes.attribute_names())
    }

    /// 按插入顺序列出全部属性
    pub fn all_attributes(&self) -> ScopeResult<Vec<(String, AttributeValue)>> {
        self.with_valid(|attributes| attributes.all_attributes())
    }

    /// 原子的“不存在则创建”
    ///
    /// 创建过程在本作用域内互斥；创建完成后才对其他调用方可见。
    pub fn get_or_create_attribute(
        &self,
        name: &str,
        factory: &mut AttributeFactory<'_>,
    ) -> ScopeResult<(AttributeValue, ChangeResult)> {
        if let Some(existing) = self.get_attribute(name)? {
            return Ok((existing, ChangeResult::Unchanged));
        }

        let creating = self.creating.lock();
        if let Some(existing) = self.get_attribute(name)? {
            return Ok((existing, ChangeResult::Unchanged));
        }
        if !creating.borrow_mut().insert(name.to_string()) {
            return Err(ScopeError::RecursiveSingletonCreation {
                type_name: name.to_string(),
            });
        }

        let value = {
            let _marker = CreatingMarker {
                creating: &*creating,
                name,
            };
            factory()?
        };

        self.with_valid(|attributes| attributes.insert_if_absent(name, value))
    }

    /// 销毁作用域
    ///
    /// 1. 可用 → 销毁中（非可用状态直接返回）
    /// 2. `pre_destroy`
    /// 3. 两阶段通知销毁感知属性，单个失败只记录
    /// 4. 清空属性
    /// 5. `post_destroy`
    /// 6. 销毁中 → 已销毁
    pub fn destroy(&self, scope: &dyn Scope, hooks: &dyn ScopeHooks) {
        {
            let mut state = self.state.write();
            let current = *state;
            if current != ScopeState::Valid {
                debug!(
                    kind = %self.kind,
                    scope_id = %self.id,
                    state = %current,
                    "作用域已在销毁或已销毁，忽略重复销毁"
                );
                return;
            }
            *state = ScopeState::InDestruction;
        }

        hooks.pre_destroy();

        let attributes = self.attributes.all_attributes();
        for (name, value) in &attributes {
            if let Some(aware) = value.as_destruction_aware() {
                self.run_hook(name, "on_before_scope_destruction", || {
                    aware.on_before_scope_destruction(scope)
                });
            }
        }
        for (name, value) in &attributes {
            if let Some(aware) = value.as_destruction_aware() {
                self.run_hook(name, "on_scope_destruction", || {
                    aware.on_scope_destruction(scope)
                });
            }
        }

        self.attributes.clear();
        hooks.post_destroy();

        *self.state.write() = ScopeState::Destroyed;
        log_life_cycle("作用域已销毁", self.kind.as_str(), &self.id);
    }

    fn run_hook(&self, attribute: &str, hook: &str, f: impl FnOnce() -> Result<(), BoxError>) {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(
                kind = %self.kind,
                scope_id = %self.id,
                attribute,
                hook,
                "属性销毁失败: {}",
                e
            ),
            Err(panic) => error!(
                kind = %self.kind,
                scope_id = %self.id,
                attribute,
                hook,
                "属性销毁时发生 panic: {}",
                panic_message(panic.as_ref())
            ),
        }
    }
}

/// 提取 panic 信息
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// 为包含 `core: ScopeCore` 字段并实现 [`ScopeHooks`] 的类型实现 [`Scope`]
macro_rules! delegate_scope {
    ($ty:ty) => {
        impl scope_abstractions::Scope for $ty {
            fn id(&self) -> &str {
                self.core.id()
            }

            fn kind(&self) -> scope_common::ScopeKind {
                self.core.kind()
            }

            fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
                self.core.created_at()
            }

            fn state(&self) -> scope_common::ScopeState {
                self.core.state()
            }

            fn init_scope(&self) {
                if self.core.mark_initialized() {
                    $crate::core::ScopeHooks::on_init(self);
                }
            }

            fn destroy_scope(&self) {
                self.core.destroy(self, self);
            }

            fn set_attribute(
                &self,
                name: &str,
                value: Option<scope_abstractions::AttributeValue>,
            ) -> scope_common::ScopeResult<scope_common::ChangeResult> {
                self.core.set_attribute(name, value)
            }

            fn get_attribute(
                &self,
                name: &str,
            ) -> scope_common::ScopeResult<Option<scope_abstractions::AttributeValue>> {
                self.core.get_attribute(name)
            }

            fn remove_attribute(
                &self,
                name: &str,
            ) -> scope_common::ScopeResult<scope_common::ChangeResult> {
                self.core.remove_attribute(name)
            }

            fn contains_attribute(&self, name: &str) -> scope_common::ScopeResult<bool> {
                self.core.contains_attribute(name)
            }

            fn attribute_count(&self) -> usize {
                self.core.attribute_count()
            }

            fn attribute_names(&self) -> scope_common::ScopeResult<Vec<String>> {
                self.core.attribute_names()
            }

            fn all_attributes(
                &self,
            ) -> scope_common::ScopeResult<Vec<(String, scope_abstractions::AttributeValue)>> {
                self.core.all_attributes()
            }

            fn get_or_create_attribute(
                &self,
                name: &str,
                factory: &mut scope_abstractions::AttributeFactory<'_>,
            ) -> scope_common::ScopeResult<(
                scope_abstractions::AttributeValue,
                scope_common::ChangeResult,
            )> {
                self.core.get_or_create_attribute(name, factory)
            }
        }
    };
}

pub(crate) use delegate_scope;
