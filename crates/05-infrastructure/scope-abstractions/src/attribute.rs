//! 作用域属性抽象
//!
//! 属性值以 [`AttributeValue`] 存储，能力（销毁感知、续期感知、快照）通过
//! [`ScopeAttribute`] 上的查询方法暴露，而不是依赖类型继承。

use crate::scope::Scope;
use crate::snapshot::SnapshotAttribute;
use scope_common::BoxError;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// 类型擦除辅助 trait
pub trait AsAny: Any + Send + Sync {
    /// 转换为 `&dyn Any`
    fn as_any(&self) -> &dyn Any;

    /// 转换为 `Arc<dyn Any>`，用于向下转型
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// 作用域属性 trait
///
/// 可存入作用域的任何值都必须实现此 trait。默认实现不具备任何能力，
/// 相等性按实例判断。
pub trait ScopeAttribute: AsAny + Debug {
    /// 销毁感知能力
    fn as_destruction_aware(&self) -> Option<&dyn ScopeDestructionAware> {
        None
    }

    /// 续期感知能力：会话续期时属性会被迁移到新会话
    fn is_renewal_aware(&self) -> bool {
        false
    }

    /// 快照能力
    fn as_snapshot(&self) -> Option<&dyn SnapshotAttribute> {
        None
    }

    /// 值相等比较，用于判断设置属性是否产生变化
    fn attribute_eq(&self, _other: &dyn ScopeAttribute) -> bool {
        false
    }
}

/// 存储在作用域中的属性值
pub type AttributeValue = Arc<dyn ScopeAttribute>;

/// 销毁感知 trait
///
/// 作用域销毁时，每个具备此能力的属性恰好被通知一次。
pub trait ScopeDestructionAware: Send + Sync {
    /// 销毁前通知，在任何属性的 [`on_scope_destruction`](Self::on_scope_destruction) 之前调用
    fn on_before_scope_destruction(&self, _scope: &dyn Scope) -> Result<(), BoxError> {
        Ok(())
    }

    /// 销毁通知，在这里释放外部资源
    fn on_scope_destruction(&self, scope: &dyn Scope) -> Result<(), BoxError>;
}

/// 按值比较属性
pub fn attribute_eq_by_value<T: PartialEq + 'static>(this: &T, other: &dyn ScopeAttribute) -> bool {
    AsAny::as_any(other)
        .downcast_ref::<T>()
        .is_some_and(|other| other == this)
}

/// 将属性值向下转型为具体类型
pub fn downcast_attribute<T: ScopeAttribute>(value: &AttributeValue) -> Option<Arc<T>> {
    AsAny::into_any_arc(Arc::clone(value)).downcast::<T>().ok()
}

/// 判断属性值是否为指定类型
pub fn is_attribute_of<T: ScopeAttribute>(value: &AttributeValue) -> bool {
    AsAny::as_any(value.as_ref()).is::<T>()
}

/// 判断两个属性值是否相等（同一实例或值相等）
pub fn attribute_values_equal(a: &AttributeValue, b: &AttributeValue) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
        || a.attribute_eq(b.as_ref())
}

/// 将任意属性包装为属性值
pub fn attribute_value<T: ScopeAttribute>(value: T) -> AttributeValue {
    Arc::new(value)
}

macro_rules! impl_value_attribute {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ScopeAttribute for $ty {
                fn attribute_eq(&self, other: &dyn ScopeAttribute) -> bool {
                    attribute_eq_by_value(self, other)
                }
            }
        )*
    };
}

impl_value_attribute!(
    String,
    &'static str,
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    usize,
    isize,
    f32,
    f64,
    Vec<String>,
);
