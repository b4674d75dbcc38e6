//! 元数据定义
//!
//! 提供单例属性命名所需的类型信息

use std::any::TypeId;

/// 单例属性名前缀
pub const SINGLETON_ATTRIBUTE_PREFIX: &str = "singleton.";

/// 类型信息
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// 简短类型名称
    pub name: String,
    /// 类型ID
    pub id: TypeId,
    /// 完整类型路径
    pub module_path: String,
}

impl TypeInfo {
    /// 从类型获取类型信息
    pub fn of<T: 'static + ?Sized>() -> Self {
        let full_name = std::any::type_name::<T>();
        Self {
            name: full_name
                .split("::")
                .last()
                .unwrap_or(full_name)
                .to_string(),
            id: TypeId::of::<T>(),
            module_path: full_name.to_string(),
        }
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &str {
        &self.name
    }

    /// 单例在作用域中的属性名，由完整类型路径确定
    pub fn singleton_attribute_name(&self) -> String {
        format!("{}{}", SINGLETON_ATTRIBUTE_PREFIX, self.module_path)
    }
}

/// 判断属性名是否为单例属性名
pub fn is_singleton_attribute_name(name: &str) -> bool {
    name.starts_with(SINGLETON_ATTRIBUTE_PREFIX)
}
