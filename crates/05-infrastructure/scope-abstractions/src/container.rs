//! 属性容器抽象接口

use crate::attribute::AttributeValue;
use scope_common::ChangeResult;

/// 属性容器 trait
///
/// 线程安全的键值存储：读操作可并发，写操作串行化。
pub trait AttributeContainer: Send + Sync {
    /// 设置属性
    ///
    /// 值为 `None` 等同于删除；设置相等的值返回 [`ChangeResult::Unchanged`]。
    fn set_attribute(&self, name: &str, value: Option<AttributeValue>) -> ChangeResult;

    /// 获取属性
    fn get_attribute(&self, name: &str) -> Option<AttributeValue>;

    /// 删除属性
    fn remove_attribute(&self, name: &str) -> ChangeResult;

    /// 是否包含属性
    fn contains_attribute(&self, name: &str) -> bool;

    /// 属性数量
    fn attribute_count(&self) -> usize;

    /// 所有属性名，按插入顺序
    fn attribute_names(&self) -> Vec<String>;

    /// 所有属性的稳定快照，按插入顺序
    fn all_attributes(&self) -> Vec<(String, AttributeValue)>;

    /// 仅在属性不存在时插入，返回最终存储的值以及是否插入
    fn insert_if_absent(&self, name: &str, value: AttributeValue) -> (AttributeValue, ChangeResult);

    /// 清空所有属性
    fn clear(&self) -> ChangeResult;

    /// 是否为空
    fn is_empty(&self) -> bool {
        self.attribute_count() == 0
    }
}
