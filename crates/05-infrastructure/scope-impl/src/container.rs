//! 基于 HashMap 的属性容器实现

use parking_lot::RwLock;
use scope_abstractions::{attribute_values_equal, AttributeContainer, AttributeValue};
use scope_common::ChangeResult;
use std::collections::HashMap;
use std::fmt;

/// 属性条目，`seq` 记录首次插入顺序
struct AttributeEntry {
    seq: u64,
    value: AttributeValue,
}

#[derive(Default)]
struct AttributeMap {
    entries: HashMap<String, AttributeEntry>,
    next_seq: u64,
}

impl AttributeMap {
    fn sorted(&self) -> Vec<(&String, &AttributeEntry)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.seq);
        entries
    }
}

/// 属性容器实现
///
/// 读写锁保护：读并发，写串行。遍历总是基于快照。
#[derive(Default)]
pub struct MapAttributeContainer {
    inner: RwLock<AttributeMap>,
}

impl MapAttributeContainer {
    /// 创建空容器
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for MapAttributeContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapAttributeContainer")
            .field("attribute_names", &self.attribute_names())
            .finish()
    }
}

impl AttributeContainer for MapAttributeContainer {
    fn set_attribute(&self, name: &str, value: Option<AttributeValue>) -> ChangeResult {
        let Some(value) = value else {
            return self.remove_attribute(name);
        };

        let mut inner = self.inner.write();
        if let Some(entry) = inner.entries.get_mut(name) {
            if attribute_values_equal(&entry.value, &value) {
                return ChangeResult::Unchanged;
            }
            entry.value = value;
            return ChangeResult::Changed;
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .entries
            .insert(name.to_string(), AttributeEntry { seq, value });
        ChangeResult::Changed
    }

    fn get_attribute(&self, name: &str) -> Option<AttributeValue> {
        self.inner
            .read()
            .entries
            .get(name)
            .map(|entry| entry.value.clone())
    }

    fn remove_attribute(&self, name: &str) -> ChangeResult {
        ChangeResult::from_changed(self.inner.write().entries.remove(name).is_some())
    }

    fn contains_attribute(&self, name: &str) -> bool {
        self.inner.read().entries.contains_key(name)
    }

    fn attribute_count(&self) -> usize {
        self.inner.read().entries.len()
    }

    fn attribute_names(&self) -> Vec<String> {
        self.inner
            .read()
            .sorted()
            .into_iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn all_attributes(&self) -> Vec<(String, AttributeValue)> {
        self.inner
            .read()
            .sorted()
            .into_iter()
            .map(|(name, entry)| (name.clone(), entry.value.clone()))
            .collect()
    }

    fn insert_if_absent(&self, name: &str, value: AttributeValue) -> (AttributeValue, ChangeResult) {
        let mut inner = self.inner.write();
        if let Some(entry) = inner.entries.get(name) {
            return (entry.value.clone(), ChangeResult::Unchanged);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            name.to_string(),
            AttributeEntry {
                seq,
                value: value.clone(),
            },
        );
        (value, ChangeResult::Changed)
    }

    fn clear(&self) -> ChangeResult {
        let mut inner = self.inner.write();
        let changed = !inner.entries.is_empty();
        inner.entries.clear();
        ChangeResult::from_changed(changed)
    }
}
