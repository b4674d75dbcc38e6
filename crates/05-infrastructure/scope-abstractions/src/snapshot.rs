//! 会话快照契约
//!
//! 需要随会话迁移的属性实现 [`Snapshotable`]，以带版本的 JSON 形式导出和恢复。
//! 作用域通过对象安全的 [`SnapshotAttribute`] 能力（[`ScopeAttribute::as_snapshot`]）
//! 识别可快照的属性。
//! 快照仅存在于内存中，如何传输由调用方决定。

use crate::attribute::{AttributeValue, ScopeAttribute};
use chrono::{DateTime, Utc};
use scope_common::BoxError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// 快照格式版本
pub const SESSION_SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// 可快照属性（对象安全部分）
pub trait SnapshotAttribute: Send + Sync {
    /// 快照类型名，恢复时据此查找恢复函数
    fn snapshot_type(&self) -> &'static str;

    /// 快照数据版本
    fn snapshot_version(&self) -> u32;

    /// 导出快照数据
    fn snapshot(&self) -> Result<serde_json::Value, BoxError>;
}

/// 基于 serde 的可快照属性
///
/// 实现后在 [`ScopeAttribute::as_snapshot`] 中返回 `Some(self)` 即可参与会话快照。
pub trait Snapshotable: ScopeAttribute + Serialize + DeserializeOwned + Sized {
    /// 快照类型名
    const SNAPSHOT_TYPE: &'static str;

    /// 当前数据版本
    const SNAPSHOT_VERSION: u32;

    /// 将旧版本数据升级到当前版本，默认只接受当前版本
    fn upgrade(version: u32, data: serde_json::Value) -> Option<serde_json::Value> {
        (version == Self::SNAPSHOT_VERSION).then_some(data)
    }
}

impl<T: Snapshotable> SnapshotAttribute for T {
    fn snapshot_type(&self) -> &'static str {
        T::SNAPSHOT_TYPE
    }

    fn snapshot_version(&self) -> u32 {
        T::SNAPSHOT_VERSION
    }

    fn snapshot(&self) -> Result<serde_json::Value, BoxError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// 恢复失败原因
#[derive(Debug)]
pub enum RestoreError {
    /// 版本不受支持
    UnsupportedVersion(u32),
    /// 数据无法反序列化
    Invalid(BoxError),
}

/// 恢复函数：版本号 + 数据 → 属性值
pub type RestoreFn =
    Arc<dyn Fn(u32, serde_json::Value) -> Result<AttributeValue, RestoreError> + Send + Sync>;

/// 为 [`Snapshotable`] 类型构造恢复函数
pub fn restore_fn_for<T: Snapshotable>() -> RestoreFn {
    Arc::new(|version, data| {
        let data = T::upgrade(version, data).ok_or(RestoreError::UnsupportedVersion(version))?;
        let value: T =
            serde_json::from_value(data).map_err(|e| RestoreError::Invalid(Box::new(e)))?;
        Ok(Arc::new(value) as AttributeValue)
    })
}

/// 单个属性的快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// 属性名
    pub attribute_name: String,
    /// 快照类型名
    pub snapshot_type: String,
    /// 数据版本
    pub version: u32,
    /// 数据
    pub data: serde_json::Value,
}

/// 会话应用作用域快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionApplicationSnapshot {
    /// 应用ID
    pub application_id: String,
    /// 属性快照
    pub entries: Vec<SnapshotEntry>,
}

/// 会话快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// 格式版本
    pub format_version: u32,
    /// 快照ID
    pub snapshot_id: Uuid,
    /// 会话ID
    pub session_id: String,
    /// 生成时间
    pub taken_at: DateTime<Utc>,
    /// 会话属性快照
    pub entries: Vec<SnapshotEntry>,
    /// 会话应用作用域快照
    pub applications: Vec<SessionApplicationSnapshot>,
}

impl SessionSnapshot {
    /// 创建空快照
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            format_version: SESSION_SNAPSHOT_FORMAT_VERSION,
            snapshot_id: Uuid::new_v4(),
            session_id: session_id.into(),
            taken_at: Utc::now(),
            entries: Vec::new(),
            applications: Vec::new(),
        }
    }

    /// 快照中的属性总数
    pub fn entry_count(&self) -> usize {
        self.entries.len()
            + self
                .applications
                .iter()
                .map(|app| app.entries.len())
                .sum::<usize>()
    }
}
