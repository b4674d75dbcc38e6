//! 作用域生命周期类型

use serde::{Deserialize, Serialize};
use std::fmt;

/// 作用域类型
///
/// 按销毁级联顺序排列：全局 → 应用 → 会话 → 会话应用 → 请求
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// 全局作用域，每个进程最多一个
    Global,
    /// 应用作用域，归属于全局作用域
    Application,
    /// 会话作用域
    Session,
    /// 会话应用作用域，归属于会话作用域
    SessionApplication,
    /// 请求作用域，仅在一次请求内存在
    Request,
}

impl ScopeKind {
    /// 所有作用域类型
    pub const ALL: [Self; 5] = [
        Self::Global,
        Self::Application,
        Self::Session,
        Self::SessionApplication,
        Self::Request,
    ];

    /// 获取类型名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Application => "application",
            Self::Session => "session",
            Self::SessionApplication => "session_application",
            Self::Request => "request",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 作用域状态
///
/// 状态单调递进，不可回退。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScopeState {
    /// 可用
    Valid,
    /// 销毁中
    InDestruction,
    /// 已销毁
    Destroyed,
}

impl Default for ScopeState {
    fn default() -> Self {
        Self::Valid
    }
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Valid => "valid",
            Self::InDestruction => "in_destruction",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// 属性变更结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeResult {
    /// 属性发生了变化
    Changed,
    /// 属性未变化
    Unchanged,
}

impl ChangeResult {
    /// 根据布尔值创建
    pub fn from_changed(changed: bool) -> Self {
        if changed {
            Self::Changed
        } else {
            Self::Unchanged
        }
    }

    /// 是否发生变化
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed)
    }

    /// 是否未变化
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// 合并两个变更结果
    pub fn or(self, other: Self) -> Self {
        Self::from_changed(self.is_changed() || other.is_changed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_state_is_ordered() {
        assert!(ScopeState::Valid < ScopeState::InDestruction);
        assert!(ScopeState::InDestruction < ScopeState::Destroyed);
        assert_eq!(ScopeState::default(), ScopeState::Valid);
    }

    #[test]
    fn test_change_result_or() {
        assert!(ChangeResult::Unchanged.or(ChangeResult::Changed).is_changed());
        assert!(ChangeResult::Unchanged.or(ChangeResult::Unchanged).is_unchanged());
    }

    #[test]
    fn test_scope_kind_names() {
        assert_eq!(ScopeKind::SessionApplication.to_string(), "session_application");
        assert_eq!(ScopeKind::ALL.len(), 5);
    }
}
