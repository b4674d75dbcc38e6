//! 作用域管理器配置

use crate::debug::ScopeDebugFlags;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// 作用域管理器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeManagerConfig {
    /// 按需创建全局作用域时使用的ID
    pub default_global_scope_id: String,
    /// 结束全局作用域时是否先结束所有会话
    pub end_sessions_on_global_end: bool,
    /// 开始请求时是否要求非空会话ID
    pub require_session_id: bool,
    /// 生命周期调试日志
    pub debug_life_cycle: bool,
    /// 生命周期日志附带调用栈
    pub debug_stack_traces: bool,
}

impl Default for ScopeManagerConfig {
    fn default() -> Self {
        Self {
            default_global_scope_id: "global".to_string(),
            end_sessions_on_global_end: true,
            require_session_id: true,
            debug_life_cycle: false,
            debug_stack_traces: false,
        }
    }
}

impl ScopeManagerConfig {
    /// 配置节名称
    pub const SECTION: &'static str = "scopes";

    /// 验证配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_global_scope_id.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "default_global_scope_id 不能为空".to_string(),
            });
        }
        Ok(())
    }

    /// 将调试开关应用到进程级设置
    pub fn apply_debug_flags(&self) {
        ScopeDebugFlags::set_debug_life_cycle_enabled(self.debug_life_cycle);
        ScopeDebugFlags::set_debug_stack_traces_enabled(self.debug_stack_traces);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScopeManagerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.end_sessions_on_global_end);
        assert!(config.require_session_id);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScopeManagerConfig =
            serde_json::from_str(r#"{ "debug_life_cycle": true }"#).unwrap();
        assert!(config.debug_life_cycle);
        assert_eq!(config.default_global_scope_id, "global");
    }

    #[test]
    fn test_blank_global_id_is_rejected() {
        let config = ScopeManagerConfig {
            default_global_scope_id: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}
