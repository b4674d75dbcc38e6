//! 错误类型定义

use crate::lifecycle::{ScopeKind, ScopeState};
use thiserror::Error;

/// 作用域错误类型
///
/// 前置条件违反、重复生命周期事件以及单例错误都通过此类型同步返回给调用方。
#[derive(Error, Debug)]
pub enum ScopeError {
    /// 作用域ID为空
    #[error("作用域ID不能为空: {kind}")]
    EmptyScopeId { kind: ScopeKind },

    /// 全局作用域尚未开始
    #[error("全局作用域不存在")]
    GlobalScopeNotPresent,

    /// 全局作用域重复开始
    #[error("全局作用域已存在: {scope_id}")]
    GlobalScopeAlreadyPresent { scope_id: String },

    /// 应用作用域不存在
    #[error("应用作用域不存在: {application_id}")]
    ApplicationScopeNotPresent { application_id: String },

    /// 会话作用域不存在
    #[error("会话作用域不存在: {session_id}")]
    SessionScopeNotPresent { session_id: String },

    /// 会话ID已被存活会话占用
    #[error("会话作用域已存在: {session_id}")]
    SessionScopeAlreadyPresent { session_id: String },

    /// 会话应用作用域不存在
    #[error("会话应用作用域不存在: 会话 {session_id}, 应用 {application_id}")]
    SessionApplicationScopeNotPresent {
        session_id: String,
        application_id: String,
    },

    /// 请求上下文未绑定请求作用域
    #[error("当前上下文未绑定请求作用域")]
    RequestScopeNotPresent,

    /// 请求上下文已绑定请求作用域
    #[error("当前上下文已绑定请求作用域: {request_id}")]
    RequestScopeAlreadyPresent { request_id: String },

    /// 请求ID与活动请求重复
    #[error("请求ID已被活动请求占用: {request_id}")]
    DuplicateRequestId { request_id: String },

    /// 作用域已开始销毁
    #[error("作用域不可用: {kind} '{scope_id}' 处于 {state} 状态")]
    ScopeNotValid {
        kind: ScopeKind,
        scope_id: String,
        state: ScopeState,
    },

    /// 单例属性类型与请求类型不符
    #[error("单例类型不匹配: 属性 {attribute_name} 不是 {expected}")]
    SingletonTypeMismatch {
        attribute_name: String,
        expected: String,
    },

    /// 同一作用域内递归创建同类型单例
    #[error("单例递归创建: {type_name}")]
    RecursiveSingletonCreation { type_name: String },

    /// 单例工厂返回错误
    #[error("单例创建失败: {type_name}, 原因: {message}")]
    SingletonCreationFailed { type_name: String, message: String },

    /// 属性生成快照失败
    #[error("属性快照失败: {attribute_name}, 原因: {message}")]
    SnapshotFailed {
        attribute_name: String,
        message: String,
    },

    /// 快照类型未注册
    #[error("未知的快照类型: {snapshot_type}")]
    UnknownSnapshotType { snapshot_type: String },

    /// 快照版本无法恢复
    #[error("不支持的快照版本: {snapshot_type} v{version}")]
    UnsupportedSnapshotVersion { snapshot_type: String, version: u32 },
}

impl ScopeError {
    /// 创建作用域不可用错误
    pub fn not_valid(kind: ScopeKind, scope_id: impl Into<String>, state: ScopeState) -> Self {
        Self::ScopeNotValid {
            kind,
            scope_id: scope_id.into(),
            state,
        }
    }

    /// 是否为重复生命周期事件错误
    pub fn is_duplicate_lifecycle_event(&self) -> bool {
        matches!(
            self,
            Self::GlobalScopeAlreadyPresent { .. }
                | Self::SessionScopeAlreadyPresent { .. }
                | Self::RequestScopeAlreadyPresent { .. }
                | Self::DuplicateRequestId { .. }
                | Self::GlobalScopeNotPresent
                | Self::RequestScopeNotPresent
        )
    }
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 必需的配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 配置源解析失败
    #[error("配置解析失败: {source}")]
    ParseError {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 配置值不合法
    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum ScopeInfrastructureError {
    /// 配置加载失败
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    /// 作用域操作失败
    #[error("作用域错误: {source}")]
    ScopeError {
        #[from]
        source: ScopeError,
    },

    /// 启动失败
    #[error("基础设施启动失败: {message}")]
    BootstrapFailed { message: String },

    /// 关闭失败
    #[error("基础设施关闭失败: {message}")]
    ShutdownFailed { message: String },
}

/// 钩子与监听器返回的错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 作用域操作结果
pub type ScopeResult<T> = Result<T, ScopeError>;
/// 配置加载结果
pub type ConfigResult<T> = Result<T, ConfigError>;
/// 基础设施操作结果
pub type InfrastructureResult<T> = Result<T, ScopeInfrastructureError>;
