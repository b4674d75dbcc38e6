//! 作用域基础设施构建器

use crate::config_sources::{LoggingSettings, ScopeConfigLoader, ScopeSettings, DEFAULT_ENV_PREFIX};
use crate::infrastructure::ScopeInfrastructure;
use scope_abstractions::{ScopeLifecycleListener, Snapshotable};
use scope_common::{InfrastructureResult, ScopeInfrastructureError, ScopeManagerConfig};
use scope_impl::{ScopeManager, SnapshotRegistry};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

type SnapshotRegistration = Box<dyn FnOnce(&SnapshotRegistry) + Send>;

/// 作用域基础设施构建器
///
/// 使用建造者模式组装配置、日志、监听器和快照类型
pub struct ScopeInfrastructureBuilder {
    /// 配置加载器
    loader: ScopeConfigLoader,
    /// 显式指定的配置，优先于配置源
    config_override: Option<ScopeManagerConfig>,
    /// 生命周期监听器
    listeners: Vec<Arc<dyn ScopeLifecycleListener>>,
    /// 快照类型注册
    snapshot_types: Vec<SnapshotRegistration>,
    /// 是否启用日志初始化
    logging_enabled: bool,
    /// 日志配置
    logging_config: Option<LoggingConfig>,
}

impl std::fmt::Debug for ScopeInfrastructureBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeInfrastructureBuilder")
            .field("loader", &self.loader)
            .field("config_override", &self.config_override)
            .field("listener_count", &self.listeners.len())
            .field("snapshot_type_count", &self.snapshot_types.len())
            .field("logging_enabled", &self.logging_enabled)
            .finish()
    }
}

impl ScopeInfrastructureBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            loader: ScopeConfigLoader::new(),
            config_override: None,
            listeners: Vec::new(),
            snapshot_types: Vec::new(),
            logging_enabled: false, // 默认不初始化日志，避免测试中重复初始化
            logging_config: None,
        }
    }

    /// 添加配置文件，类型由扩展名推断，文件不存在时跳过
    pub fn add_config_file<P: AsRef<Path>>(mut self, path: P) -> InfrastructureResult<Self> {
        info!("添加配置文件: {}", path.as_ref().display());
        let priority = self.next_priority();
        self.loader = self.loader.add_file(path, priority)?;
        Ok(self)
    }

    /// 添加必须存在的配置文件
    pub fn add_required_config_file<P: AsRef<Path>>(mut self, path: P) -> InfrastructureResult<Self> {
        info!("添加必需配置文件: {}", path.as_ref().display());
        let priority = self.next_priority();
        self.loader = self.loader.add_required_file(path, priority)?;
        Ok(self)
    }

    /// 添加环境变量配置源，优先于之前添加的所有配置源
    pub fn add_config_env_vars<S: Into<String>>(mut self, prefix: S) -> Self {
        let prefix = prefix.into();
        info!("添加环境变量配置源，前缀: {}", prefix);
        let priority = self.next_priority();
        self.loader = self.loader.add_environment(prefix, priority);
        self
    }

    /// 添加默认前缀的环境变量配置源
    pub fn add_default_env_vars(self) -> Self {
        self.add_config_env_vars(DEFAULT_ENV_PREFIX)
    }

    /// 直接使用自定义配置加载器
    pub fn with_config_loader(mut self, loader: ScopeConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    /// 显式指定作用域配置，忽略配置源中的 `scopes` 节
    pub fn with_config(mut self, config: ScopeManagerConfig) -> Self {
        self.config_override = Some(config);
        self
    }

    /// 注册生命周期监听器
    pub fn add_listener(mut self, listener: Arc<dyn ScopeLifecycleListener>) -> Self {
        debug!("添加作用域监听器: {}", listener.name());
        self.listeners.push(listener);
        self
    }

    /// 注册可快照类型
    pub fn register_snapshot_type<T: Snapshotable>(mut self) -> Self {
        debug!("添加快照类型: {}", T::SNAPSHOT_TYPE);
        self.snapshot_types
            .push(Box::new(|registry: &SnapshotRegistry| registry.register::<T>()));
        self
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = Some(config);
        self.logging_enabled = true;
        self
    }

    /// 按配置源中的 `logging` 节初始化日志
    pub fn with_configured_logging(mut self) -> Self {
        self.logging_enabled = true;
        self
    }

    /// 构建基础设施实例
    pub fn build(self) -> InfrastructureResult<ScopeInfrastructure> {
        info!("开始构建作用域基础设施");

        let ScopeSettings { scopes, logging } = self.loader.load()?;
        let config = match self.config_override {
            Some(config) => {
                config.validate()?;
                config
            }
            None => scopes,
        };

        if self.logging_enabled {
            let logging_config = match (self.logging_config, logging) {
                (Some(config), _) => config,
                (None, Some(settings)) => LoggingConfig::try_from(&settings)?,
                (None, None) => LoggingConfig::default(),
            };
            initialize_logging(&logging_config)?;
        }

        config.apply_debug_flags();
        let manager = ScopeManager::with_config(config);
        for listener in self.listeners {
            manager.register_listener(listener);
        }
        for register in self.snapshot_types {
            register(manager.snapshot_registry());
        }

        info!("作用域基础设施构建完成");
        Ok(ScopeInfrastructure::new(Arc::new(manager)))
    }

    fn next_priority(&self) -> u32 {
        // 后添加的配置源优先
        u32::MAX - self.loader.sources().len() as u32
    }
}

impl Default for ScopeInfrastructureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 初始化日志系统
fn initialize_logging(config: &LoggingConfig) -> InfrastructureResult<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(config.level)
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_file(config.show_file)
        .with_line_number(config.show_line_number);

    if config.json_format {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    }
    .map_err(|e| ScopeInfrastructureError::BootstrapFailed {
        message: format!("日志初始化失败: {}", e),
    })?;

    info!("日志系统初始化完成");
    Ok(())
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: tracing::Level,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }
}

impl TryFrom<&LoggingSettings> for LoggingConfig {
    type Error = ScopeInfrastructureError;

    fn try_from(settings: &LoggingSettings) -> Result<Self, Self::Error> {
        let level = tracing::Level::from_str(&settings.level).map_err(|_| {
            ScopeInfrastructureError::BootstrapFailed {
                message: format!("无效的日志级别: {}", settings.level),
            }
        })?;
        Ok(Self {
            level,
            show_target: settings.show_target,
            show_thread_ids: settings.show_thread_ids,
            json_format: settings.json_format,
            ..Self::default()
        })
    }
}
