//! 配置源管理
//!
//! 通过 `config` crate 合并文件和环境变量配置源，读取 `scopes` 和 `logging` 配置节。

use scope_common::{ConfigError, ConfigResult, ScopeManagerConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 默认环境变量前缀
pub const DEFAULT_ENV_PREFIX: &str = "SCOPES";

/// 环境变量中层级分隔符，`SCOPES_SCOPES__REQUIRE_SESSION_ID` 对应 `scopes.require_session_id`
pub const ENV_SEPARATOR: &str = "__";

/// 配置源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSourceType {
    /// TOML 文件
    Toml,
    /// JSON 文件
    Json,
    /// YAML 文件
    Yaml,
    /// 环境变量
    Environment,
}

impl ConfigSourceType {
    /// 根据文件扩展名推断类型
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    fn file_format(self) -> Option<config::FileFormat> {
        match self {
            Self::Toml => Some(config::FileFormat::Toml),
            Self::Json => Some(config::FileFormat::Json),
            Self::Yaml => Some(config::FileFormat::Yaml),
            Self::Environment => None,
        }
    }
}

/// 配置源描述
#[derive(Debug, Clone)]
pub struct ConfigSourceDescriptor {
    /// 配置源类型
    pub source_type: ConfigSourceType,
    /// 文件路径或环境变量前缀
    pub location: String,
    /// 优先级（数字越小优先级越高）
    pub priority: u32,
    /// 文件不存在时是否报错
    pub required: bool,
}

/// 日志配置节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// 日志级别：trace/debug/info/warn/error
    pub level: String,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_target: true,
            show_thread_ids: false,
            json_format: false,
        }
    }
}

impl LoggingSettings {
    /// 配置节名称
    pub const SECTION: &'static str = "logging";
}

/// 加载后的配置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeSettings {
    /// 作用域管理器配置
    pub scopes: ScopeManagerConfig,
    /// 日志配置，未配置时为 `None`
    pub logging: Option<LoggingSettings>,
}

/// 配置加载器
///
/// 多个配置源按优先级合并，优先级数字越小越晚应用、越优先生效。
#[derive(Debug, Default)]
pub struct ScopeConfigLoader {
    sources: Vec<ConfigSourceDescriptor>,
    env_overrides: Option<HashMap<String, String>>,
}

impl ScopeConfigLoader {
    /// 创建空加载器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加配置文件，类型由扩展名推断
    pub fn add_file<P: AsRef<Path>>(self, path: P, priority: u32) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source_type =
            ConfigSourceType::from_path(path).ok_or_else(|| ConfigError::ValidationError {
                message: format!("无法识别的配置文件类型: {}", path.display()),
            })?;
        Ok(self.add_typed_file(path, source_type, priority, false))
    }

    /// 添加必须存在的配置文件
    pub fn add_required_file<P: AsRef<Path>>(self, path: P, priority: u32) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let mut loader = self.add_file(path, priority)?;
        if let Some(last) = loader.sources.last_mut() {
            last.required = true;
        }
        Ok(loader)
    }

    /// 添加 TOML 文件
    pub fn add_toml_file<P: AsRef<Path>>(self, path: P, priority: u32) -> Self {
        self.add_typed_file(path.as_ref(), ConfigSourceType::Toml, priority, false)
    }

    /// 添加 JSON 文件
    pub fn add_json_file<P: AsRef<Path>>(self, path: P, priority: u32) -> Self {
        self.add_typed_file(path.as_ref(), ConfigSourceType::Json, priority, false)
    }

    /// 添加 YAML 文件
    pub fn add_yaml_file<P: AsRef<Path>>(self, path: P, priority: u32) -> Self {
        self.add_typed_file(path.as_ref(), ConfigSourceType::Yaml, priority, false)
    }

    /// 添加环境变量配置源
    pub fn add_environment<S: Into<String>>(mut self, prefix: S, priority: u32) -> Self {
        let prefix = prefix.into();
        debug!("添加环境变量配置源，前缀: {}", prefix);
        self.sources.push(ConfigSourceDescriptor {
            source_type: ConfigSourceType::Environment,
            location: prefix,
            priority,
            required: false,
        });
        self
    }

    /// 用给定的变量表代替进程环境变量
    pub fn with_environment_overrides(mut self, vars: HashMap<String, String>) -> Self {
        self.env_overrides = Some(vars);
        self
    }

    /// 已添加的配置源
    pub fn sources(&self) -> &[ConfigSourceDescriptor] {
        &self.sources
    }

    fn add_typed_file(
        mut self,
        path: &Path,
        source_type: ConfigSourceType,
        priority: u32,
        required: bool,
    ) -> Self {
        debug!("添加 {:?} 配置源: {}", source_type, path.display());
        self.sources.push(ConfigSourceDescriptor {
            source_type,
            location: path.to_string_lossy().to_string(),
            priority,
            required,
        });
        self
    }

    /// 加载并验证配置
    pub fn load(&self) -> ConfigResult<ScopeSettings> {
        let mut ordered: Vec<_> = self.sources.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut builder = config::Config::builder();
        for source in ordered {
            match source.source_type.file_format() {
                Some(format) => {
                    let path = PathBuf::from(&source.location);
                    if !path.exists() {
                        if source.required {
                            return Err(ConfigError::FileNotFound {
                                path: source.location.clone(),
                            });
                        }
                        warn!("配置文件不存在，跳过: {}", source.location);
                        continue;
                    }
                    builder = builder.add_source(
                        config::File::from(path)
                            .format(format)
                            .required(source.required),
                    );
                }
                None => {
                    let mut environment = config::Environment::with_prefix(&source.location)
                        .prefix_separator("_")
                        .separator(ENV_SEPARATOR)
                        .try_parsing(true);
                    if let Some(vars) = &self.env_overrides {
                        environment = environment.source(Some(vars.clone().into_iter().collect()));
                    }
                    builder = builder.add_source(environment);
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|e| ConfigError::ParseError { source: Box::new(e) })?;

        let scopes = read_section::<ScopeManagerConfig>(&settings, ScopeManagerConfig::SECTION)?
            .unwrap_or_default();
        scopes.validate()?;
        let logging = read_section::<LoggingSettings>(&settings, LoggingSettings::SECTION)?;

        info!(
            "作用域配置加载完成: 全局作用域ID={}, 要求会话ID={}",
            scopes.default_global_scope_id, scopes.require_session_id
        );
        Ok(ScopeSettings { scopes, logging })
    }
}

fn read_section<T: serde::de::DeserializeOwned>(
    settings: &config::Config,
    section: &str,
) -> ConfigResult<Option<T>> {
    match settings.get::<T>(section) {
        Ok(value) => Ok(Some(value)),
        Err(config::ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(ConfigError::ParseError { source: Box::new(e) }),
    }
}
