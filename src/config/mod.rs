//! 扫描编排配置
//!
//! 每个引擎一段独立配置（开关、防抖窗口、防抖策略），外加全局排除目录。
//! 支持从 TOML 文件加载，缺省字段回退到内置默认值。

use serde::Deserialize;
use std::path::Path;

use crate::errors::ConfigError;
use crate::types::EngineKind;

/// 防抖策略（见 command 模块）
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DebounceStrategyKind {
    /// 每个文档独立计时器
    #[default]
    PerDocument,
    /// 所有文档共享一个计时器
    Global,
}

/// 单个引擎的配置
#[derive(Deserialize, Debug, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 防抖窗口（毫秒）。下限 1000ms：低于上一轮临时文件安全删除所需时间，
    /// 新一轮扫描可能读到写了一半的临时文件。
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub strategy: DebounceStrategyKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            debounce_ms: default_debounce_ms(),
            strategy: DebounceStrategyKind::default(),
        }
    }
}

/// Configuration for the whole orchestrator
#[derive(Deserialize, Debug, Clone)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub oss: EngineConfig,
    #[serde(default = "default_global_engine")]
    pub secrets: EngineConfig,
    #[serde(default = "default_global_engine")]
    pub static_rules: EngineConfig,
    #[serde(default)]
    pub iac: EngineConfig,
    #[serde(default = "default_global_engine")]
    pub containers: EngineConfig,
    /// 额外排除目录（与内置排除目录合并）
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            oss: EngineConfig::default(),
            secrets: default_global_engine(),
            static_rules: default_global_engine(),
            iac: EngineConfig::default(),
            containers: default_global_engine(),
            exclude_dirs: Vec::new(),
        }
    }
}

/// Partial configuration for loading from files
#[derive(Deserialize, Debug, Default)]
pub struct PartialOrchestratorConfig {
    oss: Option<PartialEngineConfig>,
    secrets: Option<PartialEngineConfig>,
    static_rules: Option<PartialEngineConfig>,
    iac: Option<PartialEngineConfig>,
    containers: Option<PartialEngineConfig>,
    exclude_dirs: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PartialEngineConfig {
    enabled: Option<bool>,
    debounce_ms: Option<u64>,
    strategy: Option<DebounceStrategyKind>,
}

impl OrchestratorConfig {
    /// Create OrchestratorConfig from partial config with defaults
    pub fn from_partial(partial: Option<PartialOrchestratorConfig>) -> Self {
        let partial = partial.unwrap_or_default();
        let defaults = OrchestratorConfig::default();

        Self {
            oss: merge_engine(partial.oss, defaults.oss),
            secrets: merge_engine(partial.secrets, defaults.secrets),
            static_rules: merge_engine(partial.static_rules, defaults.static_rules),
            iac: merge_engine(partial.iac, defaults.iac),
            containers: merge_engine(partial.containers, defaults.containers),
            exclude_dirs: partial.exclude_dirs.unwrap_or_default(),
        }
    }

    /// 从 TOML 文件加载配置
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.display().to_string(), e))?;
        Self::load_from_str(&content, &path.display().to_string())
    }

    pub fn load_from_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let partial: PartialOrchestratorConfig = toml::from_str(content)
            .map_err(|e| ConfigError::TomlParse(origin.to_string(), e))?;
        Ok(Self::from_partial(Some(partial)))
    }

    pub fn for_engine(&self, kind: EngineKind) -> &EngineConfig {
        match kind {
            EngineKind::Oss => &self.oss,
            EngineKind::Secrets => &self.secrets,
            EngineKind::StaticRules => &self.static_rules,
            EngineKind::Iac => &self.iac,
            EngineKind::Containers => &self.containers,
        }
    }
}

/// 基于内存配置的 ConfigProvider。宿主在配置变更事件里调用 `update`，
/// 随后触发 registry 重新评估各扫描器的激活状态。
pub struct StaticConfigProvider {
    config: parking_lot::RwLock<OrchestratorConfig>,
}

impl StaticConfigProvider {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config: parking_lot::RwLock::new(config),
        }
    }

    pub fn update(&self, config: OrchestratorConfig) {
        *self.config.write() = config;
    }

    pub fn snapshot(&self) -> OrchestratorConfig {
        self.config.read().clone()
    }
}

impl crate::engine::ConfigProvider for StaticConfigProvider {
    fn is_scanner_active(&self, kind: EngineKind) -> bool {
        self.config.read().for_engine(kind).enabled
    }
}

fn merge_engine(partial: Option<PartialEngineConfig>, defaults: EngineConfig) -> EngineConfig {
    match partial {
        Some(p) => EngineConfig {
            enabled: p.enabled.unwrap_or(defaults.enabled),
            debounce_ms: p.debounce_ms.unwrap_or(defaults.debounce_ms),
            strategy: p.strategy.unwrap_or(defaults.strategy),
        },
        None => defaults,
    }
}

// Default functions
fn default_enabled() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    1000 // 临时文件安全删除窗口的经验下限
}

/// 调用开销较大的引擎默认采用全局防抖，避免多文档并发扫描
fn default_global_engine() -> EngineConfig {
    EngineConfig {
        enabled: true,
        debounce_ms: 2000,
        strategy: DebounceStrategyKind::Global,
    }
}
