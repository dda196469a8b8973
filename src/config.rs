//! 管道配置管理模块
//!
//! 提供配置文件加载、环境变量覆盖和启动前验证

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::provider::ProviderKind;

/// 管道配置常量
pub mod constants {
    pub const DEFAULT_CONCURRENCY: usize = 4;
    pub const DEFAULT_BATCH_SIZE: usize = 20;
    pub const DEFAULT_MAX_RETRIES: usize = 2;
    pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400; // 24小时
    pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;
    pub const DEFAULT_CACHE_PATH: &str = ".lingo-cache.json";

    pub const DEFAULT_KEY_MAX_LENGTH: usize = 32;
    pub const DEFAULT_KEY_HASH_LENGTH: usize = 6;
    pub const DEFAULT_KEY_SEPARATOR: char = '_';

    pub const DEFAULT_SOURCE_LOCALE: &str = "zh-CN";
    pub const DEFAULT_OUTPUT_DIR: &str = "locales";
    pub const DEFAULT_LOCALE_PATTERN: &str = "{locale}.json";

    pub const MAX_FILE_SIZE: u64 = 512 * 1024;

    pub const PROCESSABLE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "vue"];

    pub const SKIP_DIRS: &[&str] = &[
        "node_modules",
        ".git",
        ".next",
        "dist",
        "build",
        "out",
        "coverage",
        "target",
    ];

    pub const CONFIG_PATHS: &[&str] = &["lingo.toml", ".lingo.toml"];

    // 环境变量名
    pub const ENV_API_KEY: &str = "LINGO_API_KEY";
    pub const ENV_API_URL: &str = "LINGO_API_URL";
    pub const ENV_MODEL: &str = "LINGO_MODEL";
}

/// 管道总配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 并发处理的工作单元上限
    pub concurrency: usize,
    /// 翻译批次大小（条目数）
    pub batch_size: usize,
    /// 外部服务配置
    pub provider: ProviderConfig,
    /// 键生成配置
    pub keys: KeyConfig,
    /// 响应缓存配置
    pub cache: CacheSettings,
    /// 输出配置
    pub output: OutputConfig,
    /// 扫描配置
    pub scan: ScanConfig,
}

/// 外部服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// 服务类型
    pub kind: ProviderKind,
    /// API地址（为空时使用服务类型的默认地址）
    pub api_url: Option<String>,
    /// API密钥（优先从环境变量读取）
    pub api_key: Option<String>,
    /// 模型名称
    pub model: String,
    /// 单次调用超时（秒）
    pub timeout_secs: u64,
    /// 最大重试次数
    pub max_retries: usize,
    /// 重试基础延迟（毫秒），按 2^attempt 指数退避
    pub retry_base_delay_ms: u64,
}

/// 键生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// 罗马化形式的最大长度（字符数）
    pub max_length: usize,
    /// 截断/冲突后缀的哈希长度（十六进制字符数）
    pub hash_length: usize,
    /// 词元分隔符
    pub separator: char,
    /// 键前缀（为空时不添加）
    pub prefix: String,
    /// 相同文本复用既有键
    pub reuse_existing: bool,
}

/// 响应缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// 启用缓存
    pub enabled: bool,
    /// 启用磁盘持久化
    pub persistent: bool,
    /// 快照文件路径
    pub path: PathBuf,
    /// 条目TTL（秒）
    pub ttl_secs: u64,
    /// 容量上限
    pub max_entries: usize,
}

/// 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// 源语言区域代码
    pub source_locale: String,
    /// 需要翻译的目标区域代码
    pub target_locales: Vec<String>,
    /// 语言文件输出目录
    pub dir: PathBuf,
    /// 文件名模式，{locale} 会被替换为区域代码
    pub file_pattern: String,
    /// 美化输出JSON
    pub pretty: bool,
}

/// 扫描配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// 可处理的文件扩展名
    pub extensions: Vec<String>,
    /// 跳过的目录名
    pub skip_dirs: Vec<String>,
    /// 单文件大小上限（字节）
    pub max_file_size: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: constants::DEFAULT_CONCURRENCY,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            provider: ProviderConfig::default(),
            keys: KeyConfig::default(),
            cache: CacheSettings::default(),
            output: OutputConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            api_url: None,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: constants::DEFAULT_TIMEOUT_SECS,
            max_retries: constants::DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: constants::DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            max_length: constants::DEFAULT_KEY_MAX_LENGTH,
            hash_length: constants::DEFAULT_KEY_HASH_LENGTH,
            separator: constants::DEFAULT_KEY_SEPARATOR,
            prefix: String::new(),
            reuse_existing: true,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            persistent: true,
            path: PathBuf::from(constants::DEFAULT_CACHE_PATH),
            ttl_secs: constants::DEFAULT_CACHE_TTL_SECS,
            max_entries: constants::DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            source_locale: constants::DEFAULT_SOURCE_LOCALE.to_string(),
            target_locales: Vec::new(),
            dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            file_pattern: constants::DEFAULT_LOCALE_PATTERN.to_string(),
            pretty: true,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: constants::PROCESSABLE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            skip_dirs: constants::SKIP_DIRS.iter().map(|s| s.to_string()).collect(),
            max_file_size: constants::MAX_FILE_SIZE,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl OutputConfig {
    /// 根据文件名模式得到指定区域的输出路径
    pub fn locale_path(&self, locale: &str) -> PathBuf {
        self.dir.join(self.file_pattern.replace("{locale}", locale))
    }
}

impl PipelineConfig {
    /// 加载配置
    ///
    /// 显式路径缺失视为致命错误；未指定路径时按约定位置查找，
    /// 都不存在则使用默认配置。环境变量覆盖最后应用。
    pub fn load(explicit: Option<&Path>) -> PipelineResult<Self> {
        let mut config = match explicit {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    PipelineError::Config(format!("无法读取配置文件 {}: {}", path.display(), e))
                })?;
                toml::from_str(&raw)?
            }
            None => {
                let mut found: Option<Self> = None;
                for candidate in constants::CONFIG_PATHS {
                    let path = Path::new(candidate);
                    if path.exists() {
                        let raw = std::fs::read_to_string(path).map_err(|e| {
                            PipelineError::Config(format!(
                                "无法读取配置文件 {}: {}",
                                path.display(),
                                e
                            ))
                        })?;
                        found = Some(toml::from_str(&raw)?);
                        tracing::debug!("已加载配置文件: {}", path.display());
                        break;
                    }
                }
                found.unwrap_or_default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 应用环境变量覆盖
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = env::var(constants::ENV_API_KEY) {
            if !key.is_empty() {
                self.provider.api_key = Some(key);
            }
        }
        if let Ok(url) = env::var(constants::ENV_API_URL) {
            if !url.is_empty() {
                self.provider.api_url = Some(url);
            }
        }
        if let Ok(model) = env::var(constants::ENV_MODEL) {
            if !model.is_empty() {
                self.provider.model = model;
            }
        }
    }

    /// 启动前验证
    ///
    /// 配置错误是唯一的运行级致命错误，必须在处理开始前暴露。
    pub fn validate(&self) -> PipelineResult<()> {
        if self.concurrency == 0 {
            return Err(PipelineError::Config("concurrency 必须大于 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::Config("batch_size 必须大于 0".to_string()));
        }
        if self.keys.hash_length == 0 || self.keys.hash_length > 64 {
            return Err(PipelineError::Config(
                "keys.hash_length 必须在 1..=64 范围内".to_string(),
            ));
        }
        if !(self.keys.separator.is_ascii_alphanumeric()
            || self.keys.separator == '_'
            || self.keys.separator == '-'
            || self.keys.separator == '.')
        {
            return Err(PipelineError::Config(format!(
                "keys.separator 不是合法的分隔符: {:?}",
                self.keys.separator
            )));
        }
        if self.provider.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "provider.timeout_secs 必须大于 0".to_string(),
            ));
        }
        if !self.output.file_pattern.contains("{locale}") {
            return Err(PipelineError::Config(
                "output.file_pattern 必须包含 {locale} 占位符".to_string(),
            ));
        }
        for locale in &self.output.target_locales {
            if locale.trim().is_empty() {
                return Err(PipelineError::Config("目标区域代码不能为空".to_string()));
            }
        }
        Ok(())
    }
}
