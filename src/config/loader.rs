//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// # 环境变量示例
/// - `READALONG_TTS__URL=http://tts-server:8000`
/// - `READALONG_CACHE__MAX_ENTRIES=100`
/// - `READALONG_SYNC__TICK_INTERVAL_MS=33`
/// - `READALONG_LOG__JSON=true`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// `config_path` 为 None 时搜索工作目录下的 config.toml / config.local.toml
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    builder = builder
        .set_default("tts.url", "http://localhost:8000")?
        .set_default("tts.timeout_secs", 30)?
        .set_default("tts.max_retries", 1)?
        .set_default("tts.retry_backoff_ms", 250)?
        .set_default("cache.max_entries", 50)?
        .set_default("cache.ttl_secs", 7 * 24 * 60 * 60)?
        .set_default("sync.tick_interval_ms", 16)?
        .set_default("sync.fallback_word_secs", 0.4)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 前缀 READALONG_，层级分隔符 __
    builder = builder.add_source(
        Environment::with_prefix("READALONG")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.tts.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS URL cannot be empty".to_string(),
        ));
    }

    if config.cache.max_entries == 0 {
        return Err(ConfigError::ValidationError(
            "Cache max_entries cannot be 0".to_string(),
        ));
    }

    if config.cache.ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Cache ttl_secs cannot be 0".to_string(),
        ));
    }

    if config.sync.tick_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "Sync tick_interval_ms cannot be 0".to_string(),
        ));
    }

    let fallback = config.sync.fallback_word_secs;
    if !fallback.is_finite() || fallback <= 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "Sync fallback_word_secs must be positive, got {}",
            fallback
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== ReadAlong Configuration ===");
    tracing::info!("TTS URL: {}", config.tts.url);
    tracing::info!("TTS Timeout: {}s", config.tts.timeout_secs);
    tracing::info!(
        "TTS Retries: {} (backoff {}ms)",
        config.tts.max_retries,
        config.tts.retry_backoff_ms
    );
    tracing::info!("Cache Max Entries: {}", config.cache.max_entries);
    tracing::info!("Cache TTL: {}s", config.cache.ttl_secs);
    tracing::info!("Sync Tick Interval: {}ms", config.sync.tick_interval_ms);
    tracing::info!("Fallback Word Duration: {}s", config.sync.fallback_word_secs);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("===============================");
}
