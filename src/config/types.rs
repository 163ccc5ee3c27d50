//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::time::Duration;

use crate::application::EngineConfig;
use crate::domain::DEFAULT_FALLBACK_WORD_SECS;
use crate::infrastructure::{AudioCacheConfig, HttpSynthesisClientConfig};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 合成服务配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 音频缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// 高亮同步配置
    #[serde(default)]
    pub sync: SyncConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 合成服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// 合成服务基础 URL
    #[serde(default = "default_tts_url")]
    pub url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// 最大重试次数（仅网络错误与 5xx）
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 重试退避基数（毫秒）
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_tts_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_tts_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_backoff() -> u64 {
    250
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            url: default_tts_url(),
            timeout_secs: default_tts_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl From<&TtsConfig> for HttpSynthesisClientConfig {
    fn from(config: &TtsConfig) -> Self {
        HttpSynthesisClientConfig::new(config.url.clone())
            .with_timeout(config.timeout_secs)
            .with_retries(config.max_retries, config.retry_backoff_ms)
    }
}

/// 音频缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 最大条目数
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// 条目存活时间（秒），默认 7 天
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

fn default_max_entries() -> usize {
    50
}

fn default_ttl() -> u64 {
    7 * 24 * 60 * 60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl(),
        }
    }
}

impl From<&CacheConfig> for AudioCacheConfig {
    fn from(config: &CacheConfig) -> Self {
        AudioCacheConfig {
            max_entries: config.max_entries,
            ttl_secs: config.ttl_secs,
        }
    }
}

/// 高亮同步配置
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// 同步循环帧间隔（毫秒）
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// 总时长未知时每个单词的估算时长（秒）
    #[serde(default = "default_fallback_word_secs")]
    pub fallback_word_secs: f64,
}

fn default_tick_interval() -> u64 {
    16 // 约一个渲染帧
}

fn default_fallback_word_secs() -> f64 {
    DEFAULT_FALLBACK_WORD_SECS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            fallback_word_secs: default_fallback_word_secs(),
        }
    }
}

impl From<&SyncConfig> for EngineConfig {
    fn from(config: &SyncConfig) -> Self {
        EngineConfig {
            frame_interval: Duration::from_millis(config.tick_interval_ms),
            fallback_word_secs: config.fallback_word_secs,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.tts.url, "http://localhost:8000");
        assert_eq!(config.tts.timeout_secs, 30);
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.cache.ttl_secs, 604_800);
        assert_eq!(config.sync.tick_interval_ms, 16);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_conversions() {
        let config = AppConfig::default();

        let client: HttpSynthesisClientConfig = (&config.tts).into();
        assert_eq!(client.max_retries, 1);
        assert_eq!(client.retry_backoff_ms, 250);

        let engine: EngineConfig = (&config.sync).into();
        assert_eq!(engine.frame_interval, Duration::from_millis(16));
        assert_eq!(engine.fallback_word_secs, 0.4);

        let cache: AudioCacheConfig = (&config.cache).into();
        assert_eq!(cache.max_entries, 50);
    }
}
