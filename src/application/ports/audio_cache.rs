//! Audio Cache Port - 音频缓存管理
//!
//! 定义音频缓存的抽象接口，具体实现为内存 LRU 缓存（带 TTL）

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::AudioResource;
use crate::domain::{SpeechKind, SpeechSpeed, WordTiming};

/// Audio Cache 错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("Cache full, eviction failed")]
    EvictionFailed,
}

/// 写入缓存的音频
#[derive(Debug, Clone)]
pub struct CachedAudio {
    pub resource: AudioResource,
    /// 句子的逐词时间戳（服务方提供时）
    pub timings: Option<Vec<WordTiming>>,
    /// 音频时长（秒）
    pub duration_secs: Option<f64>,
}

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub resource: AudioResource,
    pub timings: Option<Vec<WordTiming>>,
    pub duration_secs: Option<f64>,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// Audio Cache Port
///
/// 基于规范化 (kind, speed, text) key 的 LRU 缓存
/// - 超过 TTL 的条目在下次查找时视为不存在并被移除
/// - 达到容量上限时淘汰 last_accessed 最早的条目
/// - 移除条目时撤销其资源句柄
pub trait AudioCachePort: Send + Sync {
    /// 获取缓存条目
    ///
    /// 同时更新 last_accessed（LRU touch）；过期或句柄已撤销的条目返回 None
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// 存储音频，返回缓存持有的资源句柄
    ///
    /// 满容量时先淘汰最久未访问的条目
    fn put(&self, key: &str, audio: CachedAudio) -> Result<AudioResource, CacheError>;

    /// 淘汰最久未访问的条目，返回被淘汰的 key
    fn evict_oldest(&self) -> Option<String>;

    /// 移除所有过期条目，返回移除数量
    fn purge_expired(&self) -> usize;

    /// 删除缓存条目
    fn remove(&self, key: &str) -> bool;

    /// 清空缓存并撤销所有资源句柄
    fn clear(&self);

    /// 获取缓存统计信息
    fn stats(&self) -> CacheStats;
}

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub max_entries: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
}

/// 生成缓存 key
///
/// 拼接 kind + speed + text 后只保留字母数字字符，再取 md5，
/// 使仅有空白/标点差异的请求命中同一条目
pub fn generate_cache_key(kind: SpeechKind, speed: SpeechSpeed, text: &str) -> String {
    let normalized: String = format!("{}{}{}", kind, speed, text)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    let digest = md5::compute(normalized.as_bytes());
    format!("{}:{:x}", kind, digest)
}
