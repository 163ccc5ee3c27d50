//! In-Memory LRU Audio Cache Implementation
//!
//! 容量上限按条目数计算，超过 TTL 的条目在查找时移除；
//! 所有移除路径都会撤销资源句柄

use chrono::Duration;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::SystemClock;
use crate::application::ports::{
    AudioCachePort, AudioResource, CacheEntry, CacheError, CacheStats, CachedAudio, Clock,
};

/// 默认最大条目数
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// 默认 TTL（7 天）
pub const DEFAULT_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// 内存缓存配置
#[derive(Debug, Clone)]
pub struct AudioCacheConfig {
    /// 最大条目数
    pub max_entries: usize,
    /// 条目存活时间（秒）
    pub ttl_secs: u64,
}

impl Default for AudioCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

/// 超出 chrono 可表示范围的 TTL 视为永不过期
fn ttl_from_secs(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// 查找结果
enum Lookup {
    Hit(CacheEntry),
    Expired,
    Revoked,
    Missing,
}

/// 内存音频缓存
pub struct InMemoryAudioCache {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    eviction_count: AtomicU64,
}

impl InMemoryAudioCache {
    pub fn new(config: &AudioCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AudioCacheConfig, clock: Arc<dyn Clock>) -> Self {
        tracing::info!(
            max_entries = config.max_entries,
            ttl_secs = config.ttl_secs,
            "InMemoryAudioCache initialized"
        );

        Self {
            entries: DashMap::new(),
            max_entries: config.max_entries,
            ttl: ttl_from_secs(config.ttl_secs),
            clock,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.clock.now() - entry.created_at > self.ttl
    }

    /// 移除条目并撤销句柄
    fn discard(&self, key: &str) -> Option<CacheEntry> {
        let (_, entry) = self.entries.remove(key)?;
        entry.resource.revoke();
        Some(entry)
    }
}

impl AudioCachePort for InMemoryAudioCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let lookup = match self.entries.get_mut(key) {
            None => Lookup::Missing,
            Some(mut entry) => {
                if self.is_expired(&entry) {
                    Lookup::Expired
                } else if entry.resource.is_revoked() {
                    Lookup::Revoked
                } else {
                    entry.last_accessed = self.clock.now();
                    Lookup::Hit(entry.clone())
                }
            }
        };

        match lookup {
            Lookup::Hit(entry) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            Lookup::Expired => {
                self.discard(key);
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "Cache entry expired");
                None
            }
            Lookup::Revoked => {
                self.discard(key);
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %key, "Cache entry handle revoked, treating as miss");
                None
            }
            Lookup::Missing => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn put(&self, key: &str, audio: CachedAudio) -> Result<AudioResource, CacheError> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        if self.max_entries == 0 {
            return Err(CacheError::EvictionFailed);
        }

        // 覆盖已有条目
        if self.discard(key).is_some() {
            tracing::debug!(key = %key, "Replacing cached audio");
        }

        // 淘汰以腾出空间
        while self.entries.len() >= self.max_entries {
            if self.evict_oldest().is_none() {
                return Err(CacheError::EvictionFailed);
            }
        }

        let now = self.clock.now();
        let resource = audio.resource.clone();
        let size_bytes = resource.size_bytes();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                resource: audio.resource,
                timings: audio.timings,
                duration_secs: audio.duration_secs,
                size_bytes,
                created_at: now,
                last_accessed: now,
            },
        );

        tracing::debug!(key = %key, size_bytes = size_bytes, "Audio cached");
        Ok(resource)
    }

    fn evict_oldest(&self) -> Option<String> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().last_accessed)
            .map(|e| e.key().clone())?;

        let entry = self.discard(&oldest)?;
        self.eviction_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            key = %oldest,
            size_bytes = entry.size_bytes,
            "LRU evicted cache entry"
        );
        Some(oldest)
    }

    fn purge_expired(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| self.is_expired(e.value()))
            .map(|e| e.key().clone())
            .collect();

        let purged = expired
            .iter()
            .filter(|key| self.discard(key).is_some())
            .count();
        if purged > 0 {
            tracing::debug!(purged = purged, "Expired cache entries purged");
        }
        purged
    }

    fn remove(&self, key: &str) -> bool {
        self.discard(key).is_some()
    }

    fn clear(&self) {
        self.entries.retain(|_, entry| {
            entry.resource.revoke();
            false
        });
        tracing::debug!("Audio cache cleared");
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            total_size_bytes: self.entries.iter().map(|e| e.value().size_bytes).sum(),
            max_entries: self.max_entries,
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            eviction_count: self.eviction_count.load(Ordering::Relaxed),
        }
    }
}
