//! ReadAlong Engine - 组合根
//!
//! 持有全局播放注册表与音频缓存，为每个播放控件创建 `PlaybackSession`

use std::sync::Arc;
use std::time::Duration;

use crate::application::error::PlaybackError;
use crate::application::ports::{
    generate_cache_key, AudioCachePort, AudioPlayerPort, AudioResource, CachedAudio,
    SpeechSynthesisPort, SynthesisRequest,
};
use crate::application::registry::PlaybackRegistry;
use crate::application::session::PlaybackSession;
use crate::domain::{BoundaryEstimator, PlayRequest, WordTiming, DEFAULT_FALLBACK_WORD_SECS};

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 同步循环帧间隔
    pub frame_interval: Duration,
    /// 未知总时长时每个单词的估算时长（秒）
    pub fallback_word_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            fallback_word_secs: DEFAULT_FALLBACK_WORD_SECS,
        }
    }
}

/// 已解析的音频（来自缓存或合成服务）
#[derive(Debug, Clone)]
pub(crate) struct ResolvedAudio {
    pub resource: AudioResource,
    pub timings: Option<Vec<WordTiming>>,
    pub duration_secs: Option<f64>,
    pub from_cache: bool,
}

/// 会话共享的依赖
pub(crate) struct EngineContext {
    pub registry: Arc<PlaybackRegistry>,
    pub cache: Arc<dyn AudioCachePort>,
    pub synthesizer: Arc<dyn SpeechSynthesisPort>,
    pub player: Arc<dyn AudioPlayerPort>,
    pub estimator: BoundaryEstimator,
    pub frame_interval: Duration,
}

impl EngineContext {
    /// 查缓存，未命中时调用合成服务并写回缓存
    ///
    /// 合成失败直接返回，不在此重试；写缓存失败只记录日志，不影响播放
    pub async fn resolve_audio(
        &self,
        key: &str,
        request: &PlayRequest,
    ) -> Result<ResolvedAudio, PlaybackError> {
        if let Some(entry) = self.cache.get(key) {
            tracing::debug!(key = %key, "Audio cache hit");
            return Ok(ResolvedAudio {
                resource: entry.resource,
                timings: entry.timings,
                duration_secs: entry.duration_secs,
                from_cache: true,
            });
        }

        tracing::debug!(key = %key, kind = %request.kind, "Audio cache miss, synthesizing");
        let response = self
            .synthesizer
            .synthesize(SynthesisRequest::from(request))
            .await?;

        let duration_secs = response.duration_secs();
        let audio = CachedAudio {
            resource: AudioResource::new(response.audio_data, response.mime_type),
            timings: response.timings,
            duration_secs,
        };

        let resource = match self.cache.put(key, audio.clone()) {
            Ok(resource) => resource,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to cache audio, playing uncached");
                audio.resource.clone()
            }
        };

        tracing::debug!(
            key = %key,
            provider = %response.provider,
            size_bytes = resource.size_bytes(),
            has_timings = audio.timings.is_some(),
            "Audio synthesized"
        );

        Ok(ResolvedAudio {
            resource,
            timings: audio.timings,
            duration_secs,
            from_cache: false,
        })
    }
}

/// 朗读同步引擎
///
/// 注册表与缓存是进程级共享状态，由引擎显式持有；
/// 同一个引擎创建的所有会话共享"同一时刻只有一个声音"的约束
#[derive(Clone)]
pub struct ReadAlongEngine {
    ctx: Arc<EngineContext>,
}

impl ReadAlongEngine {
    pub fn new(
        config: EngineConfig,
        cache: Arc<dyn AudioCachePort>,
        synthesizer: Arc<dyn SpeechSynthesisPort>,
        player: Arc<dyn AudioPlayerPort>,
    ) -> Self {
        Self::with_registry(config, PlaybackRegistry::new().arc(), cache, synthesizer, player)
    }

    /// 使用外部创建的注册表（例如需要预先设置平台朗读器）
    pub fn with_registry(
        config: EngineConfig,
        registry: Arc<PlaybackRegistry>,
        cache: Arc<dyn AudioCachePort>,
        synthesizer: Arc<dyn SpeechSynthesisPort>,
        player: Arc<dyn AudioPlayerPort>,
    ) -> Self {
        tracing::info!(
            frame_interval_ms = config.frame_interval.as_millis() as u64,
            fallback_word_secs = config.fallback_word_secs,
            "ReadAlongEngine initialized"
        );

        Self {
            ctx: Arc::new(EngineContext {
                registry,
                cache,
                synthesizer,
                player,
                estimator: BoundaryEstimator::new(config.fallback_word_secs),
                frame_interval: config.frame_interval,
            }),
        }
    }

    /// 为一个播放控件创建会话
    pub fn session(&self) -> PlaybackSession {
        PlaybackSession::new(self.ctx.clone())
    }

    /// 预取音频到缓存，不播放
    pub async fn prefetch(&self, request: &PlayRequest) -> Result<(), PlaybackError> {
        let key = generate_cache_key(request.kind, request.speed, &request.text);
        let audio = self.ctx.resolve_audio(&key, request).await?;
        tracing::debug!(key = %key, from_cache = audio.from_cache, "Audio prefetched");
        Ok(())
    }

    pub fn registry(&self) -> &Arc<PlaybackRegistry> {
        &self.ctx.registry
    }

    pub fn cache(&self) -> &Arc<dyn AudioCachePort> {
        &self.ctx.cache
    }

    /// 全局停止（例如离开页面时）
    pub fn stop_all(&self) -> usize {
        self.ctx.registry.stop_all()
    }

    /// 停止所有声音并清空缓存（测试隔离）
    pub fn reset(&self) {
        self.ctx.registry.reset();
        self.ctx.cache.clear();
        tracing::debug!("ReadAlongEngine reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session::SessionState;
    use crate::infrastructure::adapters::{FakeSynthesisClient, TimelinePlayer};
    use crate::infrastructure::memory::{AudioCacheConfig, InMemoryAudioCache};

    fn engine() -> (ReadAlongEngine, Arc<FakeSynthesisClient>) {
        let fake = Arc::new(FakeSynthesisClient::with_defaults());
        let engine = ReadAlongEngine::new(
            EngineConfig::default(),
            InMemoryAudioCache::new(&AudioCacheConfig::default()).arc(),
            fake.clone(),
            Arc::new(TimelinePlayer::new()),
        );
        (engine, fake)
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefetch_fills_cache() {
        let (engine, fake) = engine();
        let request = PlayRequest::word("cat");

        engine.prefetch(&request).await.unwrap();
        engine.prefetch(&request).await.unwrap();
        assert_eq!(fake.call_count(), 1);

        let session = engine.session();
        session.play(request, None).await.unwrap();
        assert_eq!(fake.call_count(), 1);
        assert_eq!(engine.cache().stats().hit_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stops_playback_and_clears_cache() {
        let (engine, fake) = engine();
        let session = engine.session();

        session
            .play(PlayRequest::sentence("long running sentence"), None)
            .await
            .unwrap();
        assert_eq!(engine.registry().playing_count(), 1);

        engine.reset();
        assert!(engine.registry().is_empty());
        assert_eq!(engine.cache().stats().total_entries, 0);
        assert_eq!(session.wait_finished().await.unwrap(), SessionState::Paused);

        session
            .play(PlayRequest::sentence("long running sentence"), None)
            .await
            .unwrap();
        assert_eq!(fake.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_when_nothing_plays() {
        let (engine, _) = engine();
        assert_eq!(engine.stop_all(), 0);
    }
}
