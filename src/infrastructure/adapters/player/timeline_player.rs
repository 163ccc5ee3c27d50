//! Timeline Player - 静音播放元素
//!
//! 不输出声音，只按 tokio 时钟推进播放位置，到达时长后发布 Ended。
//! 用于演示与测试；真实音频后端实现同一个 `AudioPlayerPort` 即可替换

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::probe::probe_duration;
use crate::application::ports::{
    AudioPlayerPort, AudioResource, PlaybackElement, PlayerError, PlayerSnapshot, PlayerStatus,
};

/// 播放进度
struct Timeline {
    /// 已播放的秒数（不含当前这段）
    offset: f64,
    /// 当前这段播放的起点，暂停时为 None
    started_at: Option<Instant>,
    /// 当前这段的驱动任务
    run: Option<CancellationToken>,
    /// 是否开始过播放
    has_run: bool,
}

impl Timeline {
    fn position(&self, duration: Option<f64>) -> f64 {
        let elapsed = self
            .started_at
            .map(|at| at.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let position = self.offset + elapsed;
        match duration {
            Some(d) => position.min(d),
            None => position,
        }
    }
}

struct ElementShared {
    id: Uuid,
    /// 加载时取出的音频数据，缓存撤销句柄后仍可继续播放
    data: Arc<[u8]>,
    mime_type: String,
    state: watch::Sender<PlayerSnapshot>,
    timeline: Mutex<Timeline>,
}

impl ElementShared {
    fn lock_timeline(&self) -> MutexGuard<'_, Timeline> {
        self.timeline.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn duration(&self) -> Option<f64> {
        self.state.borrow().duration
    }

    /// 时长未知时探测音频
    fn resolve_duration(&self) -> Result<f64, PlayerError> {
        if let Some(duration) = self.duration() {
            return Ok(duration);
        }
        let duration = probe_duration(&self.data, &self.mime_type)?;
        self.state.send_modify(|s| s.duration = Some(duration));
        tracing::debug!(element_id = %self.id, duration_secs = duration, "Audio duration probed");
        Ok(duration)
    }

    async fn drive(self: Arc<Self>, token: CancellationToken) {
        let duration = match self.resolve_duration() {
            Ok(duration) => duration,
            Err(e) => {
                let mut timeline = self.lock_timeline();
                if !token.is_cancelled() {
                    timeline.started_at = None;
                    timeline.run = None;
                    self.state
                        .send_modify(|s| s.status = PlayerStatus::Failed(e.to_string()));
                }
                return;
            }
        };

        let remaining = {
            let timeline = self.lock_timeline();
            (duration - timeline.position(Some(duration))).max(0.0)
        };

        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs_f64(remaining)) => {
                let mut timeline = self.lock_timeline();
                if token.is_cancelled() {
                    return;
                }
                timeline.offset = duration;
                timeline.started_at = None;
                timeline.run = None;
                self.state.send_modify(|s| s.status = PlayerStatus::Ended);
                tracing::debug!(element_id = %self.id, "Playback element ended");
            }
        }
    }
}

/// 静音播放元素
pub struct TimelineElement {
    shared: Arc<ElementShared>,
}

impl TimelineElement {
    fn new(resource: &AudioResource, duration: Option<f64>) -> Self {
        let (state, _) = watch::channel(PlayerSnapshot::new(duration));
        Self {
            shared: Arc::new(ElementShared {
                id: Uuid::new_v4(),
                data: resource.shared_data(),
                mime_type: resource.mime_type().to_string(),
                state,
                timeline: Mutex::new(Timeline {
                    offset: 0.0,
                    started_at: None,
                    run: None,
                    has_run: false,
                }),
            }),
        }
    }

    pub fn status(&self) -> PlayerStatus {
        self.shared.state.borrow().status.clone()
    }
}

#[async_trait]
impl PlaybackElement for TimelineElement {
    fn id(&self) -> Uuid {
        self.shared.id
    }

    async fn start(&self) -> Result<(), PlayerError> {
        let shared = &self.shared;
        let token = {
            let mut timeline = shared.lock_timeline();
            if timeline.started_at.is_some() {
                return Ok(());
            }
            // 开始前已被停止，保持静音
            if !timeline.has_run && self.status() == PlayerStatus::Paused {
                tracing::debug!(element_id = %shared.id, "Element stopped before start, staying paused");
                return Ok(());
            }
            if self.status() == PlayerStatus::Ended {
                timeline.offset = 0.0;
            }
            let token = CancellationToken::new();
            timeline.started_at = Some(Instant::now());
            timeline.run = Some(token.clone());
            timeline.has_run = true;
            shared.state.send_modify(|s| s.status = PlayerStatus::Playing);
            token
        };

        tokio::spawn(shared.clone().drive(token));
        Ok(())
    }

    fn pause(&self) {
        let shared = &self.shared;
        let mut timeline = shared.lock_timeline();
        match self.status() {
            PlayerStatus::Playing => {
                timeline.offset = timeline.position(shared.duration());
                timeline.started_at = None;
                if let Some(run) = timeline.run.take() {
                    run.cancel();
                }
                shared.state.send_modify(|s| s.status = PlayerStatus::Paused);
            }
            PlayerStatus::Idle => {
                shared.state.send_modify(|s| s.status = PlayerStatus::Paused);
            }
            PlayerStatus::Paused | PlayerStatus::Ended | PlayerStatus::Failed(_) => {}
        }
    }

    fn current_time(&self) -> f64 {
        self.shared.lock_timeline().position(self.shared.duration())
    }

    fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.shared.state.subscribe()
    }
}

/// 静音播放器
#[derive(Debug, Default, Clone)]
pub struct TimelinePlayer;

impl TimelinePlayer {
    pub fn new() -> Self {
        Self
    }
}

impl AudioPlayerPort for TimelinePlayer {
    fn load(
        &self,
        resource: &AudioResource,
        duration_hint: Option<f64>,
    ) -> Result<Arc<dyn PlaybackElement>, PlayerError> {
        if resource.is_revoked() {
            return Err(PlayerError::ResourceRevoked(resource.id()));
        }

        // 无效时长视为未知，播放开始后再探测
        let duration = duration_hint.filter(|d| d.is_finite() && *d > 0.0);
        tracing::debug!(
            resource_id = %resource.id(),
            size_bytes = resource.size_bytes(),
            duration_secs = ?duration,
            "Audio loaded"
        );
        Ok(Arc::new(TimelineElement::new(resource, duration)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::synthesis::silent_wav;

    fn wav_resource(duration_ms: u64) -> AudioResource {
        AudioResource::new(silent_wav(duration_ms, 8000), "audio/wav")
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_advances_and_ends() {
        let element = TimelinePlayer::new().load(&wav_resource(1000), Some(1.0)).unwrap();
        let mut rx = element.subscribe();

        element.start().await.unwrap();
        assert!(element.is_active());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!((element.current_time() - 0.5).abs() < 0.02);

        rx.wait_for(|s| s.status == PlayerStatus::Ended).await.unwrap();
        assert!(!element.is_active());
        assert!((element.current_time() - 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_holds_position() {
        let element = TimelinePlayer::new().load(&wav_resource(2000), Some(2.0)).unwrap();
        element.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        element.pause();
        let held = element.current_time();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(element.current_time(), held);
        assert_eq!(element.subscribe().borrow().status, PlayerStatus::Paused);

        // 重复暂停无副作用
        element.pause();
        assert_eq!(element.subscribe().borrow().status, PlayerStatus::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_before_start_stays_paused() {
        let element = TimelinePlayer::new().load(&wav_resource(1000), Some(1.0)).unwrap();
        element.pause();

        element.start().await.unwrap();
        assert!(!element.is_active());
        assert_eq!(element.subscribe().borrow().status, PlayerStatus::Paused);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(element.current_time(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_after_pause() {
        let element = TimelinePlayer::new().load(&wav_resource(1000), Some(1.0)).unwrap();
        element.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        element.pause();

        element.start().await.unwrap();
        assert!(element.is_active());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!((element.current_time() - 0.3).abs() < 0.02);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_probed_after_start() {
        let element = TimelinePlayer::new().load(&wav_resource(1500), None).unwrap();
        assert_eq!(element.duration(), None);

        let mut rx = element.subscribe();
        element.start().await.unwrap();
        rx.wait_for(|s| s.duration.is_some()).await.unwrap();
        assert!((element.duration().unwrap() - 1.5).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_audio_fails() {
        let resource = AudioResource::new(b"garbage".to_vec(), "audio/wav");
        let element = TimelinePlayer::new().load(&resource, None).unwrap();
        let mut rx = element.subscribe();

        element.start().await.unwrap();
        let snapshot = rx
            .wait_for(|s| matches!(s.status, PlayerStatus::Failed(_)))
            .await
            .unwrap()
            .clone();
        assert!(matches!(snapshot.status, PlayerStatus::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loaded_element_survives_revocation() {
        let resource = wav_resource(200);
        let element = TimelinePlayer::new().load(&resource, None).unwrap();
        resource.revoke();

        let mut rx = element.subscribe();
        element.start().await.unwrap();
        rx.wait_for(|s| s.status == PlayerStatus::Ended).await.unwrap();
    }

    #[test]
    fn test_revoked_resource_refused() {
        let resource = wav_resource(100);
        resource.revoke();

        let result = TimelinePlayer::new().load(&resource, Some(0.1));
        assert!(matches!(result, Err(PlayerError::ResourceRevoked(id)) if id == resource.id()));
    }
}
