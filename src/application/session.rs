//! Playback Session - 单个播放控件的状态机
//!
//! 状态: Idle → Loading → Playing → (Paused | Ended | Errored)，终态可回到 Idle。
//! 一次 play() 依次完成：查缓存 → 未命中时合成 → 构造播放元素 → 计算边界 →
//! 停止其他声音并注册 → 开始播放 → 启动同步循环 → 结束/出错/取消时清理

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::watch;
use uuid::Uuid;

use super::engine::EngineContext;
use super::error::PlaybackError;
use super::sync_loop::{HighlightSink, SharedBoundaries, SyncLoop};
use crate::application::ports::{
    generate_cache_key, PlaybackElement, PlayerError, PlayerStatus,
};
use crate::domain::{token_count, PlayRequest, TimingSource};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// 查缓存/合成中
    Loading,
    Playing,
    /// 被停止（主动停止或被其他播放打断）
    Paused,
    /// 自然播放结束
    Ended,
    Errored,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Playing => "playing",
            SessionState::Paused => "paused",
            SessionState::Ended => "ended",
            SessionState::Errored => "errored",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Paused | SessionState::Ended | SessionState::Errored
        )
    }

    /// 是否允许转换到 `next`
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (_, Errored) => true,
            (Idle, Loading) => true,
            (Loading, Playing | Idle) => true,
            (Playing, Paused | Ended | Idle) => true,
            (Paused | Ended | Errored, Idle) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// play() 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// 开始播放
    Started,
    /// 正在播放时再次调用，切换为停止；或加载期间被停止
    Stopped,
    /// 加载中，忽略重复请求
    Ignored,
}

/// 当前正在驱动的播放
struct ActivePlayback {
    element: Arc<dyn PlaybackElement>,
    sync: Option<SyncLoop>,
    generation: u64,
}

impl ActivePlayback {
    /// 结束高亮、注销并停止播放元素
    fn release(self, inner: &SessionInner) {
        if let Some(sync) = &self.sync {
            sync.finish();
        }
        inner.ctx.registry.unregister(self.element.id());
        self.element.pause();
    }
}

/// 边界重算所需的信息
struct Recompute {
    boundaries: SharedBoundaries,
    text: String,
    timing: TimingSource,
}

struct SessionInner {
    id: Uuid,
    ctx: Arc<EngineContext>,
    state: watch::Sender<SessionState>,
    active: Mutex<Option<ActivePlayback>>,
    /// 每次 play()/停止加载时递增，用于丢弃过期的异步结果
    generation: AtomicU64,
    last_error: Mutex<Option<String>>,
}

/// 播放会话
///
/// 每个播放控件一个，`Clone` 共享同一会话
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl PlaybackSession {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                ctx,
                state,
                active: Mutex::new(None),
                generation: AtomicU64::new(0),
                last_error: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// 订阅状态变化（UI 的加载中/播放中指示）
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// 最近一次错误信息
    pub fn last_error(&self) -> Option<String> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 播放一段文本
    ///
    /// - 正在播放时再次调用：停止并回到 Idle（切换语义）
    /// - 加载中再次调用：忽略
    /// - 多词文本且提供了 `highlight` 时启动同步循环
    pub async fn play(
        &self,
        request: PlayRequest,
        highlight: Option<HighlightSink>,
    ) -> Result<PlayOutcome, PlaybackError> {
        let inner = &self.inner;

        let word_count = token_count(&request.text);
        let generation = {
            let active = inner.lock_active();
            match inner.current_state() {
                SessionState::Playing => {
                    drop(active);
                    inner.stop_active(SessionState::Idle);
                    return Ok(PlayOutcome::Stopped);
                }
                SessionState::Loading => {
                    tracing::debug!(session_id = %inner.id, "Play ignored while loading");
                    return Ok(PlayOutcome::Ignored);
                }
                state if state.is_terminal() => inner.transition(SessionState::Idle),
                _ => {}
            }

            if word_count == 0 {
                return Err(PlaybackError::EmptyText);
            }

            *inner.last_error.lock().unwrap_or_else(|e| e.into_inner()) = None;
            inner.transition(SessionState::Loading);
            let generation = inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
            drop(active);
            generation
        };

        match inner
            .load_and_start(generation, &request, word_count, highlight)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                inner.fail(generation, err.to_string());
                Err(err)
            }
        }
    }

    /// 停止播放（或放弃加载），可重复调用
    pub fn stop(&self) {
        self.inner.stop_active(SessionState::Paused);
    }

    /// 等待本次播放结束，返回终态；出错时返回错误
    pub async fn wait_finished(&self) -> Result<SessionState, PlaybackError> {
        let mut rx = self.inner.state.subscribe();
        let state = *rx
            .wait_for(|s| s.is_terminal() || *s == SessionState::Idle)
            .await
            .map_err(|_| PlaybackError::playback("session closed"))?;

        if state == SessionState::Errored {
            let message = self.last_error().unwrap_or_else(|| "unknown error".to_string());
            return Err(PlaybackError::PlaybackFailure(message));
        }
        Ok(state)
    }
}

impl SessionInner {
    fn lock_active(&self) -> MutexGuard<'_, Option<ActivePlayback>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn transition(&self, next: SessionState) {
        let previous = self.current_state();
        if previous == next {
            return;
        }
        if !previous.can_transition_to(next) {
            tracing::warn!(
                session_id = %self.id,
                from = %previous,
                to = %next,
                "Invalid session state transition ignored"
            );
            return;
        }
        self.state.send_replace(next);
        tracing::debug!(session_id = %self.id, from = %previous, to = %next, "Session state changed");
    }

    async fn load_and_start(
        self: &Arc<Self>,
        generation: u64,
        request: &PlayRequest,
        word_count: usize,
        highlight: Option<HighlightSink>,
    ) -> Result<PlayOutcome, PlaybackError> {
        let key = generate_cache_key(request.kind, request.speed, &request.text);

        // 缓存句柄失效时重新合成一次
        let mut refetched = false;
        let (element, audio) = loop {
            let audio = self.ctx.resolve_audio(&key, request).await?;
            if !self.is_current(generation) {
                return Ok(PlayOutcome::Stopped);
            }
            match self.ctx.player.load(&audio.resource, audio.duration_secs) {
                Ok(element) => break (element, audio),
                Err(PlayerError::ResourceRevoked(id)) if !refetched => {
                    tracing::warn!(key = %key, resource_id = %id, "Cached audio revoked, refetching");
                    self.ctx.cache.remove(&key);
                    refetched = true;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let highlight = highlight.filter(|_| word_count > 1);
        let recompute = highlight.as_ref().map(|_| {
            let timing = TimingSource::from_timings(audio.timings.clone());
            let duration = element.duration().or(audio.duration_secs);
            let boundaries = self.ctx.estimator.compute(&request.text, &timing, duration);
            tracing::debug!(
                session_id = %self.id,
                words = boundaries.len(),
                method = ?boundaries.method,
                "Word boundaries computed"
            );
            Recompute {
                boundaries: Arc::new(RwLock::new(boundaries)),
                text: request.text.clone(),
                timing,
            }
        });

        // 停止其他所有声音后再注册
        self.ctx.registry.register_exclusive(element.clone());
        {
            let mut active = self.lock_active();
            if !self.is_current(generation) {
                drop(active);
                self.ctx.registry.unregister(element.id());
                return Ok(PlayOutcome::Stopped);
            }
            *active = Some(ActivePlayback {
                element: element.clone(),
                sync: None,
                generation,
            });
        }

        element.start().await?;

        let sync = {
            let mut active = self.lock_active();
            let still_current =
                matches!(active.as_ref(), Some(playback) if playback.generation == generation);
            if !still_current {
                // start() 期间被停止
                drop(active);
                element.pause();
                self.ctx.registry.unregister(element.id());
                return Ok(PlayOutcome::Stopped);
            }
            self.transition(SessionState::Playing);

            match (highlight, &recompute) {
                (Some(sink), Some(recompute)) => {
                    let sync = SyncLoop::start(
                        element.clone(),
                        recompute.boundaries.clone(),
                        sink,
                        self.ctx.frame_interval,
                    );
                    if let Some(playback) = active.as_mut() {
                        playback.sync = Some(sync.clone());
                    }
                    Some(sync)
                }
                _ => None,
            }
        };
        if let Some(sync) = sync {
            self.ctx.registry.bind_sync_loop(element.id(), sync);
        }

        tracing::info!(
            session_id = %self.id,
            kind = %request.kind,
            words = word_count,
            from_cache = audio.from_cache,
            "Playback started"
        );

        self.spawn_monitor(element, generation, recompute);
        Ok(PlayOutcome::Started)
    }

    /// 监听播放元素状态：时长就绪时重算边界，终态时清理
    fn spawn_monitor(
        self: &Arc<Self>,
        element: Arc<dyn PlaybackElement>,
        generation: u64,
        mut recompute: Option<Recompute>,
    ) {
        let inner = self.clone();
        let mut rx = element.subscribe();

        tokio::spawn(async move {
            loop {
                let snapshot = rx.borrow_and_update().clone();

                // 只重算一次
                if let Some(duration) = snapshot.duration {
                    if let Some(r) = recompute.take() {
                        let mut boundaries =
                            r.boundaries.write().unwrap_or_else(|e| e.into_inner());
                        if boundaries.needs_duration() {
                            *boundaries =
                                inner.ctx.estimator.compute(&r.text, &r.timing, Some(duration));
                            tracing::debug!(
                                session_id = %inner.id,
                                duration_secs = duration,
                                "Word boundaries recomputed with audio duration"
                            );
                        }
                    }
                }

                match snapshot.status {
                    PlayerStatus::Ended => {
                        inner.finish(generation, SessionState::Ended, None);
                        break;
                    }
                    PlayerStatus::Paused => {
                        inner.finish(generation, SessionState::Paused, None);
                        break;
                    }
                    PlayerStatus::Failed(message) => {
                        inner.finish(generation, SessionState::Errored, Some(message));
                        break;
                    }
                    PlayerStatus::Idle | PlayerStatus::Playing => {}
                }

                if rx.changed().await.is_err() {
                    inner.finish(generation, SessionState::Ended, None);
                    break;
                }
            }
        });
    }

    /// 播放元素到达终态
    fn finish(&self, generation: u64, state: SessionState, error: Option<String>) {
        let playback = {
            let mut active = self.lock_active();
            if !matches!(active.as_ref(), Some(playback) if playback.generation == generation) {
                return;
            }
            if let Some(message) = &error {
                tracing::warn!(session_id = %self.id, error = %message, "Playback failed");
                *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.clone());
            }
            self.transition(state);
            active.take()
        };

        if let Some(playback) = playback {
            playback.release(self);
        }
        tracing::info!(session_id = %self.id, state = %state, "Playback finished");
    }

    /// 加载或启动失败
    fn fail(&self, generation: u64, message: String) {
        let playback = {
            let mut active = self.lock_active();
            if !self.is_current(generation) {
                return;
            }
            tracing::warn!(session_id = %self.id, error = %message, "Playback request failed");
            *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(message);
            self.transition(SessionState::Errored);
            let owned = matches!(active.as_ref(), Some(playback) if playback.generation == generation);
            if owned {
                active.take()
            } else {
                None
            }
        };

        if let Some(playback) = playback {
            playback.release(self);
        }
    }

    /// 停止当前播放；加载中则放弃本次加载
    fn stop_active(&self, target: SessionState) {
        let playback = {
            let mut active = self.lock_active();
            match active.take() {
                Some(playback) => {
                    self.transition(target);
                    Some(playback)
                }
                None => {
                    if self.current_state() == SessionState::Loading {
                        self.generation.fetch_add(1, Ordering::AcqRel);
                        self.transition(SessionState::Idle);
                    }
                    None
                }
            }
        };

        if let Some(playback) = playback {
            playback.release(self);
            tracing::info!(session_id = %self.id, state = %target, "Playback stopped");
        }
    }
}
