//! Audio Player Port - 播放元素抽象
//!
//! 播放元素提供播放时钟与生命周期状态，会话层据此驱动同步循环

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use super::AudioResource;

/// 播放错误
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Audio resource revoked: {0}")]
    ResourceRevoked(Uuid),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Playback failed to start: {0}")]
    StartFailed(String),
}

/// 播放元素状态
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerStatus {
    /// 已加载，未开始
    Idle,
    Playing,
    Paused,
    /// 自然播放结束
    Ended,
    /// 播放过程中出错（解码/IO）
    Failed(String),
}

impl PlayerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlayerStatus::Paused | PlayerStatus::Ended | PlayerStatus::Failed(_)
        )
    }
}

/// 播放元素快照：状态 + 元数据
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub status: PlayerStatus,
    /// 音频总时长（秒），元数据未就绪时为 None
    pub duration: Option<f64>,
}

impl PlayerSnapshot {
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            status: PlayerStatus::Idle,
            duration,
        }
    }
}

/// 播放元素
///
/// 对应一次加载好的音频，`current_time()` 即播放时钟（秒）
#[async_trait]
pub trait PlaybackElement: Send + Sync {
    fn id(&self) -> Uuid;

    /// 开始播放，等待平台确认
    async fn start(&self) -> Result<(), PlayerError>;

    /// 暂停（停止）播放，可重复调用
    fn pause(&self);

    /// 当前播放位置（秒）
    fn current_time(&self) -> f64;

    /// 订阅状态与时长变化
    fn subscribe(&self) -> watch::Receiver<PlayerSnapshot>;

    /// 音频总时长（秒），元数据未就绪时为 None
    fn duration(&self) -> Option<f64> {
        self.subscribe().borrow().duration
    }

    /// 是否正在播放
    fn is_active(&self) -> bool {
        self.subscribe().borrow().status == PlayerStatus::Playing
    }
}

/// Audio Player Port
///
/// 由音频资源构造播放元素
pub trait AudioPlayerPort: Send + Sync {
    fn load(
        &self,
        resource: &AudioResource,
        duration_hint: Option<f64>,
    ) -> Result<Arc<dyn PlaybackElement>, PlayerError>;
}
