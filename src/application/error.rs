//! 应用层错误定义
//!
//! 播放会话向调用方暴露的错误。时间戳数量不一致、缓存句柄失效属于可恢复情况，
//! 在会话内部降级处理，不会出现在这里

use thiserror::Error;

use crate::application::ports::{PlayerError, SynthesisError};

/// 播放错误
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// 合成服务不可达或返回错误状态
    #[error("Fetch failure: {0}")]
    FetchFailure(#[from] SynthesisError),

    /// 播放元素加载或播放过程中出错
    #[error("Playback failure: {0}")]
    PlaybackFailure(String),

    /// 没有可朗读的单词
    #[error("Nothing to play: text is empty")]
    EmptyText,
}

impl PlaybackError {
    /// 创建播放失败错误
    pub fn playback(message: impl Into<String>) -> Self {
        Self::PlaybackFailure(message.into())
    }
}

impl From<PlayerError> for PlaybackError {
    fn from(err: PlayerError) -> Self {
        Self::PlaybackFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let err: PlaybackError = SynthesisError::Timeout.into();
        assert!(matches!(err, PlaybackError::FetchFailure(SynthesisError::Timeout)));

        let err: PlaybackError = PlayerError::StartFailed("denied".into()).into();
        assert_eq!(err.to_string(), "Playback failure: Playback failed to start: denied");
    }
}
