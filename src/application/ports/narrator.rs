//! Fallback Narrator Port - 平台级语音朗读
//!
//! 与音频播放共享"同一时刻只有一个声音"的约束，由播放注册表统一停止

/// 平台语音朗读器（例如系统 TTS）
pub trait FallbackNarrator: Send + Sync {
    /// 是否正在朗读
    fn is_speaking(&self) -> bool;

    /// 立即停止朗读，空闲时调用无副作用
    fn cancel(&self);
}
