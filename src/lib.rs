//! ReadAlong - 朗读与逐词高亮同步引擎
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - 分词、单词时间边界估算、当前单词二分查找
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SpeechSynthesis, AudioCache, AudioPlayer, FallbackNarrator, Clock）
//! - Registry: 全局播放注册表
//! - SyncLoop: 播放时钟到高亮下标的同步循环
//! - Session: 播放会话状态机
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HTTP/Fake 合成客户端, 静音时间线播放器
//! - Memory: LRU + TTL 音频缓存, 时钟

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{
    AudioCachePort, AudioPlayerPort, PlayOutcome, PlaybackError, PlaybackSession, ReadAlongEngine,
    SessionState, SpeechSynthesisPort,
};
pub use config::{load_config, AppConfig};
