//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SpeechSynthesis、AudioCache、AudioPlayer 等）
//! - registry: 全局播放注册表（同一时刻只有一个声音）
//! - sync_loop: 播放时钟到单词下标的同步循环
//! - session: 播放会话状态机
//! - engine: 组合根
//! - error: 应用层错误定义

pub mod engine;
pub mod error;
pub mod ports;
pub mod registry;
pub mod session;
pub mod sync_loop;

pub use engine::{EngineConfig, ReadAlongEngine};
pub use error::PlaybackError;
pub use registry::PlaybackRegistry;
pub use session::{PlayOutcome, PlaybackSession, SessionState};
pub use sync_loop::{HighlightSink, PlaybackClock, SharedBoundaries, SyncLoop, TickOutcome};

pub use ports::{
    // Audio cache
    generate_cache_key,
    AudioCachePort,
    CacheEntry,
    CacheError,
    CacheStats,
    CachedAudio,
    // Audio player
    AudioPlayerPort,
    AudioResource,
    PlaybackElement,
    PlayerError,
    PlayerSnapshot,
    PlayerStatus,
    // Misc
    Clock,
    FallbackNarrator,
    // Speech synthesis
    SpeechSynthesisPort,
    SynthesisError,
    SynthesisRequest,
    SynthesisResponse,
};
