//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_cache;
mod audio_player;
mod audio_resource;
mod clock;
mod narrator;
mod speech_synthesis;

pub use audio_cache::{
    generate_cache_key, AudioCachePort, CacheEntry, CacheError, CacheStats, CachedAudio,
};
pub use audio_player::{
    AudioPlayerPort, PlaybackElement, PlayerError, PlayerSnapshot, PlayerStatus,
};
pub use audio_resource::AudioResource;
pub use clock::Clock;
pub use narrator::FallbackNarrator;
pub use speech_synthesis::{
    SpeechSynthesisPort, SynthesisError, SynthesisRequest, SynthesisResponse,
};
