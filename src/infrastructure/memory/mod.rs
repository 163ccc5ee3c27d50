//! In-Memory Implementations
//!
//! 进程内状态：音频缓存、时钟

mod audio_cache;
mod clock;

pub use audio_cache::{AudioCacheConfig, InMemoryAudioCache, DEFAULT_MAX_ENTRIES, DEFAULT_TTL_SECS};
pub use clock::{ManualClock, SystemClock};
