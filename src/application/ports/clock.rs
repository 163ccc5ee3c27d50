//! Clock Port - 时间来源
//!
//! 缓存的 TTL 与 LRU 依赖当前时间，测试时可替换为手动时钟

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
