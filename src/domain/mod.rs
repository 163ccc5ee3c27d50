//! Domain Layer - 领域层
//!
//! 纯算法，不依赖任何运行时:
//! - tokenizer: 分词（边界计算与高亮渲染共用）
//! - boundaries: 单词时间边界估算与二分查找
//! - speech: 朗读请求值对象

mod boundaries;
mod speech;
mod tokenizer;

pub use boundaries::{
    active_index, compute_boundaries, Boundaries, BoundaryEstimator, EstimationMethod,
    TimingSource, WordBoundary, WordTiming, DEFAULT_FALLBACK_WORD_SECS,
};
pub use speech::{PlayRequest, SpeechKind, SpeechSpeed};
pub use tokenizer::{token_count, tokenize};
