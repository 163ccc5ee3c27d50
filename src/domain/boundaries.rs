//! 单词时间边界
//!
//! 将合成服务提供的逐词时间戳，或仅有的音频总时长，转换为按单词顺序排列的
//! `[start, end)` 时间窗口（秒），并支持按播放时钟二分查找当前单词

use serde::{Deserialize, Serialize};

use super::tokenizer::tokenize;

/// 未知总时长时，每个单词的估算时长（秒）
pub const DEFAULT_FALLBACK_WORD_SECS: f64 = 0.4;

/// 单个单词的时间窗口（秒）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBoundary {
    pub start: f64,
    pub end: f64,
    pub word: String,
}

/// 合成服务返回的逐词时间戳（毫秒）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTiming {
    pub word: String,
    #[serde(rename = "startTimeMs")]
    pub start_ms: u64,
    #[serde(rename = "endTimeMs")]
    pub end_ms: u64,
}

/// 时间信息来源
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TimingSource {
    /// 合成服务提供的精确时间戳（按服务方的分词）
    Precise(Vec<WordTiming>),
    /// 只知道音频总时长
    #[default]
    Absent,
}

impl TimingSource {
    pub fn from_timings(timings: Option<Vec<WordTiming>>) -> Self {
        match timings {
            Some(timings) if !timings.is_empty() => TimingSource::Precise(timings),
            _ => TimingSource::Absent,
        }
    }
}

/// 边界的计算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationMethod {
    /// 直接映射精确时间戳
    Precise,
    /// 按字符长度在真实总时长上按比例分配
    Proportional,
    /// 总时长未知，按固定单词时长估算（拿到真实时长后需要重算）
    Heuristic,
}

/// 一段文本的全部边界
#[derive(Debug, Clone, PartialEq)]
pub struct Boundaries {
    pub words: Vec<WordBoundary>,
    pub method: EstimationMethod,
}

impl Boundaries {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// 是否需要在拿到真实时长后重算
    pub fn needs_duration(&self) -> bool {
        self.method == EstimationMethod::Heuristic && !self.words.is_empty()
    }

    pub fn active_index(&self, t: f64) -> Option<usize> {
        active_index(&self.words, t)
    }

    /// 最后一个窗口的结束时间
    pub fn total_secs(&self) -> f64 {
        self.words.last().map(|b| b.end).unwrap_or(0.0)
    }
}

/// 边界估算器
#[derive(Debug, Clone)]
pub struct BoundaryEstimator {
    fallback_word_secs: f64,
}

impl Default for BoundaryEstimator {
    fn default() -> Self {
        Self {
            fallback_word_secs: DEFAULT_FALLBACK_WORD_SECS,
        }
    }
}

impl BoundaryEstimator {
    pub fn new(fallback_word_secs: f64) -> Self {
        Self { fallback_word_secs }
    }

    /// 计算文本的单词边界
    ///
    /// 策略：
    /// 1. 精确时间戳数量与本地分词数量一致时，直接毫秒转秒
    /// 2. 否则按字符长度在总时长上按比例分配
    /// 3. 总时长未知（或非正数）时，以 `单词数 * fallback_word_secs` 代替
    pub fn compute(
        &self,
        text: &str,
        timing: &TimingSource,
        total_duration_secs: Option<f64>,
    ) -> Boundaries {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Boundaries {
                words: Vec::new(),
                method: EstimationMethod::Proportional,
            };
        }

        if let TimingSource::Precise(timings) = timing {
            if timings.len() == tokens.len() && is_ordered(timings) {
                let words = tokens
                    .iter()
                    .zip(timings)
                    .map(|(token, timing)| WordBoundary {
                        start: timing.start_ms as f64 / 1000.0,
                        end: timing.end_ms as f64 / 1000.0,
                        word: (*token).to_string(),
                    })
                    .collect();
                return Boundaries {
                    words,
                    method: EstimationMethod::Precise,
                };
            }

            tracing::debug!(
                provider_words = timings.len(),
                local_words = tokens.len(),
                ordered = is_ordered(timings),
                "Timing mismatch, falling back to proportional estimation"
            );
        }

        let (total, method) = match total_duration_secs {
            Some(d) if d.is_finite() && d > 0.0 => (d, EstimationMethod::Proportional),
            _ => (
                self.fallback_word_secs * tokens.len() as f64,
                EstimationMethod::Heuristic,
            ),
        };

        Boundaries {
            words: proportional(&tokens, total),
            method,
        }
    }
}

/// 时间戳窗口是否有效：起点非递减且每个窗口不倒置
fn is_ordered(timings: &[WordTiming]) -> bool {
    timings.iter().all(|t| t.end_ms >= t.start_ms)
        && timings.windows(2).all(|pair| pair[0].start_ms <= pair[1].start_ms)
}

/// 按字符长度加权分配总时长
fn proportional(tokens: &[&str], total_secs: f64) -> Vec<WordBoundary> {
    let lengths: Vec<usize> = tokens.iter().map(|t| t.chars().count()).collect();
    let total_chars: usize = lengths.iter().sum();
    if total_chars == 0 {
        return Vec::new();
    }

    let mut current = 0.0;
    let mut words = Vec::with_capacity(tokens.len());
    for (token, len) in tokens.iter().zip(lengths) {
        let duration = total_secs * (len as f64 / total_chars as f64);
        words.push(WordBoundary {
            start: current,
            end: current + duration,
            word: (*token).to_string(),
        });
        current += duration;
    }

    // 消除累加误差，最后一个窗口精确收尾
    if let Some(last) = words.last_mut() {
        last.end = total_secs;
    }
    words
}

/// 使用默认估算器计算边界（便捷方法）
pub fn compute_boundaries(
    text: &str,
    timing: &TimingSource,
    total_duration_secs: Option<f64>,
) -> Vec<WordBoundary> {
    BoundaryEstimator::default()
        .compute(text, timing, total_duration_secs)
        .words
}

/// 二分查找时刻 `t` 对应的单词下标
///
/// 半开区间 `[start, end)`：相邻窗口的交界时刻归属后一个单词。
/// 不落在任何窗口内（早于第一个窗口、两个窗口之间的空隙、最后一个窗口之后）时返回 `None`
pub fn active_index(boundaries: &[WordBoundary], t: f64) -> Option<usize> {
    if t.is_nan() {
        return None;
    }
    match boundaries.partition_point(|b| b.start <= t) {
        0 => None,
        i if t < boundaries[i - 1].end => Some(i - 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(word: &str, start_ms: u64, end_ms: u64) -> WordTiming {
        WordTiming {
            word: word.to_string(),
            start_ms,
            end_ms,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_precise_path() {
        let source = TimingSource::Precise(vec![
            timing("The", 0, 300),
            timing("cat", 300, 600),
            timing("sat", 600, 1000),
        ]);
        let result = BoundaryEstimator::default().compute("The cat sat.", &source, None);

        assert_eq!(result.method, EstimationMethod::Precise);
        let windows: Vec<(f64, f64)> = result.words.iter().map(|b| (b.start, b.end)).collect();
        assert_eq!(windows, vec![(0.0, 0.3), (0.3, 0.6), (0.6, 1.0)]);
        // 单词取自本地分词
        assert_eq!(result.words[2].word, "sat.");
        assert_eq!(result.active_index(0.45), Some(1));
    }

    #[test]
    fn test_proportional_fallback() {
        let words = compute_boundaries("The cat sat.", &TimingSource::Absent, Some(3.0));

        assert_eq!(words.len(), 3);
        assert!(approx(words[0].start, 0.0) && approx(words[0].end, 0.9));
        assert!(approx(words[1].start, 0.9) && approx(words[1].end, 1.8));
        assert!(approx(words[2].start, 1.8) && approx(words[2].end, 3.0));
    }

    #[test]
    fn test_mismatched_timings_fall_back() {
        let source = TimingSource::Precise(vec![timing("The", 0, 300), timing("cat", 300, 600)]);
        let result = BoundaryEstimator::default().compute("The cat sat.", &source, Some(3.0));

        assert_eq!(result.method, EstimationMethod::Proportional);
        assert_eq!(result.len(), 3);
        assert!(approx(result.total_secs(), 3.0));
    }

    #[test]
    fn test_unordered_timings_fall_back() {
        let source = TimingSource::Precise(vec![
            timing("The", 0, 300),
            timing("cat", 600, 1000),
            timing("sat", 300, 600),
        ]);
        let result = BoundaryEstimator::default().compute("The cat sat.", &source, Some(1.0));

        assert_eq!(result.method, EstimationMethod::Proportional);
        for pair in result.words.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
        let i = result.active_index(0.45).unwrap();
        assert!(result.words[i].start <= 0.45 && 0.45 < result.words[i].end);

        let inverted = TimingSource::Precise(vec![timing("a", 500, 100), timing("b", 500, 900)]);
        let result = BoundaryEstimator::default().compute("a b", &inverted, Some(1.0));
        assert_eq!(result.method, EstimationMethod::Proportional);
    }

    #[test]
    fn test_unknown_duration_uses_heuristic() {
        let result = BoundaryEstimator::new(0.5).compute("one two three four", &TimingSource::Absent, None);

        assert_eq!(result.method, EstimationMethod::Heuristic);
        assert!(result.needs_duration());
        assert!(approx(result.total_secs(), 2.0));

        let invalid = BoundaryEstimator::new(0.5).compute("one two", &TimingSource::Absent, Some(f64::NAN));
        assert_eq!(invalid.method, EstimationMethod::Heuristic);
    }

    #[test]
    fn test_empty_text() {
        let result = BoundaryEstimator::default().compute("  \n ", &TimingSource::Absent, Some(2.0));
        assert!(result.is_empty());
        assert!(!result.needs_duration());
        assert_eq!(active_index(&result.words, 0.5), None);
    }

    #[test]
    fn test_boundaries_are_ordered_and_cover_duration() {
        let text = "Sometimes a longer sentence\nspans several lines of text";
        let words = compute_boundaries(text, &TimingSource::Absent, Some(7.5));

        assert_eq!(words.len(), 9);
        for pair in words.windows(2) {
            assert!(pair[0].start <= pair[1].start);
            assert!(approx(pair[0].end, pair[1].start));
            assert!(pair[0].end > pair[0].start);
        }
        assert!(approx(words.last().unwrap().end, 7.5));
    }

    #[test]
    fn test_active_index_half_open() {
        let words = compute_boundaries("The cat sat.", &TimingSource::Absent, Some(3.0));

        assert_eq!(active_index(&words, -0.1), None);
        assert_eq!(active_index(&words, 0.0), Some(0));
        assert_eq!(active_index(&words, 0.899), Some(0));
        assert_eq!(active_index(&words, 0.9), Some(1));
        assert_eq!(active_index(&words, 2.999), Some(2));
        assert_eq!(active_index(&words, 3.0), None);
        assert_eq!(active_index(&words, f64::NAN), None);
    }

    #[test]
    fn test_active_index_gap_is_none() {
        let source = TimingSource::Precise(vec![timing("a", 100, 200), timing("b", 400, 500)]);
        let result = BoundaryEstimator::default().compute("a b", &source, None);

        assert_eq!(result.active_index(0.05), None);
        assert_eq!(result.active_index(0.15), Some(0));
        assert_eq!(result.active_index(0.2), None);
        assert_eq!(result.active_index(0.3), None);
        assert_eq!(result.active_index(0.45), Some(1));
        assert_eq!(result.active_index(0.5), None);
    }

    #[test]
    fn test_timing_deserialize_wire_format() {
        let json = r#"[{"word":"The","startTimeMs":0,"endTimeMs":300}]"#;
        let timings: Vec<WordTiming> = serde_json::from_str(json).unwrap();
        assert_eq!(timings[0], timing("The", 0, 300));
    }
}
